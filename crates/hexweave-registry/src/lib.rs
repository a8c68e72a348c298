//! Tile type registry: stable ids for tiles contributed by extension modules,
//! plus the opaque asset handles those tiles carry.

pub mod definition;
pub mod handles;
pub mod registry;

pub use definition::{TileDefinition, TileSpec, TileTypeId};
pub use handles::{ComponentRef, IconMaterial, NetworkComponentRef, PrefabRef, TextureRef};
pub use registry::{DEFAULT_FIRST_CUSTOM_ID, RegistryError, RegistryLease, TileRegistry};
