//! Host capability contract: what a map generator instance must expose for
//! custom tiles to be slotted into its content tables and placed on its grid.
//!
//! The host's internals are never reached into directly. Everything the
//! generation core reads or drives goes through [`MapHost`],
//! [`SpawnGateway`], and [`MarkerMaterials`].

pub mod contract;
pub mod tables;

pub use contract::{
    DecalMaterials, HostError, InstanceId, MapHost, MarkerMaterials, MarkerProjector, ObjectId,
    SpawnAck, SpawnGateway, SpawnRequest, SpawnedObject,
};
pub use tables::{
    ContentTables, ExtendedTables, ExtensionStatus, TableError, TableExtensionAdapter,
    extend_tables,
};
