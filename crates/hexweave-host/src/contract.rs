//! Traits and value types at the host boundary.

use std::fmt;

use glam::Vec3;
use hexweave_registry::{
    ComponentRef, IconMaterial, NetworkComponentRef, PrefabRef, TextureRef, TileTypeId,
};
use thiserror::Error;

use crate::tables::ContentTables;

// ---------------------------------------------------------------------------
// Ids
// ---------------------------------------------------------------------------

/// Identity of one host generator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of an object instantiated by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(pub u64);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures reported by host collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// Large/small map setup failed.
    #[error("map setup failed: {0}")]
    Setup(String),

    /// The host could not place a tile.
    #[error("placing tile {tile} at slot {slot} failed: {reason}")]
    Placement {
        /// Tile being placed.
        tile: TileTypeId,
        /// Target slot.
        slot: usize,
        /// Host-supplied reason.
        reason: String,
    },

    /// The host could not instantiate a prefab.
    #[error("failed to instantiate {prefab}: {reason}")]
    Instantiate {
        /// Prefab that failed.
        prefab: PrefabRef,
        /// Host-supplied reason.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Spawning
// ---------------------------------------------------------------------------

/// Everything the host needs to instantiate a custom tile.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRequest {
    /// Tile type being spawned.
    pub tile: TileTypeId,
    /// Target slot.
    pub slot: usize,
    /// Content to instantiate.
    pub prefab: PrefabRef,
    /// World position of the slot.
    pub position: Vec3,
    /// Capabilities to attach, in order.
    pub components: Vec<ComponentRef>,
    /// Networked capabilities to attach, in order.
    pub network_components: Vec<NetworkComponentRef>,
}

/// An object the host instantiated but has not yet handed to the network.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnedObject {
    /// Host object id.
    pub id: ObjectId,
    /// Content it was instantiated from.
    pub prefab: PrefabRef,
    /// Where it sits.
    pub position: Vec3,
}

/// Answer from the network authority for one spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnAck {
    /// `true` if this peer has authority and the spawn is now canonical.
    pub confirmed: bool,
}

/// The network layer's spawn entry point.
pub trait SpawnGateway: Send + Sync {
    /// Hand an instantiated object to the network.
    fn spawn(&self, object: &SpawnedObject) -> SpawnAck;

    /// Make a prefab known to the network so peers can replicate it.
    fn register_prefab(&self, prefab: &PrefabRef);
}

// ---------------------------------------------------------------------------
// Materials
// ---------------------------------------------------------------------------

/// A map-icon projector owned by the host. Never resized by this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerProjector {
    /// Projector name.
    pub name: String,
    /// Whether it is drawn.
    pub enabled: bool,
}

/// Material construction collaborator used to synthesize default icons.
pub trait MarkerMaterials: Send + Sync {
    /// Texture used for icons synthesized during table extension.
    fn blank_texture(&self) -> TextureRef;

    /// Texture used for icons synthesized at placement time.
    fn white_texture(&self) -> TextureRef;

    /// Wrap a texture in a decal material.
    fn decal_from_texture(&self, texture: TextureRef) -> IconMaterial;
}

/// Default [`MarkerMaterials`]: plain decals over named built-in textures.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecalMaterials;

impl MarkerMaterials for DecalMaterials {
    fn blank_texture(&self) -> TextureRef {
        TextureRef::new("blank_2x2")
    }

    fn white_texture(&self) -> TextureRef {
        TextureRef::new("white")
    }

    fn decal_from_texture(&self, texture: TextureRef) -> IconMaterial {
        IconMaterial::decal(format!("{texture}_decal"), texture)
    }
}

// ---------------------------------------------------------------------------
// MapHost
// ---------------------------------------------------------------------------

/// One host map generator instance, as seen by the generation core.
///
/// Every method takes `&self`; hosts keep their state behind interior
/// mutability so a generation task can hold an `Arc<dyn MapHost>`.
pub trait MapHost: Send + Sync {
    /// Stable identity of this instance.
    fn instance_id(&self) -> InstanceId;

    /// Current prefab, icon, and marker tables.
    fn content_tables(&self) -> ContentTables;

    /// Replace the content tables.
    fn set_content_tables(&self, tables: ContentTables);

    /// Slot occupancy, one entry per slot of the placement grid.
    fn occupied_slots(&self) -> Vec<bool>;

    /// Overwrite slot occupancy.
    fn set_occupied_slots(&self, occupied: &[bool]);

    /// Record that the dungeon tile has been chosen.
    fn set_dungeon_placed(&self, placed: bool);

    /// Record that every slot has been placed.
    fn set_tiles_placed(&self, placed: bool);

    /// Host setup for the standard (large) layout.
    fn setup_large_map(&self) -> Result<(), HostError>;

    /// Host setup for the compact (small) layout.
    fn setup_small_map(&self) -> Result<(), HostError>;

    /// Number of terrain deformers.
    fn deformer_count(&self) -> usize;

    /// Toggle one terrain deformer.
    fn set_deformer_active(&self, index: usize, active: bool);

    /// Place the mountain feature. The host confirms through the instance signals.
    fn place_mountain(&self) -> Result<(), HostError>;

    /// The host's own placement for a slot. The host confirms through the instance signals.
    fn default_place(&self, tile: TileTypeId, slot: usize) -> Result<(), HostError>;

    /// World position of a slot, if it exists.
    fn spawn_point(&self, slot: usize) -> Option<Vec3>;

    /// Instantiate a custom tile without networking it.
    fn instantiate(&self, request: &SpawnRequest) -> Result<SpawnedObject, HostError>;

    /// Destroy an object that was never networked.
    fn discard(&self, object: SpawnedObject);

    /// Refresh the map icon of `slot` after a confirmed placement.
    fn update_map(&self, tile: TileTypeId, slot: usize);
}
