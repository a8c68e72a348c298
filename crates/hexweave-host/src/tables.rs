//! Content table extension: grows a host instance's prefab and icon tables so
//! every registered tile id indexes a valid entry.
//!
//! The marker (projector) table has its own length, unrelated to the number
//! of tile types, and is copied through unchanged.

use dashmap::DashSet;
use hexweave_registry::{IconMaterial, PrefabRef, TileDefinition, TileRegistry, TileTypeId};
use thiserror::Error;

use crate::contract::{InstanceId, MapHost, MarkerMaterials, MarkerProjector};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A host instance's per-type content tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentTables {
    /// Prefab per tile type id.
    pub prefabs: Vec<Option<PrefabRef>>,
    /// Map icon per tile type id.
    pub icons: Vec<Option<IconMaterial>>,
    /// Map icon projectors, one per map position.
    pub markers: Vec<Option<MarkerProjector>>,
}

/// Errors that abort a table extension. The host tables stay untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// Icon slot 0 is needed as the rendering template for custom icons.
    #[error("icon table has no template material at slot 0")]
    MissingTemplate,
}

/// Result of a pure table extension.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtendedTables {
    /// Replacement tables.
    pub tables: ContentTables,
    /// Default icons synthesized for definitions that had none.
    pub backfilled: Vec<(TileTypeId, IconMaterial)>,
    /// Ids whose slot already held a prefab.
    pub overwritten: Vec<TileTypeId>,
    /// Ids that fell outside the computed tables and were left out.
    pub skipped: Vec<TileTypeId>,
}

/// What [`TableExtensionAdapter::extend_once`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionStatus {
    /// Tables were extended and applied to the host.
    Extended {
        /// New prefab/icon table length.
        len: usize,
        /// Ids excluded from this instance.
        skipped: Vec<TileTypeId>,
    },
    /// This instance was already extended; nothing changed.
    AlreadyExtended,
}

// ---------------------------------------------------------------------------
// Pure extension
// ---------------------------------------------------------------------------

/// Build replacement tables with every definition slotted in at its id.
///
/// Length is `max(P - 1, max id) + 1`, where `P` is the original prefab
/// table length. Definitions without an icon get a decal over
/// `materials.blank_texture()`. Each custom icon copies the rendering
/// properties of icon slot 0 and swaps in the definition's texture.
///
/// # Errors
///
/// Returns [`TableError::MissingTemplate`] if there are definitions to add
/// but icon slot 0 is empty.
pub fn extend_tables(
    original: &ContentTables,
    tiles: &[TileDefinition],
    materials: &dyn MarkerMaterials,
) -> Result<ExtendedTables, TableError> {
    let original_len = original.prefabs.len();
    let max_id = tiles
        .iter()
        .map(|d| i64::from(d.id.0))
        .fold(original_len as i64 - 1, i64::max);
    let len = usize::try_from(max_id + 1).unwrap_or(0);

    let template = match (tiles.is_empty(), original.icons.first()) {
        (true, _) => None,
        (false, Some(Some(template))) => Some(template),
        (false, _) => return Err(TableError::MissingTemplate),
    };

    tracing::debug!(
        original_len,
        icons = original.icons.len(),
        custom = tiles.len(),
        len,
        "Extending content tables"
    );

    let mut prefabs = original.prefabs.clone();
    prefabs.resize(len, None);
    let mut icons = original.icons.clone();
    icons.resize(len.max(icons.len()), None);

    let mut extended = ExtendedTables {
        tables: ContentTables::default(),
        backfilled: Vec::new(),
        overwritten: Vec::new(),
        skipped: Vec::new(),
    };

    if let Some(template) = template {
        for def in tiles {
            let Some(index) = def.id.index().filter(|&i| i < prefabs.len()) else {
                tracing::error!(
                    tile = %def.id,
                    max = prefabs.len().saturating_sub(1),
                    "Tile id is out of bounds for the content tables"
                );
                extended.skipped.push(def.id);
                continue;
            };

            if let Some(existing) = &prefabs[index] {
                tracing::warn!(
                    tile = %def.id,
                    old = %existing,
                    new = def.prefab_name(),
                    "Overwriting existing tile prefab"
                );
                extended.overwritten.push(def.id);
            }
            prefabs[index] = def.prefab.clone();

            let texture = match &def.icon {
                Some(icon) => icon.texture.clone(),
                None => {
                    let icon = materials.decal_from_texture(materials.blank_texture());
                    tracing::warn!(tile = %def.id, "Created default icon material for tile");
                    let texture = icon.texture.clone();
                    extended.backfilled.push((def.id, icon));
                    texture
                }
            };

            icons[index] = Some(IconMaterial::from_template(
                template,
                format!("{}_Icon", def.prefab_name()),
                texture,
            ));
        }
    }

    extended.tables = ContentTables {
        prefabs,
        icons,
        markers: original.markers.clone(),
    };
    Ok(extended)
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Applies [`extend_tables`] to each host instance exactly once.
#[derive(Debug, Default)]
pub struct TableExtensionAdapter {
    extended: DashSet<InstanceId>,
}

impl TableExtensionAdapter {
    /// Creates an adapter that has extended nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Extend `host`'s tables from the registry snapshot unless already done.
    ///
    /// Synthesized default icons are written back to the registry so later
    /// placements reuse them.
    ///
    /// # Errors
    ///
    /// Propagates [`TableError`]; the instance is then not marked extended.
    pub fn extend_once(
        &self,
        host: &dyn MapHost,
        registry: &TileRegistry,
        materials: &dyn MarkerMaterials,
    ) -> Result<ExtensionStatus, TableError> {
        let instance = host.instance_id();
        if !self.extended.insert(instance) {
            tracing::debug!(%instance, "Tables already extended for this instance");
            return Ok(ExtensionStatus::AlreadyExtended);
        }

        let original = host.content_tables();
        let result = match extend_tables(&original, &registry.get_all(), materials) {
            Ok(result) => result,
            Err(err) => {
                self.extended.remove(&instance);
                return Err(err);
            }
        };

        for (id, icon) in result.backfilled {
            registry.backfill_icon(id, icon);
        }

        let len = result.tables.prefabs.len();
        tracing::info!(
            %instance,
            tiles = len,
            icons = result.tables.icons.len(),
            markers = result.tables.markers.len(),
            "Extended content tables"
        );
        host.set_content_tables(result.tables);

        Ok(ExtensionStatus::Extended {
            len,
            skipped: result.skipped,
        })
    }

    /// Whether `instance` has been extended.
    pub fn is_extended(&self, instance: InstanceId) -> bool {
        self.extended.contains(&instance)
    }

    /// Forget `instance`, e.g. when it is torn down.
    pub fn forget(&self, instance: InstanceId) {
        self.extended.remove(&instance);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
