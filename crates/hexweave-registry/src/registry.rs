//! Tile registry: maps [`TileTypeId`] to [`TileDefinition`] in registration order.
//!
//! Ids are handed out monotonically starting at the first id above the
//! host's built-in range. [`TileRegistry::reset`] forgets definitions but
//! never rewinds the counter, so an id is never issued twice.
//!
//! Registration is only valid before generation starts. Generation runs hold
//! a [`RegistryLease`]; registering while a lease is alive still succeeds but
//! is reported as a precondition violation.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use thiserror::Error;

use crate::definition::{TileDefinition, TileSpec, TileTypeId};
use crate::handles::{IconMaterial, PrefabRef};

/// First custom id when the host reserves 0-8.
pub const DEFAULT_FIRST_CUSTOM_ID: i32 = 9;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Internal registry failures.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A thread panicked while holding the registry lock.
    #[error("tile registry lock poisoned")]
    Poisoned,
    /// Every id up to `i32::MAX` has been issued.
    #[error("tile id space exhausted")]
    IdSpaceExhausted,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

struct Inner {
    /// Definitions in insertion order.
    tiles: Vec<TileDefinition>,
    /// id -> position in `tiles`.
    index: HashMap<TileTypeId, usize>,
    /// Next id to hand out. Only ever increases.
    next_id: i32,
}

/// Registry of custom tile types, shared by every generator instance.
pub struct TileRegistry {
    inner: RwLock<Inner>,
    first_id: i32,
    leases: Arc<AtomicUsize>,
}

impl TileRegistry {
    /// Creates an empty registry whose first id is [`DEFAULT_FIRST_CUSTOM_ID`].
    pub fn new() -> Self {
        Self::with_first_id(DEFAULT_FIRST_CUSTOM_ID)
    }

    /// Creates an empty registry whose first issued id is `first_id`.
    pub fn with_first_id(first_id: i32) -> Self {
        Self {
            inner: RwLock::new(Inner {
                tiles: Vec::new(),
                index: HashMap::new(),
                next_id: first_id,
            }),
            first_id,
            leases: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Registers a tile and returns its id, or [`TileTypeId::INVALID`] on
    /// internal failure. Missing prefab or icon never fails registration.
    pub fn register(&self, spec: TileSpec) -> TileTypeId {
        match self.try_register(spec) {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(error = %e, "Error registering tile");
                TileTypeId::INVALID
            }
        }
    }

    /// Registers a tile, surfacing internal failures as [`RegistryError`].
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Poisoned`] if the lock is poisoned, or
    /// [`RegistryError::IdSpaceExhausted`] once `i32::MAX` ids were issued.
    /// The registry is unchanged on error.
    pub fn try_register(&self, spec: TileSpec) -> Result<TileTypeId, RegistryError> {
        let active = self.active_leases();
        if active > 0 {
            tracing::warn!(
                active_leases = active,
                "Tile registered while generation is running; running generations will not see it"
            );
        }

        let mut inner = self.inner.write().map_err(|_| RegistryError::Poisoned)?;
        let raw = inner.next_id;
        let next = raw.checked_add(1).ok_or(RegistryError::IdSpaceExhausted)?;
        inner.next_id = next;

        let id = TileTypeId(raw);
        let def = TileDefinition::from_spec(id, spec);

        tracing::info!(tile = %id, name = %def.display_name, "Registered tile type");
        tracing::debug!(
            tile = %id,
            prefab = def.prefab_name(),
            icon = def.icon.as_ref().map_or("None", |i| i.name.as_str()),
            valid = def.valid,
            "Tile assets"
        );

        let position = inner.tiles.len();
        inner.tiles.push(def);
        inner.index.insert(id, position);
        Ok(id)
    }

    /// Returns a copy of the definition for `id`, if registered.
    pub fn try_get(&self, id: TileTypeId) -> Option<TileDefinition> {
        let inner = self.inner.read().ok()?;
        inner.index.get(&id).map(|&pos| inner.tiles[pos].clone())
    }

    /// Snapshot of every definition in registration order.
    pub fn get_all(&self) -> Vec<TileDefinition> {
        self.inner
            .read()
            .map(|inner| inner.tiles.clone())
            .unwrap_or_default()
    }

    /// Ids of every definition in registration order.
    pub fn ids(&self) -> Vec<TileTypeId> {
        self.inner
            .read()
            .map(|inner| inner.tiles.iter().map(|d| d.id).collect())
            .unwrap_or_default()
    }

    /// Sets the icon of `id` if it has none. Returns `true` if the icon was set.
    ///
    /// `valid` is left as computed at registration.
    pub fn backfill_icon(&self, id: TileTypeId, icon: IconMaterial) -> bool {
        let Ok(mut inner) = self.inner.write() else {
            return false;
        };
        let Some(&pos) = inner.index.get(&id) else {
            return false;
        };
        let def = &mut inner.tiles[pos];
        if def.icon.is_some() {
            return false;
        }
        def.icon = Some(icon);
        true
    }

    /// Every present prefab, de-duplicated by name, in registration order.
    pub fn network_prefabs(&self) -> Vec<PrefabRef> {
        let Ok(inner) = self.inner.read() else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        let mut prefabs = Vec::new();
        for def in &inner.tiles {
            match &def.prefab {
                Some(prefab) if seen.insert(prefab.name().to_string()) => {
                    prefabs.push(prefab.clone());
                }
                Some(prefab) => {
                    tracing::debug!(tile = %def.id, prefab = %prefab, "Skipping duplicate prefab");
                }
                None => tracing::debug!(tile = %def.id, "Skipping null prefab"),
            }
        }
        prefabs
    }

    /// Forgets every definition. The id counter keeps counting upward.
    pub fn reset(&self) {
        if let Ok(mut inner) = self.inner.write() {
            inner.tiles.clear();
            inner.index.clear();
        }
    }

    /// Id the next registration will receive.
    pub fn next_id(&self) -> i32 {
        self.inner
            .read()
            .map(|inner| inner.next_id)
            .unwrap_or(self.first_id)
    }

    /// First id this registry ever issues.
    pub fn first_id(&self) -> i32 {
        self.first_id
    }

    /// Number of registered definitions.
    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.tiles.len()).unwrap_or(0)
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Marks the registry as read by a running generation until the lease drops.
    pub fn lease(&self) -> RegistryLease {
        self.leases.fetch_add(1, Ordering::AcqRel);
        RegistryLease {
            leases: Arc::clone(&self.leases),
        }
    }

    /// Number of live [`RegistryLease`]s.
    pub fn active_leases(&self) -> usize {
        self.leases.load(Ordering::Acquire)
    }
}

impl Default for TileRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Held by a generation run for as long as it reads the registry.
#[derive(Debug)]
pub struct RegistryLease {
    leases: Arc<AtomicUsize>,
}

impl Drop for RegistryLease {
    fn drop(&mut self) {
        self.leases.fetch_sub(1, Ordering::AcqRel);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handles::TextureRef;

    fn full_spec(name: &str) -> TileSpec {
        TileSpec::new(
            Some(PrefabRef::new(name)),
            Some(IconMaterial::decal(format!("{name}_icon"), TextureRef::new(name))),
        )
        .named(name)
    }

    #[test]
    fn test_first_registration_gets_first_free_id() {
        let registry = TileRegistry::new();
        let id = registry.register(full_spec("ruins"));
        assert_eq!(id, TileTypeId(9));

        let all = registry.get_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, TileTypeId(9));
        assert!(all[0].valid);
        assert_eq!(all[0].display_name, "ruins");
    }

    #[test]
    fn test_ids_strictly_increasing_and_unique() {
        let registry = TileRegistry::new();
        let ids: Vec<_> = (0..20)
            .map(|i| registry.register(full_spec(&format!("tile{i}"))))
            .collect();

        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert!(ids.iter().all(|id| id.0 >= DEFAULT_FIRST_CUSTOM_ID));
        assert_eq!(registry.ids(), ids);
    }

    #[test]
    fn test_reset_never_reissues_ids() {
        let registry = TileRegistry::new();
        let before: Vec<_> = (0..3).map(|_| registry.register(TileSpec::default())).collect();

        registry.reset();
        assert!(registry.is_empty());
        assert_eq!(registry.try_get(before[0]), None);

        let after = registry.register(TileSpec::default());
        assert!(before.iter().all(|&id| id < after));
        assert_eq!(after, TileTypeId(12));
    }

    #[test]
    fn test_missing_icon_degrades_valid() {
        let registry = TileRegistry::new();
        let id = registry.register(TileSpec::new(Some(PrefabRef::new("crater")), None));
        assert!(id.is_valid());
        let def = registry.try_get(id).unwrap();
        assert!(!def.valid);
        assert_eq!(def.display_name, "Custom Tile 9");
    }

    #[test]
    fn test_try_get_unknown() {
        let registry = TileRegistry::new();
        assert!(registry.try_get(TileTypeId(3)).is_none());
    }

    #[test]
    fn test_backfill_icon_only_when_absent() {
        let registry = TileRegistry::new();
        let bare = registry.register(TileSpec::new(Some(PrefabRef::new("bare")), None));
        let full = registry.register(full_spec("full"));
        let icon = IconMaterial::decal("default", TextureRef::new("white"));

        assert!(registry.backfill_icon(bare, icon.clone()));
        assert!(!registry.backfill_icon(bare, icon.clone()));
        assert!(!registry.backfill_icon(full, icon.clone()));
        assert!(!registry.backfill_icon(TileTypeId(99), icon));

        let def = registry.try_get(bare).unwrap();
        assert_eq!(def.icon.map(|i| i.name), Some("default".to_string()));
        assert!(!def.valid);
    }

    #[test]
    fn test_network_prefabs_deduplicated() {
        let registry = TileRegistry::new();
        registry.register(full_spec("ruins"));
        registry.register(TileSpec::new(None, None));
        registry.register(full_spec("shrine"));
        registry.register(full_spec("ruins"));

        let names: Vec<_> = registry
            .network_prefabs()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["ruins", "shrine"]);
    }

    #[test]
    fn test_custom_first_id() {
        let registry = TileRegistry::with_first_id(100);
        assert_eq!(registry.register(TileSpec::default()), TileTypeId(100));
        assert_eq!(registry.next_id(), 101);
        assert_eq!(registry.first_id(), 100);
    }

    #[test]
    fn test_id_space_exhausted() {
        let registry = TileRegistry::with_first_id(i32::MAX);
        assert!(matches!(
            registry.try_register(TileSpec::default()),
            Err(RegistryError::IdSpaceExhausted)
        ));
        assert_eq!(registry.register(TileSpec::default()), TileTypeId::INVALID);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_lease_counts() {
        let registry = TileRegistry::new();
        let a = registry.lease();
        let b = registry.lease();
        assert_eq!(registry.active_leases(), 2);
        drop(a);
        assert_eq!(registry.active_leases(), 1);
        // Still allowed, only reported.
        assert!(registry.register(TileSpec::default()).is_valid());
        drop(b);
        assert_eq!(registry.active_leases(), 0);
    }
}
