//! A headless map generator instance.
//!
//! Keeps its tables, occupancy, and placed grid in memory and confirms its
//! own placements after a short delay, the way a networked host would once
//! the spawn round-trips.

use std::fmt::Write as _;
use std::sync::Mutex;
use std::time::Duration;

use glam::Vec3;
use hexweave_gen::InstanceSignals;
use hexweave_host::{
    ContentTables, HostError, InstanceId, MapHost, MarkerProjector, ObjectId, SpawnRequest,
    SpawnedObject,
};
use hexweave_registry::{IconMaterial, PrefabRef, TextureRef, TileTypeId};
use tokio::runtime::Handle;

/// Built-in tile names, indexed by type id.
pub const BUILTIN_TILES: [&str; 9] = [
    "chest", "forest", "lake", "dungeon", "camp", "vault", "field", "ruins_old", "mountain",
];

/// Slot the mountain covers when placed.
pub const MOUNTAIN_SLOT: usize = 4;

/// Type id of the host's dungeon tile.
pub const DUNGEON_TILE: TileTypeId = TileTypeId(3);

const DEFORMERS: usize = 6;
const MARKERS: usize = 7;
const RING_RADIUS: f32 = 30.0;

#[derive(Debug)]
struct SimState {
    tables: ContentTables,
    occupied: Vec<bool>,
    dungeon_placed: bool,
    tiles_placed: bool,
    deformers: Vec<bool>,
    mountain: bool,
    grid: Vec<Option<(TileTypeId, bool)>>,
    objects: Vec<SpawnedObject>,
    next_object: u64,
}

/// Simulated host instance.
#[derive(Debug)]
pub struct SimHost {
    id: InstanceId,
    signals: InstanceSignals,
    confirm_delay: Duration,
    runtime: Handle,
    state: Mutex<SimState>,
}

impl SimHost {
    /// Creates an instance with `slots` placement slots.
    ///
    /// Confirmations are scheduled on `runtime` after `confirm_delay`.
    pub fn new(
        id: InstanceId,
        slots: usize,
        signals: InstanceSignals,
        confirm_delay: Duration,
        runtime: Handle,
    ) -> Self {
        Self {
            id,
            signals,
            confirm_delay,
            runtime,
            state: Mutex::new(SimState {
                tables: builtin_tables(),
                occupied: vec![false; slots],
                dungeon_placed: false,
                tiles_placed: false,
                deformers: vec![true; DEFORMERS],
                mountain: false,
                grid: vec![None; slots],
                objects: Vec::new(),
                next_object: 0,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Confirm a placement after the configured delay. The dungeon raises
    /// only the dungeon-generated flag.
    fn schedule_confirm(&self, dungeon: bool) {
        let signals = self.signals.clone();
        let delay = self.confirm_delay;
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if dungeon {
                signals.mark_dungeon_generated();
            } else {
                signals.confirm_spawn();
            }
        });
    }

    /// Tile placed per slot, with whether it was a networked custom spawn.
    pub fn grid(&self) -> Vec<Option<(TileTypeId, bool)>> {
        self.lock().grid.clone()
    }

    /// Number of objects handed to the network.
    #[cfg(test)]
    pub fn spawned_objects(&self) -> usize {
        self.lock().objects.len()
    }

    /// Whether the last run placed every slot.
    pub fn tiles_placed(&self) -> bool {
        self.lock().tiles_placed
    }

    /// Current prefab table length.
    #[cfg(test)]
    pub fn table_len(&self) -> usize {
        self.lock().tables.prefabs.len()
    }

    /// Human-readable layout, one slot per line.
    pub fn render(&self) -> String {
        let state = self.lock();
        let mut out = String::new();
        let _ = writeln!(
            out,
            "instance {} (mountain: {}, dungeon: {}, tiles placed: {}, objects: {})",
            self.id,
            state.mountain,
            state.dungeon_placed,
            state.tiles_placed,
            state.objects.len()
        );
        for (slot, cell) in state.grid.iter().enumerate() {
            let _ = match cell {
                Some((tile, custom)) => {
                    let name = tile
                        .index()
                        .and_then(|i| state.tables.prefabs.get(i).cloned().flatten())
                        .map_or_else(|| "?".to_string(), |p| p.name().to_string());
                    let origin = if *custom { "custom" } else { "host" };
                    writeln!(out, "  slot {slot}: {name} [{tile}] ({origin})")
                }
                None if slot == MOUNTAIN_SLOT && state.mountain => {
                    writeln!(out, "  slot {slot}: mountain")
                }
                None => writeln!(out, "  slot {slot}: -"),
            };
        }
        out
    }
}

impl MapHost for SimHost {
    fn instance_id(&self) -> InstanceId {
        self.id
    }

    fn content_tables(&self) -> ContentTables {
        self.lock().tables.clone()
    }

    fn set_content_tables(&self, tables: ContentTables) {
        self.lock().tables = tables;
    }

    fn occupied_slots(&self) -> Vec<bool> {
        self.lock().occupied.clone()
    }

    fn set_occupied_slots(&self, occupied: &[bool]) {
        self.lock().occupied = occupied.to_vec();
    }

    fn set_dungeon_placed(&self, placed: bool) {
        self.lock().dungeon_placed = placed;
    }

    fn set_tiles_placed(&self, placed: bool) {
        self.lock().tiles_placed = placed;
    }

    fn setup_large_map(&self) -> Result<(), HostError> {
        let mut state = self.lock();
        state.grid.fill(None);
        state.mountain = false;
        state.tiles_placed = false;
        Ok(())
    }

    fn setup_small_map(&self) -> Result<(), HostError> {
        self.setup_large_map()
    }

    fn deformer_count(&self) -> usize {
        self.lock().deformers.len()
    }

    fn set_deformer_active(&self, index: usize, active: bool) {
        if let Some(deformer) = self.lock().deformers.get_mut(index) {
            *deformer = active;
        }
    }

    fn place_mountain(&self) -> Result<(), HostError> {
        {
            let mut state = self.lock();
            state.mountain = true;
            if let Some(cell) = state.occupied.get_mut(MOUNTAIN_SLOT) {
                *cell = true;
            }
        }
        self.schedule_confirm(false);
        Ok(())
    }

    fn default_place(&self, tile: TileTypeId, slot: usize) -> Result<(), HostError> {
        {
            let mut state = self.lock();
            let Some(cell) = state.grid.get_mut(slot) else {
                return Err(HostError::Placement {
                    tile,
                    slot,
                    reason: "no such slot".to_string(),
                });
            };
            *cell = Some((tile, false));
        }
        self.schedule_confirm(tile == DUNGEON_TILE);
        Ok(())
    }

    fn spawn_point(&self, slot: usize) -> Option<Vec3> {
        let slots = self.lock().grid.len();
        if slot >= slots {
            return None;
        }
        if slot == 0 {
            return Some(Vec3::ZERO);
        }
        let angle = std::f32::consts::TAU * (slot - 1) as f32 / (slots - 1) as f32;
        Some(Vec3::new(angle.cos(), 0.0, angle.sin()) * RING_RADIUS)
    }

    fn instantiate(&self, request: &SpawnRequest) -> Result<SpawnedObject, HostError> {
        let mut state = self.lock();
        state.next_object += 1;
        let object = SpawnedObject {
            id: ObjectId(state.next_object),
            prefab: request.prefab.clone(),
            position: request.position,
        };
        state.objects.push(object.clone());
        Ok(object)
    }

    fn discard(&self, object: SpawnedObject) {
        self.lock().objects.retain(|o| o.id != object.id);
    }

    fn update_map(&self, tile: TileTypeId, slot: usize) {
        let mut state = self.lock();
        if let Some(cell) = state.grid.get_mut(slot) {
            *cell = Some((tile, true));
        }
        if let Some(Some(marker)) = state.tables.markers.get_mut(slot % MARKERS) {
            marker.enabled = true;
        }
    }
}

/// The host's own tables before extension.
pub fn builtin_tables() -> ContentTables {
    let template = {
        let mut icon = IconMaterial::decal("map_icon", TextureRef::new(BUILTIN_TILES[0]));
        icon.properties.insert("_DecalBlend".to_string(), 1.0);
        icon.properties.insert("_DrawOrder".to_string(), 2.0);
        icon
    };
    ContentTables {
        prefabs: BUILTIN_TILES
            .iter()
            .map(|name| Some(PrefabRef::new(*name)))
            .collect(),
        icons: BUILTIN_TILES
            .iter()
            .map(|name| {
                Some(IconMaterial::from_template(
                    &template,
                    format!("{name}_Icon"),
                    Some(TextureRef::new(*name)),
                ))
            })
            .collect(),
        markers: (0..MARKERS)
            .map(|i| {
                Some(MarkerProjector {
                    name: format!("projector_{i}"),
                    enabled: false,
                })
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(slots: usize) -> SimHost {
        SimHost::new(
            InstanceId(1),
            slots,
            InstanceSignals::new(),
            Duration::from_millis(1),
            Handle::current(),
        )
    }

    #[tokio::test]
    async fn test_default_place_confirms_later() {
        let host = host(9);
        let signals = host.signals.clone();
        host.default_place(TileTypeId(1), 2).unwrap();
        assert!(!signals.snapshot().spawn_confirmed);

        let state = signals
            .wait_for(Some(Duration::from_secs(5)), |s| s.spawn_confirmed)
            .await
            .unwrap();
        assert!(!state.dungeon_generated);
        assert_eq!(host.grid()[2], Some((TileTypeId(1), false)));
    }

    #[tokio::test]
    async fn test_dungeon_raises_dungeon_flag() {
        let host = host(9);
        host.default_place(DUNGEON_TILE, 0).unwrap();
        let state = host
            .signals
            .wait_for(Some(Duration::from_secs(5)), |s| s.dungeon_generated)
            .await
            .unwrap();
        assert!(state.dungeon_generated);
    }

    #[tokio::test]
    async fn test_mountain_occupies_its_slot() {
        let host = host(9);
        host.place_mountain().unwrap();
        assert!(host.occupied_slots()[MOUNTAIN_SLOT]);
        assert!(host.render().contains("slot 4: mountain"));
    }

    #[tokio::test]
    async fn test_spawn_points_form_a_ring() {
        let host = host(7);
        assert_eq!(host.spawn_point(0), Some(Vec3::ZERO));
        assert!(host.spawn_point(7).is_none());
        for slot in 1..7 {
            let point = host.spawn_point(slot).unwrap();
            assert!((point.length() - RING_RADIUS).abs() < 1e-3);
        }
    }

    #[tokio::test]
    async fn test_default_place_rejects_unknown_slot() {
        let host = host(3);
        assert!(host.default_place(TileTypeId(1), 5).is_err());
    }

    #[test]
    fn test_builtin_tables_shape() {
        let tables = builtin_tables();
        assert_eq!(tables.prefabs.len(), 9);
        assert_eq!(tables.icons.len(), 9);
        assert_eq!(tables.markers.len(), MARKERS);
    }
}
