//! Scripted host and gateway shared by the generation tests.

use std::sync::Mutex;

use glam::Vec3;
use hexweave_host::{
    ContentTables, HostError, InstanceId, MapHost, MarkerProjector, ObjectId, SpawnAck,
    SpawnGateway, SpawnRequest, SpawnedObject,
};
use hexweave_registry::{IconMaterial, PrefabRef, TextureRef, TileTypeId};

use crate::signals::InstanceSignals;

/// How the host answers placements it performs itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirm {
    /// Confirm right away.
    Immediate,
    /// Never confirm.
    Never,
}

#[derive(Debug, Default)]
pub struct HostLog {
    pub tables: ContentTables,
    pub occupied: Vec<bool>,
    pub dungeon_placed: bool,
    pub tiles_placed: bool,
    pub deformers: Vec<bool>,
    pub events: Vec<String>,
    pub default_placed: Vec<(usize, TileTypeId)>,
    pub instantiated: Vec<SpawnRequest>,
    pub discarded: Vec<ObjectId>,
    pub map_updates: Vec<(TileTypeId, usize)>,
    next_object: u64,
}

pub struct MockHost {
    pub id: InstanceId,
    pub signals: InstanceSignals,
    pub confirm: Confirm,
    /// Dungeon placements raise only the dungeon-generated flag.
    pub dungeon_signal_only: bool,
    pub mountain_slot: Option<usize>,
    pub fail_setup: bool,
    pub fail_instantiate: bool,
    pub log: Mutex<HostLog>,
}

impl MockHost {
    pub fn new(id: u64, signals: InstanceSignals) -> Self {
        Self {
            id: InstanceId(id),
            signals,
            confirm: Confirm::Immediate,
            dungeon_signal_only: false,
            mountain_slot: None,
            fail_setup: false,
            fail_instantiate: false,
            log: Mutex::new(HostLog {
                tables: builtin_tables(),
                occupied: vec![false; 9],
                deformers: vec![true; 6],
                ..HostLog::default()
            }),
        }
    }

    pub fn with_confirm(mut self, confirm: Confirm) -> Self {
        self.confirm = confirm;
        self
    }

    fn confirm_own(&self, tile: Option<TileTypeId>) {
        if self.confirm == Confirm::Never {
            return;
        }
        if self.dungeon_signal_only && tile == Some(TileTypeId(3)) {
            self.signals.mark_dungeon_generated();
        } else {
            self.signals.confirm_spawn();
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.log.lock().unwrap().events.clone()
    }
}

impl MapHost for MockHost {
    fn instance_id(&self) -> InstanceId {
        self.id
    }

    fn content_tables(&self) -> ContentTables {
        self.log.lock().unwrap().tables.clone()
    }

    fn set_content_tables(&self, tables: ContentTables) {
        self.log.lock().unwrap().tables = tables;
    }

    fn occupied_slots(&self) -> Vec<bool> {
        self.log.lock().unwrap().occupied.clone()
    }

    fn set_occupied_slots(&self, occupied: &[bool]) {
        self.log.lock().unwrap().occupied = occupied.to_vec();
    }

    fn set_dungeon_placed(&self, placed: bool) {
        self.log.lock().unwrap().dungeon_placed = placed;
    }

    fn set_tiles_placed(&self, placed: bool) {
        self.log.lock().unwrap().tiles_placed = placed;
    }

    fn setup_large_map(&self) -> Result<(), HostError> {
        if self.fail_setup {
            return Err(HostError::Setup("terrain missing".to_string()));
        }
        self.log.lock().unwrap().events.push("setup_large".to_string());
        Ok(())
    }

    fn setup_small_map(&self) -> Result<(), HostError> {
        if self.fail_setup {
            return Err(HostError::Setup("terrain missing".to_string()));
        }
        self.log.lock().unwrap().events.push("setup_small".to_string());
        Ok(())
    }

    fn deformer_count(&self) -> usize {
        self.log.lock().unwrap().deformers.len()
    }

    fn set_deformer_active(&self, index: usize, active: bool) {
        let mut log = self.log.lock().unwrap();
        log.deformers[index] = active;
        log.events.push(format!("deformer {index} {active}"));
    }

    fn place_mountain(&self) -> Result<(), HostError> {
        {
            let mut log = self.log.lock().unwrap();
            log.events.push("mountain".to_string());
            if let Some(slot) = self.mountain_slot {
                log.occupied[slot] = true;
            }
        }
        self.confirm_own(None);
        Ok(())
    }

    fn default_place(&self, tile: TileTypeId, slot: usize) -> Result<(), HostError> {
        self.log.lock().unwrap().default_placed.push((slot, tile));
        self.confirm_own(Some(tile));
        Ok(())
    }

    fn spawn_point(&self, slot: usize) -> Option<Vec3> {
        (slot < 9).then(|| Vec3::new(slot as f32 * 10.0, 0.0, 0.0))
    }

    fn instantiate(&self, request: &SpawnRequest) -> Result<SpawnedObject, HostError> {
        if self.fail_instantiate {
            return Err(HostError::Instantiate {
                prefab: request.prefab.clone(),
                reason: "out of memory".to_string(),
            });
        }
        let mut log = self.log.lock().unwrap();
        log.next_object += 1;
        log.instantiated.push(request.clone());
        Ok(SpawnedObject {
            id: ObjectId(log.next_object),
            prefab: request.prefab.clone(),
            position: request.position,
        })
    }

    fn discard(&self, object: SpawnedObject) {
        self.log.lock().unwrap().discarded.push(object.id);
    }

    fn update_map(&self, tile: TileTypeId, slot: usize) {
        self.log.lock().unwrap().map_updates.push((tile, slot));
    }
}

#[derive(Debug, Default)]
pub struct TestGateway {
    pub non_authoritative: bool,
    pub spawned: Mutex<Vec<ObjectId>>,
    pub registered: Mutex<Vec<PrefabRef>>,
}

impl TestGateway {
    pub fn authoritative() -> Self {
        Self::default()
    }

    pub fn remote() -> Self {
        Self {
            non_authoritative: true,
            ..Self::default()
        }
    }
}

impl SpawnGateway for TestGateway {
    fn spawn(&self, object: &SpawnedObject) -> SpawnAck {
        self.spawned.lock().unwrap().push(object.id);
        SpawnAck {
            confirmed: !self.non_authoritative,
        }
    }

    fn register_prefab(&self, prefab: &PrefabRef) {
        self.registered.lock().unwrap().push(prefab.clone());
    }
}

/// Nine built-in prefabs and icons, seven markers.
pub fn builtin_tables() -> ContentTables {
    ContentTables {
        prefabs: (0..9)
            .map(|i| Some(PrefabRef::new(format!("builtin_{i}"))))
            .collect(),
        icons: (0..9)
            .map(|i| {
                Some(IconMaterial::decal(
                    format!("builtin_{i}"),
                    TextureRef::new(format!("builtin_{i}")),
                ))
            })
            .collect(),
        markers: (0..7)
            .map(|i| {
                Some(MarkerProjector {
                    name: format!("marker_{i}"),
                    enabled: true,
                })
            })
            .collect(),
    }
}

/// An icon for a custom tile.
pub fn icon(name: &str) -> IconMaterial {
    IconMaterial::decal(name, TextureRef::new(name))
}
