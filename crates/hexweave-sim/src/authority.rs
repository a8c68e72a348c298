//! In-process stand-in for the network layer.
//!
//! A [`LocalAuthority`] either owns the session (every spawn is confirmed) or
//! plays a remote peer (every spawn is refused, so hosts fall back to their
//! own placement).

use std::collections::HashSet;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use hexweave_host::{SpawnAck, SpawnGateway, SpawnedObject};
use hexweave_registry::PrefabRef;
use tracing::{debug, warn};

/// Spawn gateway that decides authority locally.
#[derive(Debug)]
pub struct LocalAuthority {
    authoritative: bool,
    prefabs: RwLock<HashSet<PrefabRef>>,
    confirmed: AtomicU64,
    refused: AtomicU64,
}

impl LocalAuthority {
    /// Creates a gateway that confirms spawns iff `authoritative`.
    pub fn new(authoritative: bool) -> Self {
        Self {
            authoritative,
            prefabs: RwLock::new(HashSet::new()),
            confirmed: AtomicU64::new(0),
            refused: AtomicU64::new(0),
        }
    }

    /// Number of prefabs known to the network.
    pub fn registered_prefabs(&self) -> usize {
        self.prefabs.read().map_or(0, |set| set.len())
    }

    /// Spawns confirmed so far.
    pub fn confirmed_count(&self) -> u64 {
        self.confirmed.load(Ordering::Relaxed)
    }

    /// Spawns refused so far.
    pub fn refused_count(&self) -> u64 {
        self.refused.load(Ordering::Relaxed)
    }
}

impl SpawnGateway for LocalAuthority {
    fn spawn(&self, object: &SpawnedObject) -> SpawnAck {
        let known = self
            .prefabs
            .read()
            .is_ok_and(|set| set.contains(&object.prefab));
        if !known {
            warn!(prefab = %object.prefab, "Spawning a prefab the network does not know");
        }

        if self.authoritative {
            self.confirmed.fetch_add(1, Ordering::Relaxed);
            debug!(object = object.id.0, prefab = %object.prefab, "Spawn confirmed");
            SpawnAck { confirmed: true }
        } else {
            self.refused.fetch_add(1, Ordering::Relaxed);
            debug!(object = object.id.0, prefab = %object.prefab, "Spawn refused, not authoritative");
            SpawnAck { confirmed: false }
        }
    }

    fn register_prefab(&self, prefab: &PrefabRef) {
        if let Ok(mut set) = self.prefabs.write()
            && set.insert(prefab.clone())
        {
            debug!(prefab = %prefab, "Registered network prefab");
        }
    }
}
