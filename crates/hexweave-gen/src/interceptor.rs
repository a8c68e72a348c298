//! Per-slot placement hook.
//!
//! Resolves a tile type to a registered custom tile and drives instantiate,
//! spawn, and confirmation. Anything it cannot handle falls through to the
//! host's own placement.

use std::sync::Arc;

use hexweave_host::{HostError, MapHost, MarkerMaterials, SpawnGateway, SpawnRequest};
use hexweave_registry::{TileRegistry, TileTypeId};

use crate::signals::InstanceSignals;

/// Whether the interceptor took care of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// A custom tile was spawned and confirmed; the host must not place this slot.
    Handled,
    /// The host's default placement should run.
    NotHandled,
}

/// Places registered custom tiles on a host's grid.
#[derive(Clone)]
pub struct PlacementInterceptor {
    registry: Arc<TileRegistry>,
    gateway: Arc<dyn SpawnGateway>,
    materials: Arc<dyn MarkerMaterials>,
}

impl PlacementInterceptor {
    /// Creates an interceptor over the given registry and collaborators.
    pub fn new(
        registry: Arc<TileRegistry>,
        gateway: Arc<dyn SpawnGateway>,
        materials: Arc<dyn MarkerMaterials>,
    ) -> Self {
        Self {
            registry,
            gateway,
            materials,
        }
    }

    /// Try to place `tile` at `slot` on `host`.
    ///
    /// On a confirmed spawn the host's map icon is refreshed and
    /// `signals.confirm_spawn()` is raised. Every failure path logs and
    /// returns [`Placement::NotHandled`].
    pub fn place(
        &self,
        host: &dyn MapHost,
        signals: &InstanceSignals,
        tile: TileTypeId,
        slot: usize,
    ) -> Placement {
        let instance = host.instance_id();
        if self.registry.try_get(tile).is_none() {
            tracing::trace!(%instance, %tile, slot, "Not a custom tile, deferring to host");
            return Placement::NotHandled;
        }

        match self.spawn_custom(host, signals, tile, slot) {
            Ok(placement) => placement,
            Err(err) => {
                tracing::error!(
                    %instance,
                    %tile,
                    slot,
                    error = %err,
                    "Custom tile placement failed, deferring to host"
                );
                Placement::NotHandled
            }
        }
    }

    fn spawn_custom(
        &self,
        host: &dyn MapHost,
        signals: &InstanceSignals,
        tile: TileTypeId,
        slot: usize,
    ) -> Result<Placement, HostError> {
        let instance = host.instance_id();
        let Some(def) = self.registry.try_get(tile) else {
            return Ok(Placement::NotHandled);
        };

        let Some(position) = host.spawn_point(slot) else {
            tracing::error!(%instance, %tile, slot, "No spawn point for slot");
            return Ok(Placement::NotHandled);
        };

        let Some(prefab) = def.prefab.clone() else {
            tracing::error!(%instance, %tile, slot, "Custom tile has no prefab");
            return Ok(Placement::NotHandled);
        };

        if def.icon.is_none() {
            let icon = self
                .materials
                .decal_from_texture(self.materials.white_texture());
            tracing::warn!(%tile, name = %def.display_name, "Created temporary icon for tile");
            self.registry.backfill_icon(tile, icon);
        }

        let request = SpawnRequest {
            tile,
            slot,
            prefab,
            position,
            components: def.components,
            network_components: def.network_components,
        };
        let object = host.instantiate(&request)?;

        if self.gateway.spawn(&object).confirmed {
            host.update_map(tile, slot);
            signals.confirm_spawn();
            tracing::debug!(%instance, %tile, slot, prefab = %object.prefab, "Spawned custom tile");
            Ok(Placement::Handled)
        } else {
            tracing::info!(%instance, %tile, slot, "No network authority, using host placement");
            host.discard(object);
            Ok(Placement::NotHandled)
        }
    }
}

impl std::fmt::Debug for PlacementInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlacementInterceptor")
            .field("registry_len", &self.registry.len())
            .finish_non_exhaustive()
    }
}
