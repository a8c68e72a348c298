//! Wires registry, gateway, service, and simulated hosts into one run.

use std::sync::Arc;
use std::time::Duration;

use hexweave_config::Config;
use hexweave_gen::{GenerationOutcome, GenerationService, Layout};
use hexweave_host::{DecalMaterials, ExtensionStatus, InstanceId};
use hexweave_registry::{IconMaterial, PrefabRef, TextureRef, TileRegistry, TileSpec};
use tokio::runtime::Handle;
use tracing::{info, warn};

use crate::authority::LocalAuthority;
use crate::sim_host::SimHost;

/// Result of one simulated instance.
#[derive(Debug)]
pub struct InstanceRun {
    /// The simulated host after generation.
    pub host: Arc<SimHost>,
    /// Layout it was generated with.
    pub layout: Layout,
    /// How generation ended.
    pub outcome: GenerationOutcome,
}

impl InstanceRun {
    /// Whether generation completed.
    #[cfg(test)]
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, GenerationOutcome::Completed(_))
    }
}

/// Register the configured custom tiles. A name ending in `?` is registered
/// without an icon to exercise default icon synthesis.
pub fn register_custom_tiles(registry: &TileRegistry, names: &[String]) {
    for name in names {
        let (name, icon) = match name.strip_suffix('?') {
            Some(bare) => (bare, None),
            None => (
                name.as_str(),
                Some(IconMaterial::decal(format!("{name}_icon"), TextureRef::new(name.as_str()))),
            ),
        };
        let id = registry.register(TileSpec::new(Some(PrefabRef::new(name)), icon).named(name));
        if !id.is_valid() {
            warn!(name, "Custom tile was not registered");
        }
    }
}

/// Run every configured instance to completion. Standard and compact
/// layouts alternate, starting with standard.
pub async fn run(config: &Config) -> Vec<InstanceRun> {
    let registry = Arc::new(TileRegistry::with_first_id(config.registry.first_custom_id));
    register_custom_tiles(&registry, &config.sim.custom_tiles);

    let gateway = Arc::new(LocalAuthority::new(config.sim.authoritative));
    let service = GenerationService::new(
        Arc::clone(&registry),
        gateway.clone(),
        Arc::new(DecalMaterials),
        config,
    );
    service.register_network_prefabs();
    info!(prefabs = gateway.registered_prefabs(), "Network prefabs ready");

    let delay = Duration::from_millis(config.sim.confirm_delay_ms);
    let mut pending = Vec::new();
    for index in 0..config.sim.instances {
        let id = InstanceId(u64::from(index) + 1);
        let host = Arc::new(SimHost::new(
            id,
            config.sim.slots,
            service.signals(id),
            delay,
            Handle::current(),
        ));

        match service.setup_instance(host.as_ref()) {
            Ok(ExtensionStatus::Extended { len, skipped }) => {
                info!(instance = %id, tables = len, skipped = skipped.len(), "Instance set up");
            }
            Ok(ExtensionStatus::AlreadyExtended) => {}
            Err(err) => warn!(instance = %id, error = %err, "Instance tables not extended"),
        }

        let layout = if index % 2 == 0 {
            Layout::Standard
        } else {
            Layout::Compact
        };
        let handle = service.generate(host.clone(), layout);
        pending.push((host, layout, handle));
    }

    let mut runs = Vec::with_capacity(pending.len());
    for (host, layout, handle) in pending {
        let outcome = handle.wait().await;
        runs.push(InstanceRun {
            host,
            layout,
            outcome,
        });
    }

    info!(
        confirmed = gateway.confirmed_count(),
        refused = gateway.refused_count(),
        "Simulation finished"
    );
    runs
}
