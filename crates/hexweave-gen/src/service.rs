//! The generation service: owns the in-flight registry and per-instance
//! signals, and is the single entry point hosts call into.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use hexweave_config::Config;
use hexweave_config::SchedulerConfig;
use hexweave_host::{
    ExtensionStatus, InstanceId, MapHost, MarkerMaterials, SpawnGateway, TableError,
    TableExtensionAdapter,
};
use hexweave_registry::{TileRegistry, TileTypeId};
use tokio::sync::watch;
use tokio::task::AbortHandle;

use crate::interceptor::{Placement, PlacementInterceptor};
use crate::scheduler::{GenerationReport, Layout, Scheduler};
use crate::shuffle::run_rng;
use crate::signals::InstanceSignals;

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Final state of a generation task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// Every slot was placed.
    Completed(GenerationReport),
    /// The run hit a fault; the message is the error's display text.
    Failed(String),
    /// The task was torn down before finishing.
    Cancelled,
}

#[derive(Debug)]
struct HandleInner {
    instance: InstanceId,
    layout: Layout,
    outcome: watch::Receiver<Option<GenerationOutcome>>,
    abort: OnceLock<AbortHandle>,
}

/// Shared handle to an in-flight (or finished) generation task.
#[derive(Debug, Clone)]
pub struct GenerationHandle {
    inner: Arc<HandleInner>,
}

impl GenerationHandle {
    fn pending(
        instance: InstanceId,
        layout: Layout,
    ) -> (Self, watch::Sender<Option<GenerationOutcome>>) {
        let (tx, rx) = watch::channel(None);
        let handle = Self {
            inner: Arc::new(HandleInner {
                instance,
                layout,
                outcome: rx,
                abort: OnceLock::new(),
            }),
        };
        (handle, tx)
    }

    /// Instance being generated.
    pub fn instance(&self) -> InstanceId {
        self.inner.instance
    }

    /// Layout of the task.
    pub fn layout(&self) -> Layout {
        self.inner.layout
    }

    /// Whether both handles refer to the same task.
    pub fn same_task(&self, other: &GenerationHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether the task has finished in any way.
    pub fn is_finished(&self) -> bool {
        self.inner.outcome.borrow().is_some()
            || self.inner.abort.get().is_some_and(AbortHandle::is_finished)
    }

    /// Wait for the task to finish.
    pub async fn wait(&self) -> GenerationOutcome {
        let mut rx = self.inner.outcome.clone();
        match rx.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).clone().unwrap_or(GenerationOutcome::Cancelled),
            Err(_) => GenerationOutcome::Cancelled,
        }
    }

    fn attach(&self, abort: AbortHandle) {
        let _ = self.inner.abort.set(abort);
    }

    fn abort(&self) {
        if let Some(abort) = self.inner.abort.get() {
            abort.abort();
        }
    }
}

/// Removes the task's in-flight entry however the task ends.
struct InFlightGuard {
    in_flight: Arc<DashMap<InstanceId, GenerationHandle>>,
    handle: GenerationHandle,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let instance = self.handle.instance();
        self.in_flight
            .remove_if(&instance, |_, current| current.same_task(&self.handle));
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Owns everything shared between generation runs.
///
/// The registry must not be mutated while any run is in flight.
pub struct GenerationService {
    registry: Arc<TileRegistry>,
    gateway: Arc<dyn SpawnGateway>,
    materials: Arc<dyn MarkerMaterials>,
    interceptor: PlacementInterceptor,
    config: SchedulerConfig,
    builtin_pool: Vec<TileTypeId>,
    in_flight: Arc<DashMap<InstanceId, GenerationHandle>>,
    signals: DashMap<InstanceId, InstanceSignals>,
    tables: TableExtensionAdapter,
}

impl GenerationService {
    /// Creates a service over `registry` with the given collaborators.
    pub fn new(
        registry: Arc<TileRegistry>,
        gateway: Arc<dyn SpawnGateway>,
        materials: Arc<dyn MarkerMaterials>,
        config: &Config,
    ) -> Self {
        let interceptor = PlacementInterceptor::new(
            Arc::clone(&registry),
            Arc::clone(&gateway),
            Arc::clone(&materials),
        );
        Self {
            registry,
            gateway,
            materials,
            interceptor,
            config: config.scheduler.clone(),
            builtin_pool: config
                .registry
                .builtin_pool
                .iter()
                .map(|&id| TileTypeId(id))
                .collect(),
            in_flight: Arc::new(DashMap::new()),
            signals: DashMap::new(),
            tables: TableExtensionAdapter::new(),
        }
    }

    /// Extend `host`'s content tables with the registered tiles, once per instance.
    ///
    /// # Errors
    ///
    /// See [`TableExtensionAdapter::extend_once`].
    pub fn setup_instance(&self, host: &dyn MapHost) -> Result<ExtensionStatus, TableError> {
        self.tables
            .extend_once(host, &self.registry, self.materials.as_ref())
    }

    /// Register every unique custom prefab with the network. Returns the count.
    pub fn register_network_prefabs(&self) -> usize {
        let prefabs = self.registry.network_prefabs();
        for prefab in &prefabs {
            self.gateway.register_prefab(prefab);
        }
        tracing::info!(count = prefabs.len(), "Registered custom prefabs with the network");
        prefabs.len()
    }

    /// Signals for `instance`, created on first use.
    pub fn signals(&self, instance: InstanceId) -> InstanceSignals {
        self.signals.entry(instance).or_default().clone()
    }

    /// Start generating `host` with `layout`, or return the task already in
    /// flight for that instance.
    ///
    /// Must be called from within a tokio runtime.
    pub fn generate(&self, host: Arc<dyn MapHost>, layout: Layout) -> GenerationHandle {
        let instance = host.instance_id();

        let (handle, outcome_tx) = match self.in_flight.entry(instance) {
            Entry::Occupied(existing) => {
                tracing::debug!(%instance, "Generation already in flight, reusing task");
                return existing.get().clone();
            }
            Entry::Vacant(slot) => {
                let (handle, outcome_tx) = GenerationHandle::pending(instance, layout);
                slot.insert(handle.clone());
                (handle, outcome_tx)
            }
        };

        if let Err(err) = self.setup_instance(host.as_ref()) {
            tracing::warn!(%instance, error = %err, "Content tables not extended");
        }

        let scheduler = Scheduler {
            signals: self.signals(instance),
            host,
            registry: Arc::clone(&self.registry),
            interceptor: self.interceptor.clone(),
            config: self.config.clone(),
            builtin_pool: self.builtin_pool.clone(),
            layout,
        };
        let guard = InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            handle: handle.clone(),
        };
        let seed = self.config.seed;

        tracing::info!(%instance, ?layout, "Starting map generation");
        let task = tokio::spawn(async move {
            let mut rng = run_rng(seed, instance);
            let outcome = match scheduler.run(&mut rng).await {
                Ok(report) => GenerationOutcome::Completed(report),
                Err(err) => GenerationOutcome::Failed(err.to_string()),
            };
            drop(guard);
            let _ = outcome_tx.send(Some(outcome));
        });
        handle.attach(task.abort_handle());
        handle
    }

    /// Per-slot hook for the host's own placement path.
    pub fn intercept_placement(
        &self,
        host: &dyn MapHost,
        tile: TileTypeId,
        slot: usize,
    ) -> Placement {
        let signals = self.signals(host.instance_id());
        self.interceptor.place(host, &signals, tile, slot)
    }

    /// Abandon any generation for `instance` and forget its state.
    pub fn teardown_instance(&self, instance: InstanceId) {
        if let Some((_, handle)) = self.in_flight.remove(&instance) {
            handle.abort();
            tracing::info!(%instance, "Cancelled in-flight generation");
        }
        self.signals.remove(&instance);
        self.tables.forget(instance);
    }

    /// Whether a task for `instance` is in flight.
    pub fn is_in_flight(&self, instance: InstanceId) -> bool {
        self.in_flight.contains_key(&instance)
    }

    /// Number of in-flight tasks.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether `instance` has had its tables extended.
    pub fn is_extended(&self, instance: InstanceId) -> bool {
        self.tables.is_extended(instance)
    }
}

impl std::fmt::Debug for GenerationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationService")
            .field("tiles", &self.registry.len())
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}
