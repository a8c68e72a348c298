//! Map generation state machine for one host instance.
//!
//! A run walks `Idle -> Preamble -> MountainPhase? -> SlotLoop -> Finalize ->
//! Done`, suspending after each placement until the instance signals report
//! the spawn as confirmed.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use hexweave_config::SchedulerConfig;
use hexweave_host::{HostError, InstanceId, MapHost};
use hexweave_registry::{TileRegistry, TileTypeId};
use rand::Rng;
use thiserror::Error;

use crate::interceptor::{Placement, PlacementInterceptor};
use crate::shuffle::shuffle;
use crate::signals::{InstanceSignals, WaitError};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Which host generator is being replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    /// Large map: deformers, optional mountain, every slot from the shuffled pool.
    Standard,
    /// Small map: reserved slots and a loot quota.
    Compact,
}

/// Where a run was suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPoint {
    /// After placing the mountain.
    Mountain,
    /// After placing a slot.
    Slot(usize),
}

impl fmt::Display for WaitPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitPoint::Mountain => f.write_str("mountain"),
            WaitPoint::Slot(slot) => write!(f, "slot {slot}"),
        }
    }
}

/// Faults that abort a generation run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// No confirmation arrived before the configured deadline.
    #[error("timed out waiting for spawn confirmation at {at}")]
    ConfirmationTimeout {
        /// Suspension point that timed out.
        at: WaitPoint,
    },

    /// The instance's signal channel shut down mid-run.
    #[error("instance signals closed at {at}")]
    SignalsClosed {
        /// Suspension point that was waiting.
        at: WaitPoint,
    },

    /// A host collaborator call failed.
    #[error(transparent)]
    Host(#[from] HostError),
}

/// One placed slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPlacement {
    /// Slot index.
    pub slot: usize,
    /// Type placed there.
    pub tile: TileTypeId,
    /// `true` if a custom tile was spawned, `false` if the host placed it.
    pub custom: bool,
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationReport {
    /// Instance that was generated.
    pub instance: InstanceId,
    /// Layout used.
    pub layout: Layout,
    /// Placements in the order they were issued.
    pub placements: Vec<SlotPlacement>,
    /// Whether the mountain phase placed the mountain.
    pub mountain_placed: bool,
    /// Shuffled candidate pool.
    pub pool: Vec<TileTypeId>,
}

impl GenerationReport {
    /// Placed type per slot, `None` for slots that were skipped.
    pub fn layout_by_slot(&self, slots: usize) -> Vec<Option<TileTypeId>> {
        let mut grid = vec![None; slots];
        for placement in &self.placements {
            if let Some(cell) = grid.get_mut(placement.slot) {
                *cell = Some(placement.tile);
            }
        }
        grid
    }
}

// ---------------------------------------------------------------------------
// Instance state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Preamble,
    MountainPhase,
    SlotLoop(usize),
    Finalize,
    Done,
}

/// Scheduler-owned state for one run.
#[derive(Debug)]
struct InstanceState {
    stage: Stage,
    occupied: Vec<bool>,
    dungeon_placed: bool,
    tiles_placed: bool,
    loot_count: u32,
    mountain_placed: bool,
    pool: Vec<TileTypeId>,
    placements: Vec<SlotPlacement>,
}

impl InstanceState {
    fn new() -> Self {
        Self {
            stage: Stage::Idle,
            occupied: Vec::new(),
            dungeon_placed: false,
            tiles_placed: false,
            loot_count: 0,
            mountain_placed: false,
            pool: Vec::new(),
            placements: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Compact loot quota
// ---------------------------------------------------------------------------

/// Apply the compact-layout loot rules to the candidate for `slot`.
///
/// `loot_count` counts every loot candidate seen so far, before any
/// substitution; a forced tile is not counted. Past the quota a
/// loot candidate is swapped for the first non-loot type in the pool (kept
/// as is when the pool has none). Reaching the forced slot while under the
/// quota replaces the candidate with the most preferred loot type present in
/// the pool.
pub fn compact_choice(
    config: &SchedulerConfig,
    pool: &[TileTypeId],
    slot: usize,
    candidate: TileTypeId,
    loot_count: &mut u32,
) -> TileTypeId {
    let is_loot = |tile: TileTypeId| config.loot_types.contains(&tile.0);
    let candidate_is_loot = is_loot(candidate);
    if candidate_is_loot {
        *loot_count += 1;
    }

    if *loot_count > config.max_loot && candidate_is_loot {
        match pool.iter().copied().find(|&tile| !is_loot(tile)) {
            Some(substitute) => {
                tracing::debug!(slot, from = %candidate, to = %substitute, "Loot quota reached, substituting");
                substitute
            }
            None => {
                tracing::warn!(slot, tile = %candidate, "Loot quota exceeded and no substitute available");
                candidate
            }
        }
    } else if *loot_count < config.max_loot && slot == config.compact_forced_slot {
        let forced = config
            .forced_loot_preference
            .iter()
            .map(|&id| TileTypeId(id))
            .find(|tile| pool.contains(tile));
        match forced {
            Some(forced) => {
                tracing::debug!(slot, from = %candidate, to = %forced, "Forcing loot tile");
                forced
            }
            None => candidate,
        }
    } else {
        candidate
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Everything one run needs. Consumed by [`Scheduler::run`].
pub(crate) struct Scheduler {
    pub host: Arc<dyn MapHost>,
    pub registry: Arc<TileRegistry>,
    pub interceptor: PlacementInterceptor,
    pub signals: InstanceSignals,
    pub config: SchedulerConfig,
    pub builtin_pool: Vec<TileTypeId>,
    pub layout: Layout,
}

impl Scheduler {
    /// Run the whole state machine, logging any fault with its context.
    pub async fn run<R: Rng + Send>(self, rng: &mut R) -> Result<GenerationReport, GenerationError> {
        let instance = self.host.instance_id();
        let mut state = InstanceState::new();

        match self.advance(&mut state, rng).await {
            Ok(()) => {
                tracing::info!(
                    %instance,
                    layout = ?self.layout,
                    placed = state.placements.len(),
                    mountain = state.mountain_placed,
                    "Map generation complete"
                );
                Ok(GenerationReport {
                    instance,
                    layout: self.layout,
                    placements: state.placements,
                    mountain_placed: state.mountain_placed,
                    pool: state.pool,
                })
            }
            Err(err) => {
                tracing::error!(
                    %instance,
                    layout = ?self.layout,
                    stage = ?state.stage,
                    pool = ?state.pool,
                    error = %err,
                    "Map generation failed"
                );
                Err(err)
            }
        }
    }

    async fn advance<R: Rng + Send>(
        &self,
        state: &mut InstanceState,
        rng: &mut R,
    ) -> Result<(), GenerationError> {
        let instance = self.host.instance_id();
        let _lease = self.registry.lease();
        self.signals.reset();

        state.stage = Stage::Preamble;
        self.preamble()?;

        if self.layout == Layout::Standard {
            state.stage = Stage::MountainPhase;
            state.mountain_placed = self.mountain_phase(rng).await?;
        }

        state.pool = self.candidate_pool();
        shuffle(&mut state.pool, rng);
        tracing::debug!(%instance, pool = ?state.pool, "Shuffled candidate pool");

        state.occupied = self.host.occupied_slots();
        if self.layout == Layout::Compact {
            for &slot in &self.config.compact_reserved_slots {
                if let Some(cell) = state.occupied.get_mut(slot) {
                    *cell = true;
                }
            }
            self.host.set_occupied_slots(&state.occupied);
        }

        for slot in 0..state.occupied.len() {
            state.stage = Stage::SlotLoop(slot);
            self.refresh_occupancy(&mut state.occupied);
            if state.occupied[slot] {
                tracing::trace!(%instance, slot, "Slot occupied, skipping");
                continue;
            }

            let Some(&candidate) = state.pool.get(slot) else {
                tracing::error!(
                    %instance,
                    slot,
                    pool_len = state.pool.len(),
                    "Slot index outside the candidate pool, skipping"
                );
                continue;
            };

            let tile = match self.layout {
                Layout::Standard => candidate,
                Layout::Compact => compact_choice(
                    &self.config,
                    &state.pool,
                    slot,
                    candidate,
                    &mut state.loot_count,
                ),
            };

            let is_dungeon = tile.0 == self.config.dungeon_type;
            if is_dungeon {
                state.dungeon_placed = true;
                self.host.set_dungeon_placed(true);
            }

            let placement = self.place(tile, slot, is_dungeon).await?;
            state.occupied[slot] = true;
            state.placements.push(SlotPlacement {
                slot,
                tile,
                custom: placement == Placement::Handled,
            });
        }

        state.stage = Stage::Finalize;
        state.tiles_placed = true;
        self.host.set_tiles_placed(true);
        state.occupied.fill(false);
        self.host.set_occupied_slots(&state.occupied);

        state.stage = Stage::Done;
        tracing::debug!(
            %instance,
            dungeon = state.dungeon_placed,
            tiles_placed = state.tiles_placed,
            loot = state.loot_count,
            "Finalized instance"
        );
        Ok(())
    }

    fn preamble(&self) -> Result<(), GenerationError> {
        match self.layout {
            Layout::Standard => {
                self.host.setup_large_map()?;
                let kept = self.config.kept_deformers;
                for index in 0..self.host.deformer_count() {
                    self.host.set_deformer_active(index, index < kept);
                }
            }
            Layout::Compact => self.host.setup_small_map()?,
        }
        tracing::debug!(instance = %self.host.instance_id(), layout = ?self.layout, "Preamble done");
        Ok(())
    }

    async fn mountain_phase<R: Rng + Send>(&self, rng: &mut R) -> Result<bool, GenerationError> {
        let roll = rng.random_range(0..100u32);
        if roll >= self.config.mountain_chance_percent {
            return Ok(false);
        }

        self.host.place_mountain()?;
        self.await_confirmation(WaitPoint::Mountain, false).await?;
        tracing::debug!(instance = %self.host.instance_id(), "Mountain placed");
        Ok(true)
    }

    fn candidate_pool(&self) -> Vec<TileTypeId> {
        let mut pool = self.builtin_pool.clone();
        pool.extend(self.registry.ids());
        pool
    }

    /// Slots the host occupied on its own (e.g. under the mountain) count too.
    fn refresh_occupancy(&self, occupied: &mut [bool]) {
        for (cell, host_cell) in occupied.iter_mut().zip(self.host.occupied_slots()) {
            *cell |= host_cell;
        }
    }

    async fn place(
        &self,
        tile: TileTypeId,
        slot: usize,
        is_dungeon: bool,
    ) -> Result<Placement, GenerationError> {
        let placement = self
            .interceptor
            .place(self.host.as_ref(), &self.signals, tile, slot);
        if placement == Placement::NotHandled {
            self.host.default_place(tile, slot)?;
        }

        self.await_confirmation(WaitPoint::Slot(slot), is_dungeon)
            .await?;
        tracing::debug!(instance = %self.host.instance_id(), %tile, slot, ?placement, "Slot placed");
        Ok(placement)
    }

    /// Suspend until the spawn is confirmed, or for the dungeon slot until
    /// the host reports the dungeon generated. Consumes the confirmation.
    async fn await_confirmation(
        &self,
        at: WaitPoint,
        is_dungeon: bool,
    ) -> Result<(), GenerationError> {
        let timeout = match self.config.confirm_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        self.signals
            .wait_for(timeout, |s| {
                s.spawn_confirmed || (is_dungeon && s.dungeon_generated)
            })
            .await
            .map_err(|err| match err {
                WaitError::TimedOut => GenerationError::ConfirmationTimeout { at },
                WaitError::Closed => GenerationError::SignalsClosed { at },
            })?;

        self.signals.clear_spawn();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
