#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Spawn scheduler owning the wave lifecycle.
//!
//! The scheduler generates a wave from the shared [`WaveProfile`], paces its
//! spawn queue under the concurrency cap, waits for the live set to clear and
//! then advances to the next wave. Every notification is pushed into the
//! caller's event buffer in the order it happened; [`Listeners`] fans a buffer
//! out to registered observers.

mod listeners;

use std::{
    collections::{BTreeMap, VecDeque},
    sync::Arc,
    time::Duration,
};

use glam::Quat;
use horde_core::{
    ConfigurationError, Event, InstanceFactory, InstanceHandle, LivenessPolicy, TemplateId,
    WaveIndex,
};
use horde_system_allocation::{AllocationWarning, BudgetAllocator, ShortfallReason};
use horde_system_placement::{Placement, PlacementConfig, PlacementContext};
use horde_system_wave_profile::{
    derive_labeled_seed, derive_wave_seed, wave_progress, PlanWarning, WaveProfile,
    RNG_STREAM_PLACEMENT,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

pub use listeners::{ListenerId, Listeners, WaveListener};

/// Shortest interval between two emissions in seconds.
pub const MIN_SPAWN_INTERVAL: f32 = 0.01;

/// Runtime options that do not belong to the wave profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerOptions {
    /// Base seed every per-wave stream is derived from.
    pub seed: u64,
    /// Wave generated on start.
    pub starting_wave: WaveIndex,
    /// Which lifetime states leave the live set.
    pub liveness: LivenessPolicy,
    /// Hands pruned instances back to the factory for reuse.
    pub recycle_instances: bool,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            starting_wave: WaveIndex::FIRST,
            liveness: LivenessPolicy::default(),
            recycle_instances: false,
        }
    }
}

/// Configuration parameters required to construct the scheduler.
#[derive(Clone, Debug)]
pub struct Config {
    profile: Option<Arc<WaveProfile>>,
    placement: PlacementConfig,
    options: SchedulerOptions,
}

impl Config {
    /// Creates a configuration from a shared profile and a placement strategy.
    #[must_use]
    pub fn new(
        profile: Option<Arc<WaveProfile>>,
        placement: PlacementConfig,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            profile,
            placement,
            options,
        }
    }
}

/// Lifecycle phase of the scheduler.
///
/// Generation happens synchronously inside the tick that triggers it, so it is
/// never observed as a phase of its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Constructed but not started.
    Idle,
    /// Emitting the spawn queue.
    Spawning,
    /// Queue exhausted; waiting for the live set and the wave timer.
    Draining,
    /// Stopped explicitly or refused to start; no further notifications.
    Stopped,
}

/// Mutable state of the wave in progress.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveRuntimeState {
    wave: WaveIndex,
    wave_timer: f32,
    wave_duration: f32,
    spawn_timer: f32,
    spawn_rate: f32,
    concurrency_cap: u32,
    spawn_queue: VecDeque<TemplateId>,
    live_instances: BTreeMap<InstanceHandle, TemplateId>,
    all_defeated_notified: bool,
}

impl WaveRuntimeState {
    /// Wave being run.
    #[must_use]
    pub const fn wave(&self) -> WaveIndex {
        self.wave
    }

    /// Seconds left in the wave window; negative once overdue.
    #[must_use]
    pub const fn wave_timer(&self) -> f32 {
        self.wave_timer
    }

    /// Length of the wave window in seconds.
    #[must_use]
    pub const fn wave_duration(&self) -> f32 {
        self.wave_duration
    }

    /// Seconds until the next emission may happen.
    #[must_use]
    pub const fn spawn_timer(&self) -> f32 {
        self.spawn_timer
    }

    /// Maximum simultaneously alive instances.
    #[must_use]
    pub const fn concurrency_cap(&self) -> u32 {
        self.concurrency_cap
    }

    /// Templates not yet emitted, front first.
    #[must_use]
    pub const fn spawn_queue(&self) -> &VecDeque<TemplateId> {
        &self.spawn_queue
    }

    /// Handles counted towards the live population.
    pub fn live_instances(&self) -> impl Iterator<Item = InstanceHandle> + '_ {
        self.live_instances.keys().copied()
    }

    /// Number of handles counted towards the live population.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live_instances.len()
    }

    /// Whether `AllEnemiesDefeated` already fired for this wave.
    #[must_use]
    pub const fn all_defeated_notified(&self) -> bool {
        self.all_defeated_notified
    }

    fn is_cleared(&self) -> bool {
        self.spawn_queue.is_empty() && self.live_instances.is_empty()
    }

    fn has_capacity(&self) -> bool {
        u32::try_from(self.live_instances.len())
            .map_or(false, |live| live < self.concurrency_cap)
    }
}

/// Wave lifecycle state machine.
#[derive(Debug)]
pub struct Scheduler {
    config: Config,
    phase: Phase,
    state: Option<WaveRuntimeState>,
    allocator: BudgetAllocator,
    placement: Option<Placement>,
    pruned: Vec<(InstanceHandle, TemplateId)>,
    failure: Option<ConfigurationError>,
}

impl Scheduler {
    /// Creates a scheduler in the idle phase.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            phase: Phase::Idle,
            state: None,
            allocator: BudgetAllocator::new(),
            placement: None,
            pruned: Vec::new(),
            failure: None,
        }
    }

    /// Current lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// State of the wave in progress, if a wave has been generated.
    #[must_use]
    pub const fn state(&self) -> Option<&WaveRuntimeState> {
        self.state.as_ref()
    }

    /// Wave in progress, if any.
    #[must_use]
    pub fn current_wave(&self) -> Option<WaveIndex> {
        self.state.as_ref().map(WaveRuntimeState::wave)
    }

    /// Validates the configuration and generates the starting wave.
    ///
    /// A configuration error is logged once and leaves the scheduler stopped;
    /// later calls return the same error without retrying. Starting a
    /// scheduler that is already running does nothing.
    pub fn start(&mut self, out: &mut Vec<Event>) -> Result<(), ConfigurationError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        if self.phase != Phase::Idle {
            return Ok(());
        }

        let placement = match self.validate() {
            Ok(placement) => placement,
            Err(error) => {
                error!(%error, "wave scheduler refused to start");
                self.phase = Phase::Stopped;
                self.failure = Some(error.clone());
                return Err(error);
            }
        };
        self.placement = Some(placement);
        self.generate(self.config.options.starting_wave, out);
        Ok(())
    }

    /// Configuration error that prevented the scheduler from starting.
    #[must_use]
    pub const fn failure(&self) -> Option<&ConfigurationError> {
        self.failure.as_ref()
    }

    /// Stops the scheduler; no notification is emitted afterwards.
    pub fn stop(&mut self) {
        if self.phase != Phase::Stopped {
            info!(
                wave = self.current_wave().map(|wave| wave.get()),
                "wave scheduler stopped"
            );
        }
        self.phase = Phase::Stopped;
    }

    /// Advances the lifecycle by `dt`.
    pub fn tick<F>(
        &mut self,
        dt: Duration,
        factory: &mut F,
        context: &PlacementContext<'_>,
        out: &mut Vec<Event>,
    ) where
        F: InstanceFactory + ?Sized,
    {
        if !matches!(self.phase, Phase::Spawning | Phase::Draining) {
            return;
        }
        let Some(profile) = self.config.profile.clone() else {
            return;
        };

        self.prune(factory);

        let Some(state) = self.state.as_mut() else {
            return;
        };
        let elapsed = dt.as_secs_f32();
        state.wave_timer -= elapsed;
        state.spawn_timer -= elapsed;

        if let Some(placement) = self.placement.as_mut() {
            emit_due(state, &profile, placement, factory, context, out);
        }

        if state.spawn_queue.is_empty() {
            self.phase = Phase::Draining;
            if profile.end_early_when_queue_empty() && state.wave_timer > 0.0 {
                state.wave_timer = 0.0;
            }
        }

        if !state.is_cleared() {
            return;
        }
        if !state.all_defeated_notified {
            state.all_defeated_notified = true;
            out.push(Event::AllEnemiesDefeated { wave: state.wave });
        }
        if state.wave_timer <= 0.0 {
            let finished = state.wave;
            info!(wave = finished.get(), "wave ended");
            out.push(Event::WaveEnded { wave: finished });
            self.generate(finished.next(), out);
        }
    }

    fn validate(&self) -> Result<Placement, ConfigurationError> {
        if self.config.profile.is_none() {
            return Err(ConfigurationError::MissingProfile);
        }
        let seed = derive_labeled_seed(self.config.options.seed, RNG_STREAM_PLACEMENT);
        Placement::new(self.config.placement.clone(), seed)
    }

    fn prune<F>(&mut self, factory: &mut F)
    where
        F: InstanceFactory + ?Sized,
    {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        let policy = self.config.options.liveness;
        self.pruned.clear();
        self.pruned.extend(
            state
                .live_instances
                .iter()
                .filter(|(handle, _)| !policy.is_alive(factory.liveness(**handle)))
                .map(|(handle, template)| (*handle, *template)),
        );
        for (handle, template) in self.pruned.drain(..) {
            let _ = state.live_instances.remove(&handle);
            if self.config.options.recycle_instances {
                factory.recycle(template, handle);
            }
        }
    }

    fn generate(&mut self, wave: WaveIndex, out: &mut Vec<Event>) {
        let Some(profile) = self.config.profile.clone() else {
            return;
        };

        let mut rng = ChaCha8Rng::seed_from_u64(derive_wave_seed(self.config.options.seed, wave));
        let plan = profile.plan_wave(wave, &mut self.allocator, &mut rng);
        for warning in plan.warnings() {
            log_plan_warning(wave, warning);
        }

        let scalars = *plan.scalars();
        let spawn_queue: VecDeque<TemplateId> = plan.into_allocation().into_templates().into();
        info!(
            wave = wave.get(),
            archetype = %scalars.archetype,
            budget = scalars.budget,
            queued = spawn_queue.len(),
            duration = scalars.duration,
            "wave started"
        );

        self.state = Some(WaveRuntimeState {
            wave,
            wave_timer: scalars.duration,
            wave_duration: scalars.duration,
            spawn_timer: 0.0,
            spawn_rate: scalars.spawn_rate,
            concurrency_cap: scalars.concurrency_cap,
            spawn_queue,
            live_instances: BTreeMap::new(),
            all_defeated_notified: false,
        });
        self.phase = Phase::Spawning;
        out.push(Event::WaveStarted { wave });
    }
}

fn emit_due<F>(
    state: &mut WaveRuntimeState,
    profile: &WaveProfile,
    placement: &mut Placement,
    factory: &mut F,
    context: &PlacementContext<'_>,
    out: &mut Vec<Event>,
) where
    F: InstanceFactory + ?Sized,
{
    while state.spawn_timer <= 0.0 && !state.spawn_queue.is_empty() {
        if !state.has_capacity() {
            state.spawn_timer = 0.0;
            return;
        }
        let Some(template) = state.spawn_queue.pop_front() else {
            return;
        };

        let position = placement.choose_location(context);
        match factory.instantiate(template, position, Quat::IDENTITY) {
            Some(instance) => {
                let _ = state.live_instances.insert(instance, template);
                debug!(
                    wave = state.wave.get(),
                    instance = instance.get(),
                    template = template.get(),
                    "enemy spawned"
                );
                out.push(Event::EnemySpawned {
                    wave: state.wave,
                    instance,
                    template,
                    position,
                });
            }
            None => {
                warn!(
                    wave = state.wave.get(),
                    template = template.get(),
                    "template could not be instantiated; emission skipped"
                );
            }
        }

        let progress = wave_progress(state.wave_timer, state.wave_duration);
        let rate = state.spawn_rate * profile.pacing_multiplier(progress);
        state.spawn_timer += (1.0 / rate).max(MIN_SPAWN_INTERVAL);
    }
}

fn log_plan_warning(wave: WaveIndex, warning: &PlanWarning) {
    match warning {
        PlanWarning::BossNotConfigured => {
            warn!(wave = wave.get(), "boss wave has no usable boss entry");
        }
        PlanWarning::Allocation(AllocationWarning::Shortfall {
            generated,
            cap,
            reason: ShortfallReason::BudgetExhausted,
        }) => {
            debug!(wave = wave.get(), generated, cap, "budget spent before the population cap");
        }
        PlanWarning::Allocation(AllocationWarning::Shortfall {
            generated,
            cap,
            reason,
        }) => {
            warn!(
                wave = wave.get(),
                generated,
                cap,
                ?reason,
                "allocation fell short of the population cap"
            );
        }
        PlanWarning::Allocation(AllocationWarning::IterationBoundExceeded { iterations }) => {
            warn!(wave = wave.get(), iterations, "allocation hit its iteration bound");
        }
        PlanWarning::Allocation(AllocationWarning::BossUnaffordable { cost, budget }) => {
            warn!(wave = wave.get(), cost, budget, "boss exceeds the budget and spawns for free");
        }
        PlanWarning::Allocation(AllocationWarning::BossOnlyWave) => {
            warn!(wave = wave.get(), "boss wave contains no regular enemies");
        }
    }
}
