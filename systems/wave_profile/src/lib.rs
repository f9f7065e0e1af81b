#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Wave profiles: per-wave scalars, special archetypes, and wave planning.
//!
//! A [`WaveProfile`] is immutable once validated. Every query is a pure
//! function of the wave index, so the scheduler and the preview tooling see
//! identical numbers. [`WaveProfile::plan_wave`] is the single generation
//! entry point both of them call.

mod config;
mod seed;

use horde_core::{CatalogEntry, ConfigurationError, Curve, CurveError, SpecialArchetype, WaveIndex};
use horde_system_allocation::{
    AllocationRequest, AllocationResult, AllocationWarning, BossInsertion, BudgetAllocator,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub use config::{
    ArchetypeRule, ArchetypeRules, BossConfig, CurveConfig, GlobalMultipliers, KeyframePairs,
    WaveProfileConfig,
};
pub use seed::{derive_labeled_seed, derive_wave_seed, RNG_STREAM_PLACEMENT};

/// Shortest wave duration in seconds.
pub const MIN_DURATION: f32 = 0.1;
/// Lowest spawn rate in spawns per second.
pub const MIN_SPAWN_RATE: f32 = 0.01;
/// Lowest pacing multiplier.
pub const MIN_PACING_MULTIPLIER: f32 = 0.01;

/// Smallest multiplier accepted for global multipliers.
const MIN_GLOBAL_MULTIPLIER: f32 = 0.1;

#[derive(Clone, Debug, PartialEq)]
struct WaveCurves {
    duration: Curve,
    budget: Curve,
    spawn_rate: Curve,
    population_cap: Curve,
    concurrency_cap: Curve,
    pacing: Curve,
    elite_chance: Curve,
}

/// Validated, read-only wave configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveProfile {
    curves: WaveCurves,
    multipliers: GlobalMultipliers,
    normal: Vec<CatalogEntry>,
    elite: Vec<CatalogEntry>,
    fallback: Vec<CatalogEntry>,
    boss: Option<BossConfig>,
    archetypes: ArchetypeRules,
    end_early_when_queue_empty: bool,
}

/// Scalars governing a single wave.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaveScalars {
    /// Wave the scalars belong to.
    pub wave: WaveIndex,
    /// Active special archetype.
    pub archetype: SpecialArchetype,
    /// Wave window in seconds.
    pub duration: f32,
    /// Budget available to the allocator.
    pub budget: u32,
    /// Base spawns per second.
    pub spawn_rate: f32,
    /// Maximum non-boss entries generated.
    pub population_cap: u32,
    /// Maximum simultaneously alive instances; `u32::MAX` when unbounded.
    pub concurrency_cap: u32,
    /// Probability of attempting an elite draw first.
    pub elite_chance: f32,
    /// Signed cost bias handed to the allocator.
    pub cost_bias: f32,
}

/// Conditions noticed while planning a wave.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlanWarning {
    /// Reported by the allocator.
    Allocation(AllocationWarning),
    /// A boss wave was triggered but no usable boss entry is configured.
    BossNotConfigured,
}

/// Everything generated for one wave.
#[derive(Clone, Debug, PartialEq)]
pub struct WavePlan {
    scalars: WaveScalars,
    allocation: AllocationResult,
    available_normal: usize,
    available_elite: usize,
    warnings: Vec<PlanWarning>,
}

impl WavePlan {
    /// Scalars the plan was generated from.
    #[must_use]
    pub const fn scalars(&self) -> &WaveScalars {
        &self.scalars
    }

    /// Allocation result holding the spawn order.
    #[must_use]
    pub const fn allocation(&self) -> &AllocationResult {
        &self.allocation
    }

    /// Consumes the plan, yielding the allocation result.
    #[must_use]
    pub fn into_allocation(self) -> AllocationResult {
        self.allocation
    }

    /// Number of normal entries valid for the wave.
    #[must_use]
    pub const fn available_normal(&self) -> usize {
        self.available_normal
    }

    /// Number of elite entries valid for the wave.
    #[must_use]
    pub const fn available_elite(&self) -> usize {
        self.available_elite
    }

    /// Planning and allocation warnings.
    #[must_use]
    pub fn warnings(&self) -> &[PlanWarning] {
        &self.warnings
    }
}

impl WaveProfile {
    /// Validates an authored configuration.
    pub fn from_config(config: WaveProfileConfig) -> Result<Self, ConfigurationError> {
        let WaveProfileConfig {
            curves,
            multipliers,
            normal,
            elite,
            fallback,
            boss,
            archetypes,
            end_early_when_queue_empty,
        } = config;

        if normal.is_empty() && elite.is_empty() && fallback.is_empty() {
            return Err(ConfigurationError::EmptyCatalogs);
        }

        check_multiplier("multipliers.budget", multipliers.budget)?;
        check_multiplier("multipliers.duration", multipliers.duration)?;
        check_multiplier("multipliers.spawn_rate", multipliers.spawn_rate)?;

        for archetype in SpecialArchetype::PRIORITY {
            let Some(rule) = archetypes.rule(archetype) else {
                continue;
            };
            if rule.enabled && rule.period == 0 {
                return Err(ConfigurationError::OutOfRange {
                    field: "archetypes.period",
                    requirement: "at least 1 for enabled rules",
                    value: 0.0,
                });
            }
        }

        let curves = WaveCurves {
            duration: build_curve("duration", curves.duration)?,
            budget: build_curve("budget", curves.budget)?,
            spawn_rate: build_curve("spawn_rate", curves.spawn_rate)?,
            population_cap: build_curve("population_cap", curves.population_cap)?,
            concurrency_cap: build_curve("concurrency_cap", curves.concurrency_cap)?,
            pacing: build_curve("pacing", curves.pacing)?,
            elite_chance: build_curve("elite_chance", curves.elite_chance)?,
        };

        Ok(Self {
            curves,
            multipliers,
            normal,
            elite,
            fallback,
            boss,
            archetypes,
            end_early_when_queue_empty,
        })
    }

    /// Whether a wave ends as soon as its spawn queue runs dry.
    #[must_use]
    pub const fn end_early_when_queue_empty(&self) -> bool {
        self.end_early_when_queue_empty
    }

    /// Configured boss, if any.
    #[must_use]
    pub const fn boss(&self) -> Option<&BossConfig> {
        self.boss.as_ref()
    }

    /// Resolves the special archetype of `wave` using Boss > Tank > Swarm > Rush.
    #[must_use]
    pub fn special_archetype(&self, wave: WaveIndex) -> SpecialArchetype {
        SpecialArchetype::PRIORITY
            .into_iter()
            .find(|archetype| {
                self.archetypes
                    .rule(*archetype)
                    .is_some_and(|rule| rule.enabled && wave.is_multiple_of(rule.period))
            })
            .unwrap_or(SpecialArchetype::None)
    }

    /// Budget for `wave`, never negative.
    #[must_use]
    pub fn budget(&self, wave: WaveIndex) -> u32 {
        let value = self.curves.budget.evaluate(wave.as_curve_x())
            * self.multipliers.budget
            * self.rule_for(wave).map_or(1.0, |rule| rule.budget);
        if !value.is_finite() || value <= 0.0 {
            return 0;
        }
        value.round() as u32
    }

    /// Duration of `wave` in seconds, at least [`MIN_DURATION`].
    #[must_use]
    pub fn duration(&self, wave: WaveIndex) -> f32 {
        let value = self.curves.duration.evaluate(wave.as_curve_x())
            * self.multipliers.duration
            * self.rule_for(wave).map_or(1.0, |rule| rule.duration);
        value.max(MIN_DURATION)
    }

    /// Base spawns per second for `wave`, at least [`MIN_SPAWN_RATE`].
    #[must_use]
    pub fn spawn_rate(&self, wave: WaveIndex) -> f32 {
        let value = self.curves.spawn_rate.evaluate(wave.as_curve_x())
            * self.multipliers.spawn_rate
            * self.rule_for(wave).map_or(1.0, |rule| rule.spawn_rate);
        value.max(MIN_SPAWN_RATE)
    }

    /// Maximum non-boss entries generated for `wave`, at least one.
    #[must_use]
    pub fn population_cap(&self, wave: WaveIndex) -> u32 {
        let value = self.curves.population_cap.evaluate(wave.as_curve_x())
            * self.rule_for(wave).map_or(1.0, |rule| rule.population_cap);
        value.round().max(1.0) as u32
    }

    /// Maximum simultaneously alive instances; `u32::MAX` when unbounded.
    #[must_use]
    pub fn concurrency_cap(&self, wave: WaveIndex) -> u32 {
        let value = self
            .curves
            .concurrency_cap
            .evaluate(wave.as_curve_x())
            .round();
        if value.is_nan() || value <= 0.0 {
            u32::MAX
        } else {
            value as u32
        }
    }

    /// Elite chance for `wave` in `[0, 1]`.
    #[must_use]
    pub fn elite_chance(&self, wave: WaveIndex) -> f32 {
        let value = self.curves.elite_chance.evaluate(wave.as_curve_x());
        if value.is_nan() {
            return 0.0;
        }
        value.clamp(0.0, 1.0)
    }

    /// Signed cost bias: positive on tank waves, negative on swarm waves, zero otherwise.
    #[must_use]
    pub fn cost_bias(&self, wave: WaveIndex) -> f32 {
        match self.special_archetype(wave) {
            SpecialArchetype::Tank => self.archetypes.tank.cost_bias.abs(),
            SpecialArchetype::Swarm => -self.archetypes.swarm.cost_bias.abs(),
            SpecialArchetype::None | SpecialArchetype::Rush | SpecialArchetype::Boss => 0.0,
        }
    }

    /// Spawn rate multiplier at normalised `progress`, at least [`MIN_PACING_MULTIPLIER`].
    #[must_use]
    pub fn pacing_multiplier(&self, progress: f32) -> f32 {
        let progress = if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 1.0)
        };
        self.curves
            .pacing
            .evaluate(progress)
            .max(MIN_PACING_MULTIPLIER)
    }

    /// Every scalar of `wave` in one value.
    #[must_use]
    pub fn scalars(&self, wave: WaveIndex) -> WaveScalars {
        WaveScalars {
            wave,
            archetype: self.special_archetype(wave),
            duration: self.duration(wave),
            budget: self.budget(wave),
            spawn_rate: self.spawn_rate(wave),
            population_cap: self.population_cap(wave),
            concurrency_cap: self.concurrency_cap(wave),
            elite_chance: self.elite_chance(wave),
            cost_bias: self.cost_bias(wave),
        }
    }

    /// Normal entries valid for `wave`, using the fallback catalog when the normal one is empty.
    #[must_use]
    pub fn normal_pool(&self, wave: WaveIndex) -> Vec<&CatalogEntry> {
        let source = if self.normal.is_empty() {
            &self.fallback
        } else {
            &self.normal
        };
        source
            .iter()
            .filter(|entry| entry.is_available_for(wave))
            .collect()
    }

    /// Elite entries valid for `wave`.
    #[must_use]
    pub fn elite_pool(&self, wave: WaveIndex) -> Vec<&CatalogEntry> {
        self.elite
            .iter()
            .filter(|entry| entry.is_available_for(wave))
            .collect()
    }

    /// Whether `wave` is a boss wave with a usable boss entry.
    #[must_use]
    pub fn boss_insertion(&self, wave: WaveIndex) -> Option<BossInsertion> {
        if self.special_archetype(wave) != SpecialArchetype::Boss {
            return None;
        }
        let boss = self.boss.as_ref()?;
        let template = boss.entry.template()?;
        Some(BossInsertion {
            template,
            cost: boss.entry.cost().max(1),
            consumes_budget: boss.consumes_budget,
            position: boss.position,
            allow_boss_only: boss.allow_boss_only_waves,
        })
    }

    /// Generates the spawn order of `wave` from the caller's random stream.
    pub fn plan_wave<R>(
        &self,
        wave: WaveIndex,
        allocator: &mut BudgetAllocator,
        rng: &mut R,
    ) -> WavePlan
    where
        R: Rng + ?Sized,
    {
        let scalars = self.scalars(wave);
        let normal = self.normal_pool(wave);
        let elite = self.elite_pool(wave);
        let boss = self.boss_insertion(wave);

        let request = AllocationRequest {
            budget: scalars.budget,
            population_cap: scalars.population_cap,
            cost_bias: scalars.cost_bias,
            elite_chance: scalars.elite_chance,
        };
        let allocation = allocator.allocate(&request, &normal, &elite, boss, rng);

        let mut warnings = Vec::new();
        if scalars.archetype == SpecialArchetype::Boss && boss.is_none() {
            warnings.push(PlanWarning::BossNotConfigured);
        }
        warnings.extend(
            allocation
                .warnings()
                .iter()
                .copied()
                .map(PlanWarning::Allocation),
        );

        WavePlan {
            scalars,
            allocation,
            available_normal: normal.len(),
            available_elite: elite.len(),
            warnings,
        }
    }

    /// Generates the spawn order of `wave` from an explicit seed.
    #[must_use]
    pub fn plan_wave_seeded(&self, wave: WaveIndex, seed: u64) -> WavePlan {
        let mut allocator = BudgetAllocator::new();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        self.plan_wave(wave, &mut allocator, &mut rng)
    }

    fn rule_for(&self, wave: WaveIndex) -> Option<&ArchetypeRule> {
        self.archetypes.rule(self.special_archetype(wave))
    }
}

/// Normalised progress through a wave given the remaining time.
#[must_use]
pub fn wave_progress(remaining: f32, duration: f32) -> f32 {
    if duration <= f32::EPSILON {
        return 1.0;
    }
    (1.0 - remaining / duration).clamp(0.0, 1.0)
}

fn build_curve(name: &'static str, pairs: KeyframePairs) -> Result<Curve, ConfigurationError> {
    Curve::try_from(pairs).map_err(|source: CurveError| ConfigurationError::InvalidCurve {
        curve: name,
        source,
    })
}

fn check_multiplier(field: &'static str, value: f32) -> Result<(), ConfigurationError> {
    if value.is_finite() && value >= MIN_GLOBAL_MULTIPLIER {
        Ok(())
    } else {
        Err(ConfigurationError::OutOfRange {
            field,
            requirement: "a finite value of at least 0.1",
            value,
        })
    }
}
