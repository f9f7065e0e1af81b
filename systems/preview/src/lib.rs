#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Side-effect free inspection of what a wave would contain.
//!
//! Previews run the same planning entry point as the scheduler. Previewing a
//! wave with [`preview_runtime_wave`] and the scheduler's base seed reproduces
//! the spawn order the scheduler generates for that wave.

use std::fmt;

use horde_core::{SpecialArchetype, TemplateId, WaveIndex};
use horde_system_allocation::{AllocationWarning, ShortfallReason};
use horde_system_placement::{PlacementConfig, PlacementContext, PlacementWarning};
use horde_system_wave_profile::{derive_wave_seed, PlanWarning, WaveProfile};
use serde::Serialize;

/// Everything a designer needs to judge one wave.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WavePreview {
    /// Previewed wave.
    pub wave: WaveIndex,
    /// Seed the allocation was drawn with.
    pub seed: u64,
    /// Active special archetype.
    pub archetype: SpecialArchetype,
    /// Wave window in seconds.
    pub duration: f32,
    /// Budget before allocation.
    pub budget: u32,
    /// Base spawns per second.
    pub spawn_rate: f32,
    /// Maximum non-boss entries.
    pub population_cap: u32,
    /// Maximum simultaneously alive instances; `None` when unbounded.
    pub concurrency_cap: Option<u32>,
    /// Probability of attempting an elite draw first.
    pub elite_chance: f32,
    /// Signed cost bias.
    pub cost_bias: f32,
    /// Whether the archetype is Boss.
    pub is_boss_wave: bool,
    /// Whether the boss made it into the sequence.
    pub boss_included: bool,
    /// Normal entries valid for the wave.
    pub available_normal: usize,
    /// Elite entries valid for the wave.
    pub available_elite: usize,
    /// Upper estimate of the population if only the cheapest entry were drawn.
    pub estimated_count_by_min_cost: u32,
    /// Spawn order.
    pub sequence: Vec<TemplateId>,
    /// Budget left after allocation.
    pub leftover_budget: u32,
    /// Problems worth a designer's attention.
    pub warnings: Vec<PreviewWarning>,
}

/// Problems surfaced by a preview.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PreviewWarning {
    /// No normal entry is valid for the wave.
    NoNormalEntries,
    /// The wave has no budget.
    ZeroBudget,
    /// The budget cannot pay for the cheapest valid entry.
    BudgetBelowCheapest {
        /// Wave budget.
        budget: u32,
        /// Cost of the cheapest valid entry.
        cheapest: u32,
    },
    /// A boss wave without a usable boss entry.
    BossNotConfigured,
    /// Point-based placement without points.
    EmptySpawnPoints,
    /// Ring radii that need normalising.
    InvalidRingRadii,
    /// Placement mode that has no effect on the configured shape.
    PlacementModeIgnored,
    /// Ring placement without an anchor, centred on the origin.
    RingWithoutAnchor,
    /// Outside-view placement without a viewpoint to hide from.
    OutsideViewWithoutViewpoint,
    /// Fewer entries than the population cap.
    Shortfall {
        /// Non-boss entries produced.
        generated: u32,
        /// Population cap.
        cap: u32,
        /// Why allocation stopped.
        reason: ShortfallReason,
    },
    /// The allocation loop guard fired.
    IterationBoundExceeded {
        /// Iterations performed.
        iterations: u32,
    },
    /// The boss was admitted for free because the budget could not cover it.
    BossUnaffordable {
        /// Boss cost.
        cost: u32,
        /// Wave budget.
        budget: u32,
    },
    /// The wave holds the boss and nothing else.
    BossOnlyWave,
}

impl fmt::Display for PreviewWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoNormalEntries => write!(f, "no normal entries are valid for this wave"),
            Self::ZeroBudget => write!(f, "budget is zero"),
            Self::BudgetBelowCheapest { budget, cheapest } => {
                write!(f, "budget {budget} is below the cheapest entry cost {cheapest}")
            }
            Self::BossNotConfigured => write!(f, "boss wave without a usable boss entry"),
            Self::EmptySpawnPoints => write!(f, "placement has no spawn points"),
            Self::InvalidRingRadii => write!(f, "ring radii are invalid and will be normalised"),
            Self::PlacementModeIgnored => {
                write!(f, "placement mode has no effect on the configured shape")
            }
            Self::RingWithoutAnchor => write!(f, "ring has no anchor and is centred on the origin"),
            Self::OutsideViewWithoutViewpoint => {
                write!(f, "outside-view placement has no viewpoint")
            }
            Self::Shortfall {
                generated,
                cap,
                reason,
            } => write!(f, "generated {generated} of {cap} entries ({reason:?})"),
            Self::IterationBoundExceeded { iterations } => {
                write!(f, "allocation stopped after {iterations} iterations")
            }
            Self::BossUnaffordable { cost, budget } => {
                write!(f, "boss cost {cost} exceeds budget {budget}; boss is free")
            }
            Self::BossOnlyWave => write!(f, "wave contains only the boss"),
        }
    }
}

/// Previews `wave` with an explicit allocation seed.
///
/// When `placement` is given, its configuration is checked against the
/// context the caller will supply at spawn time.
#[must_use]
pub fn preview_wave(
    profile: &WaveProfile,
    wave: WaveIndex,
    seed: u64,
    placement: Option<(&PlacementConfig, &PlacementContext<'_>)>,
) -> WavePreview {
    let plan = profile.plan_wave_seeded(wave, seed);
    let scalars = *plan.scalars();
    let normal = profile.normal_pool(wave);
    let elite = profile.elite_pool(wave);

    let mut warnings = Vec::new();
    if normal.is_empty() {
        warnings.push(PreviewWarning::NoNormalEntries);
    }
    let cheapest = normal
        .iter()
        .chain(elite.iter())
        .filter(|entry| entry.template().is_some())
        .map(|entry| entry.cost().max(1))
        .min();
    if scalars.budget == 0 {
        warnings.push(PreviewWarning::ZeroBudget);
    } else if let Some(cheapest) = cheapest.filter(|cost| *cost > scalars.budget) {
        warnings.push(PreviewWarning::BudgetBelowCheapest {
            budget: scalars.budget,
            cheapest,
        });
    }
    if let Some((placement, context)) = placement {
        if placement.validate().is_err() {
            warnings.push(PreviewWarning::EmptySpawnPoints);
        }
        warnings.extend(placement.warnings(context).into_iter().map(|warning| match warning {
            PlacementWarning::InvalidRingRadii => PreviewWarning::InvalidRingRadii,
            PlacementWarning::ModeIgnoredForShape => PreviewWarning::PlacementModeIgnored,
            PlacementWarning::RingWithoutAnchor => PreviewWarning::RingWithoutAnchor,
            PlacementWarning::OutsideViewWithoutViewpoint => {
                PreviewWarning::OutsideViewWithoutViewpoint
            }
        }));
    }
    warnings.extend(plan.warnings().iter().map(|warning| match *warning {
        PlanWarning::BossNotConfigured => PreviewWarning::BossNotConfigured,
        PlanWarning::Allocation(AllocationWarning::Shortfall {
            generated,
            cap,
            reason,
        }) => PreviewWarning::Shortfall {
            generated,
            cap,
            reason,
        },
        PlanWarning::Allocation(AllocationWarning::IterationBoundExceeded { iterations }) => {
            PreviewWarning::IterationBoundExceeded { iterations }
        }
        PlanWarning::Allocation(AllocationWarning::BossUnaffordable { cost, budget }) => {
            PreviewWarning::BossUnaffordable { cost, budget }
        }
        PlanWarning::Allocation(AllocationWarning::BossOnlyWave) => PreviewWarning::BossOnlyWave,
    }));

    let boss_included = plan.allocation().boss_included();
    let estimated = cheapest.map_or(0, |cost| (scalars.budget / cost).min(scalars.population_cap))
        + u32::from(boss_included);

    let available_normal = plan.available_normal();
    let available_elite = plan.available_elite();
    let leftover_budget = plan.allocation().leftover_budget();
    WavePreview {
        wave,
        seed,
        archetype: scalars.archetype,
        duration: scalars.duration,
        budget: scalars.budget,
        spawn_rate: scalars.spawn_rate,
        population_cap: scalars.population_cap,
        concurrency_cap: (scalars.concurrency_cap != u32::MAX).then_some(scalars.concurrency_cap),
        elite_chance: scalars.elite_chance,
        cost_bias: scalars.cost_bias,
        is_boss_wave: scalars.archetype == SpecialArchetype::Boss,
        boss_included,
        available_normal,
        available_elite,
        estimated_count_by_min_cost: estimated,
        sequence: plan.into_allocation().into_templates(),
        leftover_budget,
        warnings,
    }
}

/// Previews `wave` exactly as a scheduler seeded with `base_seed` would generate it.
#[must_use]
pub fn preview_runtime_wave(
    profile: &WaveProfile,
    wave: WaveIndex,
    base_seed: u64,
    placement: Option<(&PlacementConfig, &PlacementContext<'_>)>,
) -> WavePreview {
    preview_wave(profile, wave, derive_wave_seed(base_seed, wave), placement)
}
