#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Budget allocator that fills a wave's population from weighted catalogs.
//!
//! The allocator repeatedly draws from the elite and normal pools, restricted
//! to entries the remaining budget can afford, until the budget is spent, the
//! population cap is reached, or nothing affordable remains. All randomness is
//! drawn from the caller's generator so identical inputs and seeds replay the
//! same sequence.

use horde_core::{CatalogEntry, TemplateId};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Multiplier applied to the population cap to bound the allocation loop.
pub const ITERATION_BOUND_FACTOR: u32 = 10;

/// Absolute ceiling on allocation iterations, whatever the population cap.
pub const MAX_ALLOCATION_ITERATIONS: u32 = 100_000;

/// Biases with a smaller magnitude are treated as no bias at all.
pub const BIAS_EPSILON: f64 = 1e-6;

/// Scalars that drive a single allocation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AllocationRequest {
    /// Budget available to spend on entries.
    pub budget: u32,
    /// Maximum number of non-boss entries.
    pub population_cap: u32,
    /// Exponent skewing selection towards expensive (positive) or cheap (negative) entries.
    pub cost_bias: f32,
    /// Probability in `[0, 1]` of attempting an elite draw first.
    pub elite_chance: f32,
}

/// Where the boss is placed in the spawn order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BossPosition {
    /// The boss opens the wave.
    #[default]
    Front,
    /// The boss closes the wave.
    Back,
}

/// Boss insertion parameters for a boss wave.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BossInsertion {
    /// Template spawned for the boss.
    pub template: TemplateId,
    /// Budget cost of the boss.
    pub cost: u32,
    /// Whether the boss cost is deducted before regular allocation.
    pub consumes_budget: bool,
    /// Position of the boss in the final sequence.
    pub position: BossPosition,
    /// Whether a wave consisting of only the boss is acceptable.
    pub allow_boss_only: bool,
}

/// Why the allocator stopped before reaching the population cap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortfallReason {
    /// The budget was spent exactly.
    BudgetExhausted,
    /// Budget remained but no entry was affordable.
    NothingAffordable,
    /// Both pools were empty.
    EmptyPools,
}

/// Non-fatal conditions observed during allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AllocationWarning {
    /// Fewer entries than the cap were produced.
    Shortfall {
        /// Non-boss entries produced.
        generated: u32,
        /// Requested population cap.
        cap: u32,
        /// Why allocation stopped.
        reason: ShortfallReason,
    },
    /// The loop guard terminated allocation early.
    IterationBoundExceeded {
        /// Iterations performed before stopping.
        iterations: u32,
    },
    /// The boss was meant to consume budget but the budget could not cover it.
    BossUnaffordable {
        /// Boss cost.
        cost: u32,
        /// Budget at the time of insertion.
        budget: u32,
    },
    /// The wave contains the boss and nothing else.
    BossOnlyWave,
}

/// Ordered templates chosen for one wave.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AllocationResult {
    templates: Vec<TemplateId>,
    leftover_budget: u32,
    boss_included: bool,
    warnings: Vec<AllocationWarning>,
}

impl AllocationResult {
    /// Templates in spawn order.
    #[must_use]
    pub fn templates(&self) -> &[TemplateId] {
        &self.templates
    }

    /// Consumes the result, yielding the spawn order.
    #[must_use]
    pub fn into_templates(self) -> Vec<TemplateId> {
        self.templates
    }

    /// Budget left unspent.
    #[must_use]
    pub const fn leftover_budget(&self) -> u32 {
        self.leftover_budget
    }

    /// Whether a boss was inserted.
    #[must_use]
    pub const fn boss_included(&self) -> bool {
        self.boss_included
    }

    /// Number of entries excluding the boss.
    #[must_use]
    pub fn regular_count(&self) -> usize {
        self.templates.len() - usize::from(self.boss_included)
    }

    /// Conditions worth surfacing to designers.
    #[must_use]
    pub fn warnings(&self) -> &[AllocationWarning] {
        &self.warnings
    }

    /// Reports whether allocation hit the iteration guard.
    #[must_use]
    pub fn hit_iteration_bound(&self) -> bool {
        self.warnings
            .iter()
            .any(|warning| matches!(warning, AllocationWarning::IterationBoundExceeded { .. }))
    }
}

/// Allocator that reuses its weight scratch buffer between calls.
#[derive(Debug, Default)]
pub struct BudgetAllocator {
    weights: Vec<f64>,
}

impl BudgetAllocator {
    /// Creates an allocator with an empty scratch buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fills a wave's population from the provided pools.
    ///
    /// Pools are expected to be pre-filtered for the wave; entries without a
    /// template or with a zero cost are never chosen regardless.
    pub fn allocate<R>(
        &mut self,
        request: &AllocationRequest,
        normal: &[&CatalogEntry],
        elite: &[&CatalogEntry],
        boss: Option<BossInsertion>,
        rng: &mut R,
    ) -> AllocationResult
    where
        R: Rng + ?Sized,
    {
        let mut budget = request.budget;
        let mut warnings = Vec::new();

        if let Some(boss) = boss.filter(|boss| boss.consumes_budget) {
            let cost = boss.cost.max(1);
            if cost <= budget {
                budget -= cost;
            } else {
                warnings.push(AllocationWarning::BossUnaffordable { cost, budget });
            }
        }

        let cap = request.population_cap;
        let bound = cap
            .saturating_mul(ITERATION_BOUND_FACTOR)
            .min(MAX_ALLOCATION_ITERATIONS);
        let elite_chance = f64::from(request.elite_chance.clamp(0.0, 1.0));
        let mut templates = Vec::new();
        let mut iterations = 0u32;

        let shortfall = loop {
            if budget == 0 {
                break Some(ShortfallReason::BudgetExhausted);
            }
            if templates.len() >= cap as usize {
                break None;
            }
            if iterations >= bound {
                warnings.push(AllocationWarning::IterationBoundExceeded { iterations });
                break None;
            }
            iterations += 1;

            let mut chosen = None;
            if !elite.is_empty() && rng.gen::<f64>() < elite_chance {
                chosen = self.choose_weighted(elite, budget, request.cost_bias, rng);
            }
            if chosen.is_none() {
                chosen = self.choose_weighted(normal, budget, request.cost_bias, rng);
            }

            let Some((template, cost)) =
                chosen.and_then(|entry| entry.template().map(|template| (template, entry.cost())))
            else {
                break Some(if normal.is_empty() && elite.is_empty() {
                    ShortfallReason::EmptyPools
                } else {
                    ShortfallReason::NothingAffordable
                });
            };

            templates.push(template);
            budget -= cost;
        };

        let generated = u32::try_from(templates.len()).unwrap_or(u32::MAX);
        if let Some(reason) = shortfall.filter(|_| generated < cap) {
            warnings.push(AllocationWarning::Shortfall {
                generated,
                cap,
                reason,
            });
        }

        let mut boss_included = false;
        if let Some(boss) = boss {
            if templates.is_empty() && !boss.allow_boss_only {
                warnings.push(AllocationWarning::BossOnlyWave);
            }
            match boss.position {
                BossPosition::Front => templates.insert(0, boss.template),
                BossPosition::Back => templates.push(boss.template),
            }
            boss_included = true;
        }

        AllocationResult {
            templates,
            leftover_budget: budget,
            boss_included,
            warnings,
        }
    }

    fn choose_weighted<'e, R>(
        &mut self,
        pool: &[&'e CatalogEntry],
        budget: u32,
        cost_bias: f32,
        rng: &mut R,
    ) -> Option<&'e CatalogEntry>
    where
        R: Rng + ?Sized,
    {
        let affordable = |entry: &CatalogEntry| {
            entry.template().is_some()
                && entry.cost() > 0
                && entry.cost() <= budget
                && entry.weight() > 0.0
        };
        let costs = pool
            .iter()
            .filter(|entry| affordable(entry))
            .map(|entry| entry.cost());
        let reference = if cost_bias > 0.0 {
            costs.max()
        } else {
            costs.min()
        }?;

        self.weights.clear();
        let mut total = 0.0;
        for entry in pool {
            let weight = if affordable(entry) {
                biased_weight(entry.weight(), entry.cost(), reference, cost_bias)
            } else {
                0.0
            };
            self.weights.push(weight);
            total += weight;
        }

        if total <= 0.0 || !total.is_finite() {
            return None;
        }

        let roll = rng.gen::<f64>() * total;
        let mut cumulative = 0.0;
        let mut last = None;
        for (entry, &weight) in pool.iter().zip(&self.weights) {
            if weight <= 0.0 {
                continue;
            }
            cumulative += weight;
            last = Some(*entry);
            if cumulative >= roll {
                return last;
            }
        }

        // Rounding can leave the roll a hair above the final sum.
        last
    }
}

/// Selection weight of an entry after applying the cost bias.
///
/// The factor is `(cost / reference_cost)^bias`, proportional to `cost^bias`
/// for positive biases and to `(1/cost)^|bias|` for negative ones. Taking the
/// most expensive affordable cost as the reference for positive biases, and
/// the cheapest for negative ones, keeps every factor within `(0, 1]` so large
/// biases cannot overflow.
#[must_use]
pub fn biased_weight(weight: f32, cost: u32, reference_cost: u32, cost_bias: f32) -> f64 {
    let weight = f64::from(weight.max(0.0));
    let bias = f64::from(cost_bias);
    if bias.abs() < BIAS_EPSILON {
        return weight;
    }

    let ratio = f64::from(cost.max(1)) / f64::from(reference_cost.max(1));
    weight * ratio.powf(bias)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bias_factor_matches_direction() {
        assert_eq!(biased_weight(2.0, 4, 1, 0.0), 2.0);
        assert_eq!(biased_weight(2.0, 4, 1, 1.0), 8.0);
        assert_eq!(biased_weight(2.0, 4, 1, -1.0), 0.5);
        assert_eq!(biased_weight(-3.0, 4, 1, 1.0), 0.0);
    }

    #[test]
    fn reference_cost_keeps_factors_bounded() {
        assert_eq!(biased_weight(2.0, 4, 4, 3.0), 2.0);
        assert_eq!(biased_weight(2.0, 2, 4, 1.0), 1.0);
        assert_eq!(biased_weight(2.0, 4, 2, -1.0), 1.0);
        assert!(biased_weight(1.0, 2, 400, 150.0).is_finite());
        assert!(biased_weight(1.0, 400, 2, -150.0).is_finite());
    }

    #[test]
    fn tiny_bias_is_ignored() {
        assert_eq!(biased_weight(1.5, 10, 1, 1e-9), 1.5);
    }
}
