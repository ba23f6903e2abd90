// src/strategy/selection.rs — Weighted strategy allocation and stagnation detection

use serde::{Deserialize, Serialize};

use crate::core::adaptive::AdaptiveConfig;
use crate::core::stats;
use crate::core::types::{ScoredCandidate, StrategyKind};
use crate::generator::GenerationContext;

const STAGNATION_WINDOW: usize = 5;
const STAGNATION_MIN_POINTS: usize = 3;
const STAGNATION_VARIANCE: f64 = 0.001;

/// Base weight per strategy. Serialized as the `[strategy]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyWeights {
    pub initial: f64,
    pub refinement: f64,
    pub crossover: f64,
    pub mutation: f64,
    pub fresh: f64,
    pub diversity: f64,
}

impl Default for StrategyWeights {
    fn default() -> Self {
        Self {
            initial: 1.0,
            refinement: 2.0,
            crossover: 1.0,
            mutation: 1.0,
            fresh: 0.5,
            diversity: 0.5,
        }
    }
}

impl StrategyWeights {
    pub fn get(&self, kind: StrategyKind) -> f64 {
        match kind {
            StrategyKind::Initial => self.initial,
            StrategyKind::Refinement => self.refinement,
            StrategyKind::Crossover => self.crossover,
            StrategyKind::Mutation => self.mutation,
            StrategyKind::Fresh => self.fresh,
            StrategyKind::Diversity => self.diversity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyAllocation {
    pub strategy: StrategyKind,
    pub count: usize,
    pub probability: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategySelection {
    pub allocations: Vec<StrategyAllocation>,
    pub stagnation_detected: bool,
}

impl StrategySelection {
    pub fn total(&self) -> usize {
        self.allocations.iter().map(|a| a.count).sum()
    }

    pub fn count_for(&self, strategy: StrategyKind) -> usize {
        self.allocations
            .iter()
            .filter(|a| a.strategy == strategy)
            .map(|a| a.count)
            .sum()
    }
}

/// Whether `kind` may run given the iteration and how many candidates exist.
pub fn is_applicable(kind: StrategyKind, iteration: u32, history_len: usize) -> bool {
    match kind {
        StrategyKind::Initial => iteration == 1,
        StrategyKind::Refinement | StrategyKind::Mutation => history_len >= 1,
        StrategyKind::Crossover => history_len >= 2,
        StrategyKind::Fresh | StrategyKind::Diversity => true,
    }
}

/// True when the last (up to) five scores barely move. Needs three points.
pub fn detect_stagnation(history: &[ScoredCandidate]) -> bool {
    let scores: Vec<f64> = history.iter().map(|c| c.score()).collect();
    let recent = stats::tail(&scores, STAGNATION_WINDOW);
    if recent.len() < STAGNATION_MIN_POINTS {
        return false;
    }
    stats::variance(recent) < STAGNATION_VARIANCE
}

/// Decide how many of `total` candidates each strategy should produce.
pub fn select_strategies(
    weights: &StrategyWeights,
    ctx: &GenerationContext<'_>,
    total: usize,
    adaptive: &AdaptiveConfig,
) -> StrategySelection {
    let history_len = ctx.previous.len();

    if ctx.iteration <= 1 || history_len == 0 {
        let allocations = if total > 0 {
            vec![StrategyAllocation {
                strategy: StrategyKind::Initial,
                count: total,
                probability: 1.0,
            }]
        } else {
            Vec::new()
        };
        return StrategySelection {
            allocations,
            stagnation_detected: false,
        };
    }

    let stagnant = detect_stagnation(ctx.previous);
    let probabilities = adjusted_probabilities(weights, ctx.iteration, adaptive, stagnant);

    let mut ordered: Vec<(StrategyKind, f64)> = probabilities;
    ordered.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut allocations = Vec::new();
    let mut remaining = total;
    for (strategy, probability) in ordered {
        if remaining == 0 {
            break;
        }
        if probability <= 0.0 || !is_applicable(strategy, ctx.iteration, history_len) {
            continue;
        }
        let wanted = ((total as f64 * probability).round() as usize).max(1);
        let count = wanted.min(remaining);
        remaining -= count;
        allocations.push(StrategyAllocation {
            strategy,
            count,
            probability,
        });
    }

    if allocations.is_empty() && remaining > 0 {
        let strategy = if history_len > 0 {
            StrategyKind::Refinement
        } else {
            StrategyKind::Fresh
        };
        allocations.push(StrategyAllocation {
            strategy,
            count: remaining,
            probability: 1.0,
        });
    }

    StrategySelection {
        allocations,
        stagnation_detected: stagnant,
    }
}

/// Normalized weights (without `initial`) after the phase, exploration and
/// stagnation multipliers, renormalized to sum to 1.
pub fn adjusted_probabilities(
    weights: &StrategyWeights,
    iteration: u32,
    adaptive: &AdaptiveConfig,
    stagnant: bool,
) -> Vec<(StrategyKind, f64)> {
    let kinds: Vec<StrategyKind> = StrategyKind::ALL
        .into_iter()
        .filter(|k| *k != StrategyKind::Initial)
        .collect();

    let weight_sum: f64 = kinds.iter().map(|k| weights.get(*k).max(0.0)).sum();
    let mut probs: Vec<(StrategyKind, f64)> = kinds
        .iter()
        .map(|k| {
            let p = if weight_sum > 0.0 {
                weights.get(*k).max(0.0) / weight_sum
            } else {
                0.0
            };
            (*k, p)
        })
        .collect();

    let mut scale = |kind: StrategyKind, factor: f64| {
        if let Some(entry) = probs.iter_mut().find(|(k, _)| *k == kind) {
            entry.1 *= factor;
        }
    };

    if iteration <= 3 {
        scale(StrategyKind::Refinement, 1.5);
        scale(StrategyKind::Diversity, 0.5);
    }
    if iteration > 5 {
        scale(StrategyKind::Fresh, 1.5);
        scale(StrategyKind::Diversity, 1.5);
        scale(StrategyKind::Crossover, 1.2);
    }
    if adaptive.exploration_rate > 0.5 {
        scale(StrategyKind::Mutation, 1.3);
        scale(StrategyKind::Diversity, 1.3);
        scale(StrategyKind::Fresh, 1.2);
    }
    if adaptive.exploration_rate < 0.2 {
        scale(StrategyKind::Refinement, 1.5);
    }
    if stagnant {
        scale(StrategyKind::Fresh, 2.0);
        scale(StrategyKind::Diversity, 2.0);
        scale(StrategyKind::Mutation, 1.5);
    }

    let total: f64 = probs.iter().map(|(_, p)| p).sum();
    if total > 0.0 {
        for entry in probs.iter_mut() {
            entry.1 /= total;
        }
    }
    probs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DesignIntent;
    use crate::test_support::scored;

    fn ctx<'a>(
        intent: &'a DesignIntent,
        iteration: u32,
        previous: &'a [ScoredCandidate],
    ) -> GenerationContext<'a> {
        GenerationContext {
            intent,
            iteration,
            previous,
            best: previous.first(),
            available_actions: &[],
            temperature: 0.8,
            min_diversity: 0.2,
        }
    }

    fn prob(probs: &[(StrategyKind, f64)], kind: StrategyKind) -> f64 {
        probs.iter().find(|(k, _)| *k == kind).map(|(_, p)| *p).unwrap()
    }

    // ─── Allocation ─────────────────────────────────────────────

    #[test]
    fn test_first_iteration_is_all_initial() {
        let intent = DesignIntent::new("x");
        let sel = select_strategies(
            &StrategyWeights::default(),
            &ctx(&intent, 1, &[]),
            4,
            &AdaptiveConfig::default(),
        );
        assert_eq!(sel.allocations.len(), 1);
        assert_eq!(sel.count_for(StrategyKind::Initial), 4);
    }

    #[test]
    fn test_no_history_is_all_initial() {
        let intent = DesignIntent::new("x");
        let sel = select_strategies(
            &StrategyWeights::default(),
            &ctx(&intent, 3, &[]),
            2,
            &AdaptiveConfig::default(),
        );
        assert_eq!(sel.count_for(StrategyKind::Initial), 2);
    }

    #[test]
    fn test_allocations_never_exceed_total() {
        let intent = DesignIntent::new("x");
        let prev = vec![scored(0.3), scored(0.5), scored(0.6)];
        for iteration in 2..9 {
            for total in 0..8 {
                for exploration in [0.1, 0.3, 0.7] {
                    let adaptive = AdaptiveConfig {
                        exploration_rate: exploration,
                        ..Default::default()
                    };
                    let sel = select_strategies(
                        &StrategyWeights::default(),
                        &ctx(&intent, iteration, &prev),
                        total,
                        &adaptive,
                    );
                    assert!(sel.total() <= total);
                    assert_eq!(sel.count_for(StrategyKind::Initial), 0);
                    assert!(sel.allocations.iter().all(|a| a.count > 0));
                }
            }
        }
    }

    #[test]
    fn test_early_iteration_favors_refinement() {
        let intent = DesignIntent::new("x");
        let prev = vec![scored(0.3), scored(0.6)];
        let sel = select_strategies(
            &StrategyWeights::default(),
            &ctx(&intent, 2, &prev),
            4,
            &AdaptiveConfig::default(),
        );
        assert_eq!(sel.allocations[0].strategy, StrategyKind::Refinement);
        // 2·1.5 / (3 + 1 + 1 + 0.5 + 0.25) ≈ 0.52 → round(2.09) = 2
        assert_eq!(sel.allocations[0].count, 2);
        assert_eq!(sel.total(), 4);
    }

    #[test]
    fn test_crossover_skipped_with_single_candidate() {
        let intent = DesignIntent::new("x");
        let prev = vec![scored(0.5)];
        let sel = select_strategies(
            &StrategyWeights::default(),
            &ctx(&intent, 2, &prev),
            6,
            &AdaptiveConfig::default(),
        );
        assert_eq!(sel.count_for(StrategyKind::Crossover), 0);
    }

    #[test]
    fn test_fallback_to_refinement() {
        let intent = DesignIntent::new("x");
        let prev = vec![scored(0.5)];
        let zero = StrategyWeights {
            initial: 0.0,
            refinement: 0.0,
            crossover: 0.0,
            mutation: 0.0,
            fresh: 0.0,
            diversity: 0.0,
        };
        let sel = select_strategies(&zero, &ctx(&intent, 2, &prev), 3, &AdaptiveConfig::default());
        assert_eq!(sel.allocations.len(), 1);
        assert_eq!(sel.count_for(StrategyKind::Refinement), 3);
    }

    // ─── Probability adjustments ────────────────────────────────

    #[test]
    fn test_probabilities_sum_to_one() {
        for iteration in [2, 4, 6] {
            let p = adjusted_probabilities(
                &StrategyWeights::default(),
                iteration,
                &AdaptiveConfig::default(),
                true,
            );
            let sum: f64 = p.iter().map(|(_, v)| v).sum();
            assert!((sum - 1.0).abs() < 1e-9);
            assert!(p.iter().all(|(k, _)| *k != StrategyKind::Initial));
        }
    }

    #[test]
    fn test_late_iteration_boosts_exploration() {
        let w = StrategyWeights::default();
        let a = AdaptiveConfig::default();
        let mid = adjusted_probabilities(&w, 4, &a, false);
        let late = adjusted_probabilities(&w, 6, &a, false);
        assert!(prob(&late, StrategyKind::Fresh) > prob(&mid, StrategyKind::Fresh));
        assert!(prob(&late, StrategyKind::Refinement) < prob(&mid, StrategyKind::Refinement));
    }

    #[test]
    fn test_stagnation_boosts_fresh_and_diversity() {
        let w = StrategyWeights::default();
        let a = AdaptiveConfig::default();
        let calm = adjusted_probabilities(&w, 4, &a, false);
        let stuck = adjusted_probabilities(&w, 4, &a, true);
        assert!(prob(&stuck, StrategyKind::Fresh) > prob(&calm, StrategyKind::Fresh));
        assert!(prob(&stuck, StrategyKind::Diversity) > prob(&calm, StrategyKind::Diversity));
    }

    #[test]
    fn test_low_exploration_boosts_refinement() {
        let w = StrategyWeights::default();
        let low = AdaptiveConfig {
            exploration_rate: 0.1,
            ..Default::default()
        };
        let p_low = adjusted_probabilities(&w, 4, &low, false);
        let p_mid = adjusted_probabilities(&w, 4, &AdaptiveConfig::default(), false);
        assert!(prob(&p_low, StrategyKind::Refinement) > prob(&p_mid, StrategyKind::Refinement));
    }

    // ─── Stagnation ─────────────────────────────────────────────

    #[test]
    fn test_constant_series_is_stagnant() {
        let history: Vec<ScoredCandidate> = (0..5).map(|_| scored(0.6)).collect();
        assert!(detect_stagnation(&history));
    }

    #[test]
    fn test_increasing_series_not_stagnant() {
        let history: Vec<ScoredCandidate> =
            [0.2, 0.3, 0.4, 0.5, 0.6].iter().map(|s| scored(*s)).collect();
        assert!(!detect_stagnation(&history));
    }

    #[test]
    fn test_too_few_points_not_stagnant() {
        let history = vec![scored(0.5), scored(0.5)];
        assert!(!detect_stagnation(&history));
    }

    #[test]
    fn test_stagnation_uses_last_five() {
        let history: Vec<ScoredCandidate> = [0.1, 0.9, 0.5, 0.5, 0.5, 0.5, 0.5]
            .iter()
            .map(|s| scored(*s))
            .collect();
        assert!(detect_stagnation(&history));
    }
}
