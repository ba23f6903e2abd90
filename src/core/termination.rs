// src/core/termination.rs — Stop/continue policy and convergence analysis

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use super::stats;
use super::types::{
    ConvergenceAnalysis, FeedbackIteration, StrategyKind, StrategyStats, TerminationDecision,
    TerminationReason,
};
use crate::strategy::StrategyUsage;

const PLATEAU_WINDOW: usize = 4;
const PLATEAU_VARIANCE: f64 = 0.001;
const OSCILLATION_RATE: f64 = 0.5;
const MIN_POINTS: usize = 3;

/// Limits the policy checks against.
#[derive(Debug, Clone, Copy)]
pub struct TerminationLimits {
    pub max_iterations: u32,
    pub quality_threshold: f64,
    pub start: Instant,
    pub timeout: Duration,
}

/// Decides when the feedback loop should stop.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminationPolicy;

impl TerminationPolicy {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate the history. First matching rule wins:
    /// max iterations, timeout, quality threshold, convergence.
    pub fn evaluate(
        &self,
        history: &[FeedbackIteration],
        limits: &TerminationLimits,
        usage: &[StrategyUsage],
    ) -> TerminationDecision {
        let strategy_breakdown = strategy_breakdown(usage);
        let stop = |reason: TerminationReason, confidence: f64| TerminationDecision {
            should_terminate: true,
            reason: Some(reason),
            confidence,
            strategy_breakdown: strategy_breakdown.clone(),
        };

        if history.len() >= limits.max_iterations as usize {
            return stop(TerminationReason::MaxIterations, 1.0);
        }

        if limits.start.elapsed() >= limits.timeout {
            return stop(TerminationReason::Timeout, 1.0);
        }

        let best = history
            .iter()
            .filter_map(|it| it.best_score())
            .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.max(s))));
        if let Some(best) = best {
            if best >= limits.quality_threshold {
                return stop(TerminationReason::QualityThreshold, best);
            }
        }

        let analysis = analyze_convergence(&score_progression(history));
        if analysis.converged {
            return stop(
                TerminationReason::Converged,
                1.0 - (analysis.rate * 10.0).min(1.0),
            );
        }

        TerminationDecision {
            should_terminate: false,
            reason: None,
            confidence: 0.5,
            strategy_breakdown,
        }
    }
}

/// Best score of every iteration that produced at least one scored candidate.
pub fn score_progression(history: &[FeedbackIteration]) -> Vec<f64> {
    history.iter().filter_map(|it| it.best_score()).collect()
}

/// Analyze a best-score-per-iteration series for plateau and oscillation.
pub fn analyze_convergence(scores: &[f64]) -> ConvergenceAnalysis {
    if scores.len() < MIN_POINTS {
        return ConvergenceAnalysis::default();
    }

    let deltas: Vec<f64> = scores.windows(2).map(|w| w[1] - w[0]).collect();

    let reversals = deltas.windows(2).filter(|w| w[0] * w[1] < 0.0).count();
    let reversal_rate = reversals as f64 / (deltas.len() - 1) as f64;
    let oscillation_detected = reversal_rate > OSCILLATION_RATE;

    let plateau_detected = stats::variance(stats::tail(scores, PLATEAU_WINDOW)) < PLATEAU_VARIANCE;

    let abs_deltas: Vec<f64> = deltas.iter().map(|d| d.abs()).collect();
    let rate = stats::mean(&abs_deltas);

    ConvergenceAnalysis {
        converged: plateau_detected && !oscillation_detected,
        oscillation_detected,
        plateau_detected,
        rate,
    }
}

/// Usage count and mean iteration of use per strategy.
pub fn strategy_breakdown(usage: &[StrategyUsage]) -> Vec<StrategyStats> {
    let mut grouped: BTreeMap<StrategyKind, Vec<f64>> = BTreeMap::new();
    for u in usage {
        grouped
            .entry(u.strategy)
            .or_default()
            .push(u.iteration as f64);
    }
    grouped
        .into_iter()
        .map(|(strategy, iterations)| StrategyStats {
            strategy,
            uses: iterations.len(),
            mean_iteration: stats::mean(&iterations),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{IterationMetrics, TerminationDecision};
    use crate::test_support::scored;
    use chrono::Utc;

    fn iteration(n: u32, best: Option<f64>) -> FeedbackIteration {
        let candidates = best.map(|s| vec![scored(s)]).unwrap_or_default();
        FeedbackIteration {
            iteration: n,
            timestamp: Utc::now(),
            best_index: best.map(|_| 0),
            candidates,
            termination: TerminationDecision::pending(),
            metrics: IterationMetrics::default(),
            strategies_used: vec![],
        }
    }

    fn history(scores: &[f64]) -> Vec<FeedbackIteration> {
        scores
            .iter()
            .enumerate()
            .map(|(i, s)| iteration(i as u32 + 1, Some(*s)))
            .collect()
    }

    fn limits(max_iterations: u32) -> TerminationLimits {
        TerminationLimits {
            max_iterations,
            quality_threshold: 0.85,
            start: Instant::now(),
            timeout: Duration::from_secs(600),
        }
    }

    // ─── Policy precedence ──────────────────────────────────────

    #[test]
    fn test_max_iterations_first() {
        // Quality is also met, but max iterations wins.
        let h = history(&[0.9]);
        let d = TerminationPolicy::new().evaluate(&h, &limits(1), &[]);
        assert!(d.should_terminate);
        assert_eq!(d.reason, Some(TerminationReason::MaxIterations));
        assert_eq!(d.confidence, 1.0);
    }

    #[test]
    fn test_timeout() {
        let h = history(&[0.2]);
        let l = TerminationLimits {
            timeout: Duration::ZERO,
            ..limits(5)
        };
        let d = TerminationPolicy::new().evaluate(&h, &l, &[]);
        assert_eq!(d.reason, Some(TerminationReason::Timeout));
    }

    #[test]
    fn test_quality_threshold_uses_best_across_history() {
        let h = history(&[0.9, 0.4]);
        let d = TerminationPolicy::new().evaluate(&h, &limits(5), &[]);
        assert_eq!(d.reason, Some(TerminationReason::QualityThreshold));
        assert!((d.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_converged_on_plateau() {
        let h = history(&[0.6, 0.6, 0.6, 0.6]);
        let d = TerminationPolicy::new().evaluate(&h, &limits(10), &[]);
        assert_eq!(d.reason, Some(TerminationReason::Converged));
        assert_eq!(d.confidence, 1.0);
    }

    #[test]
    fn test_continue_when_improving() {
        let h = history(&[0.3, 0.5, 0.7]);
        let d = TerminationPolicy::new().evaluate(&h, &limits(10), &[]);
        assert!(!d.should_terminate);
        assert!(d.reason.is_none());
        assert_eq!(d.confidence, 0.5);
    }

    #[test]
    fn test_empty_iterations_do_not_count_as_scores() {
        let h = vec![iteration(1, None), iteration(2, None)];
        let d = TerminationPolicy::new().evaluate(&h, &limits(5), &[]);
        assert!(!d.should_terminate);
    }

    // ─── Convergence analysis ───────────────────────────────────

    #[test]
    fn test_too_few_points() {
        let a = analyze_convergence(&[0.5, 0.5]);
        assert!(!a.converged);
        assert_eq!(a.rate, 0.0);
    }

    #[test]
    fn test_alternating_series_oscillates() {
        let a = analyze_convergence(&[0.5, 0.7, 0.5, 0.7, 0.5]);
        assert!(a.oscillation_detected);
        assert!(!a.converged);
        assert!((a.rate - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_small_oscillation_on_plateau_not_converged() {
        let a = analyze_convergence(&[0.60, 0.61, 0.60, 0.61, 0.60]);
        assert!(a.plateau_detected);
        assert!(a.oscillation_detected);
        assert!(!a.converged);
    }

    #[test]
    fn test_monotonic_increase_not_plateau() {
        let a = analyze_convergence(&[0.1, 0.3, 0.5, 0.7]);
        assert!(!a.plateau_detected);
        assert!(!a.oscillation_detected);
        assert!(!a.converged);
    }

    #[test]
    fn test_plateau_uses_last_four() {
        let a = analyze_convergence(&[0.1, 0.2, 0.70, 0.71, 0.71, 0.72]);
        assert!(a.plateau_detected);
        assert!(!a.oscillation_detected);
        assert!(a.converged);
    }

    // ─── Strategy breakdown ─────────────────────────────────────

    #[test]
    fn test_strategy_breakdown() {
        let usage = vec![
            StrategyUsage {
                strategy: StrategyKind::Initial,
                iteration: 1,
                count: 4,
            },
            StrategyUsage {
                strategy: StrategyKind::Refinement,
                iteration: 2,
                count: 2,
            },
            StrategyUsage {
                strategy: StrategyKind::Refinement,
                iteration: 3,
                count: 1,
            },
        ];
        let b = strategy_breakdown(&usage);
        assert_eq!(b.len(), 2);
        assert_eq!(b[0].strategy, StrategyKind::Initial);
        assert_eq!(b[1].uses, 2);
        assert!((b[1].mean_iteration - 2.5).abs() < 1e-12);
    }
}
