// src/core/adaptive.rs — Run-scoped adaptive hyperparameters

use serde::{Deserialize, Serialize};

use super::stats;

const EXPLORATION_STEP_UP: f64 = 0.1;
const EXPLORATION_STEP_DOWN: f64 = 0.05;
const EXPLORATION_CAP: f64 = 0.8;
const EXPLORATION_FLOOR: f64 = 0.1;
const DIVERSITY_STEP: f64 = 0.05;
const DIVERSITY_CAP: f64 = 0.5;
const LOW_VARIANCE: f64 = 0.01;
const HIGH_VARIANCE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureSchedule {
    pub initial: f64,
    pub min: f64,
    pub decay_rate: f64,
}

impl Default for TemperatureSchedule {
    fn default() -> Self {
        Self {
            initial: 0.8,
            min: 0.3,
            decay_rate: 0.1,
        }
    }
}

impl TemperatureSchedule {
    /// Temperature for a 1-based iteration: initial·(1−decay)^(iteration−1), floored at `min`.
    pub fn at(&self, iteration: u32) -> f64 {
        let steps = iteration.saturating_sub(1) as i32;
        (self.initial * (1.0 - self.decay_rate).powi(steps)).max(self.min)
    }
}

impl From<&crate::infra::config::TemperatureConfig> for TemperatureSchedule {
    fn from(cfg: &crate::infra::config::TemperatureConfig) -> Self {
        Self {
            initial: cfg.initial,
            min: cfg.min,
            decay_rate: cfg.decay_rate,
        }
    }
}

/// Mutable state carried from one iteration to the next within a single run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    pub temperature: f64,
    pub exploration_rate: f64,
    pub min_diversity: f64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            temperature: TemperatureSchedule::default().initial,
            exploration_rate: 0.3,
            min_diversity: 0.2,
        }
    }
}

impl From<&crate::infra::config::AdaptiveSection> for AdaptiveConfig {
    fn from(cfg: &crate::infra::config::AdaptiveSection) -> Self {
        Self {
            exploration_rate: cfg.exploration_rate,
            min_diversity: cfg.min_diversity,
            ..Default::default()
        }
    }
}

/// What one iteration observed, as input to [`AdaptiveConfig::adapt`].
#[derive(Debug, Clone, Copy)]
pub struct IterationOutcome<'a> {
    pub iteration: u32,
    pub scores: &'a [f64],
    pub best: Option<f64>,
    pub previous_best: Option<f64>,
}

impl AdaptiveConfig {
    /// Returns the state with the decayed temperature for `iteration`.
    pub fn with_temperature(self, schedule: &TemperatureSchedule, iteration: u32) -> Self {
        Self {
            temperature: schedule.at(iteration),
            ..self
        }
    }

    /// Apply the end-of-iteration adaptation rule and return the next state.
    pub fn adapt(self, outcome: IterationOutcome<'_>) -> Self {
        let mut next = self;

        if outcome.scores.len() >= 2 {
            let var = stats::variance(outcome.scores);
            if var < LOW_VARIANCE {
                next.exploration_rate = (next.exploration_rate + EXPLORATION_STEP_UP).min(EXPLORATION_CAP);
            } else if var > HIGH_VARIANCE {
                next.exploration_rate =
                    (next.exploration_rate - EXPLORATION_STEP_DOWN).max(EXPLORATION_FLOOR);
            }
        }

        if outcome.iteration > 1 {
            let improved = match (outcome.best, outcome.previous_best) {
                (Some(best), Some(prev)) => best > prev,
                (Some(_), None) => true,
                (None, _) => false,
            };
            if !improved {
                next.min_diversity = (next.min_diversity + DIVERSITY_STEP).min(DIVERSITY_CAP);
            }
        }

        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome<'a>(
        iteration: u32,
        scores: &'a [f64],
        best: Option<f64>,
        previous_best: Option<f64>,
    ) -> IterationOutcome<'a> {
        IterationOutcome {
            iteration,
            scores,
            best,
            previous_best,
        }
    }

    // ─── TemperatureSchedule ────────────────────────────────────

    #[test]
    fn test_temperature_decay() {
        let s = TemperatureSchedule::default();
        assert!((s.at(1) - 0.8).abs() < 1e-12);
        assert!((s.at(2) - 0.72).abs() < 1e-12);
        assert!((s.at(3) - 0.648).abs() < 1e-12);
    }

    #[test]
    fn test_temperature_floor() {
        let s = TemperatureSchedule {
            initial: 0.8,
            min: 0.5,
            decay_rate: 0.5,
        };
        assert_eq!(s.at(10), 0.5);
    }

    #[test]
    fn test_iteration_zero_treated_as_first() {
        let s = TemperatureSchedule::default();
        assert_eq!(s.at(0), s.at(1));
    }

    // ─── Exploration ────────────────────────────────────────────

    #[test]
    fn test_low_variance_raises_exploration() {
        let a = AdaptiveConfig::default();
        let next = a.adapt(outcome(1, &[0.5, 0.51, 0.5], Some(0.51), None));
        assert!((next.exploration_rate - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_high_variance_lowers_exploration() {
        let a = AdaptiveConfig::default();
        let next = a.adapt(outcome(1, &[0.1, 0.9], Some(0.9), None));
        assert!((next.exploration_rate - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_mid_variance_leaves_exploration() {
        let a = AdaptiveConfig::default();
        // variance of [0.4, 0.7] = 0.0225
        let next = a.adapt(outcome(1, &[0.4, 0.7], Some(0.7), None));
        assert_eq!(next.exploration_rate, a.exploration_rate);
    }

    #[test]
    fn test_exploration_bounds() {
        let high = AdaptiveConfig {
            exploration_rate: 0.75,
            ..Default::default()
        };
        assert_eq!(
            high.adapt(outcome(1, &[0.5, 0.5], Some(0.5), None))
                .exploration_rate,
            0.8
        );
        let low = AdaptiveConfig {
            exploration_rate: 0.12,
            ..Default::default()
        };
        assert_eq!(
            low.adapt(outcome(1, &[0.0, 1.0], Some(1.0), None))
                .exploration_rate,
            0.1
        );
    }

    #[test]
    fn test_single_score_skips_variance_rule() {
        let a = AdaptiveConfig::default();
        let next = a.adapt(outcome(1, &[0.5], Some(0.5), None));
        assert_eq!(next.exploration_rate, a.exploration_rate);
    }

    // ─── Diversity ──────────────────────────────────────────────

    #[test]
    fn test_no_improvement_raises_diversity() {
        let a = AdaptiveConfig::default();
        let next = a.adapt(outcome(2, &[0.6], Some(0.6), Some(0.7)));
        assert!((next.min_diversity - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_improvement_keeps_diversity() {
        let a = AdaptiveConfig::default();
        let next = a.adapt(outcome(2, &[0.8], Some(0.8), Some(0.7)));
        assert_eq!(next.min_diversity, a.min_diversity);
    }

    #[test]
    fn test_first_iteration_never_raises_diversity() {
        let a = AdaptiveConfig::default();
        let next = a.adapt(outcome(1, &[], None, None));
        assert_eq!(next.min_diversity, a.min_diversity);
    }

    #[test]
    fn test_diversity_cap() {
        let a = AdaptiveConfig {
            min_diversity: 0.48,
            ..Default::default()
        };
        let next = a.adapt(outcome(3, &[], None, Some(0.5)));
        assert_eq!(next.min_diversity, 0.5);
    }

    #[test]
    fn test_with_temperature() {
        let a = AdaptiveConfig::default();
        let s = TemperatureSchedule::default();
        let next = a.with_temperature(&s, 2);
        assert!((next.temperature - 0.72).abs() < 1e-12);
        assert_eq!(next.exploration_rate, a.exploration_rate);
    }
}
