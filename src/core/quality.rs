// src/core/quality.rs — Composite quality score derived from a verification verdict

use serde::{Deserialize, Serialize};

use super::types::{QualityComponent, QualityScore, VerificationResult};

/// Fixed component weights. Must sum to 1 for `overall` to stay in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    pub visual_fidelity: f64,
    pub technical_correctness: f64,
    pub design_principles: f64,
    pub intent_alignment: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            visual_fidelity: 0.3,
            technical_correctness: 0.25,
            design_principles: 0.2,
            intent_alignment: 0.25,
        }
    }
}

impl QualityWeights {
    pub fn sum(&self) -> f64 {
        self.visual_fidelity
            + self.technical_correctness
            + self.design_principles
            + self.intent_alignment
    }

    /// Rescale so the weights sum to 1. Negative weights count as zero;
    /// falls back to defaults when nothing positive is left.
    pub fn normalized(&self) -> Self {
        let clean = Self {
            visual_fidelity: self.visual_fidelity.max(0.0),
            technical_correctness: self.technical_correctness.max(0.0),
            design_principles: self.design_principles.max(0.0),
            intent_alignment: self.intent_alignment.max(0.0),
        };
        let total = clean.sum();
        if total <= 0.0 {
            return Self::default();
        }
        Self {
            visual_fidelity: clean.visual_fidelity / total,
            technical_correctness: clean.technical_correctness / total,
            design_principles: clean.design_principles / total,
            intent_alignment: clean.intent_alignment / total,
        }
    }
}

impl From<&crate::infra::config::QualityConfig> for QualityWeights {
    fn from(cfg: &crate::infra::config::QualityConfig) -> Self {
        Self {
            visual_fidelity: cfg.visual_fidelity,
            technical_correctness: cfg.technical_correctness,
            design_principles: cfg.design_principles,
            intent_alignment: cfg.intent_alignment,
        }
        .normalized()
    }
}

impl QualityScore {
    /// Map a verdict onto the four weighted components.
    ///
    /// visual_fidelity = fidelity, technical_correctness = mean(layout, completeness),
    /// design_principles = polish, intent_alignment = fused score. Weights are
    /// normalized first, so `overall` stays in [0, 1].
    pub fn from_verification(result: &VerificationResult, weights: &QualityWeights) -> Self {
        let weights = weights.normalized();
        let cats = &result.categories;
        let component = |score: f64, weight: f64| QualityComponent {
            score: score.clamp(0.0, 1.0),
            weight,
            confidence: result.confidence,
        };

        let visual_fidelity = component(cats.fidelity, weights.visual_fidelity);
        let technical_correctness = component(
            (cats.layout + cats.completeness) / 2.0,
            weights.technical_correctness,
        );
        let design_principles = component(cats.polish, weights.design_principles);
        let intent_alignment = component(result.score, weights.intent_alignment);

        let overall = [
            &visual_fidelity,
            &technical_correctness,
            &design_principles,
            &intent_alignment,
        ]
        .iter()
        .map(|c| c.score * c.weight)
        .sum::<f64>();

        Self {
            visual_fidelity,
            technical_correctness,
            design_principles,
            intent_alignment,
            overall,
            improvement_potential: 1.0 - overall,
        }
    }
}
