// src/core/cost.rs — Token cost tracking per model and loop phase

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::provider::TokenUsage;

/// The loop phase a provider call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostPhase {
    Generation,
    Verification,
}

impl std::fmt::Display for CostPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CostPhase::Generation => write!(f, "generation"),
            CostPhase::Verification => write!(f, "verification"),
        }
    }
}

/// Accumulates estimated spend for one run.
#[derive(Debug, Clone, Default)]
pub struct CostTracker {
    pub total_usd: f64,
    pub by_model: HashMap<String, f64>,
    pub by_phase: HashMap<CostPhase, f64>,
    /// (input, output) tokens per model.
    pub tokens_by_model: HashMap<String, (u64, u64)>,
    pub calls: u64,
}

impl CostTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, model: &str, usage: &TokenUsage, phase: CostPhase) -> f64 {
        let cost = calculate_cost(model, usage);
        self.total_usd += cost;
        *self.by_model.entry(model.into()).or_default() += cost;
        *self.by_phase.entry(phase).or_default() += cost;
        let tokens = self.tokens_by_model.entry(model.into()).or_insert((0, 0));
        tokens.0 += usage.input_tokens as u64;
        tokens.1 += usage.output_tokens as u64;
        self.calls += 1;
        cost
    }

    pub fn total_tokens(&self) -> u64 {
        self.tokens_by_model.values().map(|(i, o)| i + o).sum()
    }

    pub fn phase_cost(&self, phase: CostPhase) -> f64 {
        self.by_phase.get(&phase).copied().unwrap_or(0.0)
    }

    /// (phase, cost_usd), most expensive first.
    pub fn phase_breakdown(&self) -> Vec<(CostPhase, f64)> {
        let mut phases: Vec<_> = self.by_phase.iter().map(|(k, v)| (*k, *v)).collect();
        phases.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        phases
    }

    pub fn summary(&self) -> String {
        format!(
            "${:.4} across {} calls ({} tokens)",
            self.total_usd,
            self.calls,
            self.total_tokens()
        )
    }
}

/// Estimated USD cost for a model and token usage.
pub fn calculate_cost(model: &str, usage: &TokenUsage) -> f64 {
    let (input_price, output_price) = model_pricing(model);
    (usage.input_tokens as f64 / 1_000_000.0) * input_price
        + (usage.output_tokens as f64 / 1_000_000.0) * output_price
}

/// Returns (input_price_per_mtok, output_price_per_mtok).
pub fn model_pricing(model: &str) -> (f64, f64) {
    match model {
        // Anthropic
        m if m.contains("claude-opus") => (15.0, 75.0),
        m if m.contains("claude-sonnet") => (3.0, 15.0),
        m if m.contains("haiku") => (0.8, 4.0),

        // OpenAI
        m if m.contains("gpt-4.1-mini") => (0.4, 1.6),
        m if m.contains("gpt-4.1") => (2.0, 8.0),
        m if m.contains("gpt-4o-mini") => (0.15, 0.6),
        m if m.contains("gpt-4o") => (2.5, 10.0),
        m if m.contains("o4-mini") => (1.1, 4.4),

        // Local models behind an OpenAI-compatible endpoint
        m if m.contains("llava") || m.contains("llama") || m.contains("qwen") => (0.0, 0.0),

        _ => (1.0, 3.0),
    }
}
