// src/generator/fresh.rs — Novel designs that steer away from what was tried

use std::sync::Arc;

use async_trait::async_trait;

use super::prompt::describe_intent;
use super::{
    ensure_ready, sample_all, GenerationContext, GenerationOutput, Generator, GeneratorConfig,
    GeneratorConfigPatch, SampleRequest,
};
use crate::core::types::StrategyKind;
use crate::infra::errors::DesignLoopError;
use crate::provider::ModelProvider;

pub const DEFAULT_TEMPERATURE: f64 = 0.9;
const MAX_AVOID_PATTERNS: usize = 10;

pub struct FreshGenerator {
    provider: Arc<dyn ModelProvider>,
    config: GeneratorConfig,
}

impl FreshGenerator {
    /// Uses a fixed high temperature unless the config already sets one.
    pub fn new(provider: Arc<dyn ModelProvider>, mut config: GeneratorConfig) -> Self {
        config.temperature.get_or_insert(DEFAULT_TEMPERATURE);
        Self { provider, config }
    }
}

/// Distinct strengths reported for prior candidates, in first-seen order.
pub fn patterns_to_avoid(ctx: &GenerationContext<'_>) -> Vec<String> {
    let mut patterns: Vec<String> = Vec::new();
    for c in ctx.previous {
        for s in &c.verification.strengths {
            let s = s.trim();
            if !s.is_empty() && !patterns.iter().any(|p| p.eq_ignore_ascii_case(s)) {
                patterns.push(s.to_string());
            }
        }
    }
    patterns.truncate(MAX_AVOID_PATTERNS);
    patterns
}

#[async_trait]
impl Generator for FreshGenerator {
    fn strategy(&self) -> StrategyKind {
        StrategyKind::Fresh
    }

    fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    fn configure(&mut self, patch: &GeneratorConfigPatch) {
        self.config.apply(patch);
    }

    async fn generate(
        &self,
        ctx: &GenerationContext<'_>,
        count: usize,
    ) -> Result<GenerationOutput, DesignLoopError> {
        ensure_ready(self.provider.as_ref())?;

        let mut prompt = describe_intent(ctx.intent);
        let avoid = patterns_to_avoid(ctx);
        if !avoid.is_empty() {
            prompt.push_str("\n## Patterns to avoid\nEarlier attempts already explored:\n");
            for p in &avoid {
                prompt.push_str(&format!("- {}\n", p));
            }
        }
        prompt.push_str("\nIgnore previous attempts and propose a genuinely new direction.\n");

        let temperature = self.config.base_temperature(ctx);
        let requests = (0..count)
            .map(|_| SampleRequest {
                prompt: prompt.clone(),
                temperature,
                parents: Vec::new(),
                focus: Vec::new(),
            })
            .collect();

        Ok(sample_all(
            self.provider.as_ref(),
            &self.config,
            StrategyKind::Fresh,
            ctx,
            requests,
        )
        .await)
    }
}
