// src/generator/initial.rs — Seeds the first iteration

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

const SPREAD: f64 = 0.3;

pub struct InitialGenerator {
    provider: Arc<dyn ModelProvider>,
    config: GeneratorConfig,
}

impl InitialGenerator {
    pub fn new(provider: Arc<dyn ModelProvider>, config: GeneratorConfig) -> Self {
        Self { provider, config }
    }
}

/// Temperatures spread evenly over [base − 0.3, base + 0.3], clamped to [0.1, 1.0].
pub fn spread_temperatures(base: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![base.clamp(0.1, 1.0)],
        n => {
            let step = 2.0 * SPREAD / (n - 1) as f64;
            (0..n)
                .map(|i| (base - SPREAD + step * i as f64).clamp(0.1, 1.0))
                .collect()
        }
    }
}

#[async_trait]
impl Generator for InitialGenerator {
    fn strategy(&self) -> StrategyKind {
        StrategyKind::Initial
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

        let brief = describe_intent(ctx.intent);
        let temperatures = spread_temperatures(self.config.base_temperature(ctx), count);
        let requests = temperatures
            .into_iter()
            .enumerate()
            .map(|(i, temperature)| SampleRequest {
                prompt: format!(
                    "{}\nThis is proposal {} of {}. Make it a complete, self-contained design.",
                    brief,
                    i + 1,
                    count
                ),
                temperature,
                parents: Vec::new(),
                focus: Vec::new(),
            })
            .collect();

        Ok(sample_all(
            self.provider.as_ref(),
            &self.config,
            StrategyKind::Initial,
            ctx,
            requests,
        )
        .await)
    }
}
