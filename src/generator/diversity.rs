// src/generator/diversity.rs — Push samples apart along named design dimensions

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
use crate::util::truncate_str;

pub const DIMENSIONS: [&str; 5] = [
    "layout_structure",
    "color_theme",
    "visual_density",
    "component_style",
    "hierarchy_flow",
];

const MAX_OBSERVED: usize = 8;

pub struct DiversityGenerator {
    provider: Arc<dyn ModelProvider>,
    config: GeneratorConfig,
}

impl DiversityGenerator {
    pub fn new(provider: Arc<dyn ModelProvider>, config: GeneratorConfig) -> Self {
        Self { provider, config }
    }

    /// Effective divergence: the configured level, raised to the run's minimum diversity.
    pub fn divergence(&self, ctx: &GenerationContext<'_>) -> f64 {
        self.config
            .divergence_level
            .max(ctx.min_diversity)
            .clamp(0.0, 1.0)
    }
}

/// Dimensions sample `index` should vary: 1 to 3 of them, rotating through the list.
pub fn dimensions_for(index: usize) -> Vec<&'static str> {
    let size = 1 + index % 3;
    (0..size)
        .map(|k| DIMENSIONS[(index + k) % DIMENSIONS.len()])
        .collect()
}

pub fn temperature_for(divergence: f64) -> f64 {
    0.8 + divergence * 0.2
}

/// Rationales of prior candidates, as a proxy for the patterns already explored.
fn observed_patterns(ctx: &GenerationContext<'_>) -> Vec<String> {
    ctx.ranked()
        .iter()
        .filter_map(|c| c.candidate.metadata.rationale.as_deref())
        .map(|r| truncate_str(r, 160).to_string())
        .take(MAX_OBSERVED)
        .collect()
}

#[async_trait]
impl Generator for DiversityGenerator {
    fn strategy(&self) -> StrategyKind {
        StrategyKind::Diversity
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

        let divergence = self.divergence(ctx);
        let temperature = temperature_for(divergence);
        let brief = describe_intent(ctx.intent);

        let observed = observed_patterns(ctx);
        let mut avoid = String::new();
        if !observed.is_empty() {
            avoid.push_str("\n## Already explored\nAvoid the layout, color and density choices of:\n");
            for o in &observed {
                avoid.push_str(&format!("- {}\n", o));
            }
        }

        let requests = (0..count)
            .map(|i| {
                let dims = dimensions_for(i);
                SampleRequest {
                    prompt: format!(
                        "{}{}\nVary these dimensions strongly: {}. Divergence level {:.2}.\n",
                        brief,
                        avoid,
                        dims.join(", "),
                        divergence
                    ),
                    temperature,
                    parents: Vec::new(),
                    focus: dims.iter().map(|d| d.to_string()).collect(),
                }
            })
            .collect();

        Ok(sample_all(
            self.provider.as_ref(),
            &self.config,
            StrategyKind::Diversity,
            ctx,
            requests,
        )
        .await)
    }
}
