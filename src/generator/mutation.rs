// src/generator/mutation.rs — Focused single-aspect variations of good candidates

use std::sync::Arc;

use async_trait::async_trait;

use super::prompt::{describe_candidate, describe_intent};
use super::{
    ensure_ready, sample_all, GenerationContext, GenerationOutput, Generator, GeneratorConfig,
    GeneratorConfigPatch, SampleRequest,
};
use crate::core::types::{ScoredCandidate, StrategyKind};
use crate::infra::errors::DesignLoopError;
use crate::provider::ModelProvider;

const MIN_PARENT_SCORE: f64 = 0.5;
const TEMPERATURE_BOOST: f64 = 0.2;

pub const MUTATION_KINDS: [&str; 6] = [
    "color_shift",
    "spacing_adjust",
    "size_variation",
    "layout_tweak",
    "style_shift",
    "element_swap",
];

fn describe_kind(kind: &str) -> &'static str {
    match kind {
        "color_shift" => "Shift the color palette while keeping contrast",
        "spacing_adjust" => "Adjust spacing, padding and margins",
        "size_variation" => "Vary the size of key elements",
        "layout_tweak" => "Tweak the arrangement of sections",
        "style_shift" => "Change the visual style (corners, shadows, borders)",
        "element_swap" => "Swap one component for an alternative",
        _ => "Make one focused change",
    }
}

pub struct MutationGenerator {
    provider: Arc<dyn ModelProvider>,
    config: GeneratorConfig,
}

impl MutationGenerator {
    pub fn new(provider: Arc<dyn ModelProvider>, config: GeneratorConfig) -> Self {
        Self { provider, config }
    }
}

/// Pair each sample with a parent and a mutation kind, round-robin over both.
///
/// Parents are candidates scoring above 0.5; if none do, the best prior candidate.
pub fn plan_mutations<'a>(
    ctx: &GenerationContext<'a>,
    count: usize,
) -> Vec<(&'a ScoredCandidate, &'static str)> {
    let ranked = ctx.ranked();
    let mut pool: Vec<&ScoredCandidate> = ranked
        .iter()
        .copied()
        .filter(|c| c.score() > MIN_PARENT_SCORE)
        .collect();
    if pool.is_empty() {
        pool.extend(ranked.first().copied());
    }
    if pool.is_empty() {
        return Vec::new();
    }

    (0..count)
        .map(|i| (pool[i % pool.len()], MUTATION_KINDS[i % MUTATION_KINDS.len()]))
        .collect()
}

#[async_trait]
impl Generator for MutationGenerator {
    fn strategy(&self) -> StrategyKind {
        StrategyKind::Mutation
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

        let temperature = (self.config.base_temperature(ctx) + TEMPERATURE_BOOST).min(1.0);
        let brief = describe_intent(ctx.intent);
        let requests = plan_mutations(ctx, count)
            .into_iter()
            .map(|(parent, kind)| SampleRequest {
                prompt: format!(
                    "{}\n## Design to mutate\n{}\nApply exactly one mutation: **{}**. {}. \
                     Keep everything else unchanged.\n",
                    brief,
                    describe_candidate("Parent", parent),
                    kind,
                    describe_kind(kind)
                ),
                temperature,
                parents: vec![parent],
                focus: vec![kind.to_string()],
            })
            .collect();

        Ok(sample_all(
            self.provider.as_ref(),
            &self.config,
            StrategyKind::Mutation,
            ctx,
            requests,
        )
        .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DesignIntent;
    use crate::test_support::{scored, ScriptedProvider};

    fn ctx<'a>(intent: &'a DesignIntent, previous: &'a [ScoredCandidate]) -> GenerationContext<'a> {
        GenerationContext {
            intent,
            iteration: 2,
            previous,
            best: None,
            available_actions: &[],
            temperature: 0.7,
            min_diversity: 0.2,
        }
    }

    #[test]
    fn test_round_robin_over_parents_and_kinds() {
        let intent = DesignIntent::new("x");
        let prev = vec![scored(0.6), scored(0.9), scored(0.2)];
        let plan = plan_mutations(&ctx(&intent, &prev), 4);
        assert_eq!(plan.len(), 4);
        assert!((plan[0].0.score() - 0.9).abs() < 1e-9);
        assert!((plan[1].0.score() - 0.6).abs() < 1e-9);
        assert!((plan[2].0.score() - 0.9).abs() < 1e-9);
        let kinds: Vec<&str> = plan.iter().map(|p| p.1).collect();
        assert_eq!(
            kinds,
            vec!["color_shift", "spacing_adjust", "size_variation", "layout_tweak"]
        );
    }

    #[test]
    fn test_falls_back_to_best_when_none_above_half() {
        let intent = DesignIntent::new("x");
        let prev = vec![scored(0.2), scored(0.4)];
        let plan = plan_mutations(&ctx(&intent, &prev), 2);
        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|(p, _)| (p.score() - 0.4).abs() < 1e-9));
    }

    #[test]
    fn test_no_history_no_plan() {
        let intent = DesignIntent::new("x");
        assert!(plan_mutations(&ctx(&intent, &[]), 3).is_empty());
    }

    #[tokio::test]
    async fn test_temperature_boost_capped() {
        let provider = Arc::new(ScriptedProvider::always(r#"{"actions": []}"#));
        let mut gen = MutationGenerator::new(provider.clone(), GeneratorConfig::new("m"));
        let intent = DesignIntent::new("x");
        let prev = vec![scored(0.7)];

        gen.generate(&ctx(&intent, &prev), 1).await.unwrap();
        let t = provider.requests()[0].temperature.unwrap();
        assert!((t - 0.9).abs() < 1e-5);

        gen.configure(&crate::generator::GeneratorConfigPatch {
            temperature: Some(0.95),
            ..Default::default()
        });
        gen.generate(&ctx(&intent, &prev), 1).await.unwrap();
        assert_eq!(provider.requests()[1].temperature, Some(1.0));
    }

    #[tokio::test]
    async fn test_focus_records_kind() {
        let provider = Arc::new(ScriptedProvider::always(r#"{"actions": []}"#));
        let gen = MutationGenerator::new(provider.clone(), GeneratorConfig::new("m"));
        let intent = DesignIntent::new("x");
        let prev = vec![scored(0.7)];
        let out = gen.generate(&ctx(&intent, &prev), 2).await.unwrap();
        assert_eq!(out.candidates[1].metadata.focus, vec!["spacing_adjust"]);
        assert!(provider.requests()[0].messages[0]
            .content
            .contains("**color_shift**"));
    }
}
