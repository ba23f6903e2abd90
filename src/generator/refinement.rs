// src/generator/refinement.rs — Improve promising candidates on their weakest dimension

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

const MIN_SCORE: f64 = 0.3;
const MAX_SCORE: f64 = 0.95;

pub struct RefinementGenerator {
    provider: Arc<dyn ModelProvider>,
    config: GeneratorConfig,
}

impl RefinementGenerator {
    pub fn new(provider: Arc<dyn ModelProvider>, config: GeneratorConfig) -> Self {
        Self { provider, config }
    }
}

/// Candidates with room to improve that are not already near-perfect, best first.
pub fn select_targets<'a>(ctx: &GenerationContext<'a>, count: usize) -> Vec<&'a ScoredCandidate> {
    ctx.ranked()
        .into_iter()
        .filter(|c| c.score() > MIN_SCORE && c.score() < MAX_SCORE)
        .take(count)
        .collect()
}

fn refinement_prompt(ctx: &GenerationContext<'_>, target: &ScoredCandidate, weakest: &str) -> String {
    let mut prompt = describe_intent(ctx.intent);
    prompt.push_str("\n## Design to refine\n");
    prompt.push_str(&describe_candidate("Current design", target));
    prompt.push_str(&format!(
        "\nThe weakest dimension is **{}**. Produce an improved version that fixes it.\n",
        weakest
    ));

    let v = &target.verification;
    if !v.strengths.is_empty() {
        prompt.push_str("Preserve these strengths:\n");
        for s in &v.strengths {
            prompt.push_str(&format!("- {}\n", s));
        }
    }
    if !v.issues.is_empty() {
        prompt.push_str("Known issues:\n");
        for issue in &v.issues {
            prompt.push_str(&format!("- [{}] {}\n", issue.severity, issue.description));
        }
    }
    prompt
}

#[async_trait]
impl Generator for RefinementGenerator {
    fn strategy(&self) -> StrategyKind {
        StrategyKind::Refinement
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

        let temperature = self.config.base_temperature(ctx);
        let requests = select_targets(ctx, count)
            .into_iter()
            .map(|target| {
                let (weakest, _) = target.verification.categories.weakest();
                SampleRequest {
                    prompt: refinement_prompt(ctx, target, weakest),
                    temperature,
                    parents: vec![target],
                    focus: vec![weakest.to_string()],
                }
            })
            .collect::<Vec<_>>();

        if requests.is_empty() {
            tracing::debug!("No refinement targets in score range");
        }

        Ok(sample_all(
            self.provider.as_ref(),
            &self.config,
            StrategyKind::Refinement,
            ctx,
            requests,
        )
        .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{DesignIntent, VerificationCategories};
    use crate::test_support::{scored, scored_with, ScriptedProvider};

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
    fn test_select_targets_filters_range() {
        let intent = DesignIntent::new("x");
        let prev = vec![scored(0.2), scored(0.97), scored(0.5), scored(0.8), scored(0.25)];
        let targets = select_targets(&ctx(&intent, &prev), 5);
        let scores: Vec<f64> = targets.iter().map(|t| t.score()).collect();
        assert_eq!(scores.len(), 2);
        assert!((scores[0] - 0.8).abs() < 1e-9);
        assert!((scores[1] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_select_targets_limited_by_count() {
        let intent = DesignIntent::new("x");
        let prev = vec![scored(0.5), scored(0.6), scored(0.7)];
        assert_eq!(select_targets(&ctx(&intent, &prev), 1).len(), 1);
    }

    #[tokio::test]
    async fn test_prompt_targets_weakest_and_strengths() {
        let provider = Arc::new(ScriptedProvider::always(r#"{"actions": []}"#));
        let gen = RefinementGenerator::new(provider.clone(), GeneratorConfig::new("m"));
        let intent = DesignIntent::new("x");
        let mut target = scored_with(0.6, VerificationCategories::new(0.7, 0.7, 0.3, 0.7));
        target.verification.strengths = vec!["clear hierarchy".into()];
        let prev = vec![target];

        let out = gen.generate(&ctx(&intent, &prev), 3).await.unwrap();
        assert_eq!(out.candidates.len(), 1);
        assert_eq!(out.candidates[0].parent_ids, vec![prev[0].candidate.id.clone()]);
        assert_eq!(out.candidates[0].metadata.focus, vec!["completeness".to_string()]);

        let prompt = &provider.requests()[0].messages[0].content;
        assert!(prompt.contains("**completeness**"));
        assert!(prompt.contains("- clear hierarchy"));
    }

    #[tokio::test]
    async fn test_no_targets_produces_nothing() {
        let provider = Arc::new(ScriptedProvider::always(r#"{"actions": []}"#));
        let gen = RefinementGenerator::new(provider.clone(), GeneratorConfig::new("m"));
        let intent = DesignIntent::new("x");
        let prev = vec![scored(0.1)];
        let out = gen.generate(&ctx(&intent, &prev), 2).await.unwrap();
        assert!(out.candidates.is_empty());
        assert_eq!(provider.call_count(), 0);
    }
}
