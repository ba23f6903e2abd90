// src/generator/crossover.rs — Synthesize hybrids from the best parents

use std::sync::Arc;

use async_trait::async_trait;

use super::prompt::{describe_candidate, describe_intent};
use super::{
    ensure_ready, sample_all, GenerationContext, GenerationOutput, Generator, GeneratorConfig,
    GeneratorConfigPatch, SampleRequest,
};
use crate::core::types::{ScoredCandidate, StrategyKind, VerificationCategories};
use crate::infra::errors::DesignLoopError;
use crate::provider::ModelProvider;

pub struct CrossoverGenerator {
    provider: Arc<dyn ModelProvider>,
    config: GeneratorConfig,
}

impl CrossoverGenerator {
    pub fn new(provider: Arc<dyn ModelProvider>, config: GeneratorConfig) -> Self {
        Self { provider, config }
    }
}

fn best_in<'a>(ranked: &[&'a ScoredCandidate], category: &str) -> Option<&'a ScoredCandidate> {
    let mut best: Option<&'a ScoredCandidate> = None;
    for &c in ranked {
        let v = c.verification.categories.get(category).unwrap_or(0.0);
        let current = best.and_then(|b| b.verification.categories.get(category));
        if current.map_or(true, |cur| v > cur) {
            best = Some(c);
        }
    }
    best
}

/// Parent set for sample `index`: overall best, then category leaders, then top
/// scorers, capped at `max_parents`. Category order rotates with `index`.
pub fn select_parents<'a>(
    ranked: &[&'a ScoredCandidate],
    max_parents: usize,
    index: usize,
) -> Vec<&'a ScoredCandidate> {
    let mut parents: Vec<&'a ScoredCandidate> = Vec::new();

    let Some(&best) = ranked.first() else {
        return parents;
    };
    push_unique(&mut parents, best, max_parents);

    let names = VerificationCategories::NAMES;
    for offset in 0..names.len() {
        let category = names[(index + offset) % names.len()];
        if let Some(leader) = best_in(ranked, category) {
            push_unique(&mut parents, leader, max_parents);
        }
    }

    for &c in ranked {
        push_unique(&mut parents, c, max_parents);
    }
    parents
}

fn push_unique<'a>(
    parents: &mut Vec<&'a ScoredCandidate>,
    candidate: &'a ScoredCandidate,
    max_parents: usize,
) {
    if parents.len() < max_parents
        && !parents
            .iter()
            .any(|p| p.candidate.id == candidate.candidate.id)
    {
        parents.push(candidate);
    }
}

fn crossover_prompt(ctx: &GenerationContext<'_>, parents: &[&ScoredCandidate]) -> String {
    let mut prompt = describe_intent(ctx.intent);
    prompt.push_str("\n## Parent designs\n");
    for (i, p) in parents.iter().enumerate() {
        let (strongest, _) = strongest_category(&p.verification.categories);
        prompt.push_str(&describe_candidate(
            &format!("Parent {} (strongest: {})", i + 1, strongest),
            p,
        ));
    }
    prompt.push_str(
        "\nCombine the strongest aspects of each parent into one coherent hybrid design.\n",
    );
    prompt
}

fn strongest_category(cats: &VerificationCategories) -> (&'static str, f64) {
    let entries = cats.entries();
    let mut strongest = entries[0];
    for entry in &entries[1..] {
        if entry.1 > strongest.1 {
            strongest = *entry;
        }
    }
    strongest
}

#[async_trait]
impl Generator for CrossoverGenerator {
    fn strategy(&self) -> StrategyKind {
        StrategyKind::Crossover
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

        if ctx.previous.len() < 2 {
            tracing::debug!("Crossover needs at least two prior candidates");
            return Ok(GenerationOutput::empty(
                StrategyKind::Crossover,
                self.config.model.clone(),
            ));
        }

        let ranked = ctx.ranked();
        let temperature = self.config.base_temperature(ctx);
        let requests = (0..count)
            .map(|i| {
                let parents = select_parents(&ranked, self.config.max_parents, i);
                SampleRequest {
                    prompt: crossover_prompt(ctx, &parents),
                    temperature,
                    focus: Vec::new(),
                    parents,
                }
            })
            .collect();

        Ok(sample_all(
            self.provider.as_ref(),
            &self.config,
            StrategyKind::Crossover,
            ctx,
            requests,
        )
        .await)
    }
}
