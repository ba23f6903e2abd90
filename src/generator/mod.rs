// src/generator/mod.rs — Candidate generators, one per strategy

pub mod crossover;
pub mod diversity;
pub mod fresh;
pub mod initial;
pub mod mutation;
pub mod prompt;
pub mod refinement;

use async_trait::async_trait;
use futures::future::join_all;

use crate::core::types::{
    ActionSpec, CandidateMetadata, DesignCandidate, DesignIntent, ScoredCandidate, StrategyKind,
};
use crate::infra::errors::DesignLoopError;
use crate::provider::{ChatRequest, Message, ModelProvider, TokenUsage};

pub use crossover::CrossoverGenerator;
pub use diversity::DiversityGenerator;
pub use fresh::FreshGenerator;
pub use initial::InitialGenerator;
pub use mutation::MutationGenerator;
pub use refinement::RefinementGenerator;

/// Immutable snapshot a generator works from, taken at iteration start.
#[derive(Debug, Clone, Copy)]
pub struct GenerationContext<'a> {
    pub intent: &'a DesignIntent,
    pub iteration: u32,
    pub previous: &'a [ScoredCandidate],
    pub best: Option<&'a ScoredCandidate>,
    pub available_actions: &'a [ActionSpec],
    /// Decayed base sampling temperature for this iteration.
    pub temperature: f64,
    pub min_diversity: f64,
}

impl<'a> GenerationContext<'a> {
    /// Previous candidates, highest score first.
    pub fn ranked(&self) -> Vec<&'a ScoredCandidate> {
        let mut ranked: Vec<&ScoredCandidate> = self.previous.iter().collect();
        ranked.sort_by(|a, b| {
            b.score()
                .partial_cmp(&a.score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    pub model: String,
    /// Fixed sampling temperature; `None` follows the context's decayed temperature.
    pub temperature: Option<f64>,
    pub max_tokens: u32,
    /// Upper bound on parents combined by crossover.
    pub max_parents: usize,
    pub divergence_level: f64,
}

impl GeneratorConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
            max_tokens: 4096,
            max_parents: 3,
            divergence_level: 0.5,
        }
    }

    pub fn apply(&mut self, patch: &GeneratorConfigPatch) {
        if let Some(ref model) = patch.model {
            self.model = model.clone();
        }
        if let Some(t) = patch.temperature {
            self.temperature = Some(t.clamp(0.0, 1.0));
        }
        if let Some(m) = patch.max_tokens {
            self.max_tokens = m;
        }
        if let Some(p) = patch.max_parents {
            self.max_parents = p.max(2);
        }
        if let Some(d) = patch.divergence_level {
            self.divergence_level = d.clamp(0.0, 1.0);
        }
    }

    pub fn base_temperature(&self, ctx: &GenerationContext<'_>) -> f64 {
        self.temperature.unwrap_or(ctx.temperature)
    }
}

/// Partial update applied through [`Generator::configure`].
#[derive(Debug, Clone, Default)]
pub struct GeneratorConfigPatch {
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub max_parents: Option<usize>,
    pub divergence_level: Option<f64>,
}

/// What one `generate` call produced.
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub strategy: StrategyKind,
    pub model: String,
    pub candidates: Vec<DesignCandidate>,
    pub usage: TokenUsage,
    pub attempted: usize,
    pub failed: usize,
}

impl GenerationOutput {
    pub fn empty(strategy: StrategyKind, model: impl Into<String>) -> Self {
        Self {
            strategy,
            model: model.into(),
            candidates: Vec::new(),
            usage: TokenUsage::default(),
            attempted: 0,
            failed: 0,
        }
    }
}

/// Shared capability of every strategy implementation.
#[async_trait]
pub trait Generator: Send + Sync {
    fn strategy(&self) -> StrategyKind;

    fn config(&self) -> &GeneratorConfig;

    fn configure(&mut self, patch: &GeneratorConfigPatch);

    /// Produce up to `count` candidates. Individual failed samples are dropped;
    /// only configuration problems return `Err`.
    async fn generate(
        &self,
        ctx: &GenerationContext<'_>,
        count: usize,
    ) -> Result<GenerationOutput, DesignLoopError>;
}

/// One provider call a generator wants to make.
pub(crate) struct SampleRequest<'a> {
    pub prompt: String,
    pub temperature: f64,
    pub parents: Vec<&'a ScoredCandidate>,
    pub focus: Vec<String>,
}

pub(crate) fn ensure_ready(provider: &dyn ModelProvider) -> Result<(), DesignLoopError> {
    if provider.is_connected() {
        Ok(())
    } else {
        Err(DesignLoopError::NoProvider)
    }
}

/// Issue every request concurrently and keep the samples that parse.
pub(crate) async fn sample_all(
    provider: &dyn ModelProvider,
    config: &GeneratorConfig,
    strategy: StrategyKind,
    ctx: &GenerationContext<'_>,
    requests: Vec<SampleRequest<'_>>,
) -> GenerationOutput {
    let mut output = GenerationOutput::empty(strategy, config.model.clone());
    if requests.is_empty() {
        return output;
    }

    let system = prompt::system_prompt(strategy, ctx.available_actions);
    let calls = requests.iter().map(|req| {
        provider.chat(ChatRequest {
            model: config.model.clone(),
            messages: vec![Message::user(req.prompt.clone())],
            max_tokens: Some(config.max_tokens),
            temperature: Some(req.temperature as f32),
            system: Some(system.clone()),
        })
    });
    let responses = join_all(calls).await;

    output.attempted = requests.len();
    for (req, response) in requests.into_iter().zip(responses) {
        let response = match response {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(strategy = %strategy, "Generation sample failed: {}", e);
                output.failed += 1;
                continue;
            }
        };
        output.usage.add(&response.usage);

        let Some(parsed) = prompt::parse_generation(&response.content) else {
            tracing::warn!(strategy = %strategy, "Dropping sample with unparseable seed");
            output.failed += 1;
            continue;
        };

        let candidate = DesignCandidate::new(parsed.seed, strategy, ctx.iteration)
            .with_parents(&req.parents)
            .with_metadata(CandidateMetadata {
                temperature: req.temperature,
                confidence: parsed.confidence,
                parent_scores: Vec::new(),
                rationale: parsed.rationale,
                focus: req.focus,
            });
        output.candidates.push(candidate);
    }

    tracing::debug!(
        strategy = %strategy,
        produced = output.candidates.len(),
        failed = output.failed,
        "Generation batch complete",
    );
    output
}
