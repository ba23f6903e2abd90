// src/strategy/mod.rs — StrategyManager: owns the generators and allocates work

pub mod selection;

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::core::adaptive::AdaptiveConfig;
use crate::core::types::{DesignCandidate, StrategyKind};
use crate::generator::{
    CrossoverGenerator, DiversityGenerator, FreshGenerator, GenerationContext, Generator,
    GeneratorConfig, GeneratorConfigPatch, InitialGenerator, MutationGenerator,
    RefinementGenerator,
};
use crate::infra::errors::DesignLoopError;
use crate::provider::{ModelProvider, TokenUsage};

pub use selection::{
    detect_stagnation, select_strategies, StrategyAllocation, StrategySelection, StrategyWeights,
};

/// One recorded use of a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyUsage {
    pub strategy: StrategyKind,
    pub iteration: u32,
    /// Candidates the strategy actually produced.
    pub count: usize,
}

/// Everything one `generate_candidates` call produced.
#[derive(Debug, Clone, Default)]
pub struct GenerationBatch {
    pub candidates: Vec<DesignCandidate>,
    /// (strategy, produced) per dispatched strategy, in allocation order.
    pub produced: Vec<(StrategyKind, usize)>,
    /// (model, usage) per generator call, for cost tracking.
    pub usage: Vec<(String, TokenUsage)>,
}

impl GenerationBatch {
    pub fn strategies_used(&self) -> Vec<StrategyKind> {
        self.produced.iter().map(|(s, _)| *s).collect()
    }
}

/// Owns one generator per strategy plus the weight table used to split work.
pub struct StrategyManager {
    initial: InitialGenerator,
    refinement: RefinementGenerator,
    crossover: CrossoverGenerator,
    mutation: MutationGenerator,
    fresh: FreshGenerator,
    diversity: DiversityGenerator,
    weights: StrategyWeights,
    usage: Vec<StrategyUsage>,
}

impl StrategyManager {
    /// All six generators share one provider and model.
    pub fn new(provider: Arc<dyn ModelProvider>, model: &str, weights: StrategyWeights) -> Self {
        let config = GeneratorConfig::new(model);
        Self {
            initial: InitialGenerator::new(provider.clone(), config.clone()),
            refinement: RefinementGenerator::new(provider.clone(), config.clone()),
            crossover: CrossoverGenerator::new(provider.clone(), config.clone()),
            mutation: MutationGenerator::new(provider.clone(), config.clone()),
            fresh: FreshGenerator::new(provider.clone(), config.clone()),
            diversity: DiversityGenerator::new(provider, config),
            weights,
            usage: Vec::new(),
        }
    }

    pub fn generator(&self, kind: StrategyKind) -> &dyn Generator {
        match kind {
            StrategyKind::Initial => &self.initial,
            StrategyKind::Refinement => &self.refinement,
            StrategyKind::Crossover => &self.crossover,
            StrategyKind::Mutation => &self.mutation,
            StrategyKind::Fresh => &self.fresh,
            StrategyKind::Diversity => &self.diversity,
        }
    }

    fn generator_mut(&mut self, kind: StrategyKind) -> &mut dyn Generator {
        match kind {
            StrategyKind::Initial => &mut self.initial,
            StrategyKind::Refinement => &mut self.refinement,
            StrategyKind::Crossover => &mut self.crossover,
            StrategyKind::Mutation => &mut self.mutation,
            StrategyKind::Fresh => &mut self.fresh,
            StrategyKind::Diversity => &mut self.diversity,
        }
    }

    pub fn configure(&mut self, kind: StrategyKind, patch: &GeneratorConfigPatch) {
        self.generator_mut(kind).configure(patch);
    }

    pub fn usage_history(&self) -> &[StrategyUsage] {
        &self.usage
    }

    pub fn clear_history(&mut self) {
        self.usage.clear();
    }

    pub fn select_strategies(
        &self,
        ctx: &GenerationContext<'_>,
        total: usize,
        adaptive: &AdaptiveConfig,
    ) -> StrategySelection {
        select_strategies(&self.weights, ctx, total, adaptive)
    }

    /// Run every allocated generator concurrently and concatenate their output.
    ///
    /// A configuration error from any generator aborts the call; any other
    /// generator error drops that strategy's contribution.
    pub async fn generate_candidates(
        &mut self,
        ctx: &GenerationContext<'_>,
        selection: &StrategySelection,
    ) -> Result<GenerationBatch, DesignLoopError> {
        let active: Vec<&StrategyAllocation> = selection
            .allocations
            .iter()
            .filter(|a| a.count > 0)
            .collect();

        let results = {
            let this = &*self;
            let calls = active
                .iter()
                .map(|a| this.generator(a.strategy).generate(ctx, a.count));
            join_all(calls).await
        };

        let mut batch = GenerationBatch::default();
        for (alloc, result) in active.into_iter().zip(results) {
            match result {
                Ok(output) => {
                    tracing::debug!(
                        strategy = %alloc.strategy,
                        requested = alloc.count,
                        produced = output.candidates.len(),
                        "Strategy finished",
                    );
                    self.usage.push(StrategyUsage {
                        strategy: alloc.strategy,
                        iteration: ctx.iteration,
                        count: output.candidates.len(),
                    });
                    batch.produced.push((alloc.strategy, output.candidates.len()));
                    batch.usage.push((output.model, output.usage));
                    batch.candidates.extend(output.candidates);
                }
                Err(e) if e.is_configuration() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        strategy = %alloc.strategy,
                        retriable = e.is_retriable(),
                        "Strategy failed: {}",
                        e,
                    );
                }
            }
        }
        Ok(batch)
    }
}
