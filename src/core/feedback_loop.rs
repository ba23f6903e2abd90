// src/core/feedback_loop.rs — Generate → render → verify → terminate driver

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;

use super::adaptive::{AdaptiveConfig, IterationOutcome};
use super::cost::{CostPhase, CostTracker};
use super::stats;
use super::termination::{self, TerminationLimits, TerminationPolicy};
use super::types::*;
use crate::generator::GenerationContext;
use crate::infra::errors::DesignLoopError;
use crate::render::{render_with_timeout, RenderResult, Renderer, Screenshot};
use crate::strategy::StrategyManager;
use crate::verifier::TieredVerifier;

type ProgressCallback = Box<dyn Fn(LoopEvent) + Send + Sync>;

/// Drives iterations until the termination policy (or early stopping) says stop.
pub struct FeedbackLoop {
    strategies: StrategyManager,
    verifier: TieredVerifier,
    renderer: Arc<dyn Renderer>,
    config: LoopConfig,
    policy: TerminationPolicy,
    cost_tracker: CostTracker,
    on_progress: Option<ProgressCallback>,
}

/// What a single pass produced before it is recorded in the history.
struct PassOutput {
    scored: Vec<ScoredCandidate>,
    best_index: Option<usize>,
    metrics: IterationMetrics,
    strategies_used: Vec<StrategyKind>,
}

impl FeedbackLoop {
    pub fn new(
        strategies: StrategyManager,
        verifier: TieredVerifier,
        renderer: Arc<dyn Renderer>,
        mut config: LoopConfig,
    ) -> Self {
        config.quality_weights = config.quality_weights.normalized();
        Self {
            strategies,
            verifier,
            renderer,
            config,
            policy: TerminationPolicy::new(),
            cost_tracker: CostTracker::new(),
            on_progress: None,
        }
    }

    /// Set a callback for real-time progress events.
    pub fn with_progress(mut self, cb: impl Fn(LoopEvent) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(cb));
        self
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn strategies(&self) -> &StrategyManager {
        &self.strategies
    }

    pub fn cost(&self) -> &CostTracker {
        &self.cost_tracker
    }

    fn emit(&self, event: LoopEvent) {
        if let Some(ref cb) = self.on_progress {
            cb(event);
        }
    }

    /// Run the loop for one intent.
    ///
    /// A candidate whose verification fails is dropped from its iteration.
    /// A configuration error after a candidate has been scored ends the run
    /// with that candidate and `TerminationReason::Error`; before anything was
    /// scored it propagates.
    pub async fn run(&mut self, intent: &DesignIntent) -> Result<LoopResult, DesignLoopError> {
        let start = Instant::now();
        self.cost_tracker = CostTracker::new();
        self.strategies.clear_history();

        let limits = TerminationLimits {
            max_iterations: self.config.max_iterations,
            quality_threshold: self.config.quality_threshold,
            start,
            timeout: self.config.timeout,
        };

        let mut adaptive: AdaptiveConfig = self.config.adaptive;
        let mut history: Vec<FeedbackIteration> = Vec::new();
        let mut all_scored: Vec<ScoredCandidate> = Vec::new();
        let mut best: Option<ScoredCandidate> = None;
        let mut reason = TerminationReason::MaxIterations;

        for iteration in 1..=self.config.max_iterations {
            adaptive = adaptive.with_temperature(&self.config.temperature, iteration);
            self.emit(LoopEvent::IterationStart {
                iteration,
                max_iterations: self.config.max_iterations,
                temperature: adaptive.temperature,
            });

            let pass = match self
                .iterate(intent, iteration, &adaptive, &all_scored, best.as_ref())
                .await
            {
                Ok(pass) => pass,
                Err(e) if best.is_some() => {
                    tracing::warn!(iteration, "Iteration failed, keeping best so far: {}", e);
                    reason = TerminationReason::Error(e.to_string());
                    break;
                }
                Err(e) => return Err(e),
            };

            let previous_best = best.as_ref().map(|b| b.score());
            let scores: Vec<f64> = pass.scored.iter().map(|c| c.score()).collect();
            let iteration_best = pass.best_index.and_then(|i| pass.scored.get(i));

            if let Some(candidate) = iteration_best {
                if previous_best.map_or(true, |prev| candidate.score() > prev) {
                    best = Some(candidate.clone());
                }
            }
            let iteration_best_score = iteration_best.map(|c| c.score());

            all_scored.extend(pass.scored.iter().cloned());
            history.push(FeedbackIteration {
                iteration,
                timestamp: Utc::now(),
                candidates: pass.scored,
                best_index: pass.best_index,
                termination: TerminationDecision::pending(),
                metrics: pass.metrics,
                strategies_used: pass.strategies_used,
            });

            let decision =
                self.policy
                    .evaluate(&history, &limits, self.strategies.usage_history());
            if let Some(record) = history.last_mut() {
                record.termination = decision.clone();
            }

            let best_score = best.as_ref().map(|b| b.score());
            tracing::info!(
                iteration,
                scored = scores.len(),
                iteration_best = ?iteration_best_score,
                best = ?best_score,
                cost_usd = self.cost_tracker.total_usd,
                "Iteration complete",
            );
            self.emit(LoopEvent::IterationEnd {
                iteration,
                best_score,
                decision: decision.clone(),
                cost_so_far: self.cost_tracker.total_usd,
            });

            adaptive = adaptive.adapt(IterationOutcome {
                iteration,
                scores: &scores,
                best: iteration_best_score,
                previous_best,
            });

            if decision.should_terminate {
                reason = decision.reason.unwrap_or(TerminationReason::MaxIterations);
                break;
            }
            if self.config.enable_early_stopping
                && best_score.is_some_and(|s| s >= self.config.quality_threshold)
            {
                reason = TerminationReason::QualityThreshold;
                break;
            }
        }

        let Some(final_candidate) = best else {
            tracing::warn!(
                iterations = history.len(),
                "Loop finished without a scored candidate"
            );
            return Err(DesignLoopError::NoCandidatesGenerated);
        };

        let analytics = self.analytics(&history, &all_scored);
        let final_score = final_candidate.score();
        let success = final_score >= self.config.quality_threshold;

        tracing::info!(
            iterations = history.len(),
            final_score,
            success,
            reason = %reason,
            cost = %self.cost_tracker.summary(),
            "Feedback loop finished",
        );
        self.emit(LoopEvent::Complete {
            iterations: history.len() as u32,
            final_score,
            reason: reason.clone(),
            cost: self.cost_tracker.total_usd,
        });

        Ok(LoopResult {
            success,
            final_candidate,
            iterations: history,
            termination_reason: reason,
            analytics,
            duration: start.elapsed(),
        })
    }

    /// One pass: select, generate, render sequentially, verify concurrently.
    async fn iterate(
        &mut self,
        intent: &DesignIntent,
        iteration: u32,
        adaptive: &AdaptiveConfig,
        previous: &[ScoredCandidate],
        best: Option<&ScoredCandidate>,
    ) -> Result<PassOutput, DesignLoopError> {
        let pass_start = Instant::now();
        let cost_before = self.cost_tracker.total_usd;

        let ctx = GenerationContext {
            intent,
            iteration,
            previous,
            best,
            available_actions: &self.config.available_actions,
            temperature: adaptive.temperature,
            min_diversity: adaptive.min_diversity,
        };

        // Generate
        let selection =
            self.strategies
                .select_strategies(&ctx, self.config.candidates_per_iteration, adaptive);
        tracing::debug!(
            iteration,
            stagnant = selection.stagnation_detected,
            allocations = ?selection
                .allocations
                .iter()
                .map(|a| (a.strategy, a.count))
                .collect::<Vec<_>>(),
            "Strategies selected",
        );

        let generation_start = Instant::now();
        let batch = self.strategies.generate_candidates(&ctx, &selection).await?;
        let generation_ms = generation_start.elapsed().as_millis() as u64;

        for (model, usage) in &batch.usage {
            self.cost_tracker.record(model, usage, CostPhase::Generation);
        }
        let candidates_generated = batch.candidates.len();
        let strategies_used = batch.strategies_used();
        self.emit(LoopEvent::CandidatesGenerated {
            iteration,
            count: candidates_generated,
            strategies: batch.produced.clone(),
        });

        // Render, one candidate at a time
        let render_start = Instant::now();
        let mut rendered: Vec<(DesignCandidate, RenderResult)> = Vec::new();
        for candidate in batch.candidates {
            let result =
                render_with_timeout(self.renderer.as_ref(), &candidate, self.config.render_timeout)
                    .await;
            self.emit(LoopEvent::CandidateRendered {
                iteration,
                candidate_id: candidate.id.clone(),
                success: result.success,
                error: result.error.clone(),
            });
            if result.success && result.screenshot.is_some() {
                rendered.push((candidate, result));
            } else {
                tracing::warn!(
                    candidate = %candidate.id,
                    strategy = %candidate.strategy,
                    "Dropping candidate that failed to render: {}",
                    result.error.as_deref().unwrap_or("no screenshot"),
                );
            }
        }
        let render_ms = render_start.elapsed().as_millis() as u64;
        let candidates_rendered = rendered.len();

        // Verify
        let verification_start = Instant::now();
        let pending: Vec<(&DesignCandidate, &RenderResult, &Screenshot)> = rendered
            .iter()
            .filter_map(|(c, r)| r.screenshot.as_ref().map(|s| (c, r, s)))
            .collect();
        let outcomes = {
            let calls = pending
                .iter()
                .map(|(_, _, shot)| self.verifier.verify(intent, shot, &self.config.verification));
            join_all(calls).await
        };

        let mut scored = Vec::with_capacity(outcomes.len());
        for ((candidate, render, _), outcome) in pending.into_iter().zip(outcomes) {
            let verification = match outcome {
                Ok(v) => v,
                Err(e) if e.is_configuration() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        candidate = %candidate.id,
                        strategy = %candidate.strategy,
                        retriable = e.is_retriable(),
                        "Dropping candidate that failed verification: {}",
                        e,
                    );
                    continue;
                }
            };
            for judge in verification.model_results.iter().flatten() {
                self.cost_tracker
                    .record(&judge.model, &judge.usage, CostPhase::Verification);
            }
            let quality =
                QualityScore::from_verification(&verification, &self.config.quality_weights);
            self.emit(LoopEvent::CandidateScored {
                iteration,
                candidate_id: candidate.id.clone(),
                strategy: candidate.strategy,
                score: quality.overall,
            });
            scored.push(ScoredCandidate {
                candidate: candidate.clone(),
                render: render.clone(),
                verification,
                quality,
            });
        }
        let verification_ms = verification_start.elapsed().as_millis() as u64;

        let best_index = best_index(&scored);
        let metrics = IterationMetrics {
            generation_ms,
            render_ms,
            verification_ms,
            total_ms: pass_start.elapsed().as_millis() as u64,
            api_calls: scored.len() as u32 + 1,
            candidates_generated,
            candidates_rendered,
            estimated_cost: self.cost_tracker.total_usd - cost_before,
        };

        Ok(PassOutput {
            scored,
            best_index,
            metrics,
            strategies_used,
        })
    }

    fn analytics(
        &self,
        history: &[FeedbackIteration],
        all_scored: &[ScoredCandidate],
    ) -> LoopAnalytics {
        let score_progression = termination::score_progression(history);

        let mut per_strategy: BTreeMap<StrategyKind, Vec<f64>> = BTreeMap::new();
        for c in all_scored {
            per_strategy
                .entry(c.candidate.strategy)
                .or_default()
                .push(c.score());
        }
        let strategy_scores = per_strategy
            .into_iter()
            .map(|(k, scores)| (k, stats::mean(&scores)))
            .collect();

        let iteration_ms: Vec<f64> = history.iter().map(|it| it.metrics.total_ms as f64).collect();

        LoopAnalytics {
            convergence: termination::analyze_convergence(&score_progression),
            score_progression,
            strategy_scores,
            avg_iteration_ms: stats::mean(&iteration_ms),
            total_cost_usd: self.cost_tracker.total_usd,
            strategy_breakdown: termination::strategy_breakdown(self.strategies.usage_history()),
        }
    }
}

/// Index of the highest-scoring candidate; the earliest wins ties.
fn best_index(scored: &[ScoredCandidate]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, c) in scored.iter().enumerate() {
        if best.map_or(true, |(_, s)| c.score() > s) {
            best = Some((i, c.score()));
        }
    }
    best.map(|(i, _)| i)
}
