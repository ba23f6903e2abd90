// src/cli/run.rs — `designloop run`: drive the feedback loop

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;

use super::setup;
use crate::core::types::{DesignIntent, LoopConfig, LoopResult, VerificationTier};
use crate::core::FeedbackLoop;
use crate::infra::config::Config;
use crate::provider::resolver::ProviderCache;

/// Command-line overrides for one run.
#[derive(Debug, Default)]
pub struct RunOptions {
    pub model: Option<String>,
    pub iterations: Option<u32>,
    pub quality: Option<f64>,
    pub candidates: Option<usize>,
    pub tier: Option<VerificationTier>,
    pub screenshot_out: Option<PathBuf>,
    pub quiet: bool,
}

impl RunOptions {
    /// Apply the overrides on top of the file config.
    pub fn loop_config(&self, config: &Config) -> anyhow::Result<LoopConfig> {
        let mut lc = LoopConfig::from(config);
        if let Some(n) = self.iterations {
            anyhow::ensure!(n > 0, "--iterations must be at least 1");
            lc.max_iterations = n;
        }
        if let Some(q) = self.quality {
            anyhow::ensure!((0.0..=1.0).contains(&q), "--quality must be within [0, 1]");
            lc.quality_threshold = q;
        }
        if let Some(c) = self.candidates {
            anyhow::ensure!(c > 0, "--candidates must be at least 1");
            lc.candidates_per_iteration = c;
        }
        if let Some(tier) = self.tier {
            lc.verification.tier = tier;
        }
        Ok(lc)
    }
}

pub async fn run_loop(intent: DesignIntent, config: &Config, opts: RunOptions) -> anyhow::Result<()> {
    let loop_config = opts.loop_config(config)?;
    let model = setup::generator_model(config, opts.model.as_deref())?;

    let mut cache = ProviderCache::new();
    let strategies = setup::build_strategies(config, &model, &mut cache)?;
    let verifier = setup::build_verifier(config, &model, &mut cache)?;
    let renderer = Arc::new(setup::build_renderer(config)?);

    tracing::info!(
        model = %model,
        judges = ?verifier.names(),
        tier = %loop_config.verification.tier,
        "Starting feedback loop",
    );
    if !opts.quiet {
        eprintln!(
            "[designloop] {} | model: {} | tier: {}",
            crate::util::truncate_str(&intent.description, 60),
            model,
            loop_config.verification.tier
        );
    }

    let mut feedback = FeedbackLoop::new(strategies, verifier, renderer, loop_config);
    if !opts.quiet {
        feedback = feedback.with_progress(super::progress::terminal_progress());
    }

    let result = feedback.run(&intent).await?;

    if let Some(ref path) = opts.screenshot_out {
        match result.screenshot() {
            Some(shot) => {
                std::fs::write(path, &shot.full)?;
                if !opts.quiet {
                    eprintln!("[designloop] screenshot written to {}", path.display());
                }
            }
            None => tracing::warn!("Final candidate has no screenshot to write"),
        }
    }

    println!("{}", serde_json::to_string_pretty(&summary(&result))?);
    Ok(())
}

/// JSON written to stdout after a run.
pub fn summary(result: &LoopResult) -> serde_json::Value {
    let best = &result.final_candidate;
    json!({
        "success": result.success,
        "termination_reason": result.termination_reason.to_string(),
        "iterations": result.iterations.len(),
        "duration_ms": result.duration.as_millis() as u64,
        "final": {
            "id": best.candidate.id,
            "strategy": best.candidate.strategy,
            "iteration": best.candidate.iteration,
            "seed": best.candidate.seed,
            "score": best.score(),
            "quality": best.quality,
            "verification": {
                "score": best.verification.score,
                "acceptable": best.verification.acceptable,
                "confidence": best.verification.confidence,
                "consensus": best.verification.model_consensus,
                "categories": best.verification.categories,
                "issues": best.verification.issues,
                "suggestions": best.verification.suggestions,
            },
        },
        "analytics": result.analytics,
    })
}
