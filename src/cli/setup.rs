// src/cli/setup.rs — Build loop components from config

use std::sync::Arc;

use crate::infra::config::Config;
use crate::provider::resolver::ProviderCache;
use crate::provider::ModelRef;
use crate::render::CommandRenderer;
use crate::strategy::StrategyManager;
use crate::verifier::{LlmJudge, TieredVerifier};

pub const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4";

/// Judge name used when no `[[models.verifiers]]` are configured.
pub const DEFAULT_JUDGE: &str = "default";

fn parse_model(s: &str) -> anyhow::Result<ModelRef> {
    ModelRef::parse(s)
        .ok_or_else(|| anyhow::anyhow!("Invalid model '{}', expected provider/model", s))
}

/// Generator model: CLI override, then config, then the default.
pub fn generator_model(config: &Config, cli_model: Option<&str>) -> anyhow::Result<ModelRef> {
    let raw = cli_model
        .or(config.models.generator.as_deref())
        .unwrap_or(DEFAULT_MODEL);
    parse_model(raw)
}

pub fn build_strategies(
    config: &Config,
    model: &ModelRef,
    cache: &mut ProviderCache,
) -> anyhow::Result<StrategyManager> {
    let provider = cache.get(model)?;
    Ok(StrategyManager::new(provider, &model.model, config.strategy))
}

/// One LLM judge per configured verifier; falls back to a single judge on `fallback`.
pub fn build_verifier(
    config: &Config,
    fallback: &ModelRef,
    cache: &mut ProviderCache,
) -> anyhow::Result<TieredVerifier> {
    let mut verifier = TieredVerifier::new();
    if config.models.verifiers.is_empty() {
        let provider = cache.get(fallback)?;
        verifier.register(Arc::new(LlmJudge::new(
            DEFAULT_JUDGE,
            provider,
            fallback.model.clone(),
        )));
        return Ok(verifier);
    }

    for entry in &config.models.verifiers {
        let model = parse_model(&entry.model)?;
        match cache.get(&model) {
            Ok(provider) => {
                verifier.register(Arc::new(LlmJudge::new(
                    entry.name.clone(),
                    provider,
                    model.model.clone(),
                )));
            }
            // Advanced tier tolerates missing judges; standard tier reports it on use.
            Err(e) if !entry.enabled => {
                tracing::debug!(judge = %entry.name, "Skipping disabled judge: {}", e);
            }
            Err(e) => {
                tracing::warn!(judge = %entry.name, "Judge not available: {}", e);
            }
        }
    }
    Ok(verifier)
}

pub fn build_renderer(config: &Config) -> anyhow::Result<CommandRenderer> {
    let command = config.render.command.as_deref().ok_or_else(|| {
        anyhow::anyhow!("No renderer configured. Set [render] command in config.toml.")
    })?;
    Ok(CommandRenderer::new(command, config.render.args.clone())
        .with_device_pixel_ratio(config.render.device_pixel_ratio))
}
