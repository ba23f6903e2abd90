// src/cli/verify.rs — `designloop verify`: score an existing screenshot

use std::path::Path;

use super::setup;
use crate::core::types::{DesignIntent, VerificationTier};
use crate::infra::config::Config;
use crate::provider::resolver::ProviderCache;
use crate::render::command::png_dimensions;
use crate::render::Screenshot;
use crate::verifier::VerificationConfig;

/// Load a PNG from disk as a screenshot.
pub fn load_screenshot(path: &Path, device_pixel_ratio: f64) -> anyhow::Result<Screenshot> {
    let bytes = std::fs::read(path)
        .map_err(|e| anyhow::anyhow!("Cannot read {}: {}", path.display(), e))?;
    let (width, height) = png_dimensions(&bytes)
        .ok_or_else(|| anyhow::anyhow!("{} is not a PNG", path.display()))?;
    Ok(Screenshot::new(bytes, width, height).with_device_pixel_ratio(device_pixel_ratio))
}

pub async fn run_verify(
    intent: DesignIntent,
    screenshot: &Path,
    tier: Option<VerificationTier>,
    config: &Config,
) -> anyhow::Result<()> {
    let shot = load_screenshot(screenshot, config.render.device_pixel_ratio)?;

    let mut verification = VerificationConfig::from(config);
    if let Some(tier) = tier {
        verification.tier = tier;
    }

    let fallback = setup::generator_model(config, None)?;
    let mut cache = ProviderCache::new();
    let verifier = setup::build_verifier(config, &fallback, &mut cache)?;

    tracing::info!(
        tier = %verification.tier,
        judges = ?verifier.names(),
        width = shot.width,
        height = shot.height,
        "Verifying screenshot",
    );
    let result = verifier.verify(&intent, &shot, &verification).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
