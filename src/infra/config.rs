// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::types::{ActionSpec, VerificationTier};
use crate::infra::errors::DesignLoopError;
use crate::infra::paths;
use crate::strategy::StrategyWeights;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub iteration: IterationConfig,

    #[serde(default)]
    pub temperature: TemperatureConfig,

    #[serde(default)]
    pub adaptive: AdaptiveSection,

    /// Base strategy weights.
    #[serde(default)]
    pub strategy: StrategyWeights,

    #[serde(default)]
    pub verification: VerificationSection,

    #[serde(default)]
    pub quality: QualityConfig,

    #[serde(default)]
    pub render: RenderConfig,

    /// Actions the renderer understands; listed in generator prompts.
    #[serde(default)]
    pub actions: Vec<ActionSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// "provider/model" used by every generator.
    pub generator: Option<String>,
    /// Judges available to the verifier, by name.
    #[serde(default)]
    pub verifiers: Vec<VerifierEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierEntry {
    pub name: String,
    /// "provider/model" backing this judge.
    pub model: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_weight() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IterationConfig {
    pub max_iterations: u32,
    pub quality_threshold: f64,
    pub candidates_per_iteration: usize,
    pub timeout_seconds: u64,
    pub render_timeout_seconds: u64,
    pub early_stopping: bool,
}

impl Default for IterationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            quality_threshold: 0.85,
            candidates_per_iteration: 4,
            timeout_seconds: 600,
            render_timeout_seconds: 30,
            early_stopping: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemperatureConfig {
    pub initial: f64,
    pub min: f64,
    pub decay_rate: f64,
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        Self {
            initial: 0.8,
            min: 0.3,
            decay_rate: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveSection {
    pub exploration_rate: f64,
    pub min_diversity: f64,
}

impl Default for AdaptiveSection {
    fn default() -> Self {
        Self {
            exploration_rate: 0.3,
            min_diversity: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationSection {
    pub tier: VerificationTier,
    /// Judge used by the standard tier; defaults to the first configured.
    pub primary_model: Option<String>,
    pub acceptance_threshold: f64,
    pub consensus_threshold: f64,
}

impl Default for VerificationSection {
    fn default() -> Self {
        Self {
            tier: VerificationTier::Standard,
            primary_model: None,
            acceptance_threshold: 0.85,
            consensus_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub visual_fidelity: f64,
    pub technical_correctness: f64,
    pub design_principles: f64,
    pub intent_alignment: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            visual_fidelity: 0.3,
            technical_correctness: 0.25,
            design_principles: 0.2,
            intent_alignment: 0.25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Program that turns a seed on stdin into a PNG at $DESIGNLOOP_OUTPUT.
    pub command: Option<String>,
    pub args: Vec<String>,
    pub device_pixel_ratio: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            device_pixel_ratio: 1.0,
        }
    }
}

impl Config {
    /// Load config from the default location, falling back to defaults.
    pub fn load() -> Result<Self, DesignLoopError> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, DesignLoopError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| DesignLoopError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, DesignLoopError> {
        toml::to_string_pretty(self).map_err(|e| DesignLoopError::Config(e.to_string()))
    }

    /// Reject values the loop cannot run with.
    pub fn validate(&self) -> Result<(), DesignLoopError> {
        let unit = |name: &str, v: f64| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(DesignLoopError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, v
                )))
            }
        };
        unit("iteration.quality_threshold", self.iteration.quality_threshold)?;
        unit("verification.acceptance_threshold", self.verification.acceptance_threshold)?;
        unit("verification.consensus_threshold", self.verification.consensus_threshold)?;
        unit("temperature.decay_rate", self.temperature.decay_rate)?;

        if self.iteration.max_iterations == 0 {
            return Err(DesignLoopError::Config(
                "iteration.max_iterations must be at least 1".into(),
            ));
        }
        if self.iteration.candidates_per_iteration == 0 {
            return Err(DesignLoopError::Config(
                "iteration.candidates_per_iteration must be at least 1".into(),
            ));
        }

        let mut names = std::collections::HashSet::new();
        for v in &self.models.verifiers {
            if !names.insert(v.name.as_str()) {
                return Err(DesignLoopError::Config(format!(
                    "duplicate verifier name '{}'",
                    v.name
                )));
            }
        }
        if let Some(ref primary) = self.verification.primary_model {
            if !self.models.verifiers.is_empty() && !names.contains(primary.as_str()) {
                return Err(DesignLoopError::Config(format!(
                    "verification.primary_model '{}' is not a configured verifier",
                    primary
                )));
            }
        }
        Ok(())
    }
}
