// src/verifier/tiered.rs — Standard (single judge) and advanced (multi-judge) verification

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use super::fusion;
use super::Verifier;
use crate::core::types::{DesignIntent, VerificationResult, VerificationTier};
use crate::infra::errors::DesignLoopError;
use crate::render::Screenshot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelWeight {
    pub model: String,
    pub weight: f64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancedConfig {
    pub models: Vec<ModelWeight>,
    pub consensus_threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationConfig {
    pub tier: VerificationTier,
    /// Judge used by the standard tier; defaults to the first registered.
    pub primary_model: Option<String>,
    pub acceptance_threshold: f64,
    pub advanced: Option<AdvancedConfig>,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            tier: VerificationTier::Standard,
            primary_model: None,
            acceptance_threshold: 0.85,
            advanced: None,
        }
    }
}

impl From<&crate::infra::config::Config> for VerificationConfig {
    fn from(cfg: &crate::infra::config::Config) -> Self {
        let section = &cfg.verification;
        let models: Vec<ModelWeight> = cfg
            .models
            .verifiers
            .iter()
            .map(|v| ModelWeight {
                model: v.name.clone(),
                weight: v.weight,
                enabled: v.enabled,
            })
            .collect();
        let advanced = (!models.is_empty()).then(|| AdvancedConfig {
            models,
            consensus_threshold: section.consensus_threshold,
        });
        Self {
            tier: section.tier,
            primary_model: section.primary_model.clone(),
            acceptance_threshold: section.acceptance_threshold,
            advanced,
        }
    }
}

/// Registry of named judges dispatched by tier.
#[derive(Default)]
pub struct TieredVerifier {
    verifiers: Vec<Arc<dyn Verifier>>,
}

impl TieredVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a judge. A judge with the same name replaces the earlier one.
    pub fn register(&mut self, verifier: Arc<dyn Verifier>) {
        if let Some(slot) = self
            .verifiers
            .iter_mut()
            .find(|v| v.name() == verifier.name())
        {
            *slot = verifier;
        } else {
            self.verifiers.push(verifier);
        }
    }

    pub fn with(mut self, verifier: Arc<dyn Verifier>) -> Self {
        self.register(verifier);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Verifier>> {
        self.verifiers.iter().find(|v| v.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.verifiers.iter().map(|v| v.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.verifiers.is_empty()
    }

    pub async fn verify(
        &self,
        intent: &DesignIntent,
        screenshot: &Screenshot,
        config: &VerificationConfig,
    ) -> Result<VerificationResult, DesignLoopError> {
        match config.tier {
            VerificationTier::Standard => self.verify_standard(intent, screenshot, config).await,
            VerificationTier::Advanced => self.verify_advanced(intent, screenshot, config).await,
        }
    }

    async fn verify_standard(
        &self,
        intent: &DesignIntent,
        screenshot: &Screenshot,
        config: &VerificationConfig,
    ) -> Result<VerificationResult, DesignLoopError> {
        let verifier = match config.primary_model {
            Some(ref name) => self.get(name).ok_or_else(|| DesignLoopError::VerifierNotFound {
                name: name.clone(),
            })?,
            None => self
                .verifiers
                .first()
                .ok_or_else(|| DesignLoopError::VerifierNotFound {
                    name: "<default>".into(),
                })?,
        };

        if !verifier.is_available() {
            return Err(DesignLoopError::VerifierUnavailable {
                name: verifier.name().to_string(),
            });
        }

        let result = verifier.verify(intent, screenshot).await?;
        Ok(fusion::single(&result, config.acceptance_threshold))
    }

    async fn verify_advanced(
        &self,
        intent: &DesignIntent,
        screenshot: &Screenshot,
        config: &VerificationConfig,
    ) -> Result<VerificationResult, DesignLoopError> {
        let advanced = config
            .advanced
            .as_ref()
            .ok_or(DesignLoopError::MissingAdvancedConfig)?;

        let enabled: Vec<&ModelWeight> = advanced.models.iter().filter(|m| m.enabled).collect();
        let attempted = enabled.len();

        let mut runnable = Vec::new();
        for entry in enabled {
            match self.get(&entry.model) {
                Some(v) if v.is_available() => runnable.push((v.clone(), entry.weight)),
                Some(_) => tracing::warn!(judge = %entry.model, "Judge unavailable, skipping"),
                None => tracing::warn!(judge = %entry.model, "Judge not registered, skipping"),
            }
        }

        let calls = runnable
            .iter()
            .map(|(v, _)| v.verify(intent, screenshot));
        let outcomes = join_all(calls).await;

        let mut survivors = Vec::new();
        for ((verifier, weight), outcome) in runnable.iter().zip(outcomes) {
            match outcome {
                Ok(result) => survivors.push((result, *weight)),
                Err(e) => {
                    tracing::warn!(judge = %verifier.name(), "Judge failed: {}", e);
                }
            }
        }

        if survivors.is_empty() {
            return Err(DesignLoopError::AllVerifiersFailed { attempted });
        }

        let fused = fusion::fuse(
            &survivors,
            config.acceptance_threshold,
            advanced.consensus_threshold,
        );
        tracing::debug!(
            score = fused.score,
            consensus = fused.model_consensus,
            judges = survivors.len(),
            "Advanced verification fused",
        );
        Ok(fused)
    }
}
