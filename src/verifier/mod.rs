// src/verifier/mod.rs — Screenshot verification: judges, fusion and tiers

pub mod fusion;
pub mod judge;
pub mod parser;
pub mod tiered;

use async_trait::async_trait;

use crate::core::types::{DesignIntent, ModelVerificationResult};
use crate::infra::errors::DesignLoopError;
use crate::render::Screenshot;

pub use judge::LlmJudge;
pub use tiered::{AdvancedConfig, ModelWeight, TieredVerifier, VerificationConfig};

/// One named judge backend.
#[async_trait]
pub trait Verifier: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool {
        true
    }

    async fn verify(
        &self,
        intent: &DesignIntent,
        screenshot: &Screenshot,
    ) -> Result<ModelVerificationResult, DesignLoopError>;
}
