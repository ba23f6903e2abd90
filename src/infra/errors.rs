// src/infra/errors.rs — Error types for designloop

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DesignLoopError {
    // Provider errors (scoped to a single sample or judge call)
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("Could not parse response from judge '{model}': {message}")]
    JudgeParse { model: String, message: String },

    #[error("Render failed: {0}")]
    Render(String),

    // Configuration errors (fail the whole call)
    #[error("No provider configured. Set ANTHROPIC_API_KEY or OPENAI_API_KEY.")]
    NoProvider,

    #[error("Verifier '{name}' is not registered")]
    VerifierNotFound { name: String },

    #[error("Verifier '{name}' is not available")]
    VerifierUnavailable { name: String },

    #[error("Advanced verification tier requires an advanced config")]
    MissingAdvancedConfig,

    #[error("Configuration error: {0}")]
    Config(String),

    // Total failures
    #[error("Verification failed: all {attempted} verifier(s) dropped out")]
    AllVerifiersFailed { attempted: usize },

    #[error("No candidates generated")]
    NoCandidatesGenerated,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DesignLoopError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            DesignLoopError::Provider {
                retriable: true,
                ..
            } | DesignLoopError::RateLimited { .. }
        )
    }

    /// Setup defects that should abort the calling operation immediately.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DesignLoopError::NoProvider
                | DesignLoopError::VerifierNotFound { .. }
                | DesignLoopError::VerifierUnavailable { .. }
                | DesignLoopError::MissingAdvancedConfig
                | DesignLoopError::Config(_)
        )
    }
}
