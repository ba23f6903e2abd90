// src/provider/resolver.rs — Resolve "provider/model" references to providers from env vars

use std::collections::HashMap;
use std::sync::Arc;

use super::anthropic::AnthropicProvider;
use super::openai::OpenAIProvider;
use super::{ModelProvider, ModelRef};
use crate::infra::errors::DesignLoopError;

/// Build a provider for a model reference, reading credentials from the environment.
pub fn resolve_provider(model: &ModelRef) -> Result<Arc<dyn ModelProvider>, DesignLoopError> {
    resolve_with(model, |var| std::env::var(var).ok())
}

/// Like [`resolve_provider`] but with an injectable environment lookup.
pub fn resolve_with(
    model: &ModelRef,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Arc<dyn ModelProvider>, DesignLoopError> {
    let key = |var: &str| env(var).filter(|k| !k.trim().is_empty());

    match model.provider.as_str() {
        "anthropic" => {
            let api_key = key("ANTHROPIC_API_KEY").ok_or(DesignLoopError::NoProvider)?;
            Ok(Arc::new(AnthropicProvider::new(api_key)))
        }
        "openai" => {
            let api_key = key("OPENAI_API_KEY").ok_or(DesignLoopError::NoProvider)?;
            let provider = match key("OPENAI_BASE_URL") {
                Some(base) => OpenAIProvider::with_base_url(api_key, base),
                None => OpenAIProvider::new(api_key),
            };
            Ok(Arc::new(provider))
        }
        other => Err(DesignLoopError::Config(format!(
            "Unknown provider '{}' in model reference '{}'",
            other, model
        ))),
    }
}

/// Caches providers by id so generator and judges sharing a vendor share one client.
#[derive(Default)]
pub struct ProviderCache {
    providers: HashMap<String, Arc<dyn ModelProvider>>,
}

impl ProviderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, model: &ModelRef) -> Result<Arc<dyn ModelProvider>, DesignLoopError> {
        if let Some(p) = self.providers.get(&model.provider) {
            return Ok(p.clone());
        }
        let provider = resolve_provider(model)?;
        self.providers
            .insert(model.provider.clone(), provider.clone());
        Ok(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_with(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_resolve_anthropic() {
        let p = resolve_with(
            &ModelRef::new("anthropic", "claude-sonnet-4"),
            env_with(&[("ANTHROPIC_API_KEY", "sk-ant")]),
        )
        .unwrap();
        assert_eq!(p.id(), "anthropic");
        assert!(p.supports_vision());
    }

    #[test]
    fn test_resolve_openai() {
        let p = resolve_with(
            &ModelRef::new("openai", "gpt-4o"),
            env_with(&[("OPENAI_API_KEY", "sk-oa"), ("OPENAI_BASE_URL", "http://x/v1")]),
        )
        .unwrap();
        assert_eq!(p.id(), "openai");
    }

    #[test]
    fn test_missing_key_is_no_provider() {
        let err = resolve_with(&ModelRef::new("anthropic", "m"), env_with(&[]))
            .err()
            .unwrap();
        assert!(matches!(err, DesignLoopError::NoProvider));
    }

    #[test]
    fn test_blank_key_is_no_provider() {
        let err = resolve_with(
            &ModelRef::new("openai", "m"),
            env_with(&[("OPENAI_API_KEY", "  ")]),
        )
        .err()
        .unwrap();
        assert!(matches!(err, DesignLoopError::NoProvider));
    }

    #[test]
    fn test_unknown_provider() {
        let err = resolve_with(&ModelRef::new("mystery", "m"), env_with(&[]))
            .err()
            .unwrap();
        assert!(matches!(err, DesignLoopError::Config(_)));
    }
}
