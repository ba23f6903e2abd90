// src/verifier/judge.rs — Vision-model judge over any provider

use std::sync::Arc;

use async_trait::async_trait;

use super::parser::parse_judge_response;
use super::Verifier;
use crate::core::types::{DesignIntent, ModelVerificationResult};
use crate::generator::prompt::describe_intent;
use crate::infra::errors::DesignLoopError;
use crate::provider::{ChatRequest, ImageAttachment, Message, ModelProvider};
use crate::render::Screenshot;

const JUDGE_TEMPERATURE: f32 = 0.1;
const JUDGE_MAX_TOKENS: u32 = 2000;

const JUDGE_SYSTEM: &str = "You are a strict visual design reviewer. \
You compare a rendered screenshot against the brief it was built for and score it honestly.";

/// A judge backed by a vision-capable chat model.
pub struct LlmJudge {
    name: String,
    model: String,
    provider: Arc<dyn ModelProvider>,
}

impl LlmJudge {
    pub fn new(name: impl Into<String>, provider: Arc<dyn ModelProvider>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            provider,
        }
    }
}

pub fn judge_prompt(intent: &DesignIntent, screenshot: &Screenshot) -> String {
    format!(
        "{}\n## Screenshot\nThe attached image is {}x{} at device pixel ratio {}.\n\n\
         Score each category 0.0-1.0:\n\
         - layout: structure, alignment, spacing\n\
         - fidelity: match with the brief and style\n\
         - completeness: required elements present\n\
         - polish: visual refinement and consistency\n\n\
         Respond with JSON only:\n\
         {{\"score\": 0.0, \"confidence\": 0.0, \
         \"categories\": {{\"layout\": 0.0, \"fidelity\": 0.0, \"completeness\": 0.0, \"polish\": 0.0}}, \
         \"issues\": [{{\"type\": \"...\", \"severity\": \"critical|major|minor\", \"description\": \"...\", \"suggestion\": \"...\"}}], \
         \"strengths\": [\"...\"], \"suggestions\": [\"...\"], \"critique\": \"...\"}}",
        describe_intent(intent),
        screenshot.width,
        screenshot.height,
        screenshot.device_pixel_ratio,
    )
}

#[async_trait]
impl Verifier for LlmJudge {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.provider.is_connected() && self.provider.supports_vision()
    }

    async fn verify(
        &self,
        intent: &DesignIntent,
        screenshot: &Screenshot,
    ) -> Result<ModelVerificationResult, DesignLoopError> {
        let message = Message::user(judge_prompt(intent, screenshot))
            .with_image(ImageAttachment::png(&screenshot.full));

        let response = self
            .provider
            .chat(ChatRequest {
                model: self.model.clone(),
                messages: vec![message],
                max_tokens: Some(JUDGE_MAX_TOKENS),
                temperature: Some(JUDGE_TEMPERATURE),
                system: Some(JUDGE_SYSTEM.to_string()),
            })
            .await?;

        tracing::debug!(
            judge = %self.name,
            tokens = response.usage.total(),
            "Judge responded",
        );
        parse_judge_response(&self.model, &response.content, response.usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedProvider;

    fn screenshot() -> Screenshot {
        Screenshot::new(vec![1, 2, 3], 800, 600)
    }

    #[tokio::test]
    async fn test_sends_image_and_low_temperature() {
        let provider = Arc::new(ScriptedProvider::always(r#"{"score": 0.7}"#));
        let judge = LlmJudge::new("claude", provider.clone(), "claude-sonnet-4");
        let result = judge
            .verify(&DesignIntent::new("A dashboard"), &screenshot())
            .await
            .unwrap();

        assert_eq!(result.model, "claude-sonnet-4");
        assert!((result.score - 0.7).abs() < 1e-9);
        assert_eq!(result.usage.output_tokens, 50);

        let req = &provider.requests()[0];
        assert_eq!(req.model, "claude-sonnet-4");
        assert_eq!(req.temperature, Some(0.1));
        assert_eq!(req.messages[0].images.len(), 1);
        assert_eq!(req.messages[0].images[0].data, "AQID");
        assert!(req.messages[0].content.contains("A dashboard"));
        assert!(req.messages[0].content.contains("800x600"));
    }

    #[test]
    fn test_availability_needs_vision_and_connection() {
        let ok = LlmJudge::new("a", Arc::new(ScriptedProvider::always("")), "m");
        assert!(ok.is_available());
        let blind = LlmJudge::new("b", Arc::new(ScriptedProvider::always("").without_vision()), "m");
        assert!(!blind.is_available());
        let offline = LlmJudge::new("c", Arc::new(ScriptedProvider::always("").disconnected()), "m");
        assert!(!offline.is_available());
    }

    #[tokio::test]
    async fn test_unparseable_response_is_error() {
        let provider = Arc::new(ScriptedProvider::always("I like it."));
        let judge = LlmJudge::new("gpt", provider, "gpt-4o");
        let err = judge
            .verify(&DesignIntent::new("x"), &screenshot())
            .await
            .unwrap_err();
        assert!(matches!(err, DesignLoopError::JudgeParse { .. }));
    }
}
