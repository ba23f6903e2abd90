// src/provider/anthropic.rs — Anthropic Messages API provider (vision-capable)

use async_trait::async_trait;

use super::{ChatRequest, ChatResponse, Message, ModelProvider, Role, TokenUsage};
use crate::infra::errors::DesignLoopError;

const PROVIDER_ID: &str = "anthropic";

pub struct AnthropicProvider {
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self) -> &str {
        "https://api.anthropic.com/v1/messages"
    }

    fn message_content(message: &Message) -> serde_json::Value {
        if message.images.is_empty() {
            return serde_json::json!(message.content);
        }
        let mut blocks: Vec<serde_json::Value> = message
            .images
            .iter()
            .map(|img| {
                serde_json::json!({
                    "type": "image",
                    "source": {
                        "type": "base64",
                        "media_type": img.media_type,
                        "data": img.data,
                    }
                })
            })
            .collect();
        blocks.push(serde_json::json!({ "type": "text", "text": message.content }));
        serde_json::json!(blocks)
    }

    fn build_request_body(&self, request: &ChatRequest) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                serde_json::json!({
                    "role": if m.role == Role::Assistant { "assistant" } else { "user" },
                    "content": Self::message_content(m),
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(4096),
        });

        if let Some(system) = &request.system {
            body["system"] = serde_json::json!(system);
        }

        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        body
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn name(&self) -> &str {
        "Anthropic"
    }

    fn supports_vision(&self) -> bool {
        true
    }

    fn is_connected(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, DesignLoopError> {
        let body = self.build_request_body(&request);

        let response = self
            .client
            .post(self.api_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| DesignLoopError::Provider {
                provider: PROVIDER_ID.into(),
                message: e.to_string(),
                retriable: e.is_timeout() || e.is_connect(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5);
            return Err(DesignLoopError::RateLimited {
                provider: PROVIDER_ID.into(),
                retry_after_ms: retry_after * 1000,
            });
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(DesignLoopError::Provider {
                provider: PROVIDER_ID.into(),
                message: format!("HTTP {}: {}", status, error_body),
                retriable: status.is_server_error(),
            });
        }

        let resp: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| DesignLoopError::Provider {
                    provider: PROVIDER_ID.into(),
                    message: format!("Failed to parse response: {}", e),
                    retriable: false,
                })?;

        Ok(parse_response(&resp))
    }
}

fn parse_response(resp: &serde_json::Value) -> ChatResponse {
    let content = resp["content"]
        .as_array()
        .map(|blocks| {
            blocks
                .iter()
                .filter(|c| c["type"] == "text")
                .filter_map(|c| c["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    let usage = TokenUsage {
        input_tokens: resp["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: resp["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32,
    };

    ChatResponse { content, usage }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ImageAttachment;

    fn provider() -> AnthropicProvider {
        AnthropicProvider::new("sk-test".into())
    }

    #[test]
    fn test_body_text_only() {
        let req = ChatRequest {
            model: "claude-sonnet-4".into(),
            messages: vec![Message::user("hello")],
            max_tokens: Some(100),
            temperature: Some(0.5),
            system: Some("be brief".into()),
        };
        let body = provider().build_request_body(&req);
        assert_eq!(body["model"], "claude-sonnet-4");
        assert_eq!(body["max_tokens"], 100);
        assert_eq!(body["system"], "be brief");
        assert_eq!(body["messages"][0]["content"], "hello");
        assert!((body["temperature"].as_f64().unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_body_with_image_blocks() {
        let req = ChatRequest {
            model: "claude-sonnet-4".into(),
            messages: vec![Message::user("score").with_image(ImageAttachment::png(&[0, 1]))],
            ..Default::default()
        };
        let body = provider().build_request_body(&req);
        let content = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(content[0]["type"], "image");
        assert_eq!(content[0]["source"]["media_type"], "image/png");
        assert_eq!(content[1]["text"], "score");
        assert_eq!(body["max_tokens"], 4096);
    }

    #[test]
    fn test_system_messages_are_filtered() {
        let req = ChatRequest {
            model: "m".into(),
            messages: vec![Message::system("ignored"), Message::user("kept")],
            ..Default::default()
        };
        let body = provider().build_request_body(&req);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_parse_response_joins_text_blocks() {
        let resp = serde_json::json!({
            "content": [
                {"type": "text", "text": "{\"score\":"},
                {"type": "text", "text": " 0.8}"}
            ],
            "usage": {"input_tokens": 1200, "output_tokens": 80}
        });
        let parsed = parse_response(&resp);
        assert_eq!(parsed.content, "{\"score\": 0.8}");
        assert_eq!(parsed.usage.input_tokens, 1200);
        assert_eq!(parsed.usage.output_tokens, 80);
    }

    #[test]
    fn test_connected_requires_key() {
        assert!(provider().is_connected());
        assert!(!AnthropicProvider::new(String::new()).is_connected());
    }
}
