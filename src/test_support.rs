// src/test_support.rs — Shared fixtures for unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::quality::QualityWeights;
use crate::core::types::{
    DesignCandidate, DesignIntent, ModelVerificationResult, QualityScore, ScoredCandidate,
    StrategyKind, VerificationCategories, VerificationResult, VerificationTier,
};
use crate::infra::errors::DesignLoopError;
use crate::provider::{ChatRequest, ChatResponse, ModelProvider, TokenUsage};
use crate::render::{RenderResult, Renderer, Screenshot};
use crate::verifier::Verifier;

/// A scored candidate whose overall score equals `score`.
pub fn scored(score: f64) -> ScoredCandidate {
    scored_with(score, VerificationCategories::uniform(score))
}

/// A scored candidate with explicit categories; overall is derived from them.
pub fn scored_with(score: f64, categories: VerificationCategories) -> ScoredCandidate {
    let candidate = DesignCandidate::new(
        format!(r#"{{"actions":[{{"op":"frame","quality":{}}}]}}"#, score),
        StrategyKind::Initial,
        1,
    );
    let verification = VerificationResult {
        score,
        acceptable: score >= 0.85,
        critique: String::new(),
        categories,
        issues: vec![],
        strengths: vec![],
        suggestions: vec![],
        model_consensus: 1.0,
        confidence: 0.8,
        tier: VerificationTier::Standard,
        model_results: None,
    };
    let quality = QualityScore::from_verification(&verification, &QualityWeights::default());
    ScoredCandidate {
        candidate,
        render: RenderResult::success(Screenshot::new(vec![0u8; 4], 10, 10), 1),
        verification,
        quality,
    }
}

type Script = dyn Fn(&ChatRequest, usize) -> Result<String, DesignLoopError> + Send + Sync;

/// Provider that answers from a closure of (request, call index).
pub struct ScriptedProvider {
    script: Box<Script>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
    connected: bool,
    vision: bool,
}

impl ScriptedProvider {
    pub fn new(
        script: impl Fn(&ChatRequest, usize) -> Result<String, DesignLoopError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            connected: true,
            vision: true,
        }
    }

    pub fn always(content: &str) -> Self {
        let content = content.to_string();
        Self::new(move |_, _| Ok(content.clone()))
    }

    pub fn disconnected(mut self) -> Self {
        self.connected = false;
        self
    }

    pub fn without_vision(mut self) -> Self {
        self.vision = false;
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    fn name(&self) -> &str {
        "Scripted"
    }

    fn supports_vision(&self) -> bool {
        self.vision
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, DesignLoopError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        let result = (self.script)(&request, index);
        self.requests.lock().unwrap().push(request);
        result.map(|content| ChatResponse {
            content,
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
        })
    }
}

/// Verifier returning a fixed verdict.
pub struct FixedVerifier {
    pub name: String,
    pub score: f64,
    pub confidence: f64,
    pub available: bool,
    pub fail: bool,
}

impl FixedVerifier {
    pub fn new(name: &str, score: f64) -> Self {
        Self {
            name: name.to_string(),
            score,
            confidence: 0.8,
            available: true,
            fail: false,
        }
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn result(&self) -> ModelVerificationResult {
        ModelVerificationResult {
            model: self.name.clone(),
            score: self.score,
            confidence: self.confidence,
            critique: format!("{} critique", self.name),
            categories: VerificationCategories::uniform(self.score),
            issues: vec![],
            strengths: vec![],
            suggestions: vec![],
            raw_response: String::new(),
            usage: TokenUsage::default(),
        }
    }
}

#[async_trait]
impl Verifier for FixedVerifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn verify(
        &self,
        _intent: &DesignIntent,
        _screenshot: &Screenshot,
    ) -> Result<ModelVerificationResult, DesignLoopError> {
        if self.fail {
            return Err(DesignLoopError::Provider {
                provider: self.name.clone(),
                message: "judge failed".into(),
                retriable: false,
            });
        }
        Ok(self.result())
    }
}

/// Renderer that "captures" the seed bytes, or fails when `fail` is set.
/// Tracks the peak number of renders in flight at once.
pub struct EchoRenderer {
    pub fail: bool,
    renders: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl EchoRenderer {
    pub fn new() -> Self {
        Self {
            fail: false,
            renders: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn render_count(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Renderer for EchoRenderer {
    async fn render(&self, candidate: &DesignCandidate) -> RenderResult {
        self.renders.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        // Give any other render a chance to start before this one finishes.
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail {
            return RenderResult::failure("surface unavailable", 1);
        }
        RenderResult::success(Screenshot::new(candidate.seed.clone().into_bytes(), 100, 100), 1)
    }
}

/// Generation reply whose single action carries `quality`.
pub fn generation_reply(quality: f64) -> String {
    format!(
        r#"{{"actions":[{{"op":"frame","quality":{}}}],"rationale":"q{}","confidence":0.7}}"#,
        quality, quality
    )
}

/// Verifier that reads the `quality` field back out of an [`EchoRenderer`] screenshot.
pub struct SeedQualityVerifier;

#[async_trait]
impl Verifier for SeedQualityVerifier {
    fn name(&self) -> &str {
        "seed-quality"
    }

    async fn verify(
        &self,
        _intent: &DesignIntent,
        screenshot: &Screenshot,
    ) -> Result<ModelVerificationResult, DesignLoopError> {
        let seed: serde_json::Value = serde_json::from_slice(&screenshot.full)
            .map_err(|e| DesignLoopError::Render(e.to_string()))?;
        let score = seed["actions"][0]["quality"].as_f64().unwrap_or(0.0);
        let mut result = FixedVerifier::new("seed-quality", score).result();
        result.usage = TokenUsage {
            input_tokens: 1000,
            output_tokens: 100,
        };
        Ok(result)
    }
}
