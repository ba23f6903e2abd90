// src/render/mod.rs — Renderer contract and per-candidate timeout

pub mod command;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::types::DesignCandidate;

pub use command::CommandRenderer;

/// Captured image of a rendered candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screenshot {
    /// PNG bytes.
    #[serde(skip)]
    pub full: Vec<u8>,
    #[serde(skip)]
    pub thumbnail: Option<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    pub device_pixel_ratio: f64,
}

impl Screenshot {
    pub fn new(full: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            full,
            thumbnail: None,
            width,
            height,
            device_pixel_ratio: 1.0,
        }
    }

    pub fn with_device_pixel_ratio(mut self, ratio: f64) -> Self {
        self.device_pixel_ratio = ratio;
        self
    }
}

/// Outcome of one render: a screenshot, or a typed failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderResult {
    pub screenshot: Option<Screenshot>,
    pub success: bool,
    pub error: Option<String>,
    pub render_time_ms: u64,
}

impl RenderResult {
    pub fn success(screenshot: Screenshot, render_time_ms: u64) -> Self {
        Self {
            screenshot: Some(screenshot),
            success: true,
            error: None,
            render_time_ms,
        }
    }

    pub fn failure(error: impl Into<String>, render_time_ms: u64) -> Self {
        Self {
            screenshot: None,
            success: false,
            error: Some(error.into()),
            render_time_ms,
        }
    }
}

/// Turns a candidate seed into a screenshot.
///
/// Implementations report problems through [`RenderResult::failure`] rather
/// than returning errors, so one bad candidate never aborts a batch.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, candidate: &DesignCandidate) -> RenderResult;
}

/// Render with a time budget. Exceeding it yields a synthetic failure.
pub async fn render_with_timeout(
    renderer: &dyn Renderer,
    candidate: &DesignCandidate,
    budget: Duration,
) -> RenderResult {
    let start = Instant::now();
    match tokio::time::timeout(budget, renderer.render(candidate)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                candidate = %candidate.id,
                budget_ms = budget.as_millis() as u64,
                "Render timed out",
            );
            RenderResult::failure(
                format!("render timed out after {}ms", budget.as_millis()),
                start.elapsed().as_millis() as u64,
            )
        }
    }
}
