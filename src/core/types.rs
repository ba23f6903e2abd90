// src/core/types.rs — Core domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::adaptive::{AdaptiveConfig, TemperatureSchedule};
use super::quality::QualityWeights;
use crate::provider::TokenUsage;
use crate::render::{RenderResult, Screenshot};
use crate::verifier::tiered::VerificationConfig;

// ─── Strategy ───────────────────────────────────────────────────

/// The fixed set of generation strategies.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Initial,
    Refinement,
    Crossover,
    Mutation,
    Fresh,
    Diversity,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 6] = [
        StrategyKind::Initial,
        StrategyKind::Refinement,
        StrategyKind::Crossover,
        StrategyKind::Mutation,
        StrategyKind::Fresh,
        StrategyKind::Diversity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Initial => "initial",
            StrategyKind::Refinement => "refinement",
            StrategyKind::Crossover => "crossover",
            StrategyKind::Mutation => "mutation",
            StrategyKind::Fresh => "fresh",
            StrategyKind::Diversity => "diversity",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown strategy '{}'", s))
    }
}

// ─── Intent ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintPriority {
    Required,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignConstraint {
    pub description: String,
    pub priority: ConstraintPriority,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StylePreferences {
    #[serde(default)]
    pub colors: Vec<String>,
    pub typography: Option<String>,
    pub mood: Option<String>,
    pub notes: Option<String>,
}

/// What the user wants. Created once per run, read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignIntent {
    pub description: String,
    #[serde(default)]
    pub constraints: Vec<DesignConstraint>,
    pub style: Option<StylePreferences>,
    #[serde(default)]
    pub required_elements: Vec<String>,
}

impl DesignIntent {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            constraints: Vec::new(),
            style: None,
            required_elements: Vec::new(),
        }
    }

    pub fn with_constraint(
        mut self,
        description: impl Into<String>,
        priority: ConstraintPriority,
    ) -> Self {
        self.constraints.push(DesignConstraint {
            description: description.into(),
            priority,
        });
        self
    }

    pub fn with_required_element(mut self, element: impl Into<String>) -> Self {
        self.required_elements.push(element.into());
        self
    }

    pub fn with_style(mut self, style: StylePreferences) -> Self {
        self.style = Some(style);
        self
    }

    /// Constraints ordered most important first (stable within a priority).
    pub fn prioritized_constraints(&self) -> Vec<&DesignConstraint> {
        let mut sorted: Vec<&DesignConstraint> = self.constraints.iter().collect();
        sorted.sort_by_key(|c| c.priority);
        sorted
    }
}

/// An action the renderer understands and generators may reference in seeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

// ─── Candidates ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateMetadata {
    pub temperature: f64,
    pub confidence: f64,
    #[serde(default)]
    pub parent_scores: Vec<f64>,
    pub rationale: Option<String>,
    /// What the generator was asked to target (weak category, mutation kind, varied dimensions).
    #[serde(default)]
    pub focus: Vec<String>,
}

/// An artifact proposal. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignCandidate {
    pub id: String,
    /// Serialized instructions the renderer interprets.
    pub seed: String,
    pub strategy: StrategyKind,
    pub iteration: u32,
    #[serde(default)]
    pub parent_ids: Vec<String>,
    pub metadata: CandidateMetadata,
    pub created_at: DateTime<Utc>,
}

impl DesignCandidate {
    pub fn new(seed: impl Into<String>, strategy: StrategyKind, iteration: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            seed: seed.into(),
            strategy,
            iteration,
            parent_ids: Vec::new(),
            metadata: CandidateMetadata::default(),
            created_at: Utc::now(),
        }
    }

    pub fn with_parents(mut self, parents: &[&ScoredCandidate]) -> Self {
        self.parent_ids = parents.iter().map(|p| p.candidate.id.clone()).collect();
        self.metadata.parent_scores = parents.iter().map(|p| p.score()).collect();
        self
    }

    pub fn with_metadata(mut self, metadata: CandidateMetadata) -> Self {
        let parent_scores = std::mem::take(&mut self.metadata.parent_scores);
        self.metadata = metadata;
        if self.metadata.parent_scores.is_empty() {
            self.metadata.parent_scores = parent_scores;
        }
        self
    }
}

// ─── Verification ───────────────────────────────────────────────

/// Four bounded category scores, always present together.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VerificationCategories {
    pub layout: f64,
    pub fidelity: f64,
    pub completeness: f64,
    pub polish: f64,
}

impl VerificationCategories {
    pub const NAMES: [&'static str; 4] = ["layout", "fidelity", "completeness", "polish"];

    pub fn new(layout: f64, fidelity: f64, completeness: f64, polish: f64) -> Self {
        Self {
            layout: layout.clamp(0.0, 1.0),
            fidelity: fidelity.clamp(0.0, 1.0),
            completeness: completeness.clamp(0.0, 1.0),
            polish: polish.clamp(0.0, 1.0),
        }
    }

    /// The same score mirrored into every category.
    pub fn uniform(score: f64) -> Self {
        Self::new(score, score, score, score)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "layout" => Some(self.layout),
            "fidelity" => Some(self.fidelity),
            "completeness" => Some(self.completeness),
            "polish" => Some(self.polish),
            _ => None,
        }
    }

    pub fn entries(&self) -> [(&'static str, f64); 4] {
        [
            ("layout", self.layout),
            ("fidelity", self.fidelity),
            ("completeness", self.completeness),
            ("polish", self.polish),
        ]
    }

    /// Lowest-scoring category; ties resolve to the first in declaration order.
    pub fn weakest(&self) -> (&'static str, f64) {
        let entries = self.entries();
        let mut weakest = entries[0];
        for entry in &entries[1..] {
            if entry.1 < weakest.1 {
                weakest = *entry;
            }
        }
        weakest
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Critical,
    Major,
    Minor,
}

impl std::fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueSeverity::Critical => write!(f, "critical"),
            IssueSeverity::Major => write!(f, "major"),
            IssueSeverity::Minor => write!(f, "minor"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationIssue {
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: IssueSeverity,
    pub description: String,
    pub suggestion: Option<String>,
}

/// One judge's raw output for one screenshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelVerificationResult {
    pub model: String,
    pub score: f64,
    pub confidence: f64,
    pub critique: String,
    pub categories: VerificationCategories,
    #[serde(default)]
    pub issues: Vec<VerificationIssue>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    pub raw_response: String,
    #[serde(default)]
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationTier {
    #[default]
    Standard,
    Advanced,
}

impl std::fmt::Display for VerificationTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationTier::Standard => write!(f, "standard"),
            VerificationTier::Advanced => write!(f, "advanced"),
        }
    }
}

/// Per-model line in a fused verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBreakdown {
    pub model: String,
    pub score: f64,
    pub confidence: f64,
    pub weight: f64,
    #[serde(default)]
    pub usage: TokenUsage,
}

/// The fused verdict for one candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub score: f64,
    pub acceptable: bool,
    pub critique: String,
    pub categories: VerificationCategories,
    pub issues: Vec<VerificationIssue>,
    pub strengths: Vec<String>,
    pub suggestions: Vec<String>,
    pub model_consensus: f64,
    pub confidence: f64,
    pub tier: VerificationTier,
    pub model_results: Option<Vec<ModelBreakdown>>,
}

// ─── Scoring ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityComponent {
    pub score: f64,
    pub weight: f64,
    pub confidence: f64,
}

/// Weighted composite over four named components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub visual_fidelity: QualityComponent,
    pub technical_correctness: QualityComponent,
    pub design_principles: QualityComponent,
    pub intent_alignment: QualityComponent,
    pub overall: f64,
    pub improvement_potential: f64,
}

/// A candidate with its render, verdict and composite score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: DesignCandidate,
    pub render: RenderResult,
    pub verification: VerificationResult,
    pub quality: QualityScore,
}

impl ScoredCandidate {
    pub fn score(&self) -> f64 {
        self.quality.overall
    }
}

// ─── Iterations ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IterationMetrics {
    pub generation_ms: u64,
    pub render_ms: u64,
    pub verification_ms: u64,
    pub total_ms: u64,
    pub api_calls: u32,
    pub candidates_generated: usize,
    pub candidates_rendered: usize,
    pub estimated_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TerminationReason {
    MaxIterations,
    Timeout,
    QualityThreshold,
    Converged,
    Error(String),
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationReason::MaxIterations => write!(f, "max iterations reached"),
            TerminationReason::Timeout => write!(f, "timeout"),
            TerminationReason::QualityThreshold => write!(f, "quality threshold met"),
            TerminationReason::Converged => write!(f, "converged"),
            TerminationReason::Error(msg) => write!(f, "Error: {}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyStats {
    pub strategy: StrategyKind,
    pub uses: usize,
    pub mean_iteration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminationDecision {
    pub should_terminate: bool,
    pub reason: Option<TerminationReason>,
    pub confidence: f64,
    pub strategy_breakdown: Vec<StrategyStats>,
}

impl TerminationDecision {
    /// Placeholder stored on a record until the policy has run.
    pub fn pending() -> Self {
        Self {
            should_terminate: false,
            reason: None,
            confidence: 0.0,
            strategy_breakdown: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ConvergenceAnalysis {
    pub converged: bool,
    pub oscillation_detected: bool,
    pub plateau_detected: bool,
    pub rate: f64,
}

/// One loop pass. Append-only history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackIteration {
    pub iteration: u32,
    pub timestamp: DateTime<Utc>,
    pub candidates: Vec<ScoredCandidate>,
    pub best_index: Option<usize>,
    pub termination: TerminationDecision,
    pub metrics: IterationMetrics,
    pub strategies_used: Vec<StrategyKind>,
}

impl FeedbackIteration {
    pub fn best(&self) -> Option<&ScoredCandidate> {
        self.best_index.and_then(|i| self.candidates.get(i))
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best().map(|c| c.score())
    }
}

// ─── Run configuration & result ─────────────────────────────────

/// Configuration for one feedback-loop run.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub max_iterations: u32,
    pub quality_threshold: f64,
    pub candidates_per_iteration: usize,
    pub timeout: Duration,
    pub render_timeout: Duration,
    pub enable_early_stopping: bool,
    pub temperature: TemperatureSchedule,
    pub adaptive: AdaptiveConfig,
    pub quality_weights: QualityWeights,
    pub verification: VerificationConfig,
    pub available_actions: Vec<ActionSpec>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            quality_threshold: 0.85,
            candidates_per_iteration: 4,
            timeout: Duration::from_secs(600),
            render_timeout: Duration::from_secs(30),
            enable_early_stopping: true,
            temperature: TemperatureSchedule::default(),
            adaptive: AdaptiveConfig::default(),
            quality_weights: QualityWeights::default(),
            verification: VerificationConfig::default(),
            available_actions: Vec::new(),
        }
    }
}

impl From<&crate::infra::config::Config> for LoopConfig {
    fn from(cfg: &crate::infra::config::Config) -> Self {
        Self {
            max_iterations: cfg.iteration.max_iterations,
            quality_threshold: cfg.iteration.quality_threshold,
            candidates_per_iteration: cfg.iteration.candidates_per_iteration,
            timeout: Duration::from_secs(cfg.iteration.timeout_seconds),
            render_timeout: Duration::from_secs(cfg.iteration.render_timeout_seconds),
            enable_early_stopping: cfg.iteration.early_stopping,
            temperature: TemperatureSchedule::from(&cfg.temperature),
            adaptive: AdaptiveConfig::from(&cfg.adaptive),
            quality_weights: QualityWeights::from(&cfg.quality),
            verification: VerificationConfig::from(cfg),
            available_actions: cfg.actions.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopAnalytics {
    pub score_progression: Vec<f64>,
    pub strategy_scores: BTreeMap<StrategyKind, f64>,
    pub avg_iteration_ms: f64,
    pub total_cost_usd: f64,
    pub convergence: ConvergenceAnalysis,
    pub strategy_breakdown: Vec<StrategyStats>,
}

/// Final output of a run.
#[derive(Debug, Clone)]
pub struct LoopResult {
    pub success: bool,
    pub final_candidate: ScoredCandidate,
    pub iterations: Vec<FeedbackIteration>,
    pub termination_reason: TerminationReason,
    pub analytics: LoopAnalytics,
    pub duration: Duration,
}

impl LoopResult {
    pub fn screenshot(&self) -> Option<&Screenshot> {
        self.final_candidate.render.screenshot.as_ref()
    }

    pub fn quality(&self) -> &QualityScore {
        &self.final_candidate.quality
    }
}

/// Real-time progress notifications from the feedback loop.
#[derive(Debug, Clone)]
pub enum LoopEvent {
    IterationStart {
        iteration: u32,
        max_iterations: u32,
        temperature: f64,
    },
    CandidatesGenerated {
        iteration: u32,
        count: usize,
        strategies: Vec<(StrategyKind, usize)>,
    },
    CandidateRendered {
        iteration: u32,
        candidate_id: String,
        success: bool,
        error: Option<String>,
    },
    CandidateScored {
        iteration: u32,
        candidate_id: String,
        strategy: StrategyKind,
        score: f64,
    },
    IterationEnd {
        iteration: u32,
        best_score: Option<f64>,
        decision: TerminationDecision,
        cost_so_far: f64,
    },
    Complete {
        iterations: u32,
        final_score: f64,
        reason: TerminationReason,
        cost: f64,
    },
}
