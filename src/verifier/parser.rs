// src/verifier/parser.rs — Parse judge responses into structured verdicts

use serde::Deserialize;

use crate::core::types::{
    IssueSeverity, ModelVerificationResult, VerificationCategories, VerificationIssue,
};
use crate::infra::errors::DesignLoopError;
use crate::provider::TokenUsage;
use crate::util::{extract_json_block, truncate_str};

const DEFAULT_CONFIDENCE: f64 = 0.5;
const FALLBACK_CRITIQUE_CHARS: usize = 2000;

#[derive(Deserialize, Default)]
struct RawCategories {
    layout: Option<f64>,
    fidelity: Option<f64>,
    completeness: Option<f64>,
    polish: Option<f64>,
}

#[derive(Deserialize)]
struct RawIssue {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    description: String,
    suggestion: Option<String>,
}

#[derive(Deserialize)]
struct RawVerdict {
    score: Option<f64>,
    confidence: Option<f64>,
    #[serde(default)]
    categories: Option<RawCategories>,
    #[serde(default)]
    issues: Vec<RawIssue>,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    suggestions: Vec<String>,
    #[serde(default)]
    critique: Option<String>,
}

/// Parse a judge response.
///
/// Expected shape:
/// ```text
/// {"score": 0.8, "confidence": 0.9,
///  "categories": {"layout": .., "fidelity": .., "completeness": .., "polish": ..},
///  "issues": [{"type": "..", "severity": "major", "description": "..", "suggestion": ".."}],
///  "strengths": [..], "suggestions": [..], "critique": ".."}
/// ```
/// Without that shape, falls back to "score: 0.8" or "8/10" in the text and
/// mirrors the score into every category.
pub fn parse_judge_response(
    model: &str,
    raw: &str,
    usage: TokenUsage,
) -> Result<ModelVerificationResult, DesignLoopError> {
    if let Some(result) = parse_json_verdict(model, raw, &usage) {
        return Ok(result);
    }

    let score = find_labeled_score(raw)
        .or_else(|| find_out_of_ten(raw))
        .map(normalize_score)
        .ok_or_else(|| DesignLoopError::JudgeParse {
            model: model.to_string(),
            message: "no score found in response".into(),
        })?;

    tracing::debug!(model, score, "Judge response parsed with text fallback");
    Ok(ModelVerificationResult {
        model: model.to_string(),
        score,
        confidence: DEFAULT_CONFIDENCE,
        critique: truncate_str(raw.trim(), FALLBACK_CRITIQUE_CHARS).to_string(),
        categories: VerificationCategories::uniform(score),
        issues: Vec::new(),
        strengths: Vec::new(),
        suggestions: Vec::new(),
        raw_response: raw.to_string(),
        usage,
    })
}

fn parse_json_verdict(
    model: &str,
    raw: &str,
    usage: &TokenUsage,
) -> Option<ModelVerificationResult> {
    let json = extract_json_block(raw)?;
    let verdict: RawVerdict = serde_json::from_str(json).ok()?;
    let score = normalize_score(verdict.score?);

    let cats = verdict.categories.unwrap_or_default();
    let cat = |v: Option<f64>| v.map(normalize_score).unwrap_or(score);
    let categories = VerificationCategories::new(
        cat(cats.layout),
        cat(cats.fidelity),
        cat(cats.completeness),
        cat(cats.polish),
    );

    let issues = verdict
        .issues
        .into_iter()
        .filter(|i| !i.description.trim().is_empty())
        .map(|i| VerificationIssue {
            kind: if i.kind.is_empty() {
                "general".into()
            } else {
                i.kind
            },
            severity: parse_severity(&i.severity),
            description: i.description,
            suggestion: i.suggestion.filter(|s| !s.trim().is_empty()),
        })
        .collect();

    Some(ModelVerificationResult {
        model: model.to_string(),
        score,
        confidence: verdict
            .confidence
            .unwrap_or(DEFAULT_CONFIDENCE)
            .clamp(0.0, 1.0),
        critique: verdict.critique.unwrap_or_default(),
        categories,
        issues,
        strengths: verdict.strengths,
        suggestions: verdict.suggestions,
        raw_response: raw.to_string(),
        usage: usage.clone(),
    })
}

fn parse_severity(s: &str) -> IssueSeverity {
    match s.trim().to_ascii_lowercase().as_str() {
        "critical" | "blocker" => IssueSeverity::Critical,
        "major" | "important" => IssueSeverity::Major,
        _ => IssueSeverity::Minor,
    }
}

/// Numbers above 1 are read as out of ten. Result clamped to [0, 1].
pub fn normalize_score(value: f64) -> f64 {
    let v = if value > 1.0 { value / 10.0 } else { value };
    v.clamp(0.0, 1.0)
}

/// Leading decimal number in `s`, e.g. "0.85 overall" -> 0.85.
fn leading_number(s: &str) -> Option<f64> {
    let end = s
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s[..end].trim_end_matches('.').parse().ok()
}

/// "score: 0.8", "Score = 7.5", "overall score 8".
fn find_labeled_score(text: &str) -> Option<f64> {
    let lower = text.to_ascii_lowercase();
    let mut from = 0;
    while let Some(pos) = lower[from..].find("score") {
        let after = &lower[from + pos + "score".len()..];
        let rest = after.trim_start_matches(|c: char| c == ':' || c == '=' || c.is_whitespace());
        if let Some(n) = leading_number(rest) {
            return Some(n);
        }
        from += pos + "score".len();
    }
    None
}

/// "8/10", "7.5 / 10".
fn find_out_of_ten(text: &str) -> Option<f64> {
    let mut from = 0;
    while let Some(pos) = text[from..].find('/') {
        let slash = from + pos;
        let after = text[slash + 1..].trim_start();
        let is_ten = after.starts_with("10")
            && !after[2..].starts_with(|c: char| c.is_ascii_digit());
        if is_ten {
            let before = text[..slash].trim_end();
            let start = before
                .char_indices()
                .rev()
                .take_while(|(_, c)| c.is_ascii_digit() || *c == '.')
                .last()
                .map(|(i, _)| i);
            if let Some(start) = start {
                if let Ok(n) = before[start..].parse::<f64>() {
                    return Some(n);
                }
            }
        }
        from = slash + 1;
    }
    None
}
