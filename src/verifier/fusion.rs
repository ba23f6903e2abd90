// src/verifier/fusion.rs — Weighted fusion and consensus over judge verdicts

use std::collections::HashSet;

use crate::core::stats;
use crate::core::types::{
    ModelBreakdown, ModelVerificationResult, VerificationCategories, VerificationIssue,
    VerificationResult, VerificationTier,
};

/// Rescale weights to sum to 1. Non-positive totals fall back to equal weights.
pub fn normalize_weights(weights: &[f64]) -> Vec<f64> {
    let clean: Vec<f64> = weights.iter().map(|w| w.max(0.0)).collect();
    let total: f64 = clean.iter().sum();
    if total <= 0.0 {
        let n = weights.len().max(1) as f64;
        return vec![1.0 / n; weights.len()];
    }
    clean.iter().map(|w| w / total).collect()
}

/// Agreement among judges: max(0, 1 − 2σ) over the raw scores.
pub fn consensus(scores: &[f64]) -> f64 {
    (1.0 - 2.0 * stats::std_dev(scores)).max(0.0)
}

/// Verdict from a single judge. Consensus is 1 by definition; the breakdown
/// holds the one judge at full weight so its usage can still be priced.
pub fn single(result: &ModelVerificationResult, acceptance_threshold: f64) -> VerificationResult {
    VerificationResult {
        score: result.score,
        acceptable: result.score >= acceptance_threshold,
        critique: result.critique.clone(),
        categories: result.categories,
        issues: sort_issues(dedup_issues(&[result])),
        strengths: result.strengths.clone(),
        suggestions: result.suggestions.clone(),
        model_consensus: 1.0,
        confidence: result.confidence,
        tier: VerificationTier::Standard,
        model_results: Some(vec![ModelBreakdown {
            model: result.model.clone(),
            score: result.score,
            confidence: result.confidence,
            weight: 1.0,
            usage: result.usage.clone(),
        }]),
    }
}

/// Fuse several judges' verdicts with the given (unnormalized) weights.
///
/// `results` must be non-empty; callers drop failed judges beforehand.
pub fn fuse(
    results: &[(ModelVerificationResult, f64)],
    acceptance_threshold: f64,
    consensus_threshold: f64,
) -> VerificationResult {
    let raw_weights: Vec<f64> = results.iter().map(|(_, w)| *w).collect();
    let weights = normalize_weights(&raw_weights);
    let verdicts: Vec<&ModelVerificationResult> = results.iter().map(|(r, _)| r).collect();
    let scores: Vec<f64> = verdicts.iter().map(|r| r.score).collect();

    let fused_score: f64 = scores.iter().zip(&weights).map(|(s, w)| s * w).sum();
    let weighted_confidence: f64 = verdicts
        .iter()
        .zip(&weights)
        .map(|(r, w)| r.confidence * w)
        .sum();
    let agreement = consensus(&scores);
    let confidence = weighted_confidence * (0.5 + 0.5 * agreement);

    let categories = mean_categories(&verdicts);

    let breakdown: Vec<ModelBreakdown> = verdicts
        .iter()
        .zip(&weights)
        .map(|(r, w)| ModelBreakdown {
            model: r.model.clone(),
            score: r.score,
            confidence: r.confidence,
            weight: *w,
            usage: r.usage.clone(),
        })
        .collect();

    VerificationResult {
        score: fused_score,
        acceptable: fused_score >= acceptance_threshold && agreement >= consensus_threshold,
        critique: synthesize_critique(fused_score, agreement, &breakdown, &verdicts),
        categories,
        issues: sort_issues(dedup_issues(&verdicts)),
        strengths: union_in_order(verdicts.iter().map(|r| r.strengths.as_slice())),
        suggestions: union_in_order(verdicts.iter().map(|r| r.suggestions.as_slice())),
        model_consensus: agreement,
        confidence,
        tier: VerificationTier::Advanced,
        model_results: Some(breakdown),
    }
}

fn mean_categories(verdicts: &[&ModelVerificationResult]) -> VerificationCategories {
    let pick = |f: fn(&VerificationCategories) -> f64| {
        let values: Vec<f64> = verdicts.iter().map(|r| f(&r.categories)).collect();
        stats::mean(&values)
    };
    VerificationCategories::new(
        pick(|c| c.layout),
        pick(|c| c.fidelity),
        pick(|c| c.completeness),
        pick(|c| c.polish),
    )
}

fn normalize_description(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .trim_end_matches('.')
        .to_string()
}

/// Union of issues, keeping the first occurrence of each (type, description) key.
pub fn dedup_issues(verdicts: &[&ModelVerificationResult]) -> Vec<VerificationIssue> {
    let mut seen = HashSet::new();
    let mut issues = Vec::new();
    for r in verdicts {
        for issue in &r.issues {
            let key = (
                issue.kind.to_lowercase(),
                normalize_description(&issue.description),
            );
            if seen.insert(key) {
                issues.push(issue.clone());
            }
        }
    }
    issues
}

/// Critical first, then major, then minor. Stable within a severity.
pub fn sort_issues(mut issues: Vec<VerificationIssue>) -> Vec<VerificationIssue> {
    issues.sort_by_key(|i| i.severity);
    issues
}

fn union_in_order<'a>(lists: impl Iterator<Item = &'a [String]>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for list in lists {
        for item in list {
            if seen.insert(item.trim().to_lowercase()) {
                out.push(item.clone());
            }
        }
    }
    out
}

fn synthesize_critique(
    score: f64,
    agreement: f64,
    breakdown: &[ModelBreakdown],
    verdicts: &[&ModelVerificationResult],
) -> String {
    let mut out = format!(
        "Fused score: {:.2} (consensus {:.0}%)\n\n| Model | Score | Weight |\n|---|---|---|\n",
        score,
        agreement * 100.0
    );
    for b in breakdown {
        out.push_str(&format!("| {} | {:.2} | {:.2} |\n", b.model, b.score, b.weight));
    }
    if let Some(first) = verdicts.first() {
        if !first.critique.trim().is_empty() {
            out.push('\n');
            out.push_str(first.critique.trim());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::IssueSeverity;
    use crate::provider::TokenUsage;

    fn verdict(model: &str, score: f64, confidence: f64) -> ModelVerificationResult {
        ModelVerificationResult {
            model: model.into(),
            score,
            confidence,
            critique: format!("{} says hi", model),
            categories: VerificationCategories::uniform(score),
            issues: vec![],
            strengths: vec![],
            suggestions: vec![],
            raw_response: String::new(),
            usage: TokenUsage::default(),
        }
    }

    fn issue(kind: &str, severity: IssueSeverity, description: &str) -> VerificationIssue {
        VerificationIssue {
            kind: kind.into(),
            severity,
            description: description.into(),
            suggestion: None,
        }
    }

    // ─── Weights & consensus ────────────────────────────────────

    #[test]
    fn test_normalize_weights() {
        assert_eq!(normalize_weights(&[1.0, 3.0]), vec![0.25, 0.75]);
        assert_eq!(normalize_weights(&[0.0, 0.0]), vec![0.5, 0.5]);
        assert!(normalize_weights(&[]).is_empty());
    }

    #[test]
    fn test_consensus_identical_scores() {
        assert!((consensus(&[0.7, 0.7, 0.7]) - 1.0).abs() < 1e-9);
        assert_eq!(consensus(&[0.5]), 1.0);
    }

    #[test]
    fn test_consensus_bounded() {
        assert_eq!(consensus(&[0.0, 1.0]), 0.0);
        let c = consensus(&[0.9, 0.5]);
        assert!((c - 0.6).abs() < 1e-9);
        for scores in [[0.1, 0.2, 0.9], [0.3, 0.3, 0.31], [0.0, 0.5, 1.0]] {
            let c = consensus(&scores);
            assert!((0.0..=1.0).contains(&c));
        }
    }

    // ─── Fusion ─────────────────────────────────────────────────

    #[test]
    fn test_disagreeing_judges_not_acceptable() {
        let r = fuse(
            &[(verdict("a", 0.9, 0.8), 1.0), (verdict("b", 0.5, 0.8), 1.0)],
            0.6,
            0.9,
        );
        assert!((r.score - 0.7).abs() < 1e-9);
        assert!((r.model_consensus - 0.6).abs() < 1e-9);
        assert!(!r.acceptable);
        // 0.8 · (0.5 + 0.5 · 0.6)
        assert!((r.confidence - 0.64).abs() < 1e-9);
        assert_eq!(r.tier, VerificationTier::Advanced);
    }

    #[test]
    fn test_fused_score_within_range() {
        let inputs = vec![
            (verdict("a", 0.2, 0.5), 0.1),
            (verdict("b", 0.8, 0.9), 5.0),
            (verdict("c", 0.6, 0.7), 2.0),
        ];
        let r = fuse(&inputs, 0.85, 0.7);
        assert!(r.score >= 0.2 && r.score <= 0.8);
        let weights: f64 = r.model_results.unwrap().iter().map(|b| b.weight).sum();
        assert!((weights - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_agreeing_judges_acceptable() {
        let r = fuse(
            &[(verdict("a", 0.9, 0.9), 2.0), (verdict("b", 0.9, 0.7), 1.0)],
            0.85,
            0.7,
        );
        assert!(r.acceptable);
        assert_eq!(r.model_consensus, 1.0);
    }

    #[test]
    fn test_mean_categories() {
        let mut a = verdict("a", 0.6, 0.8);
        a.categories = VerificationCategories::new(0.2, 0.4, 0.6, 0.8);
        let mut b = verdict("b", 0.6, 0.8);
        b.categories = VerificationCategories::new(0.4, 0.6, 0.8, 1.0);
        let r = fuse(&[(a, 1.0), (b, 3.0)], 0.85, 0.7);
        assert!((r.categories.layout - 0.3).abs() < 1e-9);
        assert!((r.categories.polish - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_critique_table_and_narrative() {
        let r = fuse(
            &[(verdict("alpha", 0.8, 0.8), 1.0), (verdict("beta", 0.6, 0.8), 1.0)],
            0.85,
            0.7,
        );
        assert!(r.critique.starts_with("Fused score: 0.70"));
        assert!(r.critique.contains("| alpha | 0.80 | 0.50 |"));
        assert!(r.critique.ends_with("alpha says hi"));
    }

    // ─── Aggregation ────────────────────────────────────────────

    #[test]
    fn test_issue_dedup_and_order() {
        let mut a = verdict("a", 0.5, 0.5);
        a.issues = vec![
            issue("spacing", IssueSeverity::Minor, "Tight header"),
            issue("contrast", IssueSeverity::Major, "Low contrast CTA"),
        ];
        let mut b = verdict("b", 0.5, 0.5);
        b.issues = vec![
            issue("contrast", IssueSeverity::Major, "low  contrast cta."),
            issue("missing", IssueSeverity::Critical, "No footer"),
        ];
        let r = fuse(&[(a, 1.0), (b, 1.0)], 0.85, 0.7);
        let kinds: Vec<&str> = r.issues.iter().map(|i| i.kind.as_str()).collect();
        assert_eq!(kinds, vec!["missing", "contrast", "spacing"]);
    }

    #[test]
    fn test_strengths_union_in_order() {
        let mut a = verdict("a", 0.5, 0.5);
        a.strengths = vec!["Clean grid".into(), "Good type".into()];
        let mut b = verdict("b", 0.5, 0.5);
        b.strengths = vec!["clean grid".into(), "Nice palette".into()];
        let r = fuse(&[(a, 1.0), (b, 1.0)], 0.85, 0.7);
        assert_eq!(r.strengths, vec!["Clean grid", "Good type", "Nice palette"]);
    }

    // ─── Single judge ───────────────────────────────────────────

    #[test]
    fn test_single_passthrough() {
        let v = verdict("solo", 0.86, 0.7);
        let r = single(&v, 0.85);
        assert_eq!(r.score, 0.86);
        assert_eq!(r.model_consensus, 1.0);
        assert_eq!(r.confidence, 0.7);
        assert!(r.acceptable);
        assert_eq!(r.tier, VerificationTier::Standard);
        let breakdown = r.model_results.unwrap();
        assert_eq!(breakdown.len(), 1);
        assert_eq!(breakdown[0].model, "solo");
        assert_eq!(breakdown[0].weight, 1.0);
    }
}
