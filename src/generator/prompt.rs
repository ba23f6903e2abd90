// src/generator/prompt.rs — Prompt construction and seed parsing for generators

use serde::Deserialize;

use crate::core::types::{ActionSpec, DesignIntent, ScoredCandidate, StrategyKind};
use crate::util::{extract_json_block, truncate_str};

const SEED_PREVIEW_CHARS: usize = 1500;

/// Build the system prompt shared by every strategy.
pub fn system_prompt(strategy: StrategyKind, actions: &[ActionSpec]) -> String {
    let mut prompt = String::from(
        "You are a design generator. You produce designs as ordered lists of renderer actions.\n",
    );
    prompt.push_str(match strategy {
        StrategyKind::Initial => "Propose a complete first design for the brief.\n",
        StrategyKind::Refinement => "Improve an existing design without losing what works.\n",
        StrategyKind::Crossover => "Combine the best parts of several parent designs.\n",
        StrategyKind::Mutation => "Apply one focused change to an existing design.\n",
        StrategyKind::Fresh => "Start over with an approach unlike anything tried so far.\n",
        StrategyKind::Diversity => "Deliberately diverge from the designs seen so far.\n",
    });

    if !actions.is_empty() {
        prompt.push_str("\n## Available actions\n");
        for action in actions {
            if action.description.is_empty() {
                prompt.push_str(&format!("- {}\n", action.name));
            } else {
                prompt.push_str(&format!("- {}: {}\n", action.name, action.description));
            }
        }
    }

    prompt.push_str(
        "\nRespond with JSON only:\n\
         {\"actions\": [...], \"rationale\": \"<one sentence>\", \"confidence\": <0.0-1.0>}\n",
    );
    prompt
}

/// Render the intent as a prompt section.
pub fn describe_intent(intent: &DesignIntent) -> String {
    let mut out = format!("## Brief\n{}\n", intent.description);

    let constraints = intent.prioritized_constraints();
    if !constraints.is_empty() {
        out.push_str("\n## Constraints\n");
        for c in constraints {
            let priority = serde_json::to_value(c.priority)
                .ok()
                .and_then(|v| v.as_str().map(String::from))
                .unwrap_or_default();
            out.push_str(&format!("- [{}] {}\n", priority, c.description));
        }
    }

    if !intent.required_elements.is_empty() {
        out.push_str("\n## Required elements\n");
        for el in &intent.required_elements {
            out.push_str(&format!("- {}\n", el));
        }
    }

    if let Some(ref style) = intent.style {
        out.push_str("\n## Style\n");
        if !style.colors.is_empty() {
            out.push_str(&format!("Colors: {}\n", style.colors.join(", ")));
        }
        if let Some(ref t) = style.typography {
            out.push_str(&format!("Typography: {}\n", t));
        }
        if let Some(ref m) = style.mood {
            out.push_str(&format!("Mood: {}\n", m));
        }
        if let Some(ref n) = style.notes {
            out.push_str(&format!("Notes: {}\n", n));
        }
    }
    out
}

/// Summarize a scored candidate for inclusion in a prompt.
pub fn describe_candidate(label: &str, scored: &ScoredCandidate) -> String {
    let cats = &scored.verification.categories;
    let mut out = format!(
        "### {} (score {:.2}, layout {:.2}, fidelity {:.2}, completeness {:.2}, polish {:.2})\n",
        label,
        scored.score(),
        cats.layout,
        cats.fidelity,
        cats.completeness,
        cats.polish,
    );
    if !scored.verification.strengths.is_empty() {
        out.push_str(&format!(
            "Strengths: {}\n",
            scored.verification.strengths.join("; ")
        ));
    }
    let seed = truncate_str(&scored.candidate.seed, SEED_PREVIEW_CHARS);
    out.push_str(&format!("```json\n{}\n```\n", seed));
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedGeneration {
    pub seed: String,
    pub rationale: Option<String>,
    pub confidence: f64,
}

#[derive(Deserialize)]
struct RawGeneration {
    actions: serde_json::Value,
    #[serde(default)]
    rationale: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Parse a generator response. The seed is the serialized `actions` value.
pub fn parse_generation(content: &str) -> Option<ParsedGeneration> {
    let json = extract_json_block(content)?;
    let raw: RawGeneration = serde_json::from_str(json).ok()?;
    if raw.actions.is_null() {
        return None;
    }
    let seed = serde_json::json!({ "actions": raw.actions }).to_string();
    Some(ParsedGeneration {
        seed,
        rationale: raw.rationale.filter(|r| !r.trim().is_empty()),
        confidence: raw.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
    })
}
