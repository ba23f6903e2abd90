// src/cli/progress.rs — Terminal progress for loop events

use crate::core::types::LoopEvent;

/// Build a progress callback that writes to stderr, keeping stdout for the result JSON.
pub fn terminal_progress() -> impl Fn(LoopEvent) + Send + Sync + 'static {
    move |event| {
        if let Some(line) = format_event(&event) {
            eprintln!("{}", line);
        }
    }
}

/// One line per event. Successful renders are not reported.
pub fn format_event(event: &LoopEvent) -> Option<String> {
    let line = match event {
        LoopEvent::IterationStart {
            iteration,
            max_iterations,
            temperature,
        } => format!(
            "[iter {}/{}] generating (temperature {:.2})",
            iteration, max_iterations, temperature
        ),
        LoopEvent::CandidatesGenerated {
            iteration,
            count,
            strategies,
        } => {
            let mix: Vec<String> = strategies
                .iter()
                .map(|(s, n)| format!("{}×{}", s, n))
                .collect();
            format!(
                "[iter {}]   {} candidate(s): {}",
                iteration,
                count,
                if mix.is_empty() {
                    "none".to_string()
                } else {
                    mix.join(", ")
                }
            )
        }
        LoopEvent::CandidateRendered {
            iteration,
            candidate_id,
            success: false,
            error,
        } => format!(
            "[iter {}]   render failed {}: {}",
            iteration,
            short_id(candidate_id),
            error.as_deref().unwrap_or("unknown error")
        ),
        LoopEvent::CandidateRendered { .. } => return None,
        LoopEvent::CandidateScored {
            iteration,
            candidate_id,
            strategy,
            score,
        } => format!(
            "[iter {}]   {} ({}) score={:.2}",
            iteration,
            short_id(candidate_id),
            strategy,
            score
        ),
        LoopEvent::IterationEnd {
            iteration,
            best_score,
            decision,
            cost_so_far,
        } => {
            let verdict = match (&decision.reason, decision.should_terminate) {
                (Some(reason), true) => format!("stop: {}", reason),
                _ => "continue".to_string(),
            };
            format!(
                "[iter {}] best={} -> {} (${:.2})",
                iteration,
                best_score.map_or("-".to_string(), |s| format!("{:.2}", s)),
                verdict,
                cost_so_far
            )
        }
        LoopEvent::Complete {
            iterations,
            final_score,
            reason,
            cost,
        } => format!(
            "[done] score={:.2} iterations={} reason={} cost=${:.2}",
            final_score, iterations, reason, cost
        ),
    };
    Some(line)
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
