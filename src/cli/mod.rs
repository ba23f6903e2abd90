// src/cli/mod.rs — CLI definition (clap derive)

pub mod progress;
pub mod run;
pub mod setup;
pub mod verify;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::core::types::{DesignIntent, VerificationTier};

#[derive(Parser)]
#[command(
    name = "designloop",
    about = "Generate, render and verify designs until one is good enough",
    version
)]
pub struct Cli {
    /// Config file path (default: ~/.designloop/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the feedback loop for a design intent
    Run {
        /// What to design
        #[arg(trailing_var_arg = true)]
        intent: Vec<String>,

        /// Read a full intent (constraints, style, required elements) from JSON
        #[arg(long)]
        intent_file: Option<PathBuf>,

        /// Generator model (provider/model), overrides config
        #[arg(short, long)]
        model: Option<String>,

        /// Max iterations
        #[arg(short, long)]
        iterations: Option<u32>,

        /// Quality threshold to accept (0.0-1.0)
        #[arg(short = 'q', long)]
        quality: Option<f64>,

        /// Candidates generated per iteration
        #[arg(short, long)]
        candidates: Option<usize>,

        /// Verification tier
        #[arg(long, value_parser = parse_tier)]
        tier: Option<VerificationTier>,

        /// Write the winning screenshot here
        #[arg(long)]
        screenshot_out: Option<PathBuf>,

        /// Suppress progress output (only emit the final JSON)
        #[arg(long)]
        quiet: bool,
    },
    /// Score an existing screenshot against an intent
    Verify {
        #[arg(trailing_var_arg = true)]
        intent: Vec<String>,

        #[arg(long)]
        intent_file: Option<PathBuf>,

        /// PNG to score
        #[arg(long)]
        screenshot: PathBuf,

        #[arg(long, value_parser = parse_tier)]
        tier: Option<VerificationTier>,
    },
    /// Print the effective configuration as TOML
    Config,
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        matches!(self.command, Commands::Run { quiet: true, .. })
    }
}

fn parse_tier(s: &str) -> Result<VerificationTier, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "standard" => Ok(VerificationTier::Standard),
        "advanced" => Ok(VerificationTier::Advanced),
        other => Err(format!(
            "unknown tier '{}', expected 'standard' or 'advanced'",
            other
        )),
    }
}

/// Intent from `--intent-file` if given, else the positional words.
pub fn load_intent(words: &[String], file: Option<&std::path::Path>) -> anyhow::Result<DesignIntent> {
    if let Some(path) = file {
        let text = std::fs::read_to_string(path)?;
        let intent: DesignIntent = serde_json::from_str(&text)
            .map_err(|e| anyhow::anyhow!("Invalid intent file {}: {}", path.display(), e))?;
        return Ok(intent);
    }
    let description = words.join(" ");
    if description.trim().is_empty() {
        anyhow::bail!("No intent given. Pass a description or --intent-file.");
    }
    Ok(DesignIntent::new(description.trim()))
}
