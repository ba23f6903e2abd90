// src/main.rs — designloop entry point

use clap::Parser;

use designloop::cli::run::RunOptions;
use designloop::cli::{self, Cli, Commands};
use designloop::infra::config::Config;
use designloop::infra::logger;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logger::init_logging(logger::level_for(cli.verbose, cli.is_quiet()));

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Falls back to defaults if no config.toml
    let config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Run {
            intent,
            intent_file,
            model,
            iterations,
            quality,
            candidates,
            tier,
            screenshot_out,
            quiet,
        } => {
            let intent = cli::load_intent(&intent, intent_file.as_deref())?;
            let opts = RunOptions {
                model,
                iterations,
                quality,
                candidates,
                tier,
                screenshot_out,
                quiet,
            };
            cli::run::run_loop(intent, &config, opts).await
        }
        Commands::Verify {
            intent,
            intent_file,
            screenshot,
            tier,
        } => {
            let intent = cli::load_intent(&intent, intent_file.as_deref())?;
            cli::verify::run_verify(intent, &screenshot, tier, &config).await
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}
