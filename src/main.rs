use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cadence_agent::{
    ports_from_config, research_topology, research_workflow, RunOutcome, SharedState,
};
use cadence_core::config::{default_config_path, AppConfig};

/// Turns shown after an aborted run.
const TRANSCRIPT_TAIL: usize = 6;

#[derive(Parser)]
#[command(name = "cadence", version, about = "Think/act research agent")]
struct Cli {
    /// Path to config file (default: ./cadence.toml, then ~/.cadence/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Research a question and print the conclusion
    Run {
        /// Step bound for this run (overrides engine.max_steps)
        #[arg(long, value_parser = parse_max_steps)]
        max_steps: Option<usize>,
        /// The question; read from stdin when omitted
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,
    },
    /// Show current configuration with credentials masked
    Config,
    /// Print the workflow's nodes and edges
    Graph,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cadence=info,warn")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = AppConfig::load_or_env(&path)?;

    match cli.command {
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config.masked())?);
        }
        Commands::Graph => {
            let engine = research_topology(config.engine.stall_warning_steps)?;
            print!("{}", engine.describe());
        }
        Commands::Run { max_steps, prompt } => {
            let mut text = prompt.join(" ");
            if text.trim().is_empty() {
                text = io::stdin()
                    .lock()
                    .lines()
                    .map_while(|l| l.ok())
                    .collect::<Vec<_>>()
                    .join("\n");
            }
            if text.trim().is_empty() {
                anyhow::bail!("no question given");
            }
            return run_once(&config, &text, max_steps.unwrap_or(config.engine.max_steps)).await;
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_once(config: &AppConfig, input: &str, max_steps: usize) -> anyhow::Result<ExitCode> {
    let engine = research_workflow(ports_from_config(config)?, config.engine.stall_warning_steps)?;

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Cancelling run...");
        cancel_clone.cancel();
    });

    match engine
        .run_with_state(SharedState::new(input), max_steps, cancel)
        .await
    {
        RunOutcome::Terminated(done) => {
            println!("{}", done.conclusion());
            eprintln!("[{} steps]", done.step_count);
            Ok(ExitCode::SUCCESS)
        }
        RunOutcome::Aborted(report) => {
            eprintln!(
                "Run aborted after {} steps: {} (last node: {})",
                report.step_count,
                report.reason,
                report.last_node.as_deref().unwrap_or("-")
            );
            let skip = report.transcript.len().saturating_sub(TRANSCRIPT_TAIL);
            for turn in &report.transcript[skip..] {
                eprintln!(
                    "  [{}] {}",
                    turn.origin.as_deref().unwrap_or("human"),
                    truncate(&turn.content, 200)
                );
            }
            if !report.document.is_empty() {
                eprintln!("{}", serde_json::to_string_pretty(&report.document)?);
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

fn parse_max_steps(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn max_steps(args: &[&str]) -> Option<usize> {
        match Cli::try_parse_from(args).unwrap().command {
            Commands::Run { max_steps, .. } => max_steps,
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_zero_max_steps_is_rejected() {
        assert!(Cli::try_parse_from(["cadence", "run", "--max-steps", "0", "q"]).is_err());
        assert!(Cli::try_parse_from(["cadence", "run", "--max-steps", "-3", "q"]).is_err());
    }

    #[test]
    fn test_max_steps_override() {
        assert_eq!(max_steps(&["cadence", "run", "--max-steps", "1", "q"]), Some(1));
        assert_eq!(max_steps(&["cadence", "run", "q"]), None);
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("café", 4), "café");
        assert_eq!(truncate("café au lait", 4), "café...");
    }
}
