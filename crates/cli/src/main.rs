//! Handover decision core CLI
//!
//! Replays scenario files offline, inspects confidence thresholds and
//! queries a running handover agent.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{agent, confidence, scenario};

/// Handover decision core CLI
#[derive(Parser)]
#[command(name = "hoctl")]
#[command(author, version, about = "CLI for the Handover Decision Core", long_about = None)]
pub struct Cli {
    /// Agent URL (can also be set via HOCTL_AGENT_URL env var)
    #[arg(long, env = "HOCTL_AGENT_URL", default_value = "http://localhost:8080")]
    pub agent_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay a scenario file through the decision core
    Replay {
        /// Path to the scenario JSON file
        scenario: String,

        /// ONNX model for predictive mode (heuristic classifier if omitted)
        #[arg(long)]
        model: Option<String>,

        /// Expected SHA-256 of the model file
        #[arg(long, requires = "model")]
        model_sha256: Option<String>,

        /// Softmax temperature of the heuristic classifier
        #[arg(long, default_value_t = 0.05)]
        temperature: f64,

        /// Print only the summary
        #[arg(long)]
        summary_only: bool,
    },

    /// Check a scenario file for errors
    Validate {
        /// Path to the scenario JSON file
        scenario: String,
    },

    /// Show the predictor confidence required per service priority
    Confidence {
        /// Single priority (1-10) to show
        #[arg(long, short)]
        priority: Option<u8>,
    },

    /// Query a running agent
    #[command(subcommand)]
    Agent(AgentCommands),
}

#[derive(Subcommand)]
pub enum AgentCommands {
    /// Show component health
    Status,

    /// Show registered cells and UE trackers
    Registry,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            scenario: path,
            model,
            model_sha256,
            temperature,
            summary_only,
        } => {
            let classifier =
                scenario::build_classifier(model.as_deref(), model_sha256.as_deref(), temperature)?;
            scenario::replay_scenario(&path, classifier, summary_only, cli.format).await?;
        }
        Commands::Validate { scenario: path } => {
            scenario::validate_scenario(&path, cli.format)?;
        }
        Commands::Confidence { priority } => {
            confidence::show_thresholds(priority, cli.format)?;
        }
        Commands::Agent(agent_cmd) => {
            let client = client::ApiClient::new(&cli.agent_url)?;
            match agent_cmd {
                AgentCommands::Status => agent::show_status(&client, cli.format).await?,
                AgentCommands::Registry => agent::show_registry(&client, cli.format).await?,
            }
        }
    }

    Ok(())
}
