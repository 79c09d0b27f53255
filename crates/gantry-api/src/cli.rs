//! CLI argument definitions and the inline `review` command.

use std::path::Path;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Value;

use gantry_types::run::{RunStatus, StateMap};

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "gantry", version, about = "Step-graph workflow engine")]
pub struct Cli {
    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Step-limit safety valve for run execution
    #[arg(long, env = "GANTRY_MAX_STEPS", default_value_t = 1000, global = true)]
    pub max_steps: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 8700)]
        port: u16,
    },
    /// Run the code-review workflow on a source file, inline
    Review {
        /// Path to the source file to review
        path: std::path::PathBuf,
        /// Print the full run snapshot as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Drive the sample review graph over a file on the calling task and print
/// the outcome.
pub async fn review(state: &AppState, path: &Path, json: bool) -> anyhow::Result<()> {
    let code = tokio::fs::read_to_string(path).await?;

    let mut initial = StateMap::new();
    initial.insert("code".to_string(), Value::String(code));

    let graph = Arc::new(gantry_review::review_graph());
    let run_id = state.engine.create_run(graph, initial).await?;
    let status = state.engine.execute_run(run_id).await?;
    let info = state.engine.get_run_info(run_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let status_label = if status == RunStatus::Completed {
        console::style("completed").green()
    } else {
        console::style("failed").red()
    };

    println!();
    println!(
        "  {} Review of '{}' {} ({} steps logged)",
        console::style("⚙").bold(),
        console::style(path.display()).cyan(),
        status_label,
        info.log.len(),
    );
    println!();

    if let Some(quality) = info.state.get("quality_score").and_then(Value::as_i64) {
        println!("  quality score : {}", console::style(quality).bold());
    }
    if let Some(extracted) = info.state.get("extracted").and_then(Value::as_u64) {
        println!("  functions     : {extracted}");
    }
    if let Some(issues) = info.state.get("issues").and_then(Value::as_array) {
        println!("  issues        : {}", issues.len());
    }
    if let Some(suggestions) = info.state.get("suggestions").and_then(Value::as_array) {
        println!();
        for suggestion in suggestions.iter().filter_map(Value::as_str) {
            println!("  {} {suggestion}", console::style("→").dim());
        }
    }
    if let Some(error) = &info.error {
        println!();
        println!("  {} {error}", console::style("✗").red());
    }
    println!();

    Ok(())
}
