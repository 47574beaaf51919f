//! Solar Router CLI — entry point.
//!
//! # Commands
//! - `solar-router serve` — runs the HTTP Webhook Bridge + WebSocket Bridge.
//! - `solar-router route` — single-shot stdin/stdout Router invocation (§6).
//! - `solar-router exec-task <file>` — runs one deferred task (§4.9).

mod exec_task;
mod logging;
mod route;
mod serve;
mod setup;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Solar Router — multi-channel AI request gateway.
#[derive(Parser)]
#[command(name = "solar-router", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP Webhook Bridge and WebSocket Bridge.
    Serve {
        /// Enable debug logging.
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Read one JSON request from stdin, write one JSON response to stdout.
    Route {
        /// Enable debug logging.
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Execute one deferred task file (§4.9).
    ExecTask {
        /// Path to the task file.
        task_file: PathBuf,

        /// Command used to invoke the router (defaults to this binary's
        /// own `route` subcommand).
        #[arg(long, default_value = "solar-router route")]
        router_command: String,

        /// Task identifier.
        #[arg(long)]
        task_id: String,

        /// Task title.
        #[arg(long)]
        title: String,

        /// Enable debug logging.
        #[arg(long, default_value_t = false)]
        logs: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Serve { logs } => {
            logging::init(logs);
            serve::run().await?;
            0
        }
        Commands::Route { logs } => {
            logging::init(logs);
            route::run().await?
        }
        Commands::ExecTask {
            task_file,
            router_command,
            task_id,
            title,
            logs,
        } => {
            logging::init(logs);
            exec_task::run(task_file, router_command, task_id, title).await?
        }
    };

    std::process::exit(exit_code);
}
