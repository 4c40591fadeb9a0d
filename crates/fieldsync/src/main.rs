// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fieldsync - offline-first sync client for field representatives.
//!
//! This is the binary entry point. Each subcommand opens the local store,
//! wires the engine against the configured backend and runs one operation;
//! `run` keeps the sync loop alive until interrupted.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod app;
mod auth;
mod queue;
mod run;
mod status;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use fieldsync_core::OperationType;

use crate::app::{App, EXIT_AUTH_REQUIRED};

/// Fieldsync - offline-first sync client for field representatives.
#[derive(Parser, Debug)]
#[command(name = "fieldsync", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and keep the session on this device.
    Login {
        /// Advisor id (6 to 10 characters).
        id: String,
        /// Do not persist the session across restarts.
        #[arg(long)]
        no_remember: bool,
    },
    /// End the session and forget the stored credential.
    Logout,
    /// Show the logged-in user.
    Whoami,
    /// Record a field mutation in the offline queue.
    Enqueue {
        /// feedback, inventory, stockout or visit_closure.
        #[arg(value_parser = parse_op_type)]
        op_type: OperationType,
        /// JSON object payload.
        payload: String,
    },
    /// Show queue counts per operation type and status.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Drain the queue once, then pull today's route plan.
    Sync,
    /// Pull the route plan for a day.
    Pull {
        /// Day to pull, `YYYY-MM-DD`. Defaults to today.
        #[arg(long)]
        date: Option<String>,
    },
    /// Inspect and resolve dead items.
    Dead {
        #[command(subcommand)]
        action: DeadCommands,
    },
    /// Keep syncing in the foreground until interrupted.
    Run,
}

#[derive(Subcommand, Debug)]
enum DeadCommands {
    /// List dead items.
    List,
    /// Put a dead item back in the queue.
    Retry { id: String },
    /// Delete a dead item.
    Discard { id: String },
}

fn parse_op_type(value: &str) -> Result<OperationType, String> {
    value.parse().map_err(|_| {
        let valid: Vec<&str> = OperationType::ALL.iter().map(|op| op.as_str()).collect();
        format!("unknown operation type `{value}` (expected one of: {})", valid.join(", "))
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match fieldsync_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            fieldsync_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };
    app::init_tracing(&config.client.log_level);

    let Some(command) = cli.command else {
        println!("fieldsync: use --help for available commands");
        return ExitCode::SUCCESS;
    };

    let app = match App::open(config).await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("error: startup failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match command {
        Commands::Login { id, no_remember } => auth::run_login(&app, &id, !no_remember).await,
        Commands::Logout => auth::run_logout(&app).await,
        Commands::Whoami => auth::run_whoami(&app).await,
        Commands::Enqueue { op_type, payload } => {
            queue::run_enqueue(&app, op_type, &payload).await
        }
        Commands::Status { json, plain } => status::run_status(&app, json, plain).await,
        Commands::Sync => run::run_sync(&app).await,
        Commands::Pull { date } => run::run_pull(&app, date.as_deref()).await,
        Commands::Dead { action } => match action {
            DeadCommands::List => queue::run_dead_list(&app).await,
            DeadCommands::Retry { id } => queue::run_dead_retry(&app, &id).await,
            DeadCommands::Discard { id } => queue::run_dead_discard(&app, &id).await,
        },
        Commands::Run => run::run_foreground(&app).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            if e.requires_login() {
                eprintln!("  log in with: fieldsync login <id>");
                return ExitCode::from(EXIT_AUTH_REQUIRED);
            }
            ExitCode::FAILURE
        }
    }
}
