// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `fieldsync status` command implementation.
//!
//! Shows connectivity, the session and queue counts per operation type.
//! `--json` prints the same data for scripting; colors are dropped with
//! `--plain` or when stdout is not a TTY.

use std::io::IsTerminal;
use std::process::ExitCode;

use fieldsync_core::{FieldsyncError, OperationType, StatusKind};
use serde::Serialize;

use crate::app::App;

const STATUSES: [StatusKind; 4] = [
    StatusKind::Pending,
    StatusKind::Sending,
    StatusKind::Error,
    StatusKind::Dead,
];

/// Queue counts for one operation type.
#[derive(Debug, Default, Serialize)]
pub struct TypeCounts {
    pub op_type: &'static str,
    pub pending: u64,
    pub sending: u64,
    pub error: u64,
    pub dead: u64,
}

impl TypeCounts {
    fn set(&mut self, status: StatusKind, count: u64) {
        match status {
            StatusKind::Pending => self.pending = count,
            StatusKind::Sending => self.sending = count,
            StatusKind::Error => self.error = count,
            StatusKind::Dead => self.dead = count,
        }
    }
}

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub online: bool,
    pub user: Option<String>,
    pub queue: Vec<TypeCounts>,
}

impl StatusResponse {
    fn total(&self, status: StatusKind) -> u64 {
        self.queue
            .iter()
            .map(|c| match status {
                StatusKind::Pending => c.pending,
                StatusKind::Sending => c.sending,
                StatusKind::Error => c.error,
                StatusKind::Dead => c.dead,
            })
            .sum()
    }
}

pub async fn run_status(app: &App, json: bool, plain: bool) -> Result<ExitCode, FieldsyncError> {
    let user = app
        .engine
        .session
        .restore_session()
        .await?
        .map(|u| format!("{} ({})", u.display_name, u.id));

    let mut queue = Vec::with_capacity(OperationType::ALL.len());
    for op_type in OperationType::ALL {
        let mut counts = TypeCounts {
            op_type: op_type.as_str(),
            ..TypeCounts::default()
        };
        for status in STATUSES {
            counts.set(status, app.engine.queue.count(op_type, Some(status)).await?);
        }
        queue.push(counts);
    }

    let status = StatusResponse {
        online: app.engine.network.is_online(),
        user,
        queue,
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&status).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_status(&status, use_color);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_status(status: &StatusResponse, use_color: bool) {
    use colored::Colorize;

    println!();
    println!("  fieldsync status");
    println!("  {}", "-".repeat(51));

    let network = match (status.online, use_color) {
        (true, true) => format!("{} {}", "✓".green(), "online".green()),
        (false, true) => format!("{} {}", "✗".yellow(), "offline".yellow()),
        (true, false) => "[OK] online".to_string(),
        (false, false) => "[--] offline".to_string(),
    };
    println!("    Network:  {network}");
    match &status.user {
        Some(user) => println!("    User:     {user}"),
        None if use_color => println!("    User:     {}", "not logged in".red()),
        None => println!("    User:     not logged in"),
    }

    println!();
    println!(
        "    {:<14}{:>9}{:>9}{:>9}{:>9}",
        "type", "pending", "sending", "error", "dead"
    );
    for counts in &status.queue {
        let dead = format!("{:>9}", counts.dead);
        let dead = if use_color && counts.dead > 0 {
            dead.red().to_string()
        } else {
            dead
        };
        println!(
            "    {:<14}{:>9}{:>9}{:>9}{dead}",
            counts.op_type, counts.pending, counts.sending, counts.error
        );
    }

    let dead = status.total(StatusKind::Dead);
    if dead > 0 {
        println!();
        println!("  {dead} dead item(s). Inspect with: fieldsync dead list");
    }
    println!();
}
