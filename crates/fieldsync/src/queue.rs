// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `fieldsync enqueue` and `fieldsync dead`.

use std::process::ExitCode;

use fieldsync_core::{FieldsyncError, ItemId, OperationType, QueueItem, StatusKind};

use crate::app::App;

pub async fn run_enqueue(
    app: &App,
    op_type: OperationType,
    payload: &str,
) -> Result<ExitCode, FieldsyncError> {
    let payload = serde_json::from_str(payload).map_err(|e| FieldsyncError::Validation {
        message: format!("payload is not valid JSON: {e}"),
    })?;
    let item = app.engine.queue.enqueue(op_type, payload).await?;
    println!("{}", item.id);

    // Best effort: a one-shot enqueue sends right away when it can.
    app.engine.session.restore_session().await?;
    if app.engine.network.is_online() {
        let report = app.engine.orchestrator.drain().await?;
        if report.sent > 0 {
            println!("sent {}", report.sent);
        }
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn run_dead_list(app: &App) -> Result<ExitCode, FieldsyncError> {
    let items = app.engine.queue.list(None, Some(StatusKind::Dead)).await?;
    if items.is_empty() {
        println!("no dead items");
        return Ok(ExitCode::SUCCESS);
    }
    for item in &items {
        println!("{}", describe(item));
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn run_dead_retry(app: &App, id: &str) -> Result<ExitCode, FieldsyncError> {
    app.engine.queue.requeue_dead(&ItemId::from(id)).await?;
    println!("requeued {id}");
    Ok(ExitCode::SUCCESS)
}

pub async fn run_dead_discard(app: &App, id: &str) -> Result<ExitCode, FieldsyncError> {
    app.engine.queue.discard_dead(&ItemId::from(id)).await?;
    println!("discarded {id}");
    Ok(ExitCode::SUCCESS)
}

fn describe(item: &QueueItem) -> String {
    format!(
        "{}  {:<13}  attempts={}  {}",
        item.id,
        item.op_type.as_str(),
        item.attempts,
        item.last_error.as_deref().unwrap_or("-")
    )
}
