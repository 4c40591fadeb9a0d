// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `fieldsync sync`, `pull` and `run`.
//!
//! `sync` and `pull` are one-shot. `run` probes the backend on an interval,
//! feeds the results to the connectivity gatekeeper and keeps the sync loop
//! going until SIGINT/SIGTERM, then releases whatever the loop had claimed.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use fieldsync_bus::SyncEvent;
use fieldsync_core::FieldsyncError;
use fieldsync_engine::{DrainReport, shutdown};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::app::{App, EXIT_AUTH_REQUIRED};

/// How long the sync loop may take to finish its drain after a signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub async fn run_sync(app: &App) -> Result<ExitCode, FieldsyncError> {
    let engine = &app.engine;
    engine.start().await?;

    let report = engine.orchestrator.drain().await?;
    print_report(&report);
    if report.auth_required {
        eprintln!("login required to send queued items: fieldsync login <id>");
        return Ok(ExitCode::from(EXIT_AUTH_REQUIRED));
    }

    if engine.network.is_online() && engine.session.is_authenticated().await {
        let today = engine.reference.today();
        match engine.reference.pull_route_plan(&today).await {
            Ok(plan) => println!("route plan {today}: {} clients", plan.clients.len()),
            Err(e) => warn!(error = %e, date = %today, "route plan pull failed"),
        }
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn run_pull(app: &App, date: Option<&str>) -> Result<ExitCode, FieldsyncError> {
    let engine = &app.engine;
    engine.session.restore_session().await?;

    let date = date.map_or_else(|| engine.reference.today(), str::to_string);
    let plan = engine.reference.pull_route_plan(&date).await?;
    println!(
        "route plan {date}: {} clients, {} recommendations",
        plan.clients.len(),
        plan.recommendations.len()
    );
    Ok(ExitCode::SUCCESS)
}

/// Runs the sync loop in the foreground until a shutdown signal.
pub async fn run_foreground(app: &App) -> Result<ExitCode, FieldsyncError> {
    let engine = &app.engine;
    let cancel = shutdown::install_signal_handler();

    match engine.start().await? {
        Some(user) => info!(user_id = %user.id, "session restored"),
        None => warn!("not logged in, queued items wait for a login"),
    }

    let probe = app.probe.clone();
    let network = engine.network.clone();
    let interval = app.config.network.probe_interval();
    let probe_cancel = cancel.clone();
    let probe_task = tokio::spawn(async move {
        probe
            .run(interval, probe_cancel, move |online| network.report(online))
            .await;
    });

    let orchestrator = Arc::clone(&engine.orchestrator);
    let loop_cancel = cancel.clone();
    let sync_task = tokio::spawn(async move { orchestrator.run(loop_cancel).await });
    engine.orchestrator.handle().foreground();

    let mut events = engine.bus.subscribe();
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            event = events.recv() => match event {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "event log lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    shutdown::drain_sync_loop(sync_task, &engine.queue, SHUTDOWN_GRACE).await?;
    if let Err(e) = probe_task.await {
        warn!(error = %e, "health probe task failed");
    }
    info!("fieldsync stopped");
    Ok(ExitCode::SUCCESS)
}

fn log_event(event: &SyncEvent) {
    match event {
        SyncEvent::ConnectivityChanged { online } => info!(online, "connectivity changed"),
        SyncEvent::DrainCompleted {
            sent,
            retried,
            dead,
            released,
        } => {
            if sent + retried + dead + released > 0 {
                info!(sent, retried, dead, released, "drain completed");
            }
        }
        SyncEvent::ItemDead { id, op_type, error } => {
            warn!(item_id = %id, %op_type, error = %error, "item moved to dead letters");
        }
        SyncEvent::AuthLost => warn!("credential rejected, log in again to resume sending"),
        SyncEvent::SessionEnded => info!("session ended"),
    }
}

fn print_report(report: &DrainReport) {
    if report.offline {
        println!("offline: nothing sent");
        return;
    }
    println!(
        "sent {}, retrying {}, dead {}, released {}",
        report.sent, report.retried, report.dead, report.released
    );
    for outcome in report
        .outcomes
        .iter()
        .filter(|o| matches!(o.outcome, fieldsync_engine::ItemOutcome::Dead))
    {
        println!("  dead: {} ({})", outcome.id, outcome.op_type);
    }
}
