//! Interactive camera session.
//!
//! Keys (each followed by Enter): empty line captures, `d` dismisses the
//! quota alert, `q` quits.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::info;

use snapsage_config::SnapSageConfig;
use snapsage_core::PipelinePhase;
use snapsage_pipeline::PipelineController;

use crate::terminal_output::{note_info, note_warn, render_alert, render_phase, supports_color};
use crate::wiring;

#[derive(Debug, PartialEq, Eq)]
enum Key {
    Capture,
    Dismiss,
    Quit,
    Unknown(String),
}

fn parse_key(line: &str) -> Key {
    match line.trim() {
        "" => Key::Capture,
        "d" | "D" => Key::Dismiss,
        "q" | "Q" => Key::Quit,
        other => Key::Unknown(other.to_string()),
    }
}

/// Enter pressed mid-cycle is answered locally instead of racing a trigger.
fn busy_notice(phase: &PipelinePhase) -> Option<String> {
    phase
        .is_busy()
        .then(|| format!("Still working ({phase}); wait for the result"))
}

pub async fn run(config: &SnapSageConfig) -> Result<()> {
    let camera = config.camera.clone().unwrap_or_default();
    let devices = wiring::media_devices(&camera)?;
    let controller = Arc::new(wiring::build_controller(config, devices)?);

    let events = wiring::spawn_event_logger(&controller);
    let renderer = spawn_renderer(&controller);

    let phase = controller.start().await;
    info!(phase = %phase, engine = controller.engine_name(), "Session started");
    note_info("Enter = capture, d = dismiss alert, q = quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        match parse_key(&line) {
            Key::Capture => {
                if let Some(notice) = busy_notice(&controller.phase()) {
                    note_info(&notice);
                    continue;
                }
                let controller = Arc::clone(&controller);
                tokio::spawn(async move {
                    if let Err(rejected) = controller.trigger().await {
                        note_warn(&rejected.to_string());
                    }
                });
            }
            Key::Dismiss => {
                if !controller.dismiss_quota_alert() {
                    note_info("No alert to dismiss");
                }
            }
            Key::Quit => break,
            Key::Unknown(other) => note_warn(&format!("Unknown key {other:?}")),
        }
    }

    renderer.abort();
    events.abort();
    info!("Session ended");
    Ok(())
}

/// Print each phase change and each raised alert.
fn spawn_renderer(controller: &PipelineController) -> JoinHandle<()> {
    let mut phases = controller.subscribe_phase();
    let mut alerts = controller.subscribe_quota_alert();
    let color = supports_color();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = phases.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let phase = phases.borrow_and_update().clone();
                    println!("{}", render_phase(&phase, color));
                }
                changed = alerts.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if let Some(alert) = alerts.borrow_and_update().clone() {
                        println!("{}", render_alert(&alert, color));
                    }
                }
            }
        }
    })
}
