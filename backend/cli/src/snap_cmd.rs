//! One capture cycle over a still image.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use snapsage_config::SnapSageConfig;
use snapsage_core::{DeviceHint, PipelinePhase};
use snapsage_media::StillImageDevices;

use crate::terminal_output::{note_error, render_alert, supports_color};
use crate::wiring;

const EXIT_FAULTED: u8 = 1;
const EXIT_QUOTA: u8 = 2;

pub async fn run(config: &SnapSageConfig, image: &Path) -> Result<ExitCode> {
    let devices = Arc::new(StillImageDevices::new().with_image(DeviceHint::Rear, image));
    let controller = wiring::build_controller(config, devices)?;
    let events = wiring::spawn_event_logger(&controller);

    let code = match controller.start().await {
        PipelinePhase::Faulted(message) => {
            note_error(&message);
            ExitCode::from(EXIT_FAULTED)
        }
        _ => {
            let report = controller.trigger().await?;
            info!(cycle_id = %report.cycle_id, phase = %report.phase, "Snap finished");
            if let Some(alert) = controller.quota_alert() {
                eprintln!("{}", render_alert(&alert, supports_color()));
                ExitCode::from(EXIT_QUOTA)
            } else {
                match report.phase {
                    PipelinePhase::Displaying(text) => {
                        println!("{text}");
                        ExitCode::SUCCESS
                    }
                    PipelinePhase::Faulted(message) => {
                        note_error(&message);
                        ExitCode::from(EXIT_FAULTED)
                    }
                    other => {
                        note_error(&format!("cycle ended in unexpected phase {other}"));
                        ExitCode::from(EXIT_FAULTED)
                    }
                }
            }
        }
    };

    // Let the last events reach the log before the runtime shuts down.
    drop(controller);
    let _ = events.await;
    Ok(code)
}
