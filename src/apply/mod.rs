mod log;

pub use log::{format_log, log_filename, write_log};

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::backup;
use crate::device::{Connector, DeviceSession, Target};
use crate::error::ApplyError;

/// Result text recorded in the apply log for a dry-run.
pub const DRY_RUN_RESULT: &str = "DRY_RUN";

/// Everything one run needs, with the template already rendered.
#[derive(Debug, Clone)]
pub struct ApplyRequest {
    pub target: Target,
    pub lines: Vec<String>,
    pub dry_run: bool,
    pub backup: bool,
    pub output_dir: PathBuf,
    /// Unix seconds, shared by the backup and log filenames of this run.
    pub timestamp: i64,
}

#[derive(Debug)]
pub struct ApplyReport {
    pub backup_file: Option<PathBuf>,
    pub log_file: PathBuf,
    pub output: String,
}

/// What happened on the device thread.
struct DeviceOutcome {
    backup_file: Option<PathBuf>,
    transcript: String,
    error: Option<anyhow::Error>,
}

/// Apply the rendered configuration.
///
/// A dry-run only writes the apply log. Otherwise the whole device phase
/// runs on one blocking thread and the log is written afterwards, whether
/// or not the device accepted the change.
pub async fn run<C>(connector: C, request: ApplyRequest) -> Result<ApplyReport>
where
    C: Connector + Send + 'static,
{
    let host = request.target.host.clone();

    if request.dry_run {
        let log_file = write_log(
            &request.output_dir,
            &host,
            request.timestamp,
            &request.lines,
            DRY_RUN_RESULT,
            None,
        )
        .await?;
        return Ok(ApplyReport {
            backup_file: None,
            log_file,
            output: DRY_RUN_RESULT.to_string(),
        });
    }

    tracing::info!("Connecting to {}:{}...", host, request.target.port);
    let device_request = request.clone();
    let outcome = tokio::task::spawn_blocking(move || apply_on_device(&connector, &device_request))
        .await
        .context("Device task failed")?;

    let error_text = outcome.error.as_ref().map(|e| format!("{:#}", e));
    let logged = write_log(
        &request.output_dir,
        &host,
        request.timestamp,
        &request.lines,
        &outcome.transcript,
        error_text.as_deref(),
    )
    .await;

    match (outcome.error, logged) {
        (None, Ok(log_file)) => Ok(ApplyReport {
            backup_file: outcome.backup_file,
            log_file,
            output: outcome.transcript,
        }),
        (None, Err(e)) => {
            Err(e.context("Configuration was committed but the apply log could not be written"))
        }
        (Some(err), logged) => {
            match logged {
                Ok(path) => tracing::info!("Apply log saved to {}", path.display()),
                Err(e) => tracing::error!("{:#}", e),
            }
            Err(err)
        }
    }
}

/// Connect, optionally back up, send, commit, disconnect. Blocking.
fn apply_on_device<C: Connector>(connector: &C, request: &ApplyRequest) -> DeviceOutcome {
    let mut outcome = DeviceOutcome {
        backup_file: None,
        transcript: String::new(),
        error: None,
    };

    let mut session = match connector.connect(&request.target) {
        Ok(session) => session,
        Err(e) => {
            tracing::error!("Failed to connect to {}: {}", request.target.host, e);
            outcome.error = Some(e.into());
            return outcome;
        }
    };

    if let Err(e) = push_config(&mut session, request, &mut outcome) {
        outcome.error = Some(e);
    }
    session.disconnect();
    outcome
}

fn push_config<S: DeviceSession>(
    session: &mut S,
    request: &ApplyRequest,
    outcome: &mut DeviceOutcome,
) -> Result<()> {
    let host = &request.target.host;

    if request.backup {
        tracing::info!("Saving running-config backup...");
        let running = session
            .send_command("show running-config")
            .map_err(|e| ApplyError::Backup(e.to_string()))?;
        let path = backup::save_backup(&request.output_dir, host, request.timestamp, &running)
            .map_err(|e| ApplyError::Backup(format!("{:#}", e)))?;
        outcome.backup_file = Some(path);
    }

    tracing::info!(
        "Entering configuration mode and sending {} config lines...",
        request.lines.len()
    );
    match session.send_config_set(&request.lines) {
        Ok(output) => outcome.transcript.push_str(&output),
        Err(e) => {
            discard_candidate(session, outcome);
            return Err(e.into());
        }
    }

    tracing::info!("Committing configuration...");
    match session.commit() {
        Ok(output) => push_section(&mut outcome.transcript, &output),
        Err(e) => {
            discard_candidate(session, outcome);
            return Err(e.into());
        }
    }

    // The change is live from here on; a failure to leave config mode must
    // not be reported as a failed apply.
    match session.exit_config_mode() {
        Ok(output) => push_section(&mut outcome.transcript, &output),
        Err(e) => {
            tracing::warn!("Configuration committed, but leaving configuration mode failed: {}", e);
            push_section(
                &mut outcome.transcript,
                &format!(
                    "% Warning: configuration committed, but leaving configuration mode failed: {}",
                    e
                ),
            );
        }
    }
    Ok(())
}

/// Abort so a failed change never lingers as an uncommitted candidate.
fn discard_candidate<S: DeviceSession>(session: &mut S, outcome: &mut DeviceOutcome) {
    tracing::warn!("Aborting candidate configuration");
    match session.abort() {
        Ok(output) => push_section(&mut outcome.transcript, &output),
        Err(e) => tracing::warn!("Abort failed: {}", e),
    }
}

fn push_section(transcript: &mut String, output: &str) {
    if output.is_empty() {
        return;
    }
    if !transcript.is_empty() && !transcript.ends_with('\n') {
        transcript.push('\n');
    }
    transcript.push_str(output);
}
