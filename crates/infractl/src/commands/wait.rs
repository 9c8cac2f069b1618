//! `infractl wait` - block until an object reaches a target state
//!
//! Wraps the core poller with a spinner driven by progress events and
//! Ctrl-C cancellation.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use infractl_core::{
    Absence, CoreError, ErrorKind, Observation, PollSpec, ProgressCallback, ProgressEvent,
    Request, Result as CoreResult, StateSet, Transport, WaitConfig, poll,
};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cli::{OutputFormat, WaitArgs};
use crate::connection::ConnectionManager;
use crate::error::{CliError, Result as CliResult};
use crate::output::print_output;

/// Handle `infractl wait <path>`
pub async fn handle_wait_command(
    conn_mgr: &ConnectionManager,
    profile_name: Option<&str>,
    args: &WaitArgs,
    output_format: OutputFormat,
) -> CliResult<()> {
    let (transport, resolved) = conn_mgr.create_transport(profile_name)?;
    let config = wait_config(resolved.wait, args);
    let states = StateSet::new(args.pending.iter().cloned(), args.target.iter().cloned())
        .with_failure(args.failure.iter().cloned());
    let absence = if args.absent_ok {
        Absence::Target
    } else {
        Absence::Pending
    };
    debug!(?config, ?states, ?absence, "waiting");

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let token = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                token.cancel();
            }
        })
    };

    let pb = spinner(&args.path);
    let request = Request::get(normalize(&args.path));
    let pointer = status_pointer(&args.status_field);

    let spec = PollSpec::new(args.path.clone(), || refresh(&transport, &request, &pointer))
        .wait_config(config)
        .states(states)
        .absence(absence)
        .cancel_token(cancel)
        .on_progress(progress_callback(pb.clone()));
    let outcome = poll(spec).await;
    ctrl_c.abort();

    match outcome {
        Ok(snapshot) => {
            pb.finish_and_clear();
            print_result(&args.path, snapshot, &pointer, output_format)
        }
        Err(failure) => {
            if let Some(last) = &failure.last_snapshot {
                debug!(last = %last, "last observed snapshot");
            }
            Err(CliError::from(failure.into_error()))
        }
    }
}

/// Profile wait settings with command-line overrides applied
fn wait_config(mut config: WaitConfig, args: &WaitArgs) -> WaitConfig {
    if let Some(timeout) = args.timeout {
        config.timeout = Duration::from_secs(timeout);
    }
    if let Some(interval) = args.interval {
        config.delay = Duration::from_secs(interval);
        config.min_interval = Duration::from_secs(interval);
    }
    if let Some(budget) = args.not_found_budget {
        config.not_found_budget = budget;
    }
    config
}

fn normalize(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// JSON pointer for a dotted field path: `state.phase` -> `/state/phase`
fn status_pointer(field: &str) -> String {
    field
        .split('.')
        .filter(|segment| !segment.is_empty())
        .fold(String::new(), |mut pointer, segment| {
            pointer.push('/');
            pointer.push_str(segment);
            pointer
        })
}

async fn refresh(
    transport: &Transport,
    request: &Request,
    pointer: &str,
) -> CoreResult<Observation<Value>> {
    let body = match transport.execute_json::<Value>(request).await {
        Ok((body, _)) => body,
        Err(e) if e.is_not_found() => return Ok(Observation::NotFound),
        Err(e) => return Err(e),
    };

    let state = body
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            CoreError::fatal(
                ErrorKind::Unknown,
                format!("response has no string status at '{}'", pointer),
            )
        })?;
    Ok(Observation::found(body, state))
}

fn spinner(path: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(format!("Waiting for {}", path));
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn progress_callback(pb: ProgressBar) -> ProgressCallback {
    Box::new(move |event: ProgressEvent| match event {
        ProgressEvent::Started { label } => pb.set_message(format!("Waiting for {}", label)),
        ProgressEvent::Polling { label, state, .. } => {
            pb.set_message(format!("{}: {}", label, format_state(&state)));
        }
        ProgressEvent::NotFound {
            label,
            consecutive,
            budget,
        } => pb.set_message(format!("{}: not found ({}/{})", label, consecutive, budget)),
        ProgressEvent::Converged { label, state } => {
            let state = state.unwrap_or_else(|| "gone".to_string());
            pb.finish_with_message(format!("{}: {}", label, format_state(&state)));
        }
        ProgressEvent::Failed { label, error } => {
            warn!(%label, "wait failed");
            pb.abandon_with_message(format!("{} \u{2717} {}", label, error));
        }
    })
}

/// Format a state for display with a status icon
fn format_state(state: &str) -> String {
    match state.to_lowercase().as_str() {
        "active" | "available" | "running" | "ready" => format!("\u{2713} {}", state),
        "error" | "failed" => format!("\u{2717} {}", state),
        "deleted" | "gone" => format!("\u{2298} {}", state),
        _ => format!("\u{21bb} {}", state),
    }
}

fn print_result(
    path: &str,
    snapshot: Option<Value>,
    pointer: &str,
    output_format: OutputFormat,
) -> CliResult<()> {
    let to_output = |e: anyhow::Error| CliError::OutputError {
        message: e.to_string(),
    };

    match (snapshot, output_format) {
        (Some(snapshot), OutputFormat::Auto) => {
            let state = snapshot
                .pointer(pointer)
                .and_then(Value::as_str)
                .unwrap_or_default();
            println!("{} reached {}", path, state);
            Ok(())
        }
        (None, OutputFormat::Auto) => {
            println!("{} no longer exists", path);
            Ok(())
        }
        (Some(snapshot), format) => print_output(snapshot, format).map_err(to_output),
        (None, format) => print_output(json!({"path": path, "absent": true}), format).map_err(to_output),
    }
}
