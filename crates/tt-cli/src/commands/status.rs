//! Status command for showing the running timer.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tt_core::{Store, TimerStatus, calculate_duration_at, elapsed_seconds, get_status};

use super::util::{entry_label, format_clock};

#[derive(Debug, Serialize)]
struct StatusJson<'a> {
    is_running: bool,
    /// Whole seconds since the timer started.
    elapsed_seconds: Option<i64>,
    /// Whole minutes since the timer started.
    duration: Option<i64>,
    #[serde(flatten)]
    timer: Option<&'a TimerStatus>,
}

pub fn run<W, S>(writer: &mut W, store: &S, json: bool, now: DateTime<Utc>) -> Result<()>
where
    W: Write,
    S: Store + ?Sized,
{
    let status = get_status(store)?;

    if json {
        let report = StatusJson {
            is_running: status.is_some(),
            elapsed_seconds: status
                .as_ref()
                .map(|s| elapsed_seconds(s.entry.started_at, now)),
            duration: status
                .as_ref()
                .map(|s| calculate_duration_at(s.entry.started_at, None, now)),
            timer: status.as_ref(),
        };
        writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
        return Ok(());
    }

    let Some(status) = status else {
        writeln!(writer, "No timer running")?;
        return Ok(());
    };

    let label = entry_label(
        status.client.as_ref(),
        status.project.as_ref(),
        status.task.as_ref(),
    );
    writeln!(writer, "Running: {label}")?;
    if let Some(description) = &status.entry.description {
        writeln!(writer, "Description: {description}")?;
    }
    writeln!(
        writer,
        "Started: {}",
        status
            .entry
            .started_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
    )?;
    writeln!(
        writer,
        "Elapsed: {}",
        format_clock(elapsed_seconds(status.entry.started_at, now))
    )?;
    Ok(())
}
