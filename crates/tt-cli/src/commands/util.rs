//! Shared utilities for CLI commands.

use std::io::IsTerminal;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use tt_core::validation::{validate_client_name, validate_project_name};
use tt_core::{Client, ClientStore, Project, ProjectStore, Task};

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+(minute|hour|day|week)s?\s+ago$").unwrap());

/// Conservative bounds for relative time parsing (~1000 years in minutes).
const MAX_RELATIVE_MINUTES: i64 = 1000 * 365 * 24 * 60;

/// Parse a datetime string as either ISO 8601 or relative time.
///
/// Supports:
/// - ISO 8601: "2026-01-15T10:30:00Z"
/// - Relative: "2 hours ago", "30 minutes ago", "1 day ago", "1 week ago"
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    parse_datetime_at(s, Utc::now())
}

fn parse_datetime_at(s: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let Some(caps) = RELATIVE_TIME_RE.captures(s.trim()) else {
        anyhow::bail!(
            "Invalid datetime: {s}. Use ISO 8601 (e.g., 2026-01-15T10:30:00Z) or relative (e.g., '2 hours ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let (max_for_unit, minutes_per_unit) = match &caps[2] {
        "minute" => (MAX_RELATIVE_MINUTES, 1),
        "hour" => (MAX_RELATIVE_MINUTES / 60, 60),
        "day" => (MAX_RELATIVE_MINUTES / (60 * 24), 60 * 24),
        "week" => (MAX_RELATIVE_MINUTES / (60 * 24 * 7), 60 * 24 * 7),
        unit => anyhow::bail!("Unknown time unit: {unit}"),
    };

    if n > max_for_unit {
        anyhow::bail!("Relative time value too large: {n} {}", &caps[2]);
    }

    Ok(now - Duration::minutes(n * minutes_per_unit))
}

/// Looks up a client by name, failing if it does not exist.
pub fn require_client<S>(store: &S, name: &str) -> Result<Client>
where
    S: ClientStore + ?Sized,
{
    let name = validate_client_name(name)?;
    store
        .find_client_by_name(name)?
        .with_context(|| format!("Client not found: {name}. Add it with 'tt client add {name:?}'."))
}

/// Looks up a project by name within a client, failing if it does not exist.
pub fn require_project<S>(store: &S, client: &Client, name: &str) -> Result<Project>
where
    S: ProjectStore + ?Sized,
{
    let name = validate_project_name(name)?;
    store
        .find_project_by_name(&client.id, name)?
        .with_context(|| format!("Project not found for client {}: {name}", client.name))
}

/// Human label for what an entry is tracked against, e.g. `Acme / Website / Design`.
pub fn entry_label(
    client: Option<&Client>,
    project: Option<&Project>,
    task: Option<&Task>,
) -> String {
    let mut label = client.map_or_else(|| "(unknown client)".to_string(), |c| c.name.clone());
    if let Some(project) = project {
        label.push_str(" / ");
        label.push_str(&project.name);
    }
    if let Some(task) = task {
        label.push_str(" / ");
        label.push_str(&task.name);
    }
    label
}

/// Formats whole seconds as `HH:MM:SS`. Hours are not capped at 24.
pub fn format_clock(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

/// Formats whole minutes as `Xh Ym`, or `Ym` under an hour.
pub fn format_minutes(minutes: i64) -> String {
    let minutes = minutes.max(0);
    let hours = minutes / 60;
    let rest = minutes % 60;
    if hours >= 1 {
        format!("{hours}h {rest}m")
    } else {
        format!("{rest}m")
    }
}

/// Whether a person is on the other end of stdin.
pub fn stdin_is_interactive() -> bool {
    std::io::stdin().is_terminal()
}

/// Asks a yes/no question on the terminal. Any prompt failure reads as "no".
pub fn prompt_confirm(message: &str) -> bool {
    inquire::Confirm::new(message)
        .with_default(false)
        .prompt()
        .unwrap_or(false)
}
