//! Report command for generating time reports.
//!
//! This module implements `tt report` with various period options
//! (--week, --last-week, --day, --last-day) and output formats (human-readable, JSON).
//! Time is aggregated in whole minutes per client and project.

use std::collections::BTreeMap;
use std::fmt::Write;

use anyhow::Result;
use chrono::{DateTime, Datelike, Local, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use tt_core::calculate_duration_at;
use tt_db::{Database, EntryWithNames};

use super::util::format_minutes;

/// Label used for entries tracked against a client only.
const NO_PROJECT: &str = "(no project)";

/// Report period type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Week,
    LastWeek,
    Day,
    LastDay,
}

/// Period type for JSON output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Week,
    Day,
}

impl From<Period> for PeriodType {
    fn from(period: Period) -> Self {
        match period {
            Period::Week | Period::LastWeek => Self::Week,
            Period::Day | Period::LastDay => Self::Day,
        }
    }
}

/// Minutes tracked against one project of a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectTotal {
    pub project: String,
    pub minutes: i64,
    pub entries: usize,
}

/// Minutes tracked against one client, broken down by project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientTotal {
    pub client: String,
    pub minutes: i64,
    pub projects: Vec<ProjectTotal>,
}

/// Computed report data.
#[derive(Debug)]
pub struct ReportData {
    pub generated_at: DateTime<Utc>,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub period_type: PeriodType,
    pub timezone: String,
    pub clients: Vec<ClientTotal>,
}

impl ReportData {
    pub fn total_minutes(&self) -> i64 {
        self.clients.iter().map(|c| c.minutes).sum()
    }
}

// ========== Period Date Calculation ==========

/// Converts a local date at midnight to UTC.
/// Handles DST ambiguity by picking the earlier time.
fn local_midnight_to_utc(local_date: NaiveDate) -> DateTime<Utc> {
    let resolve = |time: NaiveTime| match Local.from_local_datetime(&local_date.and_time(time)) {
        // Single or ambiguous (DST fall-back): use the earlier time
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Some(dt.with_timezone(&Utc)),
        LocalResult::None => None,
    };
    // A DST spring-forward gap at midnight is rare but possible; 1am then exists.
    resolve(NaiveTime::MIN)
        .or_else(|| NaiveTime::from_hms_opt(1, 0, 0).and_then(resolve))
        .unwrap_or_else(|| local_date.and_time(NaiveTime::MIN).and_utc())
}

/// Monday of the week containing `day`.
fn monday_of(day: NaiveDate) -> NaiveDate {
    day - chrono::Duration::days(i64::from(day.weekday().num_days_from_monday()))
}

/// Calculates week boundaries (Mon 00:00 to next Mon 00:00 local time) as half-open interval.
fn week_boundaries(today: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let monday = monday_of(today);
    let next_monday = monday + chrono::Duration::days(7);
    (local_midnight_to_utc(monday), local_midnight_to_utc(next_monday))
}

/// Calculates last week boundaries (previous Mon 00:00 to this Mon 00:00 local time).
fn last_week_boundaries(today: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let this_monday = monday_of(today);
    let last_monday = this_monday - chrono::Duration::days(7);
    (local_midnight_to_utc(last_monday), local_midnight_to_utc(this_monday))
}

/// Calculates day boundaries (today 00:00 to tomorrow 00:00 local time).
fn day_boundaries(today: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let tomorrow = today + chrono::Duration::days(1);
    (local_midnight_to_utc(today), local_midnight_to_utc(tomorrow))
}

/// Calculates yesterday boundaries (yesterday 00:00 to today 00:00 local time).
fn last_day_boundaries(today: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let yesterday = today - chrono::Duration::days(1);
    (local_midnight_to_utc(yesterday), local_midnight_to_utc(today))
}

/// Get boundaries for a given period, using the provided date as reference.
pub fn get_period_boundaries(period: Period, today: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    match period {
        Period::Week => week_boundaries(today),
        Period::LastWeek => last_week_boundaries(today),
        Period::Day => day_boundaries(today),
        Period::LastDay => last_day_boundaries(today),
    }
}

// ========== Progress Bar ==========

/// Generates a 10-character progress bar.
/// Values <5% of max get a single block for visibility.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn progress_bar(value: i64, max: i64) -> String {
    if max <= 0 {
        return "░░░░░░░░░░".to_string();
    }

    let ratio = value as f64 / max as f64;
    let filled = if ratio < 0.05 && value > 0 {
        1
    } else {
        (ratio * 10.0).round().clamp(0.0, 10.0) as usize
    };

    format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled))
}

// ========== Aggregation ==========

/// Sums whole minutes per client and project.
///
/// Each entry is floored to whole minutes on its own before summing. Running
/// entries count up to `now`. Clients and projects are ordered by name.
pub fn aggregate(entries: &[EntryWithNames], now: DateTime<Utc>) -> Vec<ClientTotal> {
    let mut by_client: BTreeMap<&str, BTreeMap<&str, (i64, usize)>> = BTreeMap::new();
    for item in entries {
        let minutes = calculate_duration_at(item.entry.started_at, item.entry.ended_at, now);
        let project = item.project_name.as_deref().unwrap_or(NO_PROJECT);
        let slot = by_client
            .entry(item.client_name.as_str())
            .or_default()
            .entry(project)
            .or_default();
        slot.0 += minutes;
        slot.1 += 1;
    }

    by_client
        .into_iter()
        .map(|(client, projects)| {
            let projects: Vec<ProjectTotal> = projects
                .into_iter()
                .map(|(project, (minutes, entries))| ProjectTotal {
                    project: project.to_string(),
                    minutes,
                    entries,
                })
                .collect();
            ClientTotal {
                client: client.to_string(),
                minutes: projects.iter().map(|p| p.minutes).sum(),
                projects,
            }
        })
        .collect()
}

// ========== Report Generation ==========

/// Generates report data from the database.
pub fn generate_report_data(
    db: &Database,
    period: Period,
    generated_at: DateTime<Utc>,
) -> Result<ReportData> {
    let today = generated_at.with_timezone(&Local).date_naive();
    let (period_start, period_end) = get_period_boundaries(period, today);
    let timezone = iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string());

    let entries = db.entries_with_names(period_start, period_end)?;
    tracing::debug!(count = entries.len(), "loaded entries for report");

    Ok(ReportData {
        generated_at,
        period_start,
        period_end,
        period_type: period.into(),
        timezone,
        clients: aggregate(&entries, generated_at),
    })
}

/// Formats the period description for the report header.
fn format_period_description(report_data: &ReportData) -> String {
    let start_date = report_data.period_start.with_timezone(&Local).date_naive();

    match report_data.period_type {
        // "Week of Jan 27, 2025"
        PeriodType::Week => format!("Week of {}", start_date.format("%b %-d, %Y")),
        // "Wednesday, Jan 29, 2025"
        PeriodType::Day => format!("{}", start_date.format("%A, %b %-d, %Y")),
    }
}

/// Formats the human-readable report output.
pub fn format_report(data: &ReportData) -> String {
    let mut output = String::new();

    let period_desc = format_period_description(data);
    writeln!(output, "TIME REPORT: {period_desc}").unwrap();

    if data.clients.is_empty() {
        let period_word = match data.period_type {
            PeriodType::Week => "week",
            PeriodType::Day => "day",
        };
        writeln!(output).unwrap();
        writeln!(output, "No time tracked this {period_word}.").unwrap();
        writeln!(output).unwrap();
        writeln!(
            output,
            "Hint: Run 'tt start --client <client> --project <project>' to start tracking."
        )
        .unwrap();
        return output;
    }

    let total = data.total_minutes();
    for client in &data.clients {
        writeln!(output).unwrap();
        writeln!(
            output,
            "{:<32}{:>8}  {}",
            client.client,
            format_minutes(client.minutes),
            progress_bar(client.minutes, total)
        )
        .unwrap();
        for project in &client.projects {
            writeln!(
                output,
                "  {:<30}{:>8}",
                project.project,
                format_minutes(project.minutes)
            )
            .unwrap();
        }
    }

    writeln!(output).unwrap();
    writeln!(output, "SUMMARY").unwrap();
    writeln!(output, "───────").unwrap();
    writeln!(output, "Total tracked:  {}", format_minutes(total)).unwrap();

    output
}

// ========== JSON Output ==========

/// JSON report structure.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub generated_at: String,
    pub timezone: &'a str,
    pub period: JsonPeriod,
    pub clients: &'a [ClientTotal],
    pub total_minutes: i64,
}

#[derive(Debug, Serialize)]
pub struct JsonPeriod {
    pub start: String,
    pub end: String,
    #[serde(rename = "type")]
    pub period_type: PeriodType,
}

/// Formats report data as JSON.
pub fn format_report_json(data: &ReportData) -> Result<String> {
    let local_start = data.period_start.with_timezone(&Local);
    let local_end = data.period_end.with_timezone(&Local);

    // period_end is the first moment of the next period; report the last day inclusive
    let end_date = (local_end.date_naive() - chrono::Duration::days(1))
        .format("%Y-%m-%d")
        .to_string();

    let report = JsonReport {
        generated_at: data.generated_at.to_rfc3339(),
        timezone: &data.timezone,
        period: JsonPeriod {
            start: local_start.date_naive().format("%Y-%m-%d").to_string(),
            end: end_date,
            period_type: data.period_type,
        },
        clients: &data.clients,
        total_minutes: data.total_minutes(),
    };

    Ok(serde_json::to_string_pretty(&report)?)
}

// ========== Public Interface ==========

/// Runs the report command.
pub fn run<W: std::io::Write>(
    writer: &mut W,
    db: &Database,
    period: Period,
    json: bool,
) -> Result<()> {
    let data = generate_report_data(db, period, Utc::now())?;

    if json {
        writeln!(writer, "{}", format_report_json(&data)?)?;
    } else {
        write!(writer, "{}", format_report(&data))?;
    }

    Ok(())
}
