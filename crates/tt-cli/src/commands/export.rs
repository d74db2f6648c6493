//! Export command for writing time entries as CSV or JSON.
//!
//! CSV output follows RFC 4180: fields containing a comma, quote or line
//! break are wrapped in double quotes and embedded quotes are doubled.

use std::io::Write;

use anyhow::{Result, bail};
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::Serialize;
use tt_core::calculate_duration_at;
use tt_db::{Database, EntryWithNames};

use crate::cli::ExportFormat;

const CSV_HEADER: [&str; 8] = [
    "id",
    "client",
    "project",
    "task",
    "description",
    "started_at",
    "ended_at",
    "duration_minutes",
];

/// One exported time entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    pub id: String,
    pub client: String,
    pub project: Option<String>,
    pub task: Option<String>,
    pub description: Option<String>,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub duration_minutes: i64,
}

impl ExportRow {
    fn from_entry(item: EntryWithNames, now: DateTime<Utc>) -> Self {
        let entry = item.entry;
        Self {
            id: entry.id.to_string(),
            client: item.client_name,
            project: item.project_name,
            task: item.task_name,
            duration_minutes: calculate_duration_at(entry.started_at, entry.ended_at, now),
            description: entry.description,
            started_at: entry.started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            ended_at: entry
                .ended_at
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }

    fn csv_fields(&self) -> [String; 8] {
        [
            self.id.clone(),
            self.client.clone(),
            self.project.clone().unwrap_or_default(),
            self.task.clone().unwrap_or_default(),
            self.description.clone().unwrap_or_default(),
            self.started_at.clone(),
            self.ended_at.clone().unwrap_or_default(),
            self.duration_minutes.to_string(),
        ]
    }
}

/// Quotes a CSV field when it contains a delimiter, quote or line break.
pub fn escape_csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn csv_line<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|f| escape_csv_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Writes rows as CSV with a header line. Lines end in CRLF.
pub fn write_csv<W: Write>(writer: &mut W, rows: &[ExportRow]) -> Result<()> {
    write!(writer, "{}\r\n", csv_line(&CSV_HEADER))?;
    for row in rows {
        write!(writer, "{}\r\n", csv_line(&row.csv_fields()))?;
    }
    Ok(())
}

/// Loads entries started in `[from, to)` as export rows, oldest first.
pub fn collect_rows(
    db: &Database,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Vec<ExportRow>> {
    let entries = db.entries_with_names(from, to)?;
    Ok(entries
        .into_iter()
        .map(|item| ExportRow::from_entry(item, now))
        .collect())
}

/// Runs the export command.
///
/// Without bounds every entry is exported.
pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    format: ExportFormat,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<()> {
    let from = from.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    let to = match to {
        Some(to) => to,
        None => far_future()?,
    };
    if to <= from {
        bail!("--to must be later than --from");
    }

    let rows = collect_rows(db, from, to, Utc::now())?;
    tracing::debug!(count = rows.len(), "exporting entries");

    match format {
        ExportFormat::Csv => write_csv(writer, &rows)?,
        ExportFormat::Json => writeln!(writer, "{}", serde_json::to_string_pretty(&rows)?)?,
    }
    Ok(())
}

/// Upper bound that still formats as a plain four-digit-year timestamp.
fn far_future() -> Result<DateTime<Utc>> {
    Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59)
        .single()
        .ok_or_else(|| anyhow::anyhow!("invalid export upper bound"))
}
