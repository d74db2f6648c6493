//! `tt stop` and `tt describe`: act on the running timer.

use std::io::Write;

use anyhow::{Result, bail};
use tt_core::validation::validate_description;
use tt_core::{
    Store, TimeEntryStore, TimeEntryUpdate, TimerOutcome, calculate_duration, get_status,
    stop_timer_with_description,
};

use super::util::{entry_label, format_minutes};

/// Stops the running timer, replacing its description when one is given.
///
/// A blank description leaves the stored one untouched.
pub fn run<W, S>(writer: &mut W, store: &mut S, description: Option<&str>) -> Result<()>
where
    W: Write,
    S: Store + ?Sized,
{
    let description = description.map(validate_description).transpose()?.flatten();
    let label = get_status(store)?.map(|status| {
        entry_label(
            status.client.as_ref(),
            status.project.as_ref(),
            status.task.as_ref(),
        )
    });

    let entry = match stop_timer_with_description(store, description)? {
        TimerOutcome::Success(entry) => entry,
        TimerOutcome::Failure(conflict) => bail!("{conflict}"),
    };

    let minutes = calculate_duration(entry.started_at, entry.ended_at);
    writeln!(
        writer,
        "Stopped timer for {} ({})",
        label.as_deref().unwrap_or("(unknown)"),
        format_minutes(minutes)
    )?;
    if let Some(description) = &entry.description {
        writeln!(writer, "Description: {description}")?;
    }
    Ok(())
}

/// Sets the description of the running timer.
pub fn describe<W, S>(writer: &mut W, store: &mut S, text: &str) -> Result<()>
where
    W: Write,
    S: TimeEntryStore + ?Sized,
{
    let Some(description) = validate_description(text)? else {
        bail!("description cannot be empty");
    };
    let Some(running) = store.find_running_entry()? else {
        bail!("No timer running");
    };
    let entry = store.update_entry(
        &running.id,
        TimeEntryUpdate {
            description: Some(description.to_string()),
            ..TimeEntryUpdate::default()
        },
    )?;
    tracing::debug!(entry_id = %entry.id, "updated description");
    writeln!(
        writer,
        "Description: {}",
        entry.description.as_deref().unwrap_or_default()
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use insta::assert_snapshot;
    use tt_core::{
        ClientStore, MemoryStore, NewClient, NewProject, ProjectStore, StartOptions, StartRequest,
        start_timer,
    };

    use super::*;

    fn running_store() -> MemoryStore {
        let mut store =
            MemoryStore::with_fixed_time(Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap());
        let client = store
            .create_client(NewClient {
                name: "Acme".to_string(),
            })
            .unwrap();
        let project = store
            .create_project(NewProject {
                client_id: client.id.clone(),
                name: "Website".to_string(),
            })
            .unwrap();
        let request = StartRequest {
            project_id: Some(project.id),
            description: Some("first draft".to_string()),
            ..StartRequest::for_client(client.id)
        };
        assert!(
            start_timer(&mut store, request, StartOptions::default())
                .unwrap()
                .is_success()
        );
        store.set_time(Utc.with_ymd_and_hms(2025, 3, 3, 9, 45, 30).unwrap());
        store
    }

    #[test]
    fn stop_with_description_writes_both() {
        let mut store = running_store();
        let mut output = Vec::new();

        run(&mut output, &mut store, Some(" shipped ")).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Stopped timer for Acme / Website (45m)
        Description: shipped
        ");
        assert_eq!(store.running_count(), 0);
        assert_eq!(store.entries()[0].description.as_deref(), Some("shipped"));
    }

    #[test]
    fn stop_without_description_keeps_existing() {
        let mut store = running_store();
        let mut output = Vec::new();

        run(&mut output, &mut store, None).unwrap();

        assert_eq!(store.entries()[0].description.as_deref(), Some("first draft"));
        assert!(String::from_utf8(output).unwrap().contains("Description: first draft"));
    }

    #[test]
    fn stop_twice_reports_no_timer() {
        let mut store = running_store();
        run(&mut Vec::new(), &mut store, None).unwrap();

        let err = run(&mut Vec::new(), &mut store, None).unwrap_err();
        assert_eq!(err.to_string(), "No timer running");
    }

    #[test]
    fn describe_updates_running_entry() {
        let mut store = running_store();
        let mut output = Vec::new();

        describe(&mut output, &mut store, "  polishing  ").unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @"Description: polishing");
        let running = store.find_running_entry().unwrap().unwrap();
        assert_eq!(running.description.as_deref(), Some("polishing"));
    }

    #[test]
    fn describe_requires_running_timer_and_text() {
        let mut store = MemoryStore::new();
        let err = describe(&mut Vec::new(), &mut store, "anything").unwrap_err();
        assert_eq!(err.to_string(), "No timer running");

        let err = describe(&mut Vec::new(), &mut store, "   ").unwrap_err();
        assert_eq!(err.to_string(), "description cannot be empty");
    }
}
