//! `tt start`: start a timer, switching away from a running one.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tt_core::validation::{validate_description, validate_task_name};
use tt_core::{
    Client, Confirm, NewTask, Project, StartRequest, Store, SwitchMessage, SwitchOptions, Task,
    calculate_duration_at, elapsed_seconds, get_status, handle_timer_switch,
};

use super::util::{entry_label, format_clock, format_minutes, require_client, require_project};
use crate::cli::StartArgs;

/// What a start resolves to before the switch flow runs.
#[derive(Debug)]
pub struct Target {
    pub client: Client,
    pub project: Project,
    pub task: Option<Task>,
    pub description: Option<String>,
}

impl Target {
    fn label(&self) -> String {
        entry_label(Some(&self.client), Some(&self.project), self.task.as_ref())
    }

    fn into_request(self) -> StartRequest {
        StartRequest {
            client_id: self.client.id,
            project_id: Some(self.project.id),
            task_id: self.task.map(|task| task.id),
            description: self.description,
        }
    }
}

/// Resolves names to records. A task that does not exist yet is created.
pub fn resolve_target<S>(
    store: &mut S,
    client: &str,
    project: &str,
    task: Option<&str>,
    description: Option<&str>,
) -> Result<Target>
where
    S: Store + ?Sized,
{
    let description = description
        .map(validate_description)
        .transpose()?
        .flatten()
        .map(str::to_string);
    let client = require_client(store, client)?;
    let project = require_project(store, &client, project)?;

    let task = match task {
        Some(name) => {
            let name = validate_task_name(name)?;
            let task = match store.find_task_by_name(&project.id, name)? {
                Some(task) => task,
                None => {
                    let task = store
                        .create_task(NewTask {
                            project_id: project.id.clone(),
                            name: name.to_string(),
                        })
                        .context("failed to create task")?;
                    tracing::info!(task_id = %task.id, name = %task.name, "created task on start");
                    task
                }
            };
            Some(task)
        }
        None => None,
    };

    Ok(Target {
        client,
        project,
        task,
        description,
    })
}

/// Runs the switch flow for `target` and reports what happened.
pub fn switch_to<W, S, C>(
    writer: &mut W,
    store: &mut S,
    target: Target,
    options: SwitchOptions,
    confirm: &mut C,
    now: DateTime<Utc>,
) -> Result<SwitchMessage>
where
    W: Write,
    S: Store + ?Sized,
    C: Confirm + ?Sized,
{
    let label = target.label();
    let result = handle_timer_switch(store, target.into_request(), options, confirm)?;

    match result.message {
        SwitchMessage::Started => {
            writeln!(writer, "Started timer for {label}")?;
        }
        SwitchMessage::Switched => {
            if let (Some(stopped), Some(entry)) = (&result.stopped_timer, &result.entry) {
                let minutes = calculate_duration_at(stopped.entry.started_at, None, entry.started_at);
                let stopped_label = entry_label(
                    stopped.client.as_ref(),
                    stopped.project.as_ref(),
                    stopped.task.as_ref(),
                );
                writeln!(
                    writer,
                    "Stopped timer for {stopped_label} ({})",
                    format_minutes(minutes)
                )?;
            }
            writeln!(writer, "Started timer for {label}")?;
        }
        SwitchMessage::NonInteractive => {
            match get_status(store)? {
                Some(running) => {
                    let running_label = entry_label(
                        running.client.as_ref(),
                        running.project.as_ref(),
                        running.task.as_ref(),
                    );
                    let elapsed = elapsed_seconds(running.entry.started_at, now);
                    writeln!(
                        writer,
                        "Timer already running for {running_label} ({})",
                        format_clock(elapsed)
                    )?;
                }
                None => writeln!(writer, "Timer already running")?,
            }
            writeln!(writer, "Use --force to stop it and start a new one.")?;
        }
        SwitchMessage::Declined => {
            writeln!(writer, "Kept the running timer.")?;
        }
    }

    Ok(result.message)
}

/// Runs the start command.
pub fn run<W, S, C>(
    writer: &mut W,
    store: &mut S,
    args: &StartArgs,
    interactive: bool,
    confirm: &mut C,
) -> Result<SwitchMessage>
where
    W: Write,
    S: Store + ?Sized,
    C: Confirm + ?Sized,
{
    let target = resolve_target(
        store,
        &args.client,
        &args.project,
        args.task.as_deref(),
        args.description.as_deref(),
    )?;
    let options = SwitchOptions {
        force: args.force,
        interactive,
    };
    switch_to(writer, store, target, options, confirm, Utc::now())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use insta::assert_snapshot;
    use tt_core::{
        ClientStore, MemoryStore, NewClient, NewProject, ProjectStore, TaskStore, TimeEntryStore,
    };

    use super::*;

    fn never_asked(_: &str) -> bool {
        panic!("confirmation should not be requested");
    }

    fn store_at(now: DateTime<Utc>) -> MemoryStore {
        let mut store = MemoryStore::with_fixed_time(now);
        let acme = store
            .create_client(NewClient {
                name: "Acme".to_string(),
            })
            .unwrap();
        store
            .create_project(NewProject {
                client_id: acme.id,
                name: "Website".to_string(),
            })
            .unwrap();
        store
    }

    fn args(task: Option<&str>, force: bool) -> StartArgs {
        StartArgs {
            client: "Acme".to_string(),
            project: "Website".to_string(),
            task: task.map(str::to_string),
            description: Some("  landing page  ".to_string()),
            force,
        }
    }

    fn start_at<C: Confirm>(
        store: &mut MemoryStore,
        args: &StartArgs,
        interactive: bool,
        confirm: &mut C,
        now: DateTime<Utc>,
    ) -> (SwitchMessage, String) {
        let target = resolve_target(
            store,
            &args.client,
            &args.project,
            args.task.as_deref(),
            args.description.as_deref(),
        )
        .unwrap();
        let options = SwitchOptions {
            force: args.force,
            interactive,
        };
        let mut output = Vec::new();
        let message = switch_to(&mut output, store, target, options, confirm, now).unwrap();
        (message, String::from_utf8(output).unwrap())
    }

    #[test]
    fn start_creates_missing_task_and_trims_description() {
        let now = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
        let mut store = store_at(now);

        let (message, output) =
            start_at(&mut store, &args(Some("Design"), false), false, &mut never_asked, now);

        assert_eq!(message, SwitchMessage::Started);
        assert_snapshot!(output, @"Started timer for Acme / Website / Design");
        let entry = store.find_running_entry().unwrap().unwrap();
        assert_eq!(entry.description.as_deref(), Some("landing page"));
        assert_eq!(store.find_all_tasks(None).unwrap().len(), 1);
    }

    #[test]
    fn start_reuses_existing_task() {
        let now = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
        let mut store = store_at(now);
        start_at(&mut store, &args(Some("Design"), false), false, &mut never_asked, now);
        start_at(&mut store, &args(Some("Design"), true), false, &mut never_asked, now);

        assert_eq!(store.find_all_tasks(None).unwrap().len(), 1);
    }

    #[test]
    fn non_interactive_start_leaves_running_timer() {
        let started = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
        let mut store = store_at(started);
        start_at(&mut store, &args(None, false), false, &mut never_asked, started);

        let later = Utc.with_ymd_and_hms(2025, 3, 3, 9, 12, 3).unwrap();
        let (message, output) =
            start_at(&mut store, &args(Some("Build"), false), false, &mut never_asked, later);

        assert_eq!(message, SwitchMessage::NonInteractive);
        assert_snapshot!(output, @r"
        Timer already running for Acme / Website (00:12:03)
        Use --force to stop it and start a new one.
        ");
        assert_eq!(store.running_count(), 1);
        assert!(store.find_running_entry().unwrap().unwrap().task_id.is_none());
    }

    #[test]
    fn confirmed_switch_reports_stopped_duration() {
        let started = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
        let mut store = store_at(started);
        start_at(&mut store, &args(None, false), false, &mut never_asked, started);

        let later = Utc.with_ymd_and_hms(2025, 3, 3, 10, 30, 59).unwrap();
        store.set_time(later);
        let mut asked = Vec::new();
        let mut confirm = |message: &str| {
            asked.push(message.to_string());
            true
        };
        let (message, output) =
            start_at(&mut store, &args(Some("Build"), false), true, &mut confirm, later);

        assert_eq!(message, SwitchMessage::Switched);
        assert_eq!(asked, vec!["Stop it and start a new one?".to_string()]);
        assert_snapshot!(output, @r"
        Stopped timer for Acme / Website (1h 30m)
        Started timer for Acme / Website / Build
        ");
        assert_eq!(store.running_count(), 1);
    }

    #[test]
    fn declined_switch_keeps_timer() {
        let now = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
        let mut store = store_at(now);
        start_at(&mut store, &args(None, false), false, &mut never_asked, now);
        let running = store.find_running_entry().unwrap().unwrap();

        let (message, output) =
            start_at(&mut store, &args(Some("Build"), false), true, &mut |_: &str| false, now);

        assert_eq!(message, SwitchMessage::Declined);
        assert_snapshot!(output, @"Kept the running timer.");
        assert_eq!(store.find_running_entry().unwrap().unwrap(), running);
    }

    #[test]
    fn unknown_project_fails_before_any_write() {
        let now = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
        let mut store = store_at(now);
        let err = resolve_target(&mut store, "Acme", "Mobile", Some("Design"), None).unwrap_err();

        assert_eq!(err.to_string(), "Project not found for client Acme: Mobile");
        assert!(store.find_all_tasks(None).unwrap().is_empty());
        assert!(store.entries().is_empty());
    }

    #[test]
    fn overlong_description_is_rejected() {
        let now = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
        let mut store = store_at(now);
        let description = "d".repeat(1001);
        let err =
            resolve_target(&mut store, "Acme", "Website", None, Some(&description)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "description must be at most 1000 characters, got 1001"
        );
    }
}
