//! Switch/confirm flow on top of the timer core.
//!
//! Decides what to do when a start is requested while another timer is
//! running: force through, ask the user, or leave the running timer alone.

use std::fmt;

use serde::Serialize;

use crate::model::{Client, Project, Task, TimeEntry};
use crate::store::{Store, StoreError, StoreErrorKind, TIME_ENTRY};
use crate::timer::{StartOptions, StartRequest, TimerOutcome, start_timer};

/// Question asked before stopping a running timer.
pub const SWITCH_PROMPT: &str = "Stop it and start a new one?";

/// The running entry joined with the records it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimerStatus {
    pub entry: TimeEntry,
    pub client: Option<Client>,
    pub project: Option<Project>,
    pub task: Option<Task>,
}

/// Reads the running entry, if any, with its client/project/task.
pub fn get_status<S>(store: &S) -> Result<Option<TimerStatus>, StoreError>
where
    S: Store + ?Sized,
{
    let Some(entry) = store.find_running_entry()? else {
        return Ok(None);
    };
    let client = store.find_client_by_id(&entry.client_id)?;
    let project = match &entry.project_id {
        Some(id) => store.find_project_by_id(id)?,
        None => None,
    };
    let task = match &entry.task_id {
        Some(id) => store.find_task_by_id(id)?,
        None => None,
    };
    Ok(Some(TimerStatus {
        entry,
        client,
        project,
        task,
    }))
}

/// A yes/no question put to the user.
pub trait Confirm {
    fn confirm(&mut self, message: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, message: &str) -> bool {
        self(message)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwitchOptions {
    /// Stop the running timer without asking.
    pub force: bool,
    /// Whether a user is present to answer a prompt.
    pub interactive: bool,
}

/// How a switch request was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SwitchMessage {
    /// Nothing was running; a timer was started.
    Started,
    /// The running timer was stopped and a new one started.
    Switched,
    /// A timer is running and nobody can be asked; nothing changed.
    NonInteractive,
    /// The user declined; nothing changed.
    Declined,
}

impl SwitchMessage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Switched => "switched",
            Self::NonInteractive => "non-interactive",
            Self::Declined => "declined",
        }
    }
}

impl fmt::Display for SwitchMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchResult {
    pub switched: bool,
    /// Status of the timer that was stopped, when switched.
    pub stopped_timer: Option<TimerStatus>,
    /// The newly started entry, when one was started.
    pub entry: Option<TimeEntry>,
    pub message: SwitchMessage,
}

impl SwitchResult {
    const fn unchanged(message: SwitchMessage) -> Self {
        Self {
            switched: false,
            stopped_timer: None,
            entry: None,
            message,
        }
    }
}

/// Starts a timer, resolving any conflict with the running one.
///
/// Only the "started" and "switched" paths write to the store.
pub fn handle_timer_switch<S, C>(
    store: &mut S,
    request: StartRequest,
    options: SwitchOptions,
    confirm: &mut C,
) -> Result<SwitchResult, StoreError>
where
    S: Store + ?Sized,
    C: Confirm + ?Sized,
{
    let Some(current) = get_status(store)? else {
        let entry = start(store, request, false)?;
        return Ok(SwitchResult {
            switched: false,
            stopped_timer: None,
            entry: Some(entry),
            message: SwitchMessage::Started,
        });
    };

    if !options.force {
        if !options.interactive {
            tracing::debug!(entry_id = %current.entry.id, "timer running, not prompting");
            return Ok(SwitchResult::unchanged(SwitchMessage::NonInteractive));
        }
        if !confirm.confirm(SWITCH_PROMPT) {
            return Ok(SwitchResult::unchanged(SwitchMessage::Declined));
        }
    }

    let entry = start(store, request, true)?;
    Ok(SwitchResult {
        switched: true,
        stopped_timer: Some(current),
        entry: Some(entry),
        message: SwitchMessage::Switched,
    })
}

/// Runs the core start and turns a lost race into a store conflict.
fn start<S>(store: &mut S, request: StartRequest, force: bool) -> Result<TimeEntry, StoreError>
where
    S: Store + ?Sized,
{
    match start_timer(store, request, StartOptions { force })? {
        TimerOutcome::Success(started) => Ok(started.entry),
        TimerOutcome::Failure(conflict) => Err(StoreError::new(
            StoreErrorKind::Conflict,
            "start",
            TIME_ENTRY,
            conflict,
        )),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::memory::MemoryStore;
    use std::cell::Cell;

    use crate::model::{NewClient, NewProject, NewTask, NewTimeEntry, TimeEntryUpdate};
    use crate::store::{ClientStore, ProjectStore, TaskStore, TimeEntryStore};
    use crate::timer::get_timer_state;
    use crate::types::{ClientId, ProjectId, TaskId, TimeEntryId};

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn setup() -> (MemoryStore, StartRequest) {
        let mut store = MemoryStore::with_fixed_time(ts("2025-01-01T09:00:00Z"));
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
        let task = store
            .create_task(NewTask {
                project_id: project.id.clone(),
                name: "Design".to_string(),
            })
            .unwrap();
        let request = StartRequest {
            client_id: client.id,
            project_id: Some(project.id),
            task_id: Some(task.id),
            description: Some("mockups".to_string()),
        };
        (store, request)
    }

    fn never_asked(_: &str) -> bool {
        panic!("confirmation should not be requested");
    }

    fn run(
        store: &mut MemoryStore,
        request: &StartRequest,
        options: SwitchOptions,
        confirm: &mut dyn Confirm,
    ) -> SwitchResult {
        handle_timer_switch(store, request.clone(), options, confirm).unwrap()
    }

    #[test]
    fn status_joins_names() {
        let (mut store, request) = setup();
        run(&mut store, &request, SwitchOptions::default(), &mut never_asked);

        let status = get_status(&store).unwrap().unwrap();
        assert_eq!(status.client.unwrap().name, "Acme");
        assert_eq!(status.project.unwrap().name, "Website");
        assert_eq!(status.task.unwrap().name, "Design");
        assert_eq!(status.entry.description.as_deref(), Some("mockups"));
    }

    #[test]
    fn starts_when_idle() {
        let (mut store, request) = setup();
        let result = run(&mut store, &request, SwitchOptions::default(), &mut never_asked);
        assert!(!result.switched);
        assert_eq!(result.message, SwitchMessage::Started);
        assert!(result.entry.unwrap().is_running());
    }

    #[test]
    fn force_switches_without_prompt() {
        let (mut store, request) = setup();
        let first = run(&mut store, &request, SwitchOptions::default(), &mut never_asked)
            .entry
            .unwrap();

        let options = SwitchOptions {
            force: true,
            interactive: false,
        };
        let result = run(&mut store, &request, options, &mut never_asked);
        assert!(result.switched);
        assert_eq!(result.message, SwitchMessage::Switched);
        assert_eq!(result.stopped_timer.unwrap().entry.id, first.id);
        assert_ne!(result.entry.unwrap().id, first.id);
        assert_eq!(store.running_count(), 1);
    }

    #[test]
    fn non_interactive_leaves_timer_running() {
        let (mut store, request) = setup();
        let first = run(&mut store, &request, SwitchOptions::default(), &mut never_asked)
            .entry
            .unwrap();

        let result = run(&mut store, &request, SwitchOptions::default(), &mut never_asked);
        assert!(!result.switched);
        assert_eq!(result.message, SwitchMessage::NonInteractive);
        assert!(result.stopped_timer.is_none());

        let state = get_timer_state(&store).unwrap();
        assert_eq!(state.current_entry.unwrap(), first);
    }

    #[test]
    fn declined_leaves_timer_running() {
        let (mut store, request) = setup();
        let first = run(&mut store, &request, SwitchOptions::default(), &mut never_asked)
            .entry
            .unwrap();

        let mut asked = Vec::new();
        let mut decline = |message: &str| {
            asked.push(message.to_string());
            false
        };
        let options = SwitchOptions {
            force: false,
            interactive: true,
        };
        let result = run(&mut store, &request, options, &mut decline);

        assert_eq!(result.message, SwitchMessage::Declined);
        assert!(!result.switched);
        assert_eq!(asked, vec!["Stop it and start a new one?".to_string()]);
        let state = get_timer_state(&store).unwrap();
        assert_eq!(state.current_entry.unwrap().id, first.id);
        assert_eq!(store.entries().len(), 1);
    }

    #[test]
    fn confirmed_switches() {
        let (mut store, request) = setup();
        let first = run(&mut store, &request, SwitchOptions::default(), &mut never_asked)
            .entry
            .unwrap();

        let other = StartRequest::for_client(request.client_id.clone());
        let options = SwitchOptions {
            force: false,
            interactive: true,
        };
        let result = run(&mut store, &other, options, &mut |_: &str| true);

        assert!(result.switched);
        assert_eq!(result.message, SwitchMessage::Switched);
        assert_eq!(result.stopped_timer.unwrap().entry.id, first.id);
        assert_eq!(store.running_count(), 1);
        assert_eq!(store.entries().len(), 2);
        assert!(store.entries()[0].ended_at.is_some());
    }

    /// Hides the running entry from the first `stale_reads` lookups, as if
    /// another process started a timer right after we looked.
    struct StaleStore {
        inner: MemoryStore,
        stale_reads: Cell<usize>,
    }

    impl ClientStore for StaleStore {
        fn create_client(&mut self, input: NewClient) -> Result<Client, StoreError> {
            self.inner.create_client(input)
        }
        fn find_client_by_id(&self, id: &ClientId) -> Result<Option<Client>, StoreError> {
            self.inner.find_client_by_id(id)
        }
        fn find_all_clients(&self) -> Result<Vec<Client>, StoreError> {
            self.inner.find_all_clients()
        }
        fn find_client_by_name(&self, name: &str) -> Result<Option<Client>, StoreError> {
            self.inner.find_client_by_name(name)
        }
    }

    impl ProjectStore for StaleStore {
        fn create_project(&mut self, input: NewProject) -> Result<Project, StoreError> {
            self.inner.create_project(input)
        }
        fn find_project_by_id(&self, id: &ProjectId) -> Result<Option<Project>, StoreError> {
            self.inner.find_project_by_id(id)
        }
        fn find_all_projects(
            &self,
            client_id: Option<&ClientId>,
        ) -> Result<Vec<Project>, StoreError> {
            self.inner.find_all_projects(client_id)
        }
        fn find_project_by_name(
            &self,
            client_id: &ClientId,
            name: &str,
        ) -> Result<Option<Project>, StoreError> {
            self.inner.find_project_by_name(client_id, name)
        }
    }

    impl TaskStore for StaleStore {
        fn create_task(&mut self, input: NewTask) -> Result<Task, StoreError> {
            self.inner.create_task(input)
        }
        fn find_task_by_id(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
            self.inner.find_task_by_id(id)
        }
        fn find_all_tasks(&self, project_id: Option<&ProjectId>) -> Result<Vec<Task>, StoreError> {
            self.inner.find_all_tasks(project_id)
        }
        fn find_task_by_name(
            &self,
            project_id: &ProjectId,
            name: &str,
        ) -> Result<Option<Task>, StoreError> {
            self.inner.find_task_by_name(project_id, name)
        }
    }

    impl TimeEntryStore for StaleStore {
        fn create_entry(&mut self, input: NewTimeEntry) -> Result<TimeEntry, StoreError> {
            self.inner.create_entry(input)
        }
        fn update_entry(
            &mut self,
            id: &TimeEntryId,
            update: TimeEntryUpdate,
        ) -> Result<TimeEntry, StoreError> {
            self.inner.update_entry(id, update)
        }
        fn find_entry_by_id(&self, id: &TimeEntryId) -> Result<Option<TimeEntry>, StoreError> {
            self.inner.find_entry_by_id(id)
        }
        fn find_running_entry(&self) -> Result<Option<TimeEntry>, StoreError> {
            let stale = self.stale_reads.get();
            if stale > 0 {
                self.stale_reads.set(stale - 1);
                return Ok(None);
            }
            self.inner.find_running_entry()
        }
        fn find_entries_by_date_range(
            &self,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<TimeEntry>, StoreError> {
            self.inner.find_entries_by_date_range(start, end)
        }
        fn stop_entry(&mut self, id: &TimeEntryId) -> Result<TimeEntry, StoreError> {
            self.inner.stop_entry(id)
        }
        fn stop_entry_with_description(
            &mut self,
            id: &TimeEntryId,
            description: Option<&str>,
        ) -> Result<TimeEntry, StoreError> {
            self.inner.stop_entry_with_description(id, description)
        }
    }

    #[test]
    fn lost_start_race_is_a_hinted_conflict() {
        let (mut inner, request) = setup();
        let running = run(&mut inner, &request, SwitchOptions::default(), &mut never_asked)
            .entry
            .unwrap();
        let mut store = StaleStore {
            inner,
            stale_reads: Cell::new(1),
        };

        let err = handle_timer_switch(
            &mut store,
            request.clone(),
            SwitchOptions::default(),
            &mut never_asked,
        )
        .unwrap_err();

        assert_eq!(err.kind, StoreErrorKind::Conflict);
        assert_eq!(err.entity, TIME_ENTRY);
        assert!(err.hint().unwrap().contains("already running"));
        assert_eq!(store.inner.running_count(), 1);
        assert_eq!(store.inner.find_running_entry().unwrap().unwrap().id, running.id);
    }

    #[test]
    fn message_strings() {
        assert_eq!(SwitchMessage::NonInteractive.to_string(), "non-interactive");
        assert_eq!(
            serde_json::to_string(&SwitchMessage::Declined).unwrap(),
            "\"declined\""
        );
    }
}
