//! Timer state machine over the single-running-entry invariant.
//!
//! States are `Idle` (no running entry) and `Running(entry)`. Business-rule
//! rejections ("already running", "nothing running") are returned as
//! [`TimerOutcome::Failure`] values rather than errors; only store failures
//! travel through `Err`.
//!
//! The read-then-write sequences here are not transactional. Two processes
//! can both observe `Idle` and both insert; backends are expected to reject
//! the second insert (the `SQLite` store does so with a partial unique index).

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::{NewTimeEntry, TimeEntry};
use crate::store::{StoreError, TimeEntryStore};
use crate::types::{ClientId, ProjectId, TaskId};

/// A business-rule rejection from the timer.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TimerConflict {
    #[error("Timer already running. Stop it first.")]
    AlreadyRunning,
    #[error("No timer running")]
    NotRunning,
}

/// Result object returned by timer operations.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum TimerOutcome<T> {
    Success(T),
    Failure(TimerConflict),
}

impl<T> TimerOutcome<T> {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The rejection message, if the operation was rejected.
    pub fn error(&self) -> Option<String> {
        match self {
            Self::Success(_) => None,
            Self::Failure(conflict) => Some(conflict.to_string()),
        }
    }

    pub fn into_result(self) -> Result<T, TimerConflict> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(conflict) => Err(conflict),
        }
    }
}

/// What to start tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub client_id: ClientId,
    pub project_id: Option<ProjectId>,
    pub task_id: Option<TaskId>,
    pub description: Option<String>,
}

impl StartRequest {
    /// A request that tracks time against a client only.
    pub const fn for_client(client_id: ClientId) -> Self {
        Self {
            client_id,
            project_id: None,
            task_id: None,
            description: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartOptions {
    /// Stop any running entry before starting.
    pub force: bool,
}

/// A successful start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Started {
    /// The newly created running entry.
    pub entry: TimeEntry,
    /// The entry that was force-stopped to make room, if any.
    pub stopped_entry: Option<TimeEntry>,
}

/// Snapshot of the timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimerState {
    pub is_running: bool,
    pub current_entry: Option<TimeEntry>,
    /// Elapsed whole minutes of the running entry.
    pub duration: Option<i64>,
}

/// Whole minutes between `started_at` and `ended_at` (or now), floored.
pub fn calculate_duration(started_at: DateTime<Utc>, ended_at: Option<DateTime<Utc>>) -> i64 {
    calculate_duration_at(started_at, ended_at, Utc::now())
}

/// [`calculate_duration`] with an explicit "now".
pub fn calculate_duration_at(
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> i64 {
    let end = ended_at.unwrap_or(now);
    (end - started_at).num_minutes().max(0)
}

/// Whole seconds elapsed since `started_at`, floored. Used for live status.
pub fn elapsed_seconds(started_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - started_at).num_seconds().max(0)
}

/// Reads the current timer state.
pub fn get_timer_state<S>(store: &S) -> Result<TimerState, StoreError>
where
    S: TimeEntryStore + ?Sized,
{
    get_timer_state_at(store, Utc::now())
}

/// [`get_timer_state`] with an explicit "now".
pub fn get_timer_state_at<S>(store: &S, now: DateTime<Utc>) -> Result<TimerState, StoreError>
where
    S: TimeEntryStore + ?Sized,
{
    let current_entry = store.find_running_entry()?;
    let duration = current_entry
        .as_ref()
        .map(|entry| calculate_duration_at(entry.started_at, None, now));
    Ok(TimerState {
        is_running: current_entry.is_some(),
        current_entry,
        duration,
    })
}

/// Starts a new entry.
///
/// With a running entry and no `force`, the request is rejected. With
/// `force`, the running entry is stopped first and returned alongside the
/// new one.
pub fn start_timer<S>(
    store: &mut S,
    request: StartRequest,
    options: StartOptions,
) -> Result<TimerOutcome<Started>, StoreError>
where
    S: TimeEntryStore + ?Sized,
{
    let stopped_entry = match store.find_running_entry()? {
        None => None,
        Some(_) if !options.force => {
            tracing::debug!("start rejected, timer already running");
            return Ok(TimerOutcome::Failure(TimerConflict::AlreadyRunning));
        }
        Some(running) => {
            let stopped = store.stop_entry(&running.id)?;
            tracing::info!(entry_id = %stopped.id, "force-stopped running timer");
            Some(stopped)
        }
    };

    let entry = store.create_entry(NewTimeEntry {
        client_id: request.client_id,
        project_id: request.project_id,
        task_id: request.task_id,
        description: request.description,
        started_at: None,
    })?;
    tracing::info!(entry_id = %entry.id, "timer started");

    Ok(TimerOutcome::Success(Started {
        entry,
        stopped_entry,
    }))
}

/// Stops the running entry.
pub fn stop_timer<S>(store: &mut S) -> Result<TimerOutcome<TimeEntry>, StoreError>
where
    S: TimeEntryStore + ?Sized,
{
    stop_timer_with_description(store, None)
}

/// Stops the running entry, optionally replacing its description.
///
/// When a description is given, the end timestamp and description are
/// written together.
pub fn stop_timer_with_description<S>(
    store: &mut S,
    description: Option<&str>,
) -> Result<TimerOutcome<TimeEntry>, StoreError>
where
    S: TimeEntryStore + ?Sized,
{
    let Some(running) = store.find_running_entry()? else {
        return Ok(TimerOutcome::Failure(TimerConflict::NotRunning));
    };

    let entry = match description {
        Some(description) => store.stop_entry_with_description(&running.id, Some(description))?,
        None => store.stop_entry(&running.id)?,
    };
    tracing::info!(entry_id = %entry.id, "timer stopped");
    Ok(TimerOutcome::Success(entry))
}
