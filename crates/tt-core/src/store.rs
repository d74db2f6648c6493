//! Persistence collaborator interfaces.
//!
//! The timer core only ever talks to these traits, so any backend (`SQLite`,
//! a hosted service, or [`MemoryStore`](crate::MemoryStore)) can sit behind it.
//! Reads take `&self`; writes take `&mut self`.
//!
//! The "current running timer" is global state owned by the store. Callers
//! must re-query it instead of caching it between calls.

use std::error::Error as StdError;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{
    Client, NewClient, NewProject, NewTask, NewTimeEntry, Project, Task, TimeEntry,
    TimeEntryUpdate,
};
use crate::types::{ClientId, ProjectId, TaskId, TimeEntryId};

/// Entity names used when tagging failures.
pub const CLIENT: &str = "client";
pub const PROJECT: &str = "project";
pub const TASK: &str = "task";
pub const TIME_ENTRY: &str = "time entry";

/// Coarse classification of a store failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// The backend could not be reached.
    Network,
    /// The backend rejected our credentials.
    Auth,
    /// The addressed record does not exist.
    NotFound,
    /// The write conflicted with concurrent state, such as a second
    /// running time entry.
    Conflict,
    /// Any other constraint, e.g. a reference to a missing record.
    Constraint,
    /// Anything else; passed through verbatim.
    Other,
}

/// A store failure tagged with the operation and entity it happened on.
#[derive(Debug, Error)]
#[error("failed to {operation} {entity}: {source}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub operation: &'static str,
    pub entity: &'static str,
    #[source]
    pub source: Box<dyn StdError + Send + Sync>,
}

impl StoreError {
    pub fn new(
        kind: StoreErrorKind,
        operation: &'static str,
        entity: &'static str,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self {
            kind,
            operation,
            entity,
            source: source.into(),
        }
    }

    /// Error for a lookup by id that found nothing.
    pub fn not_found(operation: &'static str, entity: &'static str, id: &str) -> Self {
        Self::new(
            StoreErrorKind::NotFound,
            operation,
            entity,
            format!("no {entity} with id {id}"),
        )
    }

    /// A short user-facing hint for failures we recognize.
    pub fn hint(&self) -> Option<&'static str> {
        match self.kind {
            StoreErrorKind::Network => {
                Some("Could not reach the server. Check your network connection and try again.")
            }
            StoreErrorKind::Auth => {
                Some("Your session is invalid or has expired. Run 'tt login' to sign in again.")
            }
            StoreErrorKind::Conflict if self.entity == TIME_ENTRY => {
                Some("Another timer is already running. Run 'tt status' to see it.")
            }
            _ => None,
        }
    }
}

/// Client persistence.
pub trait ClientStore {
    fn create_client(&mut self, input: NewClient) -> Result<Client, StoreError>;
    fn find_client_by_id(&self, id: &ClientId) -> Result<Option<Client>, StoreError>;
    /// All clients ordered by name.
    fn find_all_clients(&self) -> Result<Vec<Client>, StoreError>;
    fn find_client_by_name(&self, name: &str) -> Result<Option<Client>, StoreError>;
}

/// Project persistence.
pub trait ProjectStore {
    fn create_project(&mut self, input: NewProject) -> Result<Project, StoreError>;
    fn find_project_by_id(&self, id: &ProjectId) -> Result<Option<Project>, StoreError>;
    /// Projects ordered by name, optionally restricted to one client.
    fn find_all_projects(&self, client_id: Option<&ClientId>) -> Result<Vec<Project>, StoreError>;
    /// Looks up a project by name within a client.
    fn find_project_by_name(
        &self,
        client_id: &ClientId,
        name: &str,
    ) -> Result<Option<Project>, StoreError>;
}

/// Task persistence.
pub trait TaskStore {
    fn create_task(&mut self, input: NewTask) -> Result<Task, StoreError>;
    fn find_task_by_id(&self, id: &TaskId) -> Result<Option<Task>, StoreError>;
    /// Tasks ordered by name, optionally restricted to one project.
    fn find_all_tasks(&self, project_id: Option<&ProjectId>) -> Result<Vec<Task>, StoreError>;
    /// Looks up a task by name within a project.
    fn find_task_by_name(
        &self,
        project_id: &ProjectId,
        name: &str,
    ) -> Result<Option<Task>, StoreError>;
}

/// Time entry persistence.
pub trait TimeEntryStore {
    /// Inserts a new entry. `started_at` defaults to now; `ended_at` is always null.
    fn create_entry(&mut self, input: NewTimeEntry) -> Result<TimeEntry, StoreError>;
    fn update_entry(
        &mut self,
        id: &TimeEntryId,
        update: TimeEntryUpdate,
    ) -> Result<TimeEntry, StoreError>;
    fn find_entry_by_id(&self, id: &TimeEntryId) -> Result<Option<TimeEntry>, StoreError>;
    /// The entry with no `ended_at`, if any.
    fn find_running_entry(&self) -> Result<Option<TimeEntry>, StoreError>;
    /// Entries whose `started_at` lies in `[start, end)`, oldest first.
    fn find_entries_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeEntry>, StoreError>;
    /// Sets `ended_at` to now.
    fn stop_entry(&mut self, id: &TimeEntryId) -> Result<TimeEntry, StoreError>;
    /// Sets `ended_at` to now and overwrites the description in one write.
    fn stop_entry_with_description(
        &mut self,
        id: &TimeEntryId,
        description: Option<&str>,
    ) -> Result<TimeEntry, StoreError>;
}

/// A backend providing every collaborator interface.
pub trait Store: ClientStore + ProjectStore + TaskStore + TimeEntryStore {}

impl<T> Store for T where T: ClientStore + ProjectStore + TaskStore + TimeEntryStore {}
