//! Domain entities: the Client → Project → Task → `TimeEntry` hierarchy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ClientId, ProjectId, TaskId, TimeEntryId};

/// Root of the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A project owned by exactly one client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub client_id: ClientId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A task owned by exactly one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub project_id: ProjectId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A span of tracked time.
///
/// An entry with no `ended_at` is *running*. At most one running entry may
/// exist across the whole store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: TimeEntryId,
    pub client_id: ClientId,
    pub project_id: Option<ProjectId>,
    pub task_id: Option<TaskId>,
    pub description: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimeEntry {
    /// Returns true if the entry has not been stopped.
    pub const fn is_running(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Input for creating a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClient {
    pub name: String,
}

/// Input for creating a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProject {
    pub client_id: ClientId,
    pub name: String,
}

/// Input for creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub project_id: ProjectId,
    pub name: String,
}

/// Input for creating a time entry.
///
/// `started_at` defaults to the store's notion of "now" when absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTimeEntry {
    pub client_id: ClientId,
    pub project_id: Option<ProjectId>,
    pub task_id: Option<TaskId>,
    pub description: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

/// Partial update of a time entry. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeEntryUpdate {
    pub description: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl TimeEntryUpdate {
    /// Returns true if the update would not change anything.
    pub const fn is_empty(&self) -> bool {
        self.description.is_none() && self.started_at.is_none() && self.ended_at.is_none()
    }
}
