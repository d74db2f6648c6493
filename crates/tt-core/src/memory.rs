//! In-process [`Store`](crate::Store) implementation.
//!
//! Mirrors the constraints the `SQLite` backend enforces (foreign keys and a
//! single running entry) so core logic can be exercised without a database.

use chrono::{DateTime, Utc};

use crate::model::{
    Client, NewClient, NewProject, NewTask, NewTimeEntry, Project, Task, TimeEntry,
    TimeEntryUpdate,
};
use crate::store::{
    ClientStore, PROJECT, ProjectStore, StoreError, StoreErrorKind, TASK, TIME_ENTRY,
    TaskStore, TimeEntryStore,
};
use crate::types::{ClientId, ProjectId, TaskId, TimeEntryId};

/// A store that keeps everything in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    clients: Vec<Client>,
    projects: Vec<Project>,
    tasks: Vec<Task>,
    entries: Vec<TimeEntry>,
    fixed_now: Option<DateTime<Utc>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose clock is pinned to `now`.
    pub fn with_fixed_time(now: DateTime<Utc>) -> Self {
        Self {
            fixed_now: Some(now),
            ..Self::default()
        }
    }

    /// Pins the store clock to `now`.
    pub fn set_time(&mut self, now: DateTime<Utc>) {
        self.fixed_now = Some(now);
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> &[TimeEntry] {
        &self.entries
    }

    /// Number of entries without an end timestamp.
    pub fn running_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_running()).count()
    }

    fn now(&self) -> DateTime<Utc> {
        self.fixed_now.unwrap_or_else(Utc::now)
    }

    fn entry_mut(
        &mut self,
        operation: &'static str,
        id: &TimeEntryId,
    ) -> Result<&mut TimeEntry, StoreError> {
        self.entries
            .iter_mut()
            .find(|e| &e.id == id)
            .ok_or_else(|| StoreError::not_found(operation, TIME_ENTRY, id.as_str()))
    }
}

fn constraint(operation: &'static str, entity: &'static str, message: &str) -> StoreError {
    StoreError::new(
        StoreErrorKind::Constraint,
        operation,
        entity,
        message.to_string(),
    )
}

fn sorted_by_name<T: Clone>(items: impl Iterator<Item = T>, name: impl Fn(&T) -> &str) -> Vec<T> {
    let mut items: Vec<T> = items.collect();
    items.sort_by(|a, b| name(a).cmp(name(b)));
    items
}

impl ClientStore for MemoryStore {
    fn create_client(&mut self, input: NewClient) -> Result<Client, StoreError> {
        let now = self.now();
        let client = Client {
            id: ClientId::generate(),
            name: input.name,
            created_at: now,
            updated_at: now,
        };
        self.clients.push(client.clone());
        Ok(client)
    }

    fn find_client_by_id(&self, id: &ClientId) -> Result<Option<Client>, StoreError> {
        Ok(self.clients.iter().find(|c| &c.id == id).cloned())
    }

    fn find_all_clients(&self) -> Result<Vec<Client>, StoreError> {
        Ok(sorted_by_name(self.clients.iter().cloned(), |c| c.name.as_str()))
    }

    fn find_client_by_name(&self, name: &str) -> Result<Option<Client>, StoreError> {
        Ok(self.clients.iter().find(|c| c.name == name).cloned())
    }
}

impl ProjectStore for MemoryStore {
    fn create_project(&mut self, input: NewProject) -> Result<Project, StoreError> {
        if !self.clients.iter().any(|c| c.id == input.client_id) {
            return Err(constraint("create", PROJECT, "FOREIGN KEY constraint failed"));
        }
        let now = self.now();
        let project = Project {
            id: ProjectId::generate(),
            client_id: input.client_id,
            name: input.name,
            created_at: now,
            updated_at: now,
        };
        self.projects.push(project.clone());
        Ok(project)
    }

    fn find_project_by_id(&self, id: &ProjectId) -> Result<Option<Project>, StoreError> {
        Ok(self.projects.iter().find(|p| &p.id == id).cloned())
    }

    fn find_all_projects(&self, client_id: Option<&ClientId>) -> Result<Vec<Project>, StoreError> {
        Ok(sorted_by_name(
            self.projects
                .iter()
                .filter(|p| client_id.is_none_or(|id| &p.client_id == id))
                .cloned(),
            |p| p.name.as_str(),
        ))
    }

    fn find_project_by_name(
        &self,
        client_id: &ClientId,
        name: &str,
    ) -> Result<Option<Project>, StoreError> {
        Ok(self
            .projects
            .iter()
            .find(|p| &p.client_id == client_id && p.name == name)
            .cloned())
    }
}

impl TaskStore for MemoryStore {
    fn create_task(&mut self, input: NewTask) -> Result<Task, StoreError> {
        if !self.projects.iter().any(|p| p.id == input.project_id) {
            return Err(constraint("create", TASK, "FOREIGN KEY constraint failed"));
        }
        let now = self.now();
        let task = Task {
            id: TaskId::generate(),
            project_id: input.project_id,
            name: input.name,
            created_at: now,
            updated_at: now,
        };
        self.tasks.push(task.clone());
        Ok(task)
    }

    fn find_task_by_id(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        Ok(self.tasks.iter().find(|t| &t.id == id).cloned())
    }

    fn find_all_tasks(&self, project_id: Option<&ProjectId>) -> Result<Vec<Task>, StoreError> {
        Ok(sorted_by_name(
            self.tasks
                .iter()
                .filter(|t| project_id.is_none_or(|id| &t.project_id == id))
                .cloned(),
            |t| t.name.as_str(),
        ))
    }

    fn find_task_by_name(
        &self,
        project_id: &ProjectId,
        name: &str,
    ) -> Result<Option<Task>, StoreError> {
        Ok(self
            .tasks
            .iter()
            .find(|t| &t.project_id == project_id && t.name == name)
            .cloned())
    }
}

impl TimeEntryStore for MemoryStore {
    fn create_entry(&mut self, input: NewTimeEntry) -> Result<TimeEntry, StoreError> {
        if !self.clients.iter().any(|c| c.id == input.client_id) {
            return Err(constraint("create", TIME_ENTRY, "FOREIGN KEY constraint failed"));
        }
        if self.entries.iter().any(TimeEntry::is_running) {
            return Err(StoreError::new(
                StoreErrorKind::Conflict,
                "create",
                TIME_ENTRY,
                "UNIQUE constraint failed: only one running entry allowed",
            ));
        }
        let now = self.now();
        let entry = TimeEntry {
            id: TimeEntryId::generate(),
            client_id: input.client_id,
            project_id: input.project_id,
            task_id: input.task_id,
            description: input.description,
            started_at: input.started_at.unwrap_or(now),
            ended_at: None,
            created_at: now,
            updated_at: now,
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    fn update_entry(
        &mut self,
        id: &TimeEntryId,
        update: TimeEntryUpdate,
    ) -> Result<TimeEntry, StoreError> {
        let now = self.now();
        let entry = self.entry_mut("update", id)?;
        if let Some(description) = update.description {
            entry.description = Some(description);
        }
        if let Some(started_at) = update.started_at {
            entry.started_at = started_at;
        }
        if let Some(ended_at) = update.ended_at {
            entry.ended_at = Some(ended_at);
        }
        entry.updated_at = now;
        Ok(entry.clone())
    }

    fn find_entry_by_id(&self, id: &TimeEntryId) -> Result<Option<TimeEntry>, StoreError> {
        Ok(self.entries.iter().find(|e| &e.id == id).cloned())
    }

    fn find_running_entry(&self) -> Result<Option<TimeEntry>, StoreError> {
        Ok(self.entries.iter().find(|e| e.is_running()).cloned())
    }

    fn find_entries_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeEntry>, StoreError> {
        let mut entries: Vec<TimeEntry> = self
            .entries
            .iter()
            .filter(|e| e.started_at >= start && e.started_at < end)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)));
        Ok(entries)
    }

    fn stop_entry(&mut self, id: &TimeEntryId) -> Result<TimeEntry, StoreError> {
        let now = self.now();
        let entry = self.entry_mut("stop", id)?;
        entry.ended_at = Some(now);
        entry.updated_at = now;
        Ok(entry.clone())
    }

    fn stop_entry_with_description(
        &mut self,
        id: &TimeEntryId,
        description: Option<&str>,
    ) -> Result<TimeEntry, StoreError> {
        let now = self.now();
        let entry = self.entry_mut("stop", id)?;
        entry.ended_at = Some(now);
        entry.description = description.map(str::to_string);
        entry.updated_at = now;
        Ok(entry.clone())
    }
}
