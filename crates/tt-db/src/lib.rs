//! Storage layer for the time tracker.
//!
//! Implements the `tt-core` store traits on top of `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! This means a `Database` instance can be moved between threads but cannot be shared
//! across threads without external synchronization.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 format with millisecond precision
//! (e.g., `2024-01-15T10:30:00.000Z`). This ensures:
//! - Lexicographic ordering matches chronological ordering
//! - Human-readable values in the database
//! - Timezone-aware (always UTC)
//!
//! ## Running Entries
//!
//! A time entry with a NULL `ended_at` is running. A partial unique index over
//! running rows makes the database reject a second running entry, so two
//! processes racing through start cannot both succeed.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, ffi, params};
use thiserror::Error;
use tt_core::store::{CLIENT, PROJECT, TASK, TIME_ENTRY};
use tt_core::{
    Client, ClientId, ClientStore, NewClient, NewProject, NewTask, NewTimeEntry, Project,
    ProjectId, ProjectStore, StoreError, StoreErrorKind, Task, TaskId, TaskStore, TimeEntry,
    TimeEntryId, TimeEntryStore, TimeEntryUpdate,
};

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// A time entry joined with the names of the records it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryWithNames {
    pub entry: TimeEntry,
    pub client_name: String,
    pub project_name: Option<String>,
    pub task_name: Option<String>,
}

const ENTRY_COLUMNS: &str = "id, client_id, project_id, task_id, description, started_at, ended_at, created_at, updated_at";

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        tracing::debug!(path = %path.display(), "opened database");
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS clients (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_clients_name ON clients(name);

            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                client_id TEXT NOT NULL,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (client_id) REFERENCES clients(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_projects_client_name ON projects(client_id, name);

            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_project_name ON tasks(project_id, name);

            -- ended_at NULL means the entry is running
            CREATE TABLE IF NOT EXISTS time_entries (
                id TEXT PRIMARY KEY,
                client_id TEXT NOT NULL,
                project_id TEXT,
                task_id TEXT,
                description TEXT,
                started_at TEXT NOT NULL,
                ended_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (client_id) REFERENCES clients(id) ON DELETE CASCADE,
                FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE SET NULL,
                FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE SET NULL
            );

            CREATE INDEX IF NOT EXISTS idx_time_entries_started ON time_entries(started_at);
            CREATE INDEX IF NOT EXISTS idx_time_entries_client ON time_entries(client_id);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_time_entries_single_running
                ON time_entries((ended_at IS NULL)) WHERE ended_at IS NULL;
            ",
        )?;
        Ok(())
    }

    /// Lists entries started in `[start, end)` with client/project/task names.
    pub fn entries_with_names(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EntryWithNames>, StoreError> {
        let wrap = store_error("list", TIME_ENTRY);
        if end <= start {
            return Ok(Vec::new());
        }
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT e.id, e.client_id, e.project_id, e.task_id, e.description,
                       e.started_at, e.ended_at, e.created_at, e.updated_at,
                       c.name, p.name, t.name
                FROM time_entries e
                JOIN clients c ON c.id = e.client_id
                LEFT JOIN projects p ON p.id = e.project_id
                LEFT JOIN tasks t ON t.id = e.task_id
                WHERE e.started_at >= ? AND e.started_at < ?
                ORDER BY e.started_at ASC, e.id ASC
                ",
            )
            .map_err(wrap)?;
        let rows = stmt
            .query_map([format_timestamp(start), format_timestamp(end)], |row| {
                Ok(EntryWithNames {
                    entry: entry_from_row(row)?,
                    client_name: row.get(9)?,
                    project_name: row.get(10)?,
                    task_name: row.get(11)?,
                })
            })
            .map_err(wrap)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(wrap)?);
        }
        Ok(entries)
    }

    fn query_entries(
        &self,
        operation: &'static str,
        filter: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<TimeEntry>, StoreError> {
        let wrap = store_error(operation, TIME_ENTRY);
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM time_entries {filter} ORDER BY started_at ASC, id ASC"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(wrap)?;
        let rows = stmt.query_map(params, entry_from_row).map_err(wrap)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(wrap)?);
        }
        Ok(entries)
    }

    fn entry_after_write(
        &self,
        operation: &'static str,
        id: &TimeEntryId,
        changed: usize,
    ) -> Result<TimeEntry, StoreError> {
        if changed == 0 {
            return Err(StoreError::not_found(operation, TIME_ENTRY, id.as_str()));
        }
        self.find_entry_by_id(id)?
            .ok_or_else(|| StoreError::not_found(operation, TIME_ENTRY, id.as_str()))
    }
}

/// Builds a mapper that tags rusqlite failures with operation and entity.
fn store_error(
    operation: &'static str,
    entity: &'static str,
) -> impl Fn(rusqlite::Error) -> StoreError + Copy {
    move |err| {
        let kind = match &err {
            // Only the running-entry index can fail uniqueness on time entries.
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                    && entity == TIME_ENTRY =>
            {
                StoreErrorKind::Conflict
            }
            _ => match err.sqlite_error_code() {
                Some(ErrorCode::ConstraintViolation) => StoreErrorKind::Constraint,
                Some(ErrorCode::PermissionDenied | ErrorCode::ReadOnly) => StoreErrorKind::Auth,
                _ => StoreErrorKind::Other,
            },
        };
        tracing::debug!(operation, entity, error = %err, "store operation failed");
        StoreError::new(kind, operation, entity, DbError::Sqlite(err))
    }
}

/// Current time at the precision timestamps are stored with.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| conversion_error(idx, err))
}

fn optional_timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(|err| conversion_error(idx, err))
    })
    .transpose()
}

fn id_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: TryFrom<String, Error = tt_core::ValidationError>,
{
    let raw: String = row.get(idx)?;
    T::try_from(raw).map_err(|err| conversion_error(idx, err))
}

fn optional_id_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: TryFrom<String, Error = tt_core::ValidationError>,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| T::try_from(raw).map_err(|err| conversion_error(idx, err)))
        .transpose()
}

fn client_from_row(row: &Row<'_>) -> rusqlite::Result<Client> {
    Ok(Client {
        id: id_column(row, 0)?,
        name: row.get(1)?,
        created_at: timestamp_column(row, 2)?,
        updated_at: timestamp_column(row, 3)?,
    })
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: id_column(row, 0)?,
        client_id: id_column(row, 1)?,
        name: row.get(2)?,
        created_at: timestamp_column(row, 3)?,
        updated_at: timestamp_column(row, 4)?,
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: id_column(row, 0)?,
        project_id: id_column(row, 1)?,
        name: row.get(2)?,
        created_at: timestamp_column(row, 3)?,
        updated_at: timestamp_column(row, 4)?,
    })
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<TimeEntry> {
    Ok(TimeEntry {
        id: id_column(row, 0)?,
        client_id: id_column(row, 1)?,
        project_id: optional_id_column(row, 2)?,
        task_id: optional_id_column(row, 3)?,
        description: row.get(4)?,
        started_at: timestamp_column(row, 5)?,
        ended_at: optional_timestamp_column(row, 6)?,
        created_at: timestamp_column(row, 7)?,
        updated_at: timestamp_column(row, 8)?,
    })
}

impl ClientStore for Database {
    fn create_client(&mut self, input: NewClient) -> Result<Client, StoreError> {
        let now = now();
        let client = Client {
            id: ClientId::generate(),
            name: input.name,
            created_at: now,
            updated_at: now,
        };
        self.conn
            .execute(
                "INSERT INTO clients (id, name, created_at, updated_at) VALUES (?, ?, ?, ?)",
                params![
                    client.id.as_str(),
                    client.name,
                    format_timestamp(now),
                    format_timestamp(now),
                ],
            )
            .map_err(store_error("create", CLIENT))?;
        tracing::debug!(client_id = %client.id, "created client");
        Ok(client)
    }

    fn find_client_by_id(&self, id: &ClientId) -> Result<Option<Client>, StoreError> {
        self.conn
            .query_row(
                "SELECT id, name, created_at, updated_at FROM clients WHERE id = ?",
                [id.as_str()],
                client_from_row,
            )
            .optional()
            .map_err(store_error("find", CLIENT))
    }

    fn find_all_clients(&self) -> Result<Vec<Client>, StoreError> {
        let wrap = store_error("list", CLIENT);
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, created_at, updated_at FROM clients ORDER BY name ASC, id ASC")
            .map_err(wrap)?;
        let rows = stmt.query_map([], client_from_row).map_err(wrap)?;
        let mut clients = Vec::new();
        for row in rows {
            clients.push(row.map_err(wrap)?);
        }
        Ok(clients)
    }

    fn find_client_by_name(&self, name: &str) -> Result<Option<Client>, StoreError> {
        self.conn
            .query_row(
                "
                SELECT id, name, created_at, updated_at FROM clients
                WHERE name = ?
                ORDER BY created_at ASC
                LIMIT 1
                ",
                [name],
                client_from_row,
            )
            .optional()
            .map_err(store_error("find", CLIENT))
    }
}

impl ProjectStore for Database {
    fn create_project(&mut self, input: NewProject) -> Result<Project, StoreError> {
        let now = now();
        let project = Project {
            id: ProjectId::generate(),
            client_id: input.client_id,
            name: input.name,
            created_at: now,
            updated_at: now,
        };
        self.conn
            .execute(
                "
                INSERT INTO projects (id, client_id, name, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?)
                ",
                params![
                    project.id.as_str(),
                    project.client_id.as_str(),
                    project.name,
                    format_timestamp(now),
                    format_timestamp(now),
                ],
            )
            .map_err(store_error("create", PROJECT))?;
        tracing::debug!(project_id = %project.id, "created project");
        Ok(project)
    }

    fn find_project_by_id(&self, id: &ProjectId) -> Result<Option<Project>, StoreError> {
        self.conn
            .query_row(
                "SELECT id, client_id, name, created_at, updated_at FROM projects WHERE id = ?",
                [id.as_str()],
                project_from_row,
            )
            .optional()
            .map_err(store_error("find", PROJECT))
    }

    fn find_all_projects(&self, client_id: Option<&ClientId>) -> Result<Vec<Project>, StoreError> {
        let wrap = store_error("list", PROJECT);
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT id, client_id, name, created_at, updated_at FROM projects
                WHERE ?1 IS NULL OR client_id = ?1
                ORDER BY name ASC, id ASC
                ",
            )
            .map_err(wrap)?;
        let rows = stmt
            .query_map([client_id.map(ClientId::as_str)], project_from_row)
            .map_err(wrap)?;
        let mut projects = Vec::new();
        for row in rows {
            projects.push(row.map_err(wrap)?);
        }
        Ok(projects)
    }

    fn find_project_by_name(
        &self,
        client_id: &ClientId,
        name: &str,
    ) -> Result<Option<Project>, StoreError> {
        self.conn
            .query_row(
                "
                SELECT id, client_id, name, created_at, updated_at FROM projects
                WHERE client_id = ? AND name = ?
                ORDER BY created_at ASC
                LIMIT 1
                ",
                [client_id.as_str(), name],
                project_from_row,
            )
            .optional()
            .map_err(store_error("find", PROJECT))
    }
}

impl TaskStore for Database {
    fn create_task(&mut self, input: NewTask) -> Result<Task, StoreError> {
        let now = now();
        let task = Task {
            id: TaskId::generate(),
            project_id: input.project_id,
            name: input.name,
            created_at: now,
            updated_at: now,
        };
        self.conn
            .execute(
                "
                INSERT INTO tasks (id, project_id, name, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?)
                ",
                params![
                    task.id.as_str(),
                    task.project_id.as_str(),
                    task.name,
                    format_timestamp(now),
                    format_timestamp(now),
                ],
            )
            .map_err(store_error("create", TASK))?;
        tracing::debug!(task_id = %task.id, "created task");
        Ok(task)
    }

    fn find_task_by_id(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        self.conn
            .query_row(
                "SELECT id, project_id, name, created_at, updated_at FROM tasks WHERE id = ?",
                [id.as_str()],
                task_from_row,
            )
            .optional()
            .map_err(store_error("find", TASK))
    }

    fn find_all_tasks(&self, project_id: Option<&ProjectId>) -> Result<Vec<Task>, StoreError> {
        let wrap = store_error("list", TASK);
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT id, project_id, name, created_at, updated_at FROM tasks
                WHERE ?1 IS NULL OR project_id = ?1
                ORDER BY name ASC, id ASC
                ",
            )
            .map_err(wrap)?;
        let rows = stmt
            .query_map([project_id.map(ProjectId::as_str)], task_from_row)
            .map_err(wrap)?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row.map_err(wrap)?);
        }
        Ok(tasks)
    }

    fn find_task_by_name(
        &self,
        project_id: &ProjectId,
        name: &str,
    ) -> Result<Option<Task>, StoreError> {
        self.conn
            .query_row(
                "
                SELECT id, project_id, name, created_at, updated_at FROM tasks
                WHERE project_id = ? AND name = ?
                ORDER BY created_at ASC
                LIMIT 1
                ",
                [project_id.as_str(), name],
                task_from_row,
            )
            .optional()
            .map_err(store_error("find", TASK))
    }
}

impl TimeEntryStore for Database {
    fn create_entry(&mut self, input: NewTimeEntry) -> Result<TimeEntry, StoreError> {
        let now = now();
        let entry = TimeEntry {
            id: TimeEntryId::generate(),
            client_id: input.client_id,
            project_id: input.project_id,
            task_id: input.task_id,
            description: input.description,
            started_at: input.started_at.map_or(now, |t| t.trunc_subsecs(3)),
            ended_at: None,
            created_at: now,
            updated_at: now,
        };
        self.conn
            .execute(
                "
                INSERT INTO time_entries
                (id, client_id, project_id, task_id, description, started_at, ended_at, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, NULL, ?, ?)
                ",
                params![
                    entry.id.as_str(),
                    entry.client_id.as_str(),
                    entry.project_id.as_ref().map(ProjectId::as_str),
                    entry.task_id.as_ref().map(TaskId::as_str),
                    entry.description,
                    format_timestamp(entry.started_at),
                    format_timestamp(now),
                    format_timestamp(now),
                ],
            )
            .map_err(store_error("create", TIME_ENTRY))?;
        tracing::debug!(entry_id = %entry.id, "created time entry");
        Ok(entry)
    }

    fn update_entry(
        &mut self,
        id: &TimeEntryId,
        update: TimeEntryUpdate,
    ) -> Result<TimeEntry, StoreError> {
        let changed = self
            .conn
            .execute(
                "
                UPDATE time_entries
                SET description = COALESCE(?, description),
                    started_at = COALESCE(?, started_at),
                    ended_at = COALESCE(?, ended_at),
                    updated_at = ?
                WHERE id = ?
                ",
                params![
                    update.description,
                    update.started_at.map(format_timestamp),
                    update.ended_at.map(format_timestamp),
                    format_timestamp(now()),
                    id.as_str(),
                ],
            )
            .map_err(store_error("update", TIME_ENTRY))?;
        self.entry_after_write("update", id, changed)
    }

    fn find_entry_by_id(&self, id: &TimeEntryId) -> Result<Option<TimeEntry>, StoreError> {
        Ok(self
            .query_entries("find", "WHERE id = ?", [id.as_str()])?
            .into_iter()
            .next())
    }

    fn find_running_entry(&self) -> Result<Option<TimeEntry>, StoreError> {
        Ok(self
            .query_entries("find running", "WHERE ended_at IS NULL", [])?
            .into_iter()
            .next())
    }

    fn find_entries_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeEntry>, StoreError> {
        if end <= start {
            return Ok(Vec::new());
        }
        self.query_entries(
            "list",
            "WHERE started_at >= ? AND started_at < ?",
            [format_timestamp(start), format_timestamp(end)],
        )
    }

    fn stop_entry(&mut self, id: &TimeEntryId) -> Result<TimeEntry, StoreError> {
        let now = format_timestamp(now());
        let changed = self
            .conn
            .execute(
                "UPDATE time_entries SET ended_at = ?, updated_at = ? WHERE id = ?",
                params![now, now, id.as_str()],
            )
            .map_err(store_error("stop", TIME_ENTRY))?;
        self.entry_after_write("stop", id, changed)
    }

    fn stop_entry_with_description(
        &mut self,
        id: &TimeEntryId,
        description: Option<&str>,
    ) -> Result<TimeEntry, StoreError> {
        let now = format_timestamp(now());
        let changed = self
            .conn
            .execute(
                "
                UPDATE time_entries
                SET ended_at = ?, description = ?, updated_at = ?
                WHERE id = ?
                ",
                params![now, description, now, id.as_str()],
            )
            .map_err(store_error("stop", TIME_ENTRY))?;
        self.entry_after_write("stop", id, changed)
    }
}
