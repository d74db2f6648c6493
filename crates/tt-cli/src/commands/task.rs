//! `tt task` subcommands.

use std::io::Write;

use anyhow::{Result, bail};
use tt_core::validation::validate_task_name;
use tt_core::{ClientStore, NewTask, ProjectStore, TaskStore};

use super::util::{require_client, require_project};

/// Adds a task under an existing project. Names are unique per project.
pub fn add<W, S>(
    writer: &mut W,
    store: &mut S,
    name: &str,
    client: &str,
    project: &str,
) -> Result<()>
where
    W: Write,
    S: ClientStore + ProjectStore + TaskStore + ?Sized,
{
    let client = require_client(store, client)?;
    let project = require_project(store, &client, project)?;
    let name = validate_task_name(name)?;
    if store.find_task_by_name(&project.id, name)?.is_some() {
        bail!("Task already exists for project {}: {name}", project.name);
    }
    let task = store.create_task(NewTask {
        project_id: project.id,
        name: name.to_string(),
    })?;
    writeln!(
        writer,
        "Added task {} for {} / {}",
        task.name, client.name, project.name
    )?;
    Ok(())
}

/// Lists the tasks of one project.
pub fn list<W, S>(
    writer: &mut W,
    store: &S,
    client: &str,
    project: &str,
    json: bool,
) -> Result<()>
where
    W: Write,
    S: ClientStore + ProjectStore + TaskStore + ?Sized,
{
    let client = require_client(store, client)?;
    let project = require_project(store, &client, project)?;
    let tasks = store.find_all_tasks(Some(&project.id))?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&tasks)?)?;
        return Ok(());
    }

    if tasks.is_empty() {
        writeln!(writer, "No tasks for {} / {}.", client.name, project.name)?;
        return Ok(());
    }
    for task in tasks {
        writeln!(writer, "{}", task.name)?;
    }
    Ok(())
}
