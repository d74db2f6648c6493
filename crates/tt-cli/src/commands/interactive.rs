//! Interactive mode: pick client, project and task from menus, then start.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::Utc;
use inquire::{InquireError, Select, Text};
use tt_core::{Store, SwitchMessage, SwitchOptions, Task};

use super::start::{resolve_target, switch_to};
use super::util::prompt_confirm;

const NO_TASK: &str = "(no task)";

/// Menu entries for the task picker. The first one starts without a task.
pub fn task_choices(tasks: &[Task]) -> Vec<String> {
    std::iter::once(NO_TASK.to_string())
        .chain(tasks.iter().map(|task| task.name.clone()))
        .collect()
}

/// Maps a picked menu position back to a task. Position 0 is "no task".
fn task_at(tasks: &[Task], index: usize) -> Option<&Task> {
    index.checked_sub(1).and_then(|i| tasks.get(i))
}

/// Shows a menu and returns the position picked, or `None` if cancelled.
fn select(message: &str, options: Vec<String>) -> Result<Option<usize>> {
    match Select::new(message, options)
        .with_help_message("Use arrow keys to navigate, Enter to select")
        .raw_prompt()
    {
        Ok(choice) => Ok(Some(choice.index)),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
        Err(err) => Err(err).context("failed to read selection"),
    }
}

/// Walks the user through starting a timer.
///
/// Returns `None` if the user cancels a menu.
pub fn run<W, S>(writer: &mut W, store: &mut S) -> Result<Option<SwitchMessage>>
where
    W: Write,
    S: Store + ?Sized,
{
    let clients = store.find_all_clients()?;
    if clients.is_empty() {
        anyhow::bail!("No clients yet. Add one with 'tt client add <name>'.");
    }
    let names = clients.iter().map(|client| client.name.clone()).collect();
    let Some(client) = select("Client:", names)?.and_then(|i| clients.get(i)) else {
        return Ok(None);
    };

    let projects = store.find_all_projects(Some(&client.id))?;
    if projects.is_empty() {
        anyhow::bail!(
            "No projects for {name}. Add one with 'tt project add <name> --client {name:?}'.",
            name = client.name
        );
    }
    let names = projects.iter().map(|project| project.name.clone()).collect();
    let Some(project) = select("Project:", names)?.and_then(|i| projects.get(i)) else {
        return Ok(None);
    };

    let tasks = store.find_all_tasks(Some(&project.id))?;
    let Some(index) = select("Task:", task_choices(&tasks))? else {
        return Ok(None);
    };
    let task = task_at(&tasks, index).map(|task| task.name.as_str());

    let description = match Text::new("Description (optional):").prompt() {
        Ok(text) => Some(text),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
            return Ok(None);
        }
        Err(err) => return Err(err).context("failed to read description"),
    };

    let target = resolve_target(
        store,
        &client.name,
        &project.name,
        task,
        description.as_deref(),
    )?;
    let options = SwitchOptions {
        force: false,
        interactive: true,
    };
    let message = switch_to(
        writer,
        store,
        target,
        options,
        &mut prompt_confirm,
        Utc::now(),
    )?;
    Ok(Some(message))
}

#[cfg(test)]
mod tests {
    use tt_core::{ProjectId, TaskId};

    use super::*;

    fn task(name: &str) -> Task {
        let now = Utc::now();
        Task {
            id: TaskId::generate(),
            project_id: ProjectId::generate(),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn no_task_comes_first() {
        let choices = task_choices(&[task("Design"), task("Build")]);
        assert_eq!(choices, vec!["(no task)", "Design", "Build"]);
    }

    #[test]
    fn first_position_means_no_task() {
        let tasks = [task("Design")];
        assert!(task_at(&tasks, 0).is_none());
        assert_eq!(task_at(&tasks, 1).unwrap().name, "Design");
        assert!(task_at(&tasks, 2).is_none());
    }

    #[test]
    fn task_named_like_the_no_task_entry_is_still_a_task() {
        let tasks = [task(NO_TASK)];
        let choices = task_choices(&tasks);
        assert_eq!(choices, vec![NO_TASK, NO_TASK]);

        assert!(task_at(&tasks, 0).is_none());
        assert_eq!(task_at(&tasks, 1).unwrap().name, NO_TASK);
    }

    #[test]
    fn empty_store_fails_before_prompting() {
        let mut store = tt_core::MemoryStore::new();
        let err = run(&mut Vec::new(), &mut store).unwrap_err();
        assert_eq!(
            err.to_string(),
            "No clients yet. Add one with 'tt client add <name>'."
        );
    }
}
