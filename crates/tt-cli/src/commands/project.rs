//! `tt project` subcommands.

use std::io::Write;

use anyhow::{Result, bail};
use tt_core::validation::validate_project_name;
use tt_core::{ClientStore, NewProject, ProjectStore};

use super::util::require_client;

/// Adds a project under an existing client. Names are unique per client.
pub fn add<W, S>(writer: &mut W, store: &mut S, name: &str, client: &str) -> Result<()>
where
    W: Write,
    S: ClientStore + ProjectStore + ?Sized,
{
    let client = require_client(store, client)?;
    let name = validate_project_name(name)?;
    if store.find_project_by_name(&client.id, name)?.is_some() {
        bail!("Project already exists for client {}: {name}", client.name);
    }
    let project = store.create_project(NewProject {
        client_id: client.id,
        name: name.to_string(),
    })?;
    writeln!(writer, "Added project {} for {}", project.name, client.name)?;
    Ok(())
}

/// Lists projects, all of them or one client's.
pub fn list<W, S>(writer: &mut W, store: &S, client: Option<&str>, json: bool) -> Result<()>
where
    W: Write,
    S: ClientStore + ProjectStore + ?Sized,
{
    let filter = client.map(|name| require_client(store, name)).transpose()?;
    let projects = store.find_all_projects(filter.as_ref().map(|c| &c.id))?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&projects)?)?;
        return Ok(());
    }

    if projects.is_empty() {
        writeln!(writer, "No projects found.")?;
        return Ok(());
    }

    let clients = store.find_all_clients()?;
    for project in projects {
        let client_name = clients
            .iter()
            .find(|c| c.id == project.client_id)
            .map_or("?", |c| c.name.as_str());
        writeln!(writer, "{client_name} / {}", project.name)?;
    }
    Ok(())
}
