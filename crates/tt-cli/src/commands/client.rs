//! `tt client` subcommands.

use std::io::Write;

use anyhow::{Result, bail};
use tt_core::validation::validate_client_name;
use tt_core::{ClientStore, NewClient};

/// Adds a client. Names are unique.
pub fn add<W, S>(writer: &mut W, store: &mut S, name: &str) -> Result<()>
where
    W: Write,
    S: ClientStore + ?Sized,
{
    let name = validate_client_name(name)?;
    if store.find_client_by_name(name)?.is_some() {
        bail!("Client already exists: {name}");
    }
    let client = store.create_client(NewClient {
        name: name.to_string(),
    })?;
    writeln!(writer, "Added client {}", client.name)?;
    Ok(())
}

/// Lists clients by name.
pub fn list<W, S>(writer: &mut W, store: &S, json: bool) -> Result<()>
where
    W: Write,
    S: ClientStore + ?Sized,
{
    let clients = store.find_all_clients()?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&clients)?)?;
        return Ok(());
    }

    if clients.is_empty() {
        writeln!(writer, "No clients yet. Add one with 'tt client add <name>'.")?;
        return Ok(());
    }
    for client in clients {
        writeln!(writer, "{}", client.name)?;
    }
    Ok(())
}
