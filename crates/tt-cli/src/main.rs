use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use tt_cli::commands::{
    auth, client, export, interactive, project, report, start, status, stop, task, util,
};
use tt_cli::{ClientAction, Cli, Commands, Config, ProjectAction, TaskAction};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(tt_db::Database, Config)> {
    let config = load_config(config_path)?;

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = tt_db::Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

/// The first hint any error in the chain knows about.
fn hint_for(err: &anyhow::Error) -> Option<&'static str> {
    err.chain().find_map(|cause| {
        cause
            .downcast_ref::<tt_core::StoreError>()
            .and_then(tt_core::StoreError::hint)
            .or_else(|| {
                cause
                    .downcast_ref::<tt_auth::AuthError>()
                    .and_then(tt_auth::AuthError::hint)
            })
    })
}

fn run(cli: &Cli, out: &mut impl Write) -> Result<()> {
    let config_path = cli.config.as_deref();

    match &cli.command {
        Some(Commands::Client(action)) => {
            let (mut db, _config) = open_database(config_path)?;
            match action {
                ClientAction::Add { name } => client::add(out, &mut db, name)?,
                ClientAction::List { json } => client::list(out, &db, *json)?,
            }
        }
        Some(Commands::Project(action)) => {
            let (mut db, _config) = open_database(config_path)?;
            match action {
                ProjectAction::Add { name, client } => project::add(out, &mut db, name, client)?,
                ProjectAction::List { client, json } => {
                    project::list(out, &db, client.as_deref(), *json)?;
                }
            }
        }
        Some(Commands::Task(action)) => {
            let (mut db, _config) = open_database(config_path)?;
            match action {
                TaskAction::Add {
                    name,
                    client,
                    project,
                } => task::add(out, &mut db, name, client, project)?,
                TaskAction::List {
                    client,
                    project,
                    json,
                } => task::list(out, &db, client, project, *json)?,
            }
        }
        Some(Commands::Start(args)) => {
            let (mut db, _config) = open_database(config_path)?;
            start::run(
                out,
                &mut db,
                args,
                util::stdin_is_interactive(),
                &mut util::prompt_confirm,
            )?;
        }
        Some(Commands::Stop { description }) => {
            let (mut db, _config) = open_database(config_path)?;
            stop::run(out, &mut db, description.as_deref())?;
        }
        Some(Commands::Describe { text }) => {
            let (mut db, _config) = open_database(config_path)?;
            stop::describe(out, &mut db, text)?;
        }
        Some(Commands::Status { json }) => {
            let (db, _config) = open_database(config_path)?;
            status::run(out, &db, *json, chrono::Utc::now())?;
        }
        Some(Commands::Report {
            week: _,
            last_week,
            day,
            last_day,
            json,
        }) => {
            let (db, _config) = open_database(config_path)?;
            let period = if *last_week {
                report::Period::LastWeek
            } else if *day {
                report::Period::Day
            } else if *last_day {
                report::Period::LastDay
            } else {
                report::Period::Week
            };
            report::run(out, &db, period, *json)?;
        }
        Some(Commands::Export { format, from, to }) => {
            let from = from.as_deref().map(util::parse_datetime).transpose()?;
            let to = to.as_deref().map(util::parse_datetime).transpose()?;
            let (db, _config) = open_database(config_path)?;
            export::run(out, &db, *format, from, to)?;
        }
        Some(Commands::Login { email }) => {
            auth::login(out, &load_config(config_path)?, email.as_deref())?;
        }
        Some(Commands::Logout) => auth::logout(out, &load_config(config_path)?)?,
        Some(Commands::Whoami) => auth::whoami(out, &load_config(config_path)?)?,
        None => {
            if util::stdin_is_interactive() {
                let (mut db, _config) = open_database(config_path)?;
                interactive::run(out, &mut db)?;
            } else {
                Cli::command().write_help(out)?;
                writeln!(out)?;
            }
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so stdout stays parseable.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match run(&cli, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = out.flush();
            eprintln!("Error: {err:#}");
            if let Some(hint) = hint_for(&err) {
                eprintln!("Hint: {hint}");
            }
            ExitCode::FAILURE
        }
    }
}
