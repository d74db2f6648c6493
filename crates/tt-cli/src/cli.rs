//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Personal time tracker.
///
/// Tracks time against clients, projects and tasks with a single running
/// timer. Run without a subcommand in a terminal to pick what to work on.
#[derive(Debug, Parser)]
#[command(name = "tt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage clients.
    #[command(subcommand)]
    Client(ClientAction),

    /// Manage projects.
    #[command(subcommand)]
    Project(ProjectAction),

    /// Manage tasks.
    #[command(subcommand)]
    Task(TaskAction),

    /// Start a timer, switching away from any running one.
    Start(StartArgs),

    /// Stop the running timer.
    Stop {
        /// Replace the entry description as it is stopped.
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Set the description of the running timer.
    Describe {
        /// The new description.
        text: String,
    },

    /// Show the running timer.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Summarize tracked time per client and project.
    Report {
        /// Report on the current week (default).
        #[arg(long, group = "period")]
        week: bool,

        /// Report on the previous week.
        #[arg(long, group = "period")]
        last_week: bool,

        /// Report on today.
        #[arg(long, group = "period")]
        day: bool,

        /// Report on yesterday.
        #[arg(long, group = "period")]
        last_day: bool,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Export time entries.
    Export {
        /// Output format.
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,

        /// Include entries started at or after this time (ISO 8601 or relative, e.g. "7 days ago").
        #[arg(long)]
        from: Option<String>,

        /// Include entries started before this time (ISO 8601 or relative).
        #[arg(long)]
        to: Option<String>,
    },

    /// Sign in to the hosted account.
    Login {
        /// Account email. Prompted for when omitted.
        #[arg(long)]
        email: Option<String>,
    },

    /// Sign out and forget the stored session.
    Logout,

    /// Show the signed-in user.
    Whoami,
}

#[derive(Debug, Subcommand)]
pub enum ClientAction {
    /// Add a client.
    Add {
        /// Client name.
        name: String,
    },
    /// List clients.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum ProjectAction {
    /// Add a project under a client.
    Add {
        /// Project name.
        name: String,
        /// Owning client name.
        #[arg(long)]
        client: String,
    },
    /// List projects.
    List {
        /// Only list projects of this client.
        #[arg(long)]
        client: Option<String>,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum TaskAction {
    /// Add a task under a project.
    Add {
        /// Task name.
        name: String,
        /// Client name.
        #[arg(long)]
        client: String,
        /// Project name.
        #[arg(long)]
        project: String,
    },
    /// List tasks of a project.
    List {
        /// Client name.
        #[arg(long)]
        client: String,
        /// Project name.
        #[arg(long)]
        project: String,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Args)]
pub struct StartArgs {
    /// Client name.
    #[arg(long)]
    pub client: String,

    /// Project name.
    #[arg(long)]
    pub project: String,

    /// Task name. Created under the project if it does not exist.
    #[arg(long)]
    pub task: Option<String>,

    /// What you are working on.
    #[arg(short, long)]
    pub description: Option<String>,

    /// Stop any running timer without asking.
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn start_parses_all_flags() {
        let cli = Cli::parse_from([
            "tt",
            "start",
            "--client",
            "Acme",
            "--project",
            "Website",
            "--task",
            "Design",
            "-d",
            "mockups",
            "--force",
        ]);
        let Some(Commands::Start(args)) = cli.command else {
            panic!("expected start command");
        };
        assert_eq!(args.client, "Acme");
        assert_eq!(args.project, "Website");
        assert_eq!(args.task.as_deref(), Some("Design"));
        assert_eq!(args.description.as_deref(), Some("mockups"));
        assert!(args.force);
    }

    #[test]
    fn report_periods_are_exclusive() {
        let result = Cli::try_parse_from(["tt", "report", "--week", "--day"]);
        assert!(result.is_err());
    }

    #[test]
    fn export_defaults_to_csv() {
        let cli = Cli::parse_from(["tt", "export"]);
        let Some(Commands::Export { format, from, to }) = cli.command else {
            panic!("expected export command");
        };
        assert_eq!(format, ExportFormat::Csv);
        assert!(from.is_none());
        assert!(to.is_none());
    }
}
