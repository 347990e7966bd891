use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ticket_dispatch::config::LoggingSection;

mod cmd;

#[derive(Parser)]
#[command(name = "ticket-dispatch")]
#[command(version, about = "Route support tickets to AI agents and process them")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Config file. Defaults to .dispatch/dispatch.toml in the project dir.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database path. Overrides the config file and DISPATCH_DB_PATH.
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the .dispatch directory, config file and ticket database
    Init {
        /// Overwrite an existing dispatch.toml
        #[arg(long)]
        force: bool,
    },
    /// List the registered agents
    Agents,
    /// Create, inspect and update tickets
    Ticket {
        #[command(subcommand)]
        command: TicketCommands,
    },
    /// Run dispatch passes for the configured agents
    Run {
        /// Agent type to run (repeatable). Defaults to `dispatch.agents`.
        #[arg(short, long = "agent")]
        agents: Vec<String>,

        /// Run a single pass and exit
        #[arg(long)]
        once: bool,

        /// Print agent events to stdout as JSON lines
        #[arg(long)]
        events: bool,
    },
    /// View or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum TicketCommands {
    /// Open a new ticket
    Create {
        #[arg(long)]
        title: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Agent type tag, e.g. customer_service
        #[arg(long)]
        agent: String,

        #[arg(long, default_value = "medium")]
        priority: String,

        /// Owning user id
        #[arg(long)]
        user: Option<i64>,

        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// List tickets, optionally filtered
    List {
        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        agent: Option<String>,

        #[arg(long)]
        user: Option<i64>,
    },
    /// Show a ticket and its comments
    Show { id: i64 },
    /// Close a ticket
    Close { id: i64 },
    /// Put a resolved or closed ticket back in the queue
    Reopen { id: i64 },
    /// Route a ticket to a different agent
    Reassign {
        id: i64,
        #[arg(long)]
        agent: String,
    },
    /// Set the human assignee
    Assign {
        id: i64,
        #[arg(long)]
        user: i64,
    },
    /// Delete a ticket and its comments
    Delete { id: i64 },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Write a default dispatch.toml
    Init,
}

fn init_tracing(logging: &LoggingSection, verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new(&logging.level)
        }
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json || logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let config = cmd::load_config(&project_dir, &cli)?;
    init_tracing(&config.logging, cli.verbose, cli.log_json);

    match &cli.command {
        Commands::Init { force } => cmd::cmd_init(&project_dir, &config, *force)?,
        Commands::Agents => cmd::cmd_agents(),
        Commands::Ticket { command } => cmd::cmd_ticket(&config, command.clone())?,
        Commands::Run {
            agents,
            once,
            events,
        } => cmd::cmd_run(&config, agents, *once, *events).await?,
        Commands::Config { command } => cmd::cmd_config(&project_dir, &config, command.clone())?,
    }

    Ok(())
}
