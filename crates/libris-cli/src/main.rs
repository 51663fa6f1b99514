mod cmd;
mod interrupt;
mod output;
mod root;
mod runner;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, roles::RolesSubcommand, setup::SampleDataArg};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "libris",
    about = "Local setup and role provisioning for the library management system",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from libris.yaml)
    #[arg(long, global = true, env = "LIBRIS_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default libris.yaml in the project root
    Init {
        /// Project name (default: directory name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Create the required user roles (admin, staff, student)
    #[command(alias = "setup-groups")]
    SetupRoles,

    /// Inspect stored roles
    Roles {
        #[command(subcommand)]
        subcommand: RolesSubcommand,
    },

    /// Set up the project for local development
    Setup {
        /// Answer the sample-data prompt up front
        #[arg(long, value_enum, default_value = "ask")]
        sample_data: SampleDataArg,
    },

    /// Show or validate libris.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init { name } => cmd::init::run(&root, name.as_deref()),
        Commands::SetupRoles => cmd::roles::setup_roles(&root, cli.json),
        Commands::Roles { subcommand } => cmd::roles::run(&root, subcommand, cli.json),
        Commands::Setup { sample_data } => cmd::setup::run(&root, sample_data.into(), cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
