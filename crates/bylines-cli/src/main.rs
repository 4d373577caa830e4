#![forbid(unsafe_code)]

mod cmd;
mod config;
mod output;

use clap::{Parser, Subcommand};
use output::OutputMode;
use std::env;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "bylines: authorship history migration and reconstruction",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Store database path (overrides bylines.toml).
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Emit JSON output (alias for --format json).
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Derive the output mode from flags, env, and TTY state.
    fn output_mode(&self) -> OutputMode {
        output::resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Create and migrate the store",
        after_help = "EXAMPLES:\n    # Create bylines.db in the current directory\n    byl init\n\n    # Recreate an existing store\n    byl init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        about = "Bulk-load a JSONL legacy dump",
        after_help = "EXAMPLES:\n    # Load actors, works, links, and the change log\n    byl import --file dump.jsonl\n\n    # Emit machine-readable output\n    byl import --file dump.jsonl --json"
    )]
    Import(cmd::import::ImportArgs),

    #[command(
        about = "Replay the change log into authorship rows",
        long_about = "Replay creator-link history into normalized authorship rows. \
                      Safe to re-run; already-migrated groups are skipped.",
        after_help = "EXAMPLES:\n    # Migrate everything\n    byl reconcile\n\n    # Migrate one work's versions\n    byl reconcile --work 42\n\n    # Emit machine-readable output\n    byl reconcile --json"
    )]
    Reconcile(cmd::reconcile::ReconcileArgs),

    #[command(
        about = "Show a work's version history timeline",
        after_help = "EXAMPLES:\n    # Merged per-version timeline\n    byl history 42\n\n    # Emit machine-readable output\n    byl history 42 --json"
    )]
    History(cmd::history::HistoryArgs),

    #[command(
        about = "List canonical identities",
        after_help = "EXAMPLES:\n    byl actors\n    byl actors --json"
    )]
    Actors(cmd::actors::ActorsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("BYLINES_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "bylines=debug,info"
        } else {
            "bylines=info,warn"
        })
    });

    let format = env::var("BYLINES_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    // Diagnostics go to stderr; stdout carries only command output, so
    // `--json` stays machine-parseable.
    let registry = tracing_subscriber::registry().with(filter);
    if format == "json" {
        registry
            .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let root = std::env::current_dir()?;
    let mode = cli.output_mode();
    let db = config::resolve_db_path(cli.db.as_deref(), &root)?;

    let result = match cli.command {
        Commands::Init(args) => cmd::init::run_init(&args, &db, &root),
        Commands::Import(args) => cmd::import::run_import(&args, &db, mode),
        Commands::Reconcile(args) => cmd::reconcile::run_reconcile(&args, &db, mode),
        Commands::History(args) => cmd::history::run_history(&args, &db, mode),
        Commands::Actors(args) => cmd::actors::run_actors(&args, &db, mode),
    };

    if let Err(error) = result {
        output::render_error(mode, &output::CliError::new(format!("{error:#}")))?;
        std::process::exit(1);
    }
    Ok(())
}
