use anyhow::Result;
use clap::Args;
use std::path::Path;

use crate::config::CONFIG_FILE;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Recreate the store even if the database file already exists.
    #[arg(long)]
    pub force: bool,
}

const CONFIG_TOML: &str = "[store]\npath = \"bylines.db\"\n";

/// Execute `byl init`: create and migrate the store, and drop a default
/// `bylines.toml` next to it when none exists.
///
/// # Errors
///
/// Returns an error if the store already exists and `--force` is not set,
/// or if any filesystem or migration step fails.
pub fn run_init(args: &InitArgs, db: &Path, root: &Path) -> Result<()> {
    if db.exists() {
        if !args.force {
            anyhow::bail!(
                "{} already exists. Use `byl init --force` to recreate it.",
                db.display()
            );
        }
        std::fs::remove_file(db)?;
        // WAL sidecars from the previous store would otherwise be replayed
        // into the fresh database.
        for suffix in ["-wal", "-shm"] {
            let mut sidecar = db.as_os_str().to_owned();
            sidecar.push(suffix);
            let _ = std::fs::remove_file(Path::new(&sidecar));
        }
    }

    let conn = bylines_core::store::open(db)?;
    drop(conn);

    let config_path = root.join(CONFIG_FILE);
    if !config_path.exists() {
        std::fs::write(&config_path, CONFIG_TOML)?;
    }

    println!("✓ Initialized store at {}", db.display());
    println!();
    println!("Next steps:");
    println!("  Load a legacy dump:");
    println!("    byl import --file dump.jsonl");
    println!();
    println!("  Run the migration:");
    println!("    byl reconcile");

    Ok(())
}
