//! Subcommand handlers for the `byl` binary.

pub mod actors;
pub mod history;
pub mod import;
pub mod init;
pub mod reconcile;

use anyhow::{Context as _, Result};
use bylines_core::ErrorCode;
use rusqlite::Connection;
use std::path::Path;

/// Open an existing store, refusing to create one implicitly.
///
/// # Errors
///
/// Returns an error if the store file does not exist or fails to open.
pub fn open_existing_store(db: &Path) -> Result<Connection> {
    if !db.exists() {
        anyhow::bail!(
            "[{}] {}: {} ({})",
            ErrorCode::NotInitialized,
            ErrorCode::NotInitialized.message(),
            db.display(),
            ErrorCode::NotInitialized.hint().unwrap_or_default(),
        );
    }
    bylines_core::store::open(db).with_context(|| format!("open store {}", db.display()))
}
