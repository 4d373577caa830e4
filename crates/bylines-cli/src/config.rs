//! Project configuration (`bylines.toml`).
//!
//! The config file is optional; every key has a default. Store path
//! precedence, highest first: `--db` flag, `[store] path` in the config,
//! then `bylines.db` next to the config.

use anyhow::{Context, Result};
use bylines_core::ErrorCode;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file name looked up in the working directory.
pub const CONFIG_FILE: &str = "bylines.toml";

/// Store file name used when nothing overrides it.
pub const DEFAULT_DB: &str = "bylines.db";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct StoreConfig {
    /// Store path, relative paths resolve against the config's directory.
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load `bylines.toml` from `root`, or defaults when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| {
            format!(
                "[{}] {}: {}",
                ErrorCode::ConfigParseError,
                ErrorCode::ConfigParseError.message(),
                path.display()
            )
        })
    }
}

/// Resolve the store path from the flag, the config, or the default.
///
/// # Errors
///
/// Returns an error if the config file is present but malformed.
pub fn resolve_db_path(flag: Option<&Path>, root: &Path) -> Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path.to_path_buf());
    }

    let config = Config::load(root)?;
    Ok(match config.store.path {
        Some(path) if path.is_absolute() => path,
        Some(path) => root.join(path),
        None => root.join(DEFAULT_DB),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_config_uses_default_db() {
        let dir = TempDir::new().expect("temp dir");
        let path = resolve_db_path(None, dir.path()).expect("resolve");
        assert_eq!(path, dir.path().join(DEFAULT_DB));
    }

    #[test]
    fn config_path_resolves_relative_to_root() {
        let dir = TempDir::new().expect("temp dir");
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[store]\npath = \"data/authorship.db\"\n",
        )
        .expect("write config");

        let path = resolve_db_path(None, dir.path()).expect("resolve");
        assert_eq!(path, dir.path().join("data/authorship.db"));
    }

    #[test]
    fn flag_beats_config() {
        let dir = TempDir::new().expect("temp dir");
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[store]\npath = \"from-config.db\"\n",
        )
        .expect("write config");

        let flag = PathBuf::from("/tmp/from-flag.db");
        let path = resolve_db_path(Some(&flag), dir.path()).expect("resolve");
        assert_eq!(path, flag);
    }

    #[test]
    fn malformed_config_reports_code() {
        let dir = TempDir::new().expect("temp dir");
        std::fs::write(dir.path().join(CONFIG_FILE), "[store\npath=").expect("write config");

        let err = resolve_db_path(None, dir.path()).expect_err("must fail");
        assert!(format!("{err:#}").contains("E1002"));
    }

    #[test]
    fn empty_config_is_valid() {
        let dir = TempDir::new().expect("temp dir");
        std::fs::write(dir.path().join(CONFIG_FILE), "").expect("write config");
        let path = resolve_db_path(None, dir.path()).expect("resolve");
        assert_eq!(path, dir.path().join(DEFAULT_DB));
    }
}
