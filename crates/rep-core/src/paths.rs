//! Location of the store and live snapshot files.
//!
//! Resolution order for the live snapshot:
//! 1. `REPLIVE_PATH` (a leading `~` is expanded)
//! 2. `$XDG_DATA_HOME/rep-cli/live.json`
//! 3. `~/.local/share/rep-cli/live.json`
//!
//! The store file always lives in the data directory (steps 2 and 3).

use crate::{RepError, Result};
use std::path::{Path, PathBuf};

/// Overrides the live snapshot path.
pub const LIVE_PATH_ENV: &str = "REPLIVE_PATH";
/// Base directory for per-user data.
pub const DATA_HOME_ENV: &str = "XDG_DATA_HOME";

pub const STORE_FILE_NAME: &str = "store.json";
pub const LIVE_FILE_NAME: &str = "live.json";

const APP_DIR_NAME: &str = "rep-cli";

/// Resolved file locations shared by the ingest host and query consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub data_dir: PathBuf,
    pub store_file: PathBuf,
    pub live_file: PathBuf,
}

impl DataPaths {
    /// Resolve from the process environment.
    pub fn resolve() -> Result<Self> {
        Self::resolve_with(|key| std::env::var(key).ok(), dirs::home_dir())
    }

    /// Resolve from an explicit environment lookup and home directory.
    pub fn resolve_with<F>(env: F, home: Option<PathBuf>) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = data_dir_with(&env, home.as_deref())?;
        let live_file = match env(LIVE_PATH_ENV).filter(|v| !v.is_empty()) {
            Some(raw) => expand_home(&raw, home.as_deref())?,
            None => data_dir.join(LIVE_FILE_NAME),
        };

        Ok(Self {
            store_file: data_dir.join(STORE_FILE_NAME),
            live_file,
            data_dir,
        })
    }

    /// Live snapshot path alone. An absolute `REPLIVE_PATH` resolves even
    /// without a home directory.
    pub fn live_file_with<F>(env: F, home: Option<PathBuf>) -> Result<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        match env(LIVE_PATH_ENV).filter(|v| !v.is_empty()) {
            Some(raw) => expand_home(&raw, home.as_deref()),
            None => Ok(data_dir_with(&env, home.as_deref())?.join(LIVE_FILE_NAME)),
        }
    }
}

fn data_dir_with<F>(env: &F, home: Option<&Path>) -> Result<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    match env(DATA_HOME_ENV).filter(|v| !v.is_empty()) {
        Some(xdg) => Ok(PathBuf::from(xdg).join(APP_DIR_NAME)),
        None => Ok(home
            .ok_or(RepError::HomeDirUnavailable)?
            .join(".local")
            .join("share")
            .join(APP_DIR_NAME)),
    }
}

/// Expand `~` and `~/...` against `home`. Other paths pass through.
pub fn expand_home(raw: &str, home: Option<&Path>) -> Result<PathBuf> {
    if raw == "~" {
        return home.map(Path::to_path_buf).ok_or(RepError::HomeDirUnavailable);
    }
    if let Some(rest) = raw.strip_prefix("~/") {
        return home
            .map(|h| h.join(rest))
            .ok_or(RepError::HomeDirUnavailable);
    }
    Ok(PathBuf::from(raw))
}
