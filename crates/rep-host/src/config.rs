//! Host configuration.
//!
//! Sources, later ones winning: built-in defaults, an optional TOML file,
//! the environment, then command-line flags (applied by `main`).

use anyhow::Result;
use rep_core::{expand_home, DataPaths, LiveOptions, DEFAULT_CAPACITY, LIVE_PATH_ENV};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Set to `1` to keep the live snapshot when the agent disconnects. Browser
/// native messaging cannot pass custom flags, so this is the usual switch.
pub const KEEP_ON_DISCONNECT_ENV: &str = "REP_KEEP_ON_DISCONNECT";

/// Config file looked up in the data directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "host.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostConfig {
    /// Explicit live snapshot path. `~` is expanded.
    #[serde(default)]
    pub live_path: Option<PathBuf>,
    #[serde(default)]
    pub keep_on_disconnect: bool,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            live_path: None,
            keep_on_disconnect: false,
            capacity: default_capacity(),
        }
    }
}

impl HostConfig {
    /// Load config from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HostConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `host.toml` from the data directory, or fall back to defaults.
    pub fn load() -> Result<Self> {
        if let Ok(paths) = DataPaths::resolve() {
            let config_path = paths.data_dir.join(DEFAULT_CONFIG_FILE);
            if config_path.exists() {
                return Self::load_from(&config_path);
            }
        }
        Ok(HostConfig::default())
    }

    /// Apply environment overrides from `env`. `REPLIVE_PATH` replaces a
    /// `live_path` from the config file.
    pub fn apply_env<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if env(KEEP_ON_DISCONNECT_ENV).as_deref() == Some("1") {
            self.keep_on_disconnect = true;
        }
        if let Some(path) = env(LIVE_PATH_ENV).filter(|v| !v.is_empty()) {
            self.live_path = Some(PathBuf::from(path));
        }
    }

    pub fn live_options(&self) -> LiveOptions {
        LiveOptions {
            capacity: self.capacity.max(1),
            keep_on_disconnect: self.keep_on_disconnect,
        }
    }

    /// Where the live snapshot goes: the configured path if any, otherwise
    /// the usual `REPLIVE_PATH` / data directory resolution.
    pub fn live_file_with<F>(&self, env: F, home: Option<PathBuf>) -> Result<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        match &self.live_path {
            Some(path) => Ok(expand_home(&path.to_string_lossy(), home.as_deref())?),
            None => Ok(DataPaths::live_file_with(env, home)?),
        }
    }

    pub fn live_file(&self) -> Result<PathBuf> {
        self.live_file_with(|key| std::env::var(key).ok(), dirs::home_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let config = HostConfig::default();
        assert_eq!(config.capacity, 10_000);
        assert!(!config.keep_on_disconnect);
        assert!(config.live_path.is_none());
    }

    #[test]
    fn test_load_partial_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("host.toml");
        std::fs::write(&path, "keep_on_disconnect = true\n").unwrap();

        let config = HostConfig::load_from(&path).unwrap();
        assert!(config.keep_on_disconnect);
        assert_eq!(config.capacity, 10_000);
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("host.toml");
        std::fs::write(&path, "capacity = \"lots\"\n").unwrap();
        assert!(HostConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_keep_env_override() {
        let mut config = HostConfig::default();
        config.apply_env(|key| (key == KEEP_ON_DISCONNECT_ENV).then(|| "0".to_string()));
        assert!(!config.keep_on_disconnect);
        config.apply_env(|key| (key == KEEP_ON_DISCONNECT_ENV).then(|| "1".to_string()));
        assert!(config.keep_on_disconnect);
        assert!(config.live_options().keep_on_disconnect);
    }

    #[test]
    fn test_live_file_resolution() {
        let config = HostConfig::default();
        let path = config
            .live_file_with(no_env, Some(PathBuf::from("/home/u")))
            .unwrap();
        assert_eq!(path, PathBuf::from("/home/u/.local/share/rep-cli/live.json"));

        let config = HostConfig {
            live_path: Some(PathBuf::from("~/cap/live.json")),
            ..Default::default()
        };
        let path = config
            .live_file_with(no_env, Some(PathBuf::from("/home/u")))
            .unwrap();
        assert_eq!(path, PathBuf::from("/home/u/cap/live.json"));
    }

    #[test]
    fn test_env_live_path_beats_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("host.toml");
        std::fs::write(&path, "live_path = \"/from/toml/live.json\"\n").unwrap();

        let env = |key: &str| (key == LIVE_PATH_ENV).then(|| "/from/env/live.json".to_string());
        let mut config = HostConfig::load_from(&path).unwrap();
        config.apply_env(env);
        assert_eq!(
            config.live_file_with(env, None).unwrap(),
            PathBuf::from("/from/env/live.json")
        );

        // without the variable the file's path stands
        let mut config = HostConfig::load_from(&path).unwrap();
        config.apply_env(no_env);
        assert_eq!(
            config.live_file_with(no_env, None).unwrap(),
            PathBuf::from("/from/toml/live.json")
        );
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let config = HostConfig {
            capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.live_options().capacity, 1);
    }
}
