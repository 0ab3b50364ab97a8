//! Configuration structures.
//!
//! Configuration is layered: built-in defaults, then an optional JSON file,
//! then environment variables, then command-line flags (applied by the
//! binary). The resulting [`Config`] is handed explicitly to the daemon and
//! client constructors.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::{Error, Result};

/// Environment variable naming the engine installation directly.
pub const INSTALL_PATH_ENV: &str = "LO_PATH";

/// Environment variable selecting the log format (`json` or plain).
pub const LOG_FORMAT_ENV: &str = "OFFICECONV_LOG_FORMAT";

/// Global configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Engine discovery and execution.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Daemon transport settings.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Client connect/auto-spawn settings.
    #[serde(default)]
    pub client: ClientConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from an optional JSON file, then apply the
    /// process environment on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var_os(key));
        Ok(config)
    }

    /// Parse a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {}", path.display(), e)))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Overlay environment variables, looked up through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<std::ffi::OsString>,
    {
        if let Some(path) = lookup(INSTALL_PATH_ENV) {
            self.engine.install_path = Some(PathBuf::from(path));
        }
        if let Some(format) = lookup(LOG_FORMAT_ENV) {
            self.observability.json_logs = format.eq_ignore_ascii_case("json");
        }
    }
}

/// Engine discovery and execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Explicit installation directory; bypasses discovery entirely.
    pub install_path: Option<PathBuf>,

    /// Parent directory scanned for versioned installations.
    pub scan_root: PathBuf,

    /// Upper bound on a single conversion run (unbounded when absent).
    #[serde(with = "humantime_serde")]
    pub convert_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            install_path: None,
            scan_root: PathBuf::from("/opt"),
            convert_timeout: Some(Duration::from_secs(300)),
        }
    }
}

/// Daemon transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Maximum accepted frame payload in bytes.
    pub max_frame_bytes: u32,

    /// Time allowed for a client to deliver a whole request. A connection
    /// that stalls beyond it is dropped so the next client can be served.
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,

    /// Time allowed for writing the result back.
    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: 5 * 1024 * 1024,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(10),
        }
    }
}

/// Client connect/auto-spawn settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Launch a daemon when none is listening at the socket path.
    pub auto_spawn: bool,

    /// How long to keep retrying the connect after a launch.
    #[serde(with = "humantime_serde")]
    pub spawn_timeout: Duration,

    /// First retry delay after a launch; doubles per attempt.
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,

    /// Cap for the retry delay.
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,

    /// Maximum accepted result frame in bytes.
    pub max_frame_bytes: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            auto_spawn: true,
            spawn_timeout: Duration::from_secs(10),
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(500),
            max_frame_bytes: 64,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter when `RUST_LOG` is unset (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            json_logs: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::io::Write;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert!(config.client.auto_spawn);
        assert_eq!(config.engine.scan_root, PathBuf::from("/opt"));
        assert!(config.engine.install_path.is_none());
        assert!(config.client.initial_backoff <= config.client.max_backoff);
    }

    #[test]
    fn env_override_sets_install_path() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            INSTALL_PATH_ENV => Some(OsString::from("/srv/office/program")),
            LOG_FORMAT_ENV => Some(OsString::from("JSON")),
            _ => None,
        });
        assert_eq!(
            config.engine.install_path,
            Some(PathBuf::from("/srv/office/program"))
        );
        assert!(config.observability.json_logs);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"client": {{"auto_spawn": false, "spawn_timeout": "2s"}}, "daemon": {{"read_timeout": "500ms"}}}}"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert!(!config.client.auto_spawn);
        assert_eq!(config.client.spawn_timeout, Duration::from_secs(2));
        assert_eq!(config.client.initial_backoff, Duration::from_millis(50));
        assert_eq!(config.daemon.read_timeout, Duration::from_millis(500));
        assert_eq!(config.daemon.max_frame_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = Config::from_file(Path::new("/nonexistent/officeconv.json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
