//! Daemon configuration
//!
//! Stored as TOML at `<config dir>/inkbridge/config.toml`. Every key is
//! optional:
//!
//! ```toml
//! test = false
//! service_url = "https://notes.example.com/api"
//! auth_token = ""            # empty: read from the OS keyring
//! style = "github"
//! themes_dir = "/home/me/.config/inkbridge/themes"
//! log_level = "info"
//! log_file = "/home/me/.local/state/inkbridge.log"
//! remote_timeout_secs = 30
//! queue_capacity = 256
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const KEYRING_SERVICE: &str = "inkbridge";
pub const KEYRING_USER: &str = "auth_token";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("No auth token configured and none stored in the keyring")]
    MissingToken,
    #[error("Keyring error: {0}")]
    Keyring(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Dry run against an in-memory store; nothing leaves the machine
    pub test: bool,
    pub service_url: String,
    pub auth_token: String,
    /// Theme used to style markdown notes
    pub style: String,
    /// Directory of `<name>.css` files overriding the built-in themes
    pub themes_dir: Option<PathBuf>,
    pub log_level: LogLevel,
    /// Append log output here instead of stderr
    pub log_file: Option<PathBuf>,
    pub remote_timeout_secs: u64,
    /// Capacity of the watcher -> processor event queue
    pub queue_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            test: false,
            service_url: String::new(),
            auth_token: String::new(),
            style: "github".to_string(),
            themes_dir: None,
            log_level: LogLevel::Info,
            log_file: None,
            remote_timeout_secs: 30,
            queue_capacity: 256,
        }
    }
}

/// `<config dir>/inkbridge/config.toml`
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("inkbridge").join("config.toml"))
}

impl Settings {
    /// The file [`Settings::load`] reads for `path`: the explicit path, else
    /// [`default_path`] if a file exists there.
    pub fn source(path: Option<&Path>) -> Option<PathBuf> {
        match path {
            Some(path) => Some(path.to_path_buf()),
            None => default_path().filter(|path| path.exists()),
        }
    }

    /// Load settings from `path`, or from [`default_path`] when `None`.
    ///
    /// A missing file at the default location yields the defaults; an
    /// explicitly given path must exist. Runs before logging is set up, so
    /// callers report the source themselves.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = Self::source(path) else {
            return Ok(Self::default());
        };

        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be at least 1".to_string()));
        }
        if self.remote_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "remote_timeout_secs must be at least 1".to_string(),
            ));
        }
        if !self.test && self.service_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "service_url is required unless test mode is on".to_string(),
            ));
        }
        Ok(())
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }

    /// The configured token, falling back to the OS keyring.
    pub fn resolve_token(&self) -> Result<String, ConfigError> {
        if !self.auth_token.is_empty() {
            return Ok(self.auth_token.clone());
        }

        let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER)
            .map_err(|e| ConfigError::Keyring(e.to_string()))?;
        match entry.get_password() {
            Ok(token) if !token.is_empty() => Ok(token),
            Ok(_) | Err(keyring::Error::NoEntry) => Err(ConfigError::MissingToken),
            Err(e) => Err(ConfigError::Keyring(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings = Settings::from_toml(
            r#"
            test = true
            style = "minimal"
            log_level = "debug"
            "#,
        )
        .unwrap();

        assert!(settings.test);
        assert_eq!(settings.style, "minimal");
        assert_eq!(settings.log_level, LogLevel::Debug);
        assert_eq!(settings.queue_capacity, 256);
        assert_eq!(settings.remote_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "queue_capacity = \"lots\"").unwrap();

        let err = Settings::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = Settings::load(Some(&temp_dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "service_url = \"https://notes.example.com\"\nauth_token = \"abc\"\nqueue_capacity = 8\n",
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.service_url, "https://notes.example.com");
        assert_eq!(settings.queue_capacity, 8);
        assert!(settings.validate().is_ok());
        assert_eq!(settings.resolve_token().unwrap(), "abc");
    }

    #[test]
    fn test_source_prefers_explicit_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.toml");
        assert_eq!(Settings::source(Some(&path)), Some(path.clone()));
        if let Some(found) = Settings::source(None) {
            assert!(found.exists());
        }
    }

    #[test]
    fn test_validate() {
        let mut settings = Settings::default();
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));

        settings.test = true;
        assert!(settings.validate().is_ok());

        settings.queue_capacity = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("trace".parse::<LogLevel>().unwrap().as_filter(), log::LevelFilter::Trace);
        assert!("loud".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Debug.to_string(), "debug");
    }
}
