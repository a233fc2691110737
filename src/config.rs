//! Run configuration.
//!
//! Everything hangs off a base directory ("home") given by `--home` or the
//! `DISKPRINT_HOME` environment variable:
//!
//! ```text
//! <home>/
//!   configs/diskprint.toml   optional settings
//!   configs/filter.conf      filter rules
//!   log/                     one log file per run
//!   out/                     fingerprint and group files
//! ```
//!
//! Settings are layered with figment: built-in defaults, then
//! `configs/diskprint.toml`, then `DISKPRINT_*` environment variables, then
//! command-line overrides.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::scanner::DEFAULT_CHUNK_SIZE;

/// Environment variable naming the home directory.
pub const HOME_ENV: &str = "DISKPRINT_HOME";

/// Prefix of environment variables overriding settings.
pub const ENV_PREFIX: &str = "DISKPRINT_";

/// Settings file inside `configs/`.
pub const SETTINGS_FILE: &str = "diskprint.toml";

/// Default filter rule file inside `configs/`.
pub const DEFAULT_FILTER_FILE: &str = "filter.conf";

/// Errors raised while building the configuration. All of them are fatal.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// No home directory was given.
    #[error("Home directory not set: pass --home or set {HOME_ENV}")]
    MissingHome,

    /// The home path could not be made absolute.
    #[error("Cannot resolve home directory {path}: {source}")]
    ResolveHome {
        /// Home as given
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Settings could not be read or have the wrong shape.
    #[error("Invalid settings: {0}")]
    Settings(#[from] Box<figment::Error>),

    /// A setting has an unusable value.
    #[error("Invalid setting '{key}': {reason}")]
    Invalid {
        /// Setting name
        key: &'static str,
        /// Why the value is rejected
        reason: String,
    },

    /// A working directory could not be created.
    #[error("Cannot create directory {path}: {source}")]
    CreateDir {
        /// Directory path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Tunable settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Bytes read per hashing chunk
    pub chunk_size: u64,
    /// Minimum milliseconds between progress lines
    pub progress_interval_ms: u64,
    /// Filter rule file; relative paths resolve against `configs/`
    pub filter_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE as u64,
            progress_interval_ms: 1000,
            filter_file: PathBuf::from(DEFAULT_FILTER_FILE),
        }
    }
}

/// Command-line values layered over every other settings source.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SettingsOverrides {
    /// `--chunk-size`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<u64>,
    /// `--filter-file`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_file: Option<PathBuf>,
}

impl Settings {
    /// Layered provider for the settings in `configs_dir`.
    #[must_use]
    pub fn figment(configs_dir: &Path, overrides: &SettingsOverrides) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(configs_dir.join(SETTINGS_FILE)))
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["home"]))
            .merge(Serialized::defaults(overrides))
    }

    /// Extract and validate settings from a provider.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Settings`] for unreadable or ill-typed input
    /// and [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let settings: Self = figment.extract().map_err(Box::new)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid {
                key: "chunk_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        if usize::try_from(self.chunk_size).is_err() {
            return Err(ConfigError::Invalid {
                key: "chunk_size",
                reason: format!("{} does not fit in memory", self.chunk_size),
            });
        }
        if self.progress_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "progress_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.filter_file.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                key: "filter_file",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Chunk size as a buffer length.
    #[must_use]
    pub fn chunk_size_bytes(&self) -> usize {
        usize::try_from(self.chunk_size).unwrap_or(DEFAULT_CHUNK_SIZE)
    }

    /// Progress cadence.
    #[must_use]
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

/// Resolved configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base directory
    pub home: PathBuf,
    /// Log files
    pub log_dir: PathBuf,
    /// Fingerprint and group files
    pub out_dir: PathBuf,
    /// Settings and filter rules
    pub configs_dir: PathBuf,
    /// Tunables
    pub settings: Settings,
}

impl Config {
    /// Resolve directories under `home` and load layered settings.
    ///
    /// # Errors
    ///
    /// Fails with [`ConfigError::MissingHome`] when `home` is absent or
    /// empty, or when settings are invalid.
    pub fn load(home: Option<&Path>, overrides: &SettingsOverrides) -> Result<Self, ConfigError> {
        let mut config = Self::for_home(home)?;
        config.settings = Settings::from_figment(&Settings::figment(&config.configs_dir, overrides))?;
        Ok(config)
    }

    /// Directory layout for `home` with default settings.
    ///
    /// # Errors
    ///
    /// Fails when `home` is absent, empty, or cannot be made absolute.
    pub fn for_home(home: Option<&Path>) -> Result<Self, ConfigError> {
        let home = home
            .filter(|h| !h.as_os_str().is_empty())
            .ok_or(ConfigError::MissingHome)?;
        let home = std::path::absolute(home).map_err(|source| ConfigError::ResolveHome {
            path: home.to_path_buf(),
            source,
        })?;

        Ok(Self {
            log_dir: home.join("log"),
            out_dir: home.join("out"),
            configs_dir: home.join("configs"),
            home,
            settings: Settings::default(),
        })
    }

    /// Full path of the filter rule file.
    #[must_use]
    pub fn filter_path(&self) -> PathBuf {
        self.configs_dir.join(&self.settings.filter_file)
    }

    /// Create `log/` and `out/` if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::CreateDir`] for the first directory that
    /// cannot be created.
    pub fn ensure_dirs(&self) -> Result<(), ConfigError> {
        for dir in [&self.log_dir, &self.out_dir] {
            fs::create_dir_all(dir).map_err(|source| ConfigError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }
}
