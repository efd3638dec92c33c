//! `Config` struct, YAML persistence and validation.
//!
//! Covers:
//! - `load` / `load_from` / `save_to` (YAML file I/O with atomic write)
//! - XDG-style path helpers (`config_path`, `config_dir`)
//! - `validate` for values the pipeline cannot run with

use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration for the rendering pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding rendered artifacts (one file per key and variant)
    #[serde(default = "crate::defaults::cache_dir")]
    pub cache_dir: PathBuf,

    /// Prefix prepended to artifact file names to build their public locator
    #[serde(default = "crate::defaults::url_prefix")]
    pub url_prefix: String,

    /// fsync artifacts and their directory before reporting a write as done
    #[serde(default = "crate::defaults::bool_false")]
    pub durable_writes: bool,

    /// Remote compile service tier
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Local `pdflatex` + `pdf2svg` tier
    #[serde(default)]
    pub toolchain: ToolchainConfig,
}

/// Settings for the remote compile service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "crate::defaults::bool_true")]
    pub enabled: bool,

    /// Form POST endpoint of the compile service
    #[serde(default = "crate::defaults::remote_endpoint")]
    pub endpoint: String,

    /// Upper bound for the whole round trip (submit + fetch)
    #[serde(default = "crate::defaults::remote_timeout_secs")]
    pub timeout_secs: u64,

    /// Font size option forwarded to the service (e.g. "17px")
    #[serde(default = "crate::defaults::remote_font_size")]
    pub font_size: String,

    /// Foreground color forwarded to the service, hex without `#`
    #[serde(default = "crate::defaults::remote_color")]
    pub color: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: crate::defaults::bool_true(),
            endpoint: crate::defaults::remote_endpoint(),
            timeout_secs: crate::defaults::remote_timeout_secs(),
            font_size: crate::defaults::remote_font_size(),
            color: crate::defaults::remote_color(),
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings for the local typesetting toolchain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolchainConfig {
    #[serde(default = "crate::defaults::bool_true")]
    pub enabled: bool,

    /// Document compiler executable (name looked up on PATH, or absolute path)
    #[serde(default = "crate::defaults::compiler")]
    pub compiler: String,

    /// PDF to SVG converter executable (name looked up on PATH, or absolute path)
    #[serde(default = "crate::defaults::converter")]
    pub converter: String,

    /// Scratch directory for per-render intermediate files
    #[serde(default = "crate::defaults::work_dir")]
    pub work_dir: PathBuf,

    /// Upper bound for each subprocess invocation
    #[serde(default = "crate::defaults::toolchain_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            enabled: crate::defaults::bool_true(),
            compiler: crate::defaults::compiler(),
            converter: crate::defaults::converter(),
            work_dir: crate::defaults::work_dir(),
            timeout_secs: crate::defaults::toolchain_timeout_secs(),
        }
    }
}

impl ToolchainConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: crate::defaults::cache_dir(),
            url_prefix: crate::defaults::url_prefix(),
            durable_writes: crate::defaults::bool_false(),
            remote: RemoteConfig::default(),
            toolchain: ToolchainConfig::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the artifact cache at a different directory
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Load configuration from the default path, creating it with defaults
    /// when it does not exist yet.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        log::info!("Config path: {:?}", config_path);

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            log::info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            if let Err(e) = config.save_to(&config_path) {
                log::error!("Failed to save default config: {}", e);
                return Err(e);
            }
            Ok(config)
        }
    }

    /// Load and validate configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        log::info!("Loading config from {:?}", path);
        let contents = fs::read_to_string(path)
            .map_err(ConfigError::from)
            .with_context(|| format!("Failed to read config {path:?}"))?;
        let config: Config = serde_yaml_ng::from_str(&contents)
            .map_err(ConfigError::from)
            .with_context(|| format!("Failed to parse config {path:?}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml_ng::to_string(self)?;

        // Atomic save: write to temp file then rename to prevent corruption on crash
        let temp_path = path.with_extension("yaml.tmp");
        fs::write(&temp_path, &yaml)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Reject values the pipeline cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url_prefix.trim().is_empty() {
            return Err(ConfigError::Validation(
                "url_prefix must not be empty".to_string(),
            ));
        }
        if self.remote.enabled && self.remote.endpoint.trim().is_empty() {
            return Err(ConfigError::Validation(
                "remote.endpoint must not be empty while remote rendering is enabled".to_string(),
            ));
        }
        if self.remote.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "remote.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.toolchain.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "toolchain.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.toolchain.enabled
            && (self.toolchain.compiler.trim().is_empty()
                || self.toolchain.converter.trim().is_empty())
        {
            return Err(ConfigError::Validation(
                "toolchain.compiler and toolchain.converter must name an executable".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the configuration file path (using XDG convention)
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.yaml")
    }

    /// Get the configuration directory path (using XDG convention)
    pub fn config_dir() -> PathBuf {
        #[cfg(target_os = "windows")]
        {
            if let Some(config_dir) = dirs::config_dir() {
                config_dir.join("tikz-render")
            } else {
                PathBuf::from(".")
            }
        }
        #[cfg(not(target_os = "windows"))]
        {
            if let Some(home_dir) = dirs::home_dir() {
                home_dir.join(".config").join("tikz-render")
            } else {
                PathBuf::from(".")
            }
        }
    }
}
