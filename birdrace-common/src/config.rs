//! Configuration loading and data folder resolution
//!
//! Resolution priority (highest first):
//! 1. Command-line arguments ([`ConfigOverrides`])
//! 2. `BIRDRACE_*` environment variables
//! 3. TOML config file
//! 4. Compiled defaults
//!
//! A missing config file is not an error: a warning is logged and the
//! defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Signing secret used when none is configured. Only suitable for development.
pub const DEV_TOKEN_SECRET: &str = "birdrace-dev-secret-change-me";

/// Database file name inside the data folder
pub const DATABASE_FILE_NAME: &str = "birdrace.db";

/// Service configuration, injected into the application state at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Interface the HTTP server binds to
    pub bind_address: String,
    /// HTTP port
    pub port: u16,
    /// Folder holding the SQLite database
    pub data_folder: PathBuf,
    /// Competition year; all scoring is restricted to it
    pub target_year: i32,
    /// HMAC secret for bearer tokens
    pub token_secret: String,
    /// Base URL of the web frontend (magic links point here)
    pub frontend_url: String,
    /// Magic link lifetime
    pub magic_link_ttl_minutes: i64,
    /// Bearer token lifetime
    pub access_token_ttl_days: i64,
    /// Upload size ceiling, enforced before parsing
    pub max_upload_bytes: usize,
    /// Allowed CORS origins (empty = frontend_url only)
    pub cors_origins: Vec<String>,
    pub email: EmailSettings,
}

/// Outbound email settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    /// Resend API key; without one, emails are written to the log instead
    pub resend_api_key: Option<String>,
    pub from_address: String,
    /// Recipient of feature requests
    pub owner_address: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8000,
            data_folder: default_data_folder(),
            target_year: 2026,
            token_secret: DEV_TOKEN_SECRET.to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            magic_link_ttl_minutes: 15,
            access_token_ttl_days: 30,
            max_upload_bytes: 10 * 1024 * 1024,
            cors_origins: Vec::new(),
            email: EmailSettings::default(),
        }
    }
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            resend_api_key: None,
            from_address: "onboarding@resend.dev".to_string(),
            owner_address: None,
        }
    }
}

/// Command-line overrides (highest priority)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Explicit config file; must exist if given
    pub config_file: Option<PathBuf>,
    pub data_folder: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub target_year: Option<i32>,
}

impl Config {
    /// Load configuration from all sources
    pub fn load(overrides: &ConfigOverrides) -> Result<Self> {
        let mut config = match &overrides.config_file {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                Self::from_toml_file(path)?
            }
            None => match default_config_file() {
                Some(path) if path.exists() => Self::from_toml_file(&path)?,
                _ => {
                    warn!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.apply_overrides(overrides);
        config.validate()?;

        if config.token_secret == DEV_TOKEN_SECRET {
            warn!("Using development token secret; set BIRDRACE_TOKEN_SECRET in production");
        }

        Ok(config)
    }

    /// Read a TOML config file
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded config file: {}", path.display());
        Ok(config)
    }

    /// Parse TOML config content; absent keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Overlay environment variables using `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("BIRDRACE_BIND_ADDRESS") {
            self.bind_address = v;
        }
        if let Some(v) = lookup("BIRDRACE_PORT") {
            self.port = parse_env("BIRDRACE_PORT", &v)?;
        }
        if let Some(v) = lookup("BIRDRACE_DATA_FOLDER") {
            self.data_folder = PathBuf::from(v);
        }
        if let Some(v) = lookup("BIRDRACE_TARGET_YEAR") {
            self.target_year = parse_env("BIRDRACE_TARGET_YEAR", &v)?;
        }
        if let Some(v) = lookup("BIRDRACE_TOKEN_SECRET") {
            self.token_secret = v;
        }
        if let Some(v) = lookup("BIRDRACE_FRONTEND_URL") {
            self.frontend_url = v;
        }
        if let Some(v) = lookup("BIRDRACE_MAX_UPLOAD_BYTES") {
            self.max_upload_bytes = parse_env("BIRDRACE_MAX_UPLOAD_BYTES", &v)?;
        }
        if let Some(v) = lookup("BIRDRACE_CORS_ORIGINS") {
            self.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(v) = lookup("RESEND_API_KEY") {
            self.email.resend_api_key = Some(v).filter(|k| !k.trim().is_empty());
        }
        if let Some(v) = lookup("BIRDRACE_EMAIL_FROM") {
            self.email.from_address = v;
        }
        if let Some(v) = lookup("BIRDRACE_OWNER_EMAIL") {
            self.email.owner_address = Some(v);
        }
        Ok(())
    }

    /// Apply command-line overrides
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(folder) = &overrides.data_folder {
            self.data_folder = folder.clone();
        }
        if let Some(addr) = &overrides.bind_address {
            self.bind_address = addr.clone();
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(year) = overrides.target_year {
            self.target_year = year;
        }
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(1900..=2999).contains(&self.target_year) {
            return Err(Error::Config(format!(
                "target_year out of range: {}",
                self.target_year
            )));
        }
        if self.token_secret.len() < 16 {
            return Err(Error::Config(
                "token_secret must be at least 16 characters".to_string(),
            ));
        }
        if self.magic_link_ttl_minutes <= 0 || self.access_token_ttl_days <= 0 {
            return Err(Error::Config("token lifetimes must be positive".to_string()));
        }
        if self.max_upload_bytes == 0 {
            return Err(Error::Config("max_upload_bytes must be positive".to_string()));
        }
        Ok(())
    }

    /// Path of the SQLite database
    pub fn database_path(&self) -> PathBuf {
        self.data_folder.join(DATABASE_FILE_NAME)
    }

    /// Create the data folder if missing
    pub fn ensure_data_folder(&self) -> Result<()> {
        if !self.data_folder.exists() {
            std::fs::create_dir_all(&self.data_folder)?;
            info!("Created data folder: {}", self.data_folder.display());
        }
        Ok(())
    }

    /// Origins allowed to call the API from a browser
    pub fn allowed_origins(&self) -> Vec<String> {
        if self.cors_origins.is_empty() {
            vec![self.frontend_url.clone()]
        } else {
            self.cors_origins.clone()
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("Invalid value for {}: {}", key, value)))
}

/// `<config dir>/birdrace/config.toml`, falling back to `/etc/birdrace/config.toml` on Linux
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("birdrace").join("config.toml"));
    if let Some(path) = &user_config {
        if path.exists() {
            return user_config;
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/birdrace/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    user_config
}

/// OS-dependent default data folder
fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("birdrace"))
        .unwrap_or_else(|| PathBuf::from("./birdrace_data"))
}
