//! Configuration for the Bran assistant.
//!
//! TOML-based configuration with environment overrides:
//! 1. `~/.config/bran/config.toml` (or `BRAN_CONFIG_DIR`)
//! 2. Environment variables (`WAREHOUSE_*`, `SHEETS_*`, `SMTP_*`)
//!
//! Environment variables win over file values. Secrets are wrapped in
//! [`Secret`] so they never land in debug output or logs.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A required setting is missing everywhere it could be set.
    #[error("missing required setting '{field}' (set {env_var} or add it to the config file)")]
    MissingField {
        field: &'static str,
        env_var: &'static str,
    },

    /// A setting has an unusable value.
    #[error("invalid value for '{field}': {detail}")]
    InvalidValue { field: &'static str, detail: String },
}

/// Default config filename within the config directory.
const CONFIG_FILE: &str = "config.toml";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "BRAN_CONFIG_DIR";

/// Application name for config directory resolution.
const APP_NAME: &str = "bran";

// ─────────────────────────────────────────────────────────────────────────────
// Secret
// ─────────────────────────────────────────────────────────────────────────────

/// A string that must not leak through Debug or Display.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The wrapped value. Call sites hand this to clients, never to logs.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

/// Warehouse connection settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WarehouseConfig {
    pub account: String,
    pub user: String,
    pub password: Secret,
    pub database: String,
    pub schema: String,
    pub role: String,
}

/// Spreadsheet service settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SheetsConfig {
    /// Path to the service account credentials file.
    pub service_account_path: Option<PathBuf>,
    /// Email that created sheets are shared with.
    pub user_email: String,
}

/// Outbound email settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Secret,
    pub from_email: String,
    pub from_name: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 587,
            user: String::new(),
            password: Secret::default(),
            from_email: String::new(),
            from_name: "Campaign Team".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Config
// ─────────────────────────────────────────────────────────────────────────────

/// The complete Bran configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub warehouse: WarehouseConfig,
    pub sheets: SheetsConfig,
    pub smtp: SmtpConfig,
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load from a specific file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.display().to_string(),
            source: e,
        })?;
        let mut config = Self::from_toml(&contents)?;
        config.apply_env()?;
        Ok(config)
    }

    /// Load from the default location if it exists, then apply environment
    /// overrides. A missing file is fine; env-only setups are common.
    pub fn discover() -> Result<Self> {
        let mut config = match config_path() {
            Some(path) if path.exists() => {
                tracing::debug!(path = %path.display(), "Loading config file");
                let contents =
                    std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
                        path: path.display().to_string(),
                        source: e,
                    })?;
                Self::from_toml(&contents)?
            }
            _ => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Build entirely from environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Overlay environment variables onto the current values.
    pub fn apply_env(&mut self) -> Result<()> {
        override_str(&mut self.warehouse.account, "WAREHOUSE_ACCOUNT");
        override_str(&mut self.warehouse.user, "WAREHOUSE_USER");
        override_secret(&mut self.warehouse.password, "WAREHOUSE_PASSWORD");
        override_str(&mut self.warehouse.database, "WAREHOUSE_DATABASE");
        override_str(&mut self.warehouse.schema, "WAREHOUSE_SCHEMA");
        override_str(&mut self.warehouse.role, "WAREHOUSE_ROLE");

        if let Some(path) = env_var("SHEETS_SERVICE_ACCOUNT_PATH") {
            self.sheets.service_account_path = Some(PathBuf::from(path));
        }
        override_str(&mut self.sheets.user_email, "SHEETS_USER_EMAIL");

        override_str(&mut self.smtp.host, "SMTP_HOST");
        if let Some(port) = env_var("SMTP_PORT") {
            self.smtp.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                field: "smtp.port",
                detail: format!("'{port}' is not a port number"),
            })?;
        }
        override_str(&mut self.smtp.user, "SMTP_USER");
        override_secret(&mut self.smtp.password, "SMTP_PASSWORD");
        override_str(&mut self.smtp.from_email, "SMTP_FROM_EMAIL");
        override_str(&mut self.smtp.from_name, "SMTP_FROM_NAME");
        Ok(())
    }

    /// The address campaign email is sent from, falling back to the SMTP user.
    pub fn sender_address(&self) -> Result<&str> {
        if !self.smtp.from_email.is_empty() {
            Ok(&self.smtp.from_email)
        } else if !self.smtp.user.is_empty() {
            Ok(&self.smtp.user)
        } else {
            Err(ConfigError::MissingField {
                field: "smtp.from_email",
                env_var: "SMTP_FROM_EMAIL",
            })
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn override_str(target: &mut String, name: &str) {
    if let Some(value) = env_var(name) {
        *target = value;
    }
}

fn override_secret(target: &mut Secret, name: &str) {
    if let Some(value) = env_var(name) {
        *target = Secret::new(value);
    }
}

/// The default config file path, honoring `BRAN_CONFIG_DIR`.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join(CONFIG_FILE))
}

/// The config directory, honoring `BRAN_CONFIG_DIR`.
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = env_var(CONFIG_DIR_ENV) {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
