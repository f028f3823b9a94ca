//! sqldoc settings
//!
//! Settings come from three layers, each overriding the previous one:
//! - the settings file (JSON, or TOML when the file ends in `.toml`)
//! - `SQLDOC_*` environment variables
//! - command line flags, applied by the binary
//!
//! Secrets (password, access token) are read but never written back.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use sqldoc_catalog::ExtractorConfig;
use sqldoc_core::ConnectionConfig;
use sqldoc_render::OutputFormat;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

mod settings_file;

pub use settings_file::*;

pub const DEFAULT_PORT: u16 = 1433;

pub const ENV_SERVER: &str = "SQLDOC_SERVER";
pub const ENV_PORT: &str = "SQLDOC_PORT";
pub const ENV_DATABASE: &str = "SQLDOC_DATABASE";
pub const ENV_USERNAME: &str = "SQLDOC_USERNAME";
pub const ENV_PASSWORD: &str = "SQLDOC_PASSWORD";
pub const ENV_OUTPUT_DIR: &str = "SQLDOC_OUTPUT_DIR";
pub const ENV_INCLUDE_SYSTEM_OBJECTS: &str = "SQLDOC_INCLUDE_SYSTEM_OBJECTS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SqldocSettings {
    pub connection: ConnectionSettings,
    pub extraction: ExtractorConfig,
    pub output: OutputSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    pub server: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Azure AD access token obtained by the caller
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    pub encrypt: bool,
    pub trust_server_certificate: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            server: String::new(),
            port: DEFAULT_PORT,
            database: String::new(),
            username: None,
            password: None,
            access_token: None,
            encrypt: true,
            trust_server_certificate: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub directory: PathBuf,
    pub formats: BTreeSet<OutputFormat>,
    /// Replaces the built-in HTML template
    pub html_template: Option<PathBuf>,
    /// Replaces the built-in Markdown template
    pub markdown_template: Option<PathBuf>,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("docs"),
            formats: BTreeSet::from([OutputFormat::Html, OutputFormat::Markdown, OutputFormat::Json]),
            html_template: None,
            markdown_template: None,
        }
    }
}

impl OutputSettings {
    /// Read the configured template overrides
    pub fn template_overrides(&self) -> Result<Vec<(OutputFormat, String)>> {
        let mut overrides = Vec::new();
        for (format, path) in [
            (OutputFormat::Html, &self.html_template),
            (OutputFormat::Markdown, &self.markdown_template),
        ] {
            if let Some(path) = path {
                let source = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {} template from {:?}", format, path))?;
                overrides.push((format, source));
            }
        }
        Ok(overrides)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is not set
    pub level: String,
    /// Directory for daily JSON log files; console only when unset
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

impl SqldocSettings {
    /// Load from the default location, or defaults when no file exists
    pub fn load() -> Result<Self> {
        let path = settings_path()?;
        if !path.exists() {
            tracing::debug!(path = ?path, "no settings file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {:?}", path))?;
        let settings = match FileFormat::for_path(path) {
            FileFormat::Toml => toml::from_str(&content)
                .with_context(|| format!("Failed to parse settings TOML in {:?}", path))?,
            FileFormat::Json => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse settings JSON in {:?}", path))?,
        };
        tracing::debug!(path = ?path, "loaded settings");
        Ok(settings)
    }

    /// Write the settings; the password and access token are left out
    pub fn save_to(&self, path: &Path) -> Result<()> {
        ensure_parent(path)?;
        let content = match FileFormat::for_path(path) {
            FileFormat::Toml => toml::to_string_pretty(self).context("Failed to encode settings as TOML")?,
            FileFormat::Json => serde_json::to_string_pretty(self)?,
        };
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write settings to {:?}", path))?;
        Ok(())
    }

    /// Apply `SQLDOC_*` overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(server) = lookup(ENV_SERVER) {
            self.connection.server = server;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.connection.port = port
                .trim()
                .parse()
                .with_context(|| format!("{} must be a port number, got {:?}", ENV_PORT, port))?;
        }
        if let Some(database) = lookup(ENV_DATABASE) {
            self.connection.database = database;
        }
        if let Some(username) = lookup(ENV_USERNAME) {
            self.connection.username = Some(username);
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            self.connection.password = Some(password);
        }
        if let Some(directory) = lookup(ENV_OUTPUT_DIR) {
            self.output.directory = PathBuf::from(directory);
        }
        if let Some(flag) = lookup(ENV_INCLUDE_SYSTEM_OBJECTS) {
            self.extraction.include_system_objects = parse_flag(ENV_INCLUDE_SYSTEM_OBJECTS, &flag)?;
        }
        Ok(())
    }

    pub fn apply_process_env(&mut self) -> Result<()> {
        self.apply_env(|key| std::env::var(key).ok())
    }

    /// Connection configuration for the SQL Server driver
    pub fn to_connection_config(&self) -> Result<ConnectionConfig> {
        let connection = &self.connection;
        if connection.server.trim().is_empty() {
            bail!("No server configured (set connection.server or {})", ENV_SERVER);
        }
        if connection.database.trim().is_empty() {
            bail!("No database configured (set connection.database or {})", ENV_DATABASE);
        }

        let mut config = ConnectionConfig::new_mssql(&connection.server, connection.port, &connection.database)
            .with_param("encrypt", connection.encrypt)
            .with_param("trust_cert", connection.trust_server_certificate);
        if let Some(username) = &connection.username {
            config = config.with_credentials(username, connection.password.as_deref());
        }
        if let Some(token) = &connection.access_token {
            config = config.with_param("access_token", token);
        }
        if connection.username.is_none() && connection.access_token.is_none() {
            bail!(
                "No credentials configured (set connection.username and {}, or an access token)",
                ENV_PASSWORD
            );
        }
        Ok(config)
    }

    pub fn to_extractor_config(&self) -> ExtractorConfig {
        self.extraction.clone()
    }

    /// Settings with placeholder connection values, for a first settings file
    pub fn sample() -> Self {
        Self {
            connection: ConnectionSettings {
                server: "your-server.database.windows.net".to_string(),
                database: "your-database".to_string(),
                username: Some("your-username".to_string()),
                ..ConnectionSettings::default()
            },
            ..Self::default()
        }
    }

    /// Write [`SqldocSettings::sample`] to `path`, refusing to overwrite
    pub fn write_sample(path: &Path) -> Result<()> {
        if path.exists() {
            bail!("{:?} already exists, not overwriting it", path);
        }
        Self::sample().save_to(path)
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{} must be true or false, got {:?}", name, other),
    }
}
