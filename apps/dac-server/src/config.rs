//! Layered server configuration.
//!
//! Sources are merged in order: built-in defaults, the YAML file given with
//! `--config`, `DAC__*` environment variables (`__` separates nesting levels)
//! and finally command-line overrides.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use permissions::config::PermissionsConfig;
use permissions::domain::groups::GroupConfig;
use serde::{Deserialize, Serialize};
use url::Url;

pub const ENV_PREFIX: &str = "DAC__";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub permissions: PermissionsConfig,
    /// Static tenant group tree used to expand `x-groups` into roles.
    pub groups: Vec<GroupConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8087)),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub dsn: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dsn: "sqlite://dac.db?mode=rwc".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence when set.
    pub level: String,
    pub format: LogFormat,
    /// Also write logs to this file.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::Text,
            file: None,
        }
    }
}

/// Command-line values that override the merged configuration.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub verbose: u8,
}

impl AppConfig {
    /// Merge defaults, the optional YAML file and the environment.
    ///
    /// # Errors
    /// The file does not exist or the merged document does not deserialize.
    pub fn load_layered(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            if !path.is_file() {
                anyhow::bail!("config file does not exist: {}", path.display());
            }
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("invalid configuration")
    }

    pub fn apply_cli_overrides(&mut self, cli: &CliOverrides) {
        if let Some(port) = cli.port {
            self.server.bind_addr.set_port(port);
        }
        match cli.verbose {
            0 => {}
            1 => "info".clone_into(&mut self.logging.level),
            2 => "debug".clone_into(&mut self.logging.level),
            _ => "trace".clone_into(&mut self.logging.level),
        }
    }

    /// Render as YAML with the database password masked.
    ///
    /// # Errors
    /// Serialization failure.
    pub fn to_yaml(&self) -> Result<String> {
        let mut shown = self.clone();
        shown.database.dsn = redact_dsn_password(&self.database.dsn)?;
        serde_saphyr::to_string(&shown).context("failed to serialize configuration to YAML")
    }
}

/// Replace the password of a URL-style DSN with `***REDACTED***`.
///
/// # Errors
/// The DSN carries credentials but is not a valid URL.
pub fn redact_dsn_password(dsn: &str) -> Result<String> {
    if !dsn.contains('@') {
        return Ok(dsn.to_owned());
    }
    let mut url = Url::parse(dsn).context("invalid database DSN")?;
    if url.password().is_some() {
        url.set_password(Some("***REDACTED***")).ok();
    }
    Ok(url.to_string())
}
