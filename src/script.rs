//! Base lifecycle for command-line scripts.
//!
//! A [`ScriptRunner`] loads the configuration once, sets up logging, opens a
//! [`Connection`] and hands both to the script's [`Script::run`].

use crate::client::Connection;
use crate::config::Config;
use crate::database::{DatabaseConnection, DatabaseSettings};
use crate::logging::LogConfig;
use eyre::{Context, Result, bail};
use std::path::{Path, PathBuf};

/// User logic run by a [`ScriptRunner`].
pub trait Script {
    /// Name used for the log file and as log target.
    fn name(&self) -> &str;

    /// Whether the runner must authenticate before calling [`Script::run`].
    fn needs_connection(&self) -> bool {
        true
    }

    fn run(&mut self, ctx: &mut ScriptContext) -> Result<()>;
}

/// What a running script can reach: its configuration and its connection.
#[derive(Debug)]
pub struct ScriptContext {
    name: String,
    config: Config,
    connection: Connection,
}

impl ScriptContext {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shorthand for a top-level configuration value.
    pub fn config_value(&self, key: &str) -> Option<String> {
        self.config.get(key, None, None)
    }

    pub fn connection(&mut self) -> &mut Connection {
        &mut self.connection
    }

    /// Open a direct connection to the server's PostgreSQL database.
    pub fn database(&self) -> Result<DatabaseConnection> {
        let settings = DatabaseSettings::from_config(&self.config).context("Incomplete database configuration")?;
        DatabaseConnection::connect(&settings)
    }

    pub fn into_connection(self) -> Connection {
        self.connection
    }
}

/// Orchestrates parse config, init logs, connect, run.
#[derive(Debug, Default)]
pub struct ScriptRunner {
    config_path: Option<PathBuf>,
    config: Option<Config>,
}

impl ScriptRunner {
    /// Runner reading its configuration from `config_path` (`-c`).
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self {
            config_path,
            config: None,
        }
    }

    /// Runner with an already loaded configuration.
    pub fn with_config(config: Config) -> Self {
        Self {
            config_path: config.path().map(Path::to_path_buf),
            config: Some(config),
        }
    }

    pub fn config(&self) -> Option<&Config> {
        self.config.as_ref()
    }

    /// Load the configuration file. Once a configuration is loaded, further
    /// calls leave it untouched and log a warning.
    pub fn parse_config(&mut self, config_path: Option<&Path>) -> Result<&Config> {
        if let Some(path) = config_path {
            self.config_path = Some(path.to_path_buf());
        }

        if self.config.is_some() {
            log::warn!("Configuration has already been processed");
        } else {
            let Some(path) = &self.config_path else {
                bail!("No configuration file given. Usage: -c <configfile>");
            };
            self.config = Some(Config::load(path)?);
        }

        self.config
            .as_ref()
            .ok_or_else(|| eyre::eyre!("Configuration is not loaded"))
    }

    /// Configure logging for `script`.
    pub fn init_logs(&self, script: &dyn Script) -> Result<Option<PathBuf>> {
        let log_config = match &self.config {
            Some(config) => LogConfig::from_config(script.name(), config),
            None => LogConfig::new(script.name()),
        };
        log_config.init().context("Failed to setup logging")
    }

    /// Run `script` against the server described by the configuration.
    pub fn run_with_remote(&mut self, script: &mut dyn Script) -> Result<()> {
        let config = self.parse_config(None)?;
        let connection = Connection::from_config(config).with_log_target(script.name());
        self.init_logs(script)?;
        self.run_with_connection(script, connection)?;
        Ok(())
    }

    /// Run `script` with a prepared connection. Returns the context the script
    /// ran in.
    pub fn run_with_connection(&mut self, script: &mut dyn Script, mut connection: Connection) -> Result<ScriptContext> {
        if script.needs_connection() && connection.connect().is_none() {
            let reason = connection
                .handshake_error()
                .map(ToString::to_string)
                .unwrap_or_else(|| "unknown error".to_string());
            bail!("Not able to connect to Odoo with given information: {}", reason);
        }

        let mut ctx = ScriptContext {
            name: script.name().to_string(),
            config: self.config.clone().unwrap_or_default(),
            connection,
        };
        script
            .run(&mut ctx)
            .with_context(|| format!("Script '{}' failed", script.name()))?;
        log::info!(target: script.name(), "Script '{}' finished", script.name());
        Ok(ctx)
    }
}
