//! Show which server and database a configuration points at.

use crate::client::ConnectionSettings;
use crate::script::{Script, ScriptContext};
use colored::*;
use eyre::{Context, Result};

/// Prints the server URL and database without connecting.
#[derive(Debug, Default)]
pub struct CheckConfig;

impl Script for CheckConfig {
    fn name(&self) -> &str {
        "check_config"
    }

    fn needs_connection(&self) -> bool {
        false
    }

    fn run(&mut self, ctx: &mut ScriptContext) -> Result<()> {
        let settings = ConnectionSettings::from_config(ctx.config()).context("Incomplete configuration")?;
        let db_host = if ctx.config().flag("db_local") {
            "local socket".to_string()
        } else {
            ctx.config_value("db_host").unwrap_or_else(|| "-".to_string())
        };

        println!(
            "{} Will use odoo server: {}\n    database: {} ({}), user: {}, language: {}",
            "✓".green(),
            settings.base_url().cyan(),
            settings.database.cyan(),
            db_host,
            settings.username,
            settings.language
        );
        Ok(())
    }
}
