//! Module maintenance: upgrade everything, uninstall one addon.

use super::MODULE_MODEL;
use crate::script::{Script, ScriptContext};
use crate::types::Domain;
use colored::*;
use eyre::{Result, bail};

/// Upgrade every installed module.
#[derive(Debug, Default)]
pub struct UpgradeModules;

impl Script for UpgradeModules {
    fn name(&self) -> &str {
        "upgrade_all_modules"
    }

    fn run(&mut self, ctx: &mut ScriptContext) -> Result<()> {
        let connection = ctx.connection();
        let installed = connection.id_search(MODULE_MODEL, &Domain::new().filter("state", "=", "installed"));
        if installed.is_empty() {
            println!("{}", "No installed module found".dimmed());
            return Ok(());
        }

        log::warn!(target: self.name(), "Upgrading {} module(s)", installed.len());
        if connection
            .execute(MODULE_MODEL, "button_immediate_upgrade", installed.clone(), &[])
            .is_none()
        {
            bail!("Upgrade failed (see log)");
        }

        println!("{} Upgraded {} module(s)", "✓".green(), installed.len());
        Ok(())
    }
}

/// Uninstall one module by technical name.
#[derive(Debug)]
pub struct RemoveModule {
    pub module: String,
}

impl Script for RemoveModule {
    fn name(&self) -> &str {
        "remove_module"
    }

    fn run(&mut self, ctx: &mut ScriptContext) -> Result<()> {
        let connection = ctx.connection();
        let found = connection.id_search(
            MODULE_MODEL,
            &Domain::new()
                .filter("name", "=", self.module.as_str())
                .filter("state", "=", "installed"),
        );
        if found.is_empty() {
            bail!("Module {} is not installed", self.module);
        }

        if connection
            .execute(MODULE_MODEL, "button_immediate_uninstall", found, &[])
            .is_none()
        {
            bail!("Failed to uninstall {} (see log)", self.module);
        }

        println!("{} Removed module {}", "✓".green(), self.module.cyan());
        Ok(())
    }
}
