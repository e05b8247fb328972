//! Reload the translations of every active language.

use crate::client::SearchOptions;
use crate::script::{Script, ScriptContext};
use crate::types::{Domain, Record, Value};
use colored::*;
use eyre::{Result, bail};

const LANG_MODEL: &str = "res.lang";
const WIZARD_MODEL: &str = "base.update.translations";

/// Runs the "update translations" wizard once per active language.
#[derive(Debug, Default)]
pub struct UpdateTranslations;

impl Script for UpdateTranslations {
    fn name(&self) -> &str {
        "update_translations"
    }

    fn run(&mut self, ctx: &mut ScriptContext) -> Result<()> {
        let connection = ctx.connection();
        let languages = connection.search(
            LANG_MODEL,
            &Domain::new().filter("active", "=", true),
            &SearchOptions::new().with_fields(["code", "name"]),
        );
        log::warn!(target: self.name(), "Will reload {} language(s)", languages.len());

        let mut failed = Vec::new();
        for language in &languages {
            let Some(code) = language.get("code").and_then(Value::as_str) else {
                continue;
            };
            let name = language.get("name").and_then(Value::as_str).unwrap_or(code);
            log::warn!(target: self.name(), "Synchronizing for : {}", name);

            let mut values = Record::new();
            values.insert("lang".to_string(), Value::from(code));
            let updated = connection
                .create(WIZARD_MODEL, &values)
                .and_then(|wizard| connection.execute(WIZARD_MODEL, "act_update", wizard, &[]));
            match updated {
                Some(_) => println!("{} {}", "✓".green(), name),
                None => failed.push(code.to_string()),
            }
        }

        if !failed.is_empty() {
            bail!("Translation update failed for: {}", failed.join(", "));
        }
        Ok(())
    }
}
