//! Generic record scripts: search and upsert.

use crate::client::SearchOptions;
use crate::script::{Script, ScriptContext};
use crate::types::{Domain, Record, Value};
use colored::*;
use eyre::{Context, Result, bail, eyre};

/// Parse a domain given as JSON, e.g. `[["name", "=", "Acme"]]`.
pub fn parse_domain(text: &str) -> Result<Domain> {
    let json: serde_json::Value = serde_json::from_str(text).context("Domain is not valid JSON")?;
    Domain::from_value(&Value::from(json))
        .ok_or_else(|| eyre!("Domain must be a list of operators and [field, operator, value] triples"))
}

/// Parse field values given as a JSON object.
pub fn parse_values(text: &str) -> Result<Record> {
    let json: serde_json::Value = serde_json::from_str(text).context("Values are not valid JSON")?;
    match Value::from(json) {
        Value::Struct(values) => Ok(values),
        _ => bail!("Values must be a JSON object"),
    }
}

/// Print the records matching a domain as JSON.
#[derive(Debug)]
pub struct SearchRecords {
    pub model: String,
    pub domain: Domain,
    pub options: SearchOptions,
}

impl Script for SearchRecords {
    fn name(&self) -> &str {
        "search"
    }

    fn run(&mut self, ctx: &mut ScriptContext) -> Result<()> {
        let records = ctx.connection().search(&self.model, &self.domain, &self.options);
        log::info!(target: self.name(), "{} record(s) found in {}", records.len(), self.model);
        println!("{}", serde_json::to_string_pretty(&records)?);
        Ok(())
    }
}

/// Create or update the single record matching a domain.
#[derive(Debug)]
pub struct UpsertRecord {
    pub model: String,
    pub domain: Domain,
    pub values: Record,
    pub create_only: bool,
    pub include_archived: bool,
}

impl Script for UpsertRecord {
    fn name(&self) -> &str {
        "upsert"
    }

    fn run(&mut self, ctx: &mut ScriptContext) -> Result<()> {
        let id = ctx.connection().search_create_or_write(
            &self.model,
            &self.domain,
            &self.values,
            self.create_only,
            self.include_archived,
        );
        match id {
            Some(id) => {
                println!("{} {} {}", "✓".green(), self.model, id.to_string().cyan());
                Ok(())
            }
            None => bail!("No {} record created or updated (see log)", self.model),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_domain() {
        let domain = parse_domain(r#"["|", ["name", "=", "Acme"], ["ref", "ilike", "AC%"]]"#).unwrap();
        assert_eq!(domain.terms().len(), 3);
        assert!(parse_domain("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_domain_errors() {
        assert!(parse_domain("not json").is_err());
        assert!(parse_domain(r#"{"name": "Acme"}"#).is_err());
        assert!(parse_domain(r#"[["name", "="]]"#).is_err());
    }

    #[test]
    fn test_parse_values() {
        let values = parse_values(r#"{"name": "Acme", "customer_rank": 1}"#).unwrap();
        assert_eq!(values["name"], Value::String("Acme".into()));
        assert_eq!(values["customer_rank"], Value::Int(1));
        assert!(parse_values("[1, 2]").is_err());
    }
}
