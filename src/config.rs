//! Script configuration.
//!
//! A YAML document whose top level holds scalar settings. A top-level key
//! whose value is a mapping is a named section:
//!
//! ```yaml
//! odoo_host: erp.example.com
//! odoo_port: 443
//! db_name: production
//! DEBUG: 1
//! import:
//!   source_file: partners.xlsx
//! ```

use eyre::{Context, Result, bail};
use serde_yaml::{Mapping, Value as YamlValue};
use std::fs;
use std::path::{Path, PathBuf};

/// Loaded configuration. Never mutated after load.
#[derive(Debug, Clone, Default)]
pub struct Config {
    path: Option<PathBuf>,
    root: Mapping,
}

impl Config {
    /// Load and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            bail!(
                "Given config file is not a file or path is not correct: {}",
                path.display()
            );
        }
        let text = fs::read_to_string(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_yaml_str(&text)
            .with_context(|| format!("Cannot parse config file, syntax error ({}), expected YAML", path.display()))?;
        config.path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let root = match serde_yaml::from_str::<YamlValue>(text).context("Invalid YAML")? {
            YamlValue::Mapping(root) => root,
            YamlValue::Null => Mapping::new(),
            other => bail!(
                "Configuration must be a YAML mapping of `key: value` lines (INI `key = value` files are not \
                 supported), found {:?}",
                other
            ),
        };
        Ok(Self { path: None, root })
    }

    /// File the configuration was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Look up `key`, at the top level or inside `section`.
    ///
    /// Scalars of any type are returned as text (`1` is `"1"`, `true` is
    /// `"true"`). Missing keys, nulls, and non-scalar values yield `default`.
    pub fn get(&self, key: &str, default: Option<&str>, section: Option<&str>) -> Option<String> {
        let scope = match section {
            Some(name) => self.root.get(name).and_then(YamlValue::as_mapping),
            None => Some(&self.root),
        };
        scope
            .and_then(|mapping| mapping.get(key))
            .and_then(scalar_to_string)
            .or_else(|| default.map(String::from))
    }

    /// Names of the sections present in the file.
    pub fn sections(&self) -> Vec<String> {
        self.root
            .iter()
            .filter(|(_, value)| value.is_mapping())
            .filter_map(|(key, _)| key.as_str().map(String::from))
            .collect()
    }

    /// True when `key` is set to `"1"` (top level).
    pub fn flag(&self, key: &str) -> bool {
        self.get(key, None, None).as_deref() == Some("1")
    }
}

fn scalar_to_string(value: &YamlValue) -> Option<String> {
    match value {
        YamlValue::String(s) => Some(s.clone()),
        YamlValue::Number(n) => Some(n.to_string()),
        YamlValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
