//! Built-in scripts exposed as CLI subcommands.

mod check_config;
mod dependency_graph;
mod modules;
mod records;
mod translations;

pub use check_config::CheckConfig;
pub use dependency_graph::{DependencyGraph, ModuleGraph, ModuleInfo, license_color};
pub use modules::{RemoveModule, UpgradeModules};
pub use records::{SearchRecords, UpsertRecord, parse_domain, parse_values};
pub use translations::UpdateTranslations;

/// Model holding installed addons.
pub const MODULE_MODEL: &str = "ir.module.module";
