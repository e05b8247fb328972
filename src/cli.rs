//! CLI argument parsing for odootools.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "odootools",
    about = "Scripts that drive a remote Odoo server over XML-RPC",
    version,
    after_help = "Set DEBUG=1 or INTERACTIVE=1 in the configuration (or RUST_LOG) for more verbose logs."
)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the server and database the configuration points at
    CheckConfig,

    /// Print records matching a domain as JSON
    Search {
        /// Model name, e.g. res.partner
        model: String,

        /// Domain as JSON, e.g. '[["is_company", "=", true]]'
        #[arg(short, long, default_value = "[]")]
        domain: String,

        /// Fields to read (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        fields: Option<Vec<String>>,

        /// Maximum number of records
        #[arg(short, long)]
        limit: Option<u32>,

        /// Sort order, e.g. "name asc"
        #[arg(short, long)]
        order: Option<String>,

        /// Also match archived records
        #[arg(short, long)]
        archived: bool,
    },

    /// Create or update the single record matching a domain
    Upsert {
        /// Model name
        model: String,

        /// Domain as JSON identifying the record
        #[arg(short, long)]
        domain: String,

        /// Field values as a JSON object
        #[arg(long)]
        values: String,

        /// Never update an existing record
        #[arg(long)]
        create_only: bool,

        /// Also match archived records
        #[arg(short, long)]
        archived: bool,
    },

    /// Upgrade every installed module
    UpgradeModules,

    /// Uninstall a module
    RemoveModule {
        /// Technical module name
        name: String,
    },

    /// Reload translations for every active language
    UpdateTranslations,

    /// Export the module dependency graph as Graphviz DOT
    DependencyGraph {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
