//! odootools CLI - scripts for a remote Odoo server.

use clap::Parser;
use colored::*;
use eyre::Result;
use odootools::client::SearchOptions;
use odootools::script::{Script, ScriptRunner};
use odootools::scripts::{
    CheckConfig, DependencyGraph, RemoveModule, SearchRecords, UpdateTranslations, UpgradeModules, UpsertRecord,
    parse_domain, parse_values,
};

mod cli;

use cli::{Cli, Command};

fn build_script(command: Command) -> Result<Box<dyn Script>> {
    let script: Box<dyn Script> = match command {
        Command::CheckConfig => Box::new(CheckConfig),

        Command::Search {
            model,
            domain,
            fields,
            limit,
            order,
            archived,
        } => {
            let mut options = SearchOptions::new().with_fields(fields.unwrap_or_default());
            if let Some(limit) = limit {
                options = options.with_limit(limit);
            }
            if let Some(order) = order {
                options = options.with_order(order);
            }
            let mut domain = parse_domain(&domain)?;
            if archived {
                domain = domain.including_archived();
            }
            Box::new(SearchRecords { model, domain, options })
        }

        Command::Upsert {
            model,
            domain,
            values,
            create_only,
            archived,
        } => Box::new(UpsertRecord {
            model,
            domain: parse_domain(&domain)?,
            values: parse_values(&values)?,
            create_only,
            include_archived: archived,
        }),

        Command::UpgradeModules => Box::new(UpgradeModules),

        Command::RemoveModule { name } => Box::new(RemoveModule { module: name }),

        Command::UpdateTranslations => Box::new(UpdateTranslations),

        Command::DependencyGraph { output } => Box::new(DependencyGraph { output }),
    };
    Ok(script)
}

fn run(cli: Cli) -> Result<()> {
    let mut script = build_script(cli.command)?;
    ScriptRunner::new(cli.config).run_with_remote(script.as_mut())
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
