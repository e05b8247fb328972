//! Dependency graph of installed modules, written as Graphviz DOT.
//!
//! Nodes are coloured by license; edges are green when the dependency's
//! license is compatible with the depending module's, red when it is not and
//! grey when either license is unknown.

use super::MODULE_MODEL;
use crate::client::SearchOptions;
use crate::script::{Script, ScriptContext};
use crate::types::{Domain, RecordId, Value};
use colored::*;
use eyre::{Context, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::PathBuf;

const DEPENDENCY_MODEL: &str = "ir.module.module.dependency";

const COMPATIBLE_COLOR: &str = "#22aa22";
const INCOMPATIBLE_COLOR: &str = "red";
const UNKNOWN_COLOR: &str = "grey";

/// Fill colour of a module with the given license.
pub fn license_color(license: &str) -> Option<&'static str> {
    match license {
        "LGPL-3" => Some("#22aa2299"),
        "AGPL-3" => Some("#2222aa99"),
        "OPL-1" => Some("#aa222299"),
        _ => None,
    }
}

/// Licenses a module may depend on, given its own license.
fn compatible_licenses(license: &str) -> Option<&'static [&'static str]> {
    match license {
        "LGPL-3" => Some(&["LGPL-3"]),
        "AGPL-3" => Some(&["AGPL-3", "LGPL-3"]),
        "OPL-1" => Some(&["OPL-1", "LGPL-3"]),
        _ => None,
    }
}

/// An installed module.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleInfo {
    pub name: String,
    pub license: Option<String>,
}

/// Modules and their `depends` edges, with dependency levels.
#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    licenses: BTreeMap<String, Option<String>>,
    edges: Vec<(String, String)>,
    levels: BTreeMap<String, usize>,
    inlinks: BTreeMap<String, usize>,
}

impl ModuleGraph {
    /// Build the graph. `dependencies` are `(module, depends_on)` pairs; a
    /// dependency that is not among `modules` becomes a node of unknown license.
    pub fn build(modules: Vec<ModuleInfo>, dependencies: Vec<(String, String)>) -> Self {
        let mut licenses: BTreeMap<String, Option<String>> =
            modules.into_iter().map(|module| (module.name, module.license)).collect();
        for (from, to) in &dependencies {
            licenses.entry(from.clone()).or_insert(None);
            licenses.entry(to.clone()).or_insert(None);
        }

        let mut inlinks: BTreeMap<String, usize> = licenses.keys().map(|name| (name.clone(), 0)).collect();
        for (_, to) in &dependencies {
            *inlinks.entry(to.clone()).or_default() += 1;
        }

        // an edge closing a cycle does not raise levels; every other edge
        // lifts a module one level above its dependency
        let cyclic: Vec<bool> = dependencies
            .iter()
            .map(|(from, to)| reaches(&dependencies, to, from))
            .collect();
        for ((from, to), _) in dependencies.iter().zip(&cyclic).filter(|(_, cyclic)| **cyclic) {
            log::warn!("Dependency cycle through {} -> {}", from, to);
        }

        let mut levels: BTreeMap<String, usize> = licenses.keys().map(|name| (name.clone(), 0)).collect();
        for _ in 0..licenses.len() {
            let mut changed = false;
            for ((from, to), _) in dependencies.iter().zip(&cyclic).filter(|(_, cyclic)| !**cyclic) {
                let candidate = levels[to] + 1;
                if levels[from] < candidate {
                    levels.insert(from.clone(), candidate);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        Self {
            licenses,
            edges: dependencies,
            levels,
            inlinks,
        }
    }

    pub fn level(&self, module: &str) -> Option<usize> {
        self.levels.get(module).copied()
    }

    pub fn inlinks(&self, module: &str) -> usize {
        self.inlinks.get(module).copied().unwrap_or(0)
    }

    pub fn depth(&self) -> usize {
        self.levels.values().copied().max().unwrap_or(0)
    }

    fn license(&self, module: &str) -> Option<&str> {
        self.licenses.get(module).and_then(|license| license.as_deref())
    }

    /// Colour of the `from -> to` edge.
    pub fn edge_color(&self, from: &str, to: &str) -> &'static str {
        let Some(allowed) = self.license(from).and_then(compatible_licenses) else {
            return UNKNOWN_COLOR;
        };
        match self.license(to) {
            Some(license) if allowed.contains(&license) => COMPATIBLE_COLOR,
            Some(_) => INCOMPATIBLE_COLOR,
            None => UNKNOWN_COLOR,
        }
    }

    /// Render as a DOT digraph, one rank per dependency level.
    pub fn to_dot(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ModuleGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "digraph odoo_dependencies {{")?;
        writeln!(f, "    rankdir=BT;")?;
        writeln!(f, "    node [shape=box, style=filled];")?;

        for (name, license) in &self.licenses {
            let license = license.as_deref().unwrap_or("");
            writeln!(
                f,
                "    {} [fillcolor=\"{}\", license=\"{}\", level={}, inlinks={}];",
                quote(name),
                license_color(license).unwrap_or(UNKNOWN_COLOR),
                license,
                self.levels[name],
                self.inlinks(name)
            )?;
        }

        for level in 0..=self.depth() {
            let members: Vec<String> = self
                .levels
                .iter()
                .filter(|(_, l)| **l == level)
                .map(|(name, _)| quote(name))
                .collect();
            if !members.is_empty() {
                writeln!(f, "    {{ rank=same; {}; }}", members.join("; "))?;
            }
        }

        for (from, to) in &self.edges {
            let color = self.edge_color(from, to);
            writeln!(
                f,
                "    {} -> {} [color=\"{}\", compatible={}];",
                quote(from),
                quote(to),
                color,
                color == COMPATIBLE_COLOR
            )?;
        }

        writeln!(f, "}}")
    }
}

/// Whether `target` can be reached from `start` by following dependencies.
fn reaches(dependencies: &[(String, String)], start: &str, target: &str) -> bool {
    let mut visited = HashSet::new();
    let mut stack = vec![start];

    while let Some(node) = stack.pop() {
        if node == target {
            return true;
        }
        if visited.insert(node) {
            stack.extend(
                dependencies
                    .iter()
                    .filter(|(from, _)| from == node)
                    .map(|(_, to)| to.as_str()),
            );
        }
    }

    false
}

fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Export the dependency graph of installed modules.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Write here instead of stdout.
    pub output: Option<PathBuf>,
}

impl Script for DependencyGraph {
    fn name(&self) -> &str {
        "build_dependency_graph"
    }

    fn run(&mut self, ctx: &mut ScriptContext) -> Result<()> {
        let connection = ctx.connection();
        let records = connection.search(
            MODULE_MODEL,
            &Domain::new().filter("state", "=", "installed"),
            &SearchOptions::new().with_fields(["name", "license"]),
        );

        let mut names: HashMap<RecordId, String> = HashMap::new();
        let mut modules = Vec::new();
        for record in &records {
            let (Some(id), Some(name)) = (
                record.get("id").and_then(Value::as_i64),
                record.get("name").and_then(Value::as_str),
            ) else {
                continue;
            };
            let license = record.get("license").and_then(Value::as_str);
            if license.and_then(license_color).is_none() {
                log::warn!(target: self.name(), "Missing license {:?} for {}", license, name);
            }
            names.insert(id, name.to_string());
            modules.push(ModuleInfo {
                name: name.to_string(),
                license: license.map(String::from),
            });
        }

        let dependency_records = connection.search(
            DEPENDENCY_MODEL,
            &Domain::new().filter("module_id.state", "=", "installed"),
            &SearchOptions::new().with_fields(["module_id", "name"]),
        );
        let dependencies: Vec<(String, String)> = dependency_records
            .iter()
            .filter_map(|record| {
                let (module_id, _) = record.get("module_id")?.as_many2one()?;
                let from = names.get(&module_id)?;
                let to = record.get("name")?.as_str()?;
                Some((from.clone(), to.to_string()))
            })
            .collect();

        let graph = ModuleGraph::build(modules, dependencies);
        let dot = graph.to_dot();
        match &self.output {
            Some(path) => {
                fs::write(path, &dot).with_context(|| format!("Failed to write {}", path.display()))?;
                println!(
                    "{} Wrote {} module(s), depth {}, to {}",
                    "✓".green(),
                    records.len(),
                    graph.depth(),
                    path.display()
                );
            }
            None => print!("{}", dot),
        }
        Ok(())
    }
}
