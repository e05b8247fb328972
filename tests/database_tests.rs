//! Integration tests for direct database access from a script.

mod common;

use common::TestEnv;
use odootools::{Config, Script, ScriptContext, ScriptRunner};
use std::net::TcpListener;

/// Opens the database and keeps the outcome.
#[derive(Default)]
struct OpenDatabase {
    error: Option<String>,
}

impl Script for OpenDatabase {
    fn name(&self) -> &str {
        "open_database"
    }

    fn needs_connection(&self) -> bool {
        false
    }

    fn run(&mut self, ctx: &mut ScriptContext) -> eyre::Result<()> {
        if let Err(e) = ctx.database() {
            self.error = Some(format!("{:#}", e));
        }
        Ok(())
    }
}

fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn run(yaml: &str) -> OpenDatabase {
    let env = TestEnv::new();
    let mut runner = ScriptRunner::with_config(Config::from_yaml_str(yaml).unwrap());
    let mut script = OpenDatabase::default();
    runner.run_with_connection(&mut script, env.connection).unwrap();
    script
}

// =============================================================================
// Database Tests
// =============================================================================

#[test]
fn test_database_unreachable() {
    let port = closed_port();
    let yaml = format!(
        "db_name: prod\ndb_host: 127.0.0.1\ndb_port: {}\ndb_username: odoo\ndb_password: x\n",
        port
    );

    let script = run(&yaml);

    let error = script.error.expect("connection should fail");
    assert!(error.contains("Cannot connect to database prod"));
    assert!(error.contains(&format!("127.0.0.1:{}", port)));
}

#[test]
fn test_database_incomplete_configuration() {
    let script = run("db_name: prod\ndb_host: 127.0.0.1\n");

    let error = script.error.expect("configuration should be rejected");
    assert!(error.contains("Incomplete database configuration"));
    assert!(error.contains("db_username"));
}

#[test]
fn test_database_not_opened_by_runner() {
    let env = TestEnv::new();
    let mock = env.mock.clone();
    let mut runner = ScriptRunner::with_config(Config::from_yaml_str("db_name: prod\n").unwrap());
    let mut script = OpenDatabase::default();

    let ctx = runner.run_with_connection(&mut script, env.connection).unwrap();

    assert!(script.error.is_some());
    assert!(ctx.into_connection().session().is_none());
    assert!(mock.calls().is_empty());
}
