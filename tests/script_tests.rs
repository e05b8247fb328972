//! Integration tests for the script runner and the built-in scripts.

mod common;

use common::{MockTransport, TestEnv, config_yaml, record, settings};
use odootools::scripts::{DependencyGraph, RemoveModule, SearchRecords, UpdateTranslations, UpgradeModules, UpsertRecord};
use odootools::{Config, Connection, Domain, Script, ScriptContext, ScriptRunner, SearchOptions, Value};
use std::fs;
use tempfile::TempDir;

fn runner() -> ScriptRunner {
    ScriptRunner::with_config(Config::from_yaml_str(&config_yaml()).unwrap())
}

/// Records what it saw of its context.
#[derive(Default)]
struct ContextRecorder {
    seen_db: Option<String>,
    connected: bool,
}

impl Script for ContextRecorder {
    fn name(&self) -> &str {
        "context_recorder"
    }

    fn run(&mut self, ctx: &mut ScriptContext) -> eyre::Result<()> {
        self.seen_db = ctx.config_value("db_name");
        self.connected = ctx.connection().session().is_some();
        Ok(())
    }
}

// =============================================================================
// Runner Tests
// =============================================================================

#[test]
fn test_parse_config_requires_a_path() {
    let mut runner = ScriptRunner::new(None);

    let err = runner.parse_config(None).unwrap_err();
    assert!(err.to_string().contains("-c"));
}

#[test]
fn test_parse_config_only_once() {
    let temp_dir = TempDir::new().unwrap();
    let first = temp_dir.path().join("first.yaml");
    let second = temp_dir.path().join("second.yaml");
    fs::write(&first, config_yaml()).unwrap();
    fs::write(&second, "db_name: other\n").unwrap();

    let mut runner = ScriptRunner::new(Some(first.clone()));
    assert_eq!(runner.parse_config(None).unwrap().get("db_name", None, None).as_deref(), Some("prod"));

    let again = runner.parse_config(Some(&second)).unwrap();
    assert_eq!(again.get("db_name", None, None).as_deref(), Some("prod"));
    assert_eq!(again.path(), Some(first.as_path()));
}

#[test]
fn test_parse_config_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let mut runner = ScriptRunner::new(Some(temp_dir.path().join("absent.yaml")));

    assert!(runner.parse_config(None).is_err());
}

#[test]
fn test_runner_connects_before_running() {
    let env = TestEnv::new();
    let mut recorder = ContextRecorder::default();

    runner().run_with_connection(&mut recorder, env.connection).unwrap();

    assert!(recorder.connected);
    assert_eq!(recorder.seen_db.as_deref(), Some("prod"));
    assert_eq!(env.mock.count("authenticate"), 1);
}

#[test]
fn test_runner_stops_when_handshake_fails() {
    let mock = MockTransport::with_server("16.0");
    mock.always("authenticate", Value::Bool(false));
    let connection = Connection::new(settings()).with_transport(mock);
    let mut recorder = ContextRecorder::default();

    let err = runner().run_with_connection(&mut recorder, connection).unwrap_err();

    assert!(err.to_string().contains("Not able to connect to Odoo"));
    assert!(recorder.seen_db.is_none());
}

// =============================================================================
// Record Script Tests
// =============================================================================

#[test]
fn test_search_script() {
    let env = TestEnv::new();
    env.mock.respond(
        "search_read",
        Value::Array(vec![Value::Struct(record(&[("id", Value::Int(1))]))]),
    );
    let mut script = SearchRecords {
        model: "res.partner".to_string(),
        domain: Domain::new().filter("is_company", "=", true),
        options: SearchOptions::new().with_fields(["name"]),
    };

    runner().run_with_connection(&mut script, env.connection).unwrap();

    assert_eq!(env.mock.calls_to("search_read")[0].model(), Some("res.partner"));
}

#[test]
fn test_upsert_script_fails_on_ambiguous_match() {
    let env = TestEnv::new();
    env.mock.respond("search", Value::from(vec![1, 2]));
    let mut script = UpsertRecord {
        model: "res.partner".to_string(),
        domain: Domain::new().filter("name", "ilike", "acme"),
        values: record(&[("active", Value::Bool(true))]),
        create_only: false,
        include_archived: false,
    };

    let err = runner().run_with_connection(&mut script, env.connection).unwrap_err();
    assert!(format!("{:#}", err).contains("No res.partner record"));
}

// =============================================================================
// Module Script Tests
// =============================================================================

#[test]
fn test_upgrade_modules() {
    let env = TestEnv::new();
    env.mock.respond("search", Value::from(vec![1, 2, 3]));
    env.mock.respond("button_immediate_upgrade", Value::Bool(true));

    runner().run_with_connection(&mut UpgradeModules, env.connection).unwrap();

    let call = &env.mock.calls_to("button_immediate_upgrade")[0];
    assert_eq!(call.model(), Some("ir.module.module"));
    assert_eq!(call.args(), &[Value::from(vec![1, 2, 3])]);
}

#[test]
fn test_remove_module_not_installed() {
    let env = TestEnv::new();
    env.mock.respond("search", Value::Array(vec![]));
    let mut script = RemoveModule {
        module: "website".to_string(),
    };

    assert!(runner().run_with_connection(&mut script, env.connection).is_err());
    assert_eq!(env.mock.count("button_immediate_uninstall"), 0);
}

#[test]
fn test_remove_module() {
    let env = TestEnv::new();
    env.mock.respond("search", Value::from(vec![9]));
    env.mock.respond("button_immediate_uninstall", Value::Nil);
    let mut script = RemoveModule {
        module: "website".to_string(),
    };

    runner().run_with_connection(&mut script, env.connection).unwrap();

    assert_eq!(
        env.mock.calls_to("button_immediate_uninstall")[0].args(),
        &[Value::from(vec![9])]
    );
}

#[test]
fn test_update_translations_per_language() {
    let env = TestEnv::new();
    env.mock.respond(
        "search_read",
        Value::Array(vec![
            Value::Struct(record(&[("code", Value::from("fr_FR")), ("name", Value::from("French"))])),
            Value::Struct(record(&[("code", Value::from("en_US")), ("name", Value::from("English"))])),
        ]),
    );
    env.mock.respond("create", Value::Int(5));
    env.mock.respond("create", Value::Int(6));
    env.mock.always("act_update", Value::Bool(true));

    runner()
        .run_with_connection(&mut UpdateTranslations, env.connection)
        .unwrap();

    let creates = env.mock.calls_to("create");
    assert_eq!(creates.len(), 2);
    assert_eq!(creates[1].args(), &[Value::Struct(record(&[("lang", Value::from("en_US"))]))]);
    let updates = env.mock.calls_to("act_update");
    assert_eq!(updates[0].args(), &[Value::from(vec![5])]);
    assert_eq!(updates[1].args(), &[Value::from(vec![6])]);
}

#[test]
fn test_update_translations_reports_failures() {
    let env = TestEnv::new();
    env.mock.respond(
        "search_read",
        Value::Array(vec![Value::Struct(record(&[("code", Value::from("de_DE"))]))]),
    );
    env.mock.fault("create", "2", "Traceback\nUserError\nunknown language");

    let err = runner()
        .run_with_connection(&mut UpdateTranslations, env.connection)
        .unwrap_err();
    assert!(format!("{:#}", err).contains("de_DE"));
}

#[test]
fn test_dependency_graph_written_to_file() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("modules.dot");
    let env = TestEnv::new();
    env.mock.respond(
        "search_read",
        Value::Array(vec![
            Value::Struct(record(&[
                ("id", Value::Int(1)),
                ("name", Value::from("base")),
                ("license", Value::from("LGPL-3")),
            ])),
            Value::Struct(record(&[
                ("id", Value::Int(2)),
                ("name", Value::from("sale")),
                ("license", Value::from("OPL-1")),
            ])),
        ]),
    );
    env.mock.respond(
        "search_read",
        Value::Array(vec![Value::Struct(record(&[
            ("id", Value::Int(10)),
            ("module_id", Value::Array(vec![Value::Int(2), Value::from("Sales")])),
            ("name", Value::from("base")),
        ]))]),
    );
    let mut script = DependencyGraph {
        output: Some(output.clone()),
    };

    runner().run_with_connection(&mut script, env.connection).unwrap();

    let dot = fs::read_to_string(&output).unwrap();
    assert!(dot.contains("\"sale\" [fillcolor=\"#aa222299\", license=\"OPL-1\", level=1, inlinks=0];"));
    assert!(dot.contains("\"sale\" -> \"base\" [color=\"#22aa22\", compatible=true];"));
    let searches = env.mock.calls_to("search_read");
    assert_eq!(searches[1].model(), Some("ir.module.module.dependency"));
}
