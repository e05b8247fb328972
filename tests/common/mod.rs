//! Shared test infrastructure for odootools integration tests.
//!
//! Provides a scripted in-memory transport and a TestEnv helper that wires it
//! into a Connection.

#![allow(dead_code)]

use odootools::{Connection, ConnectionError, ConnectionSettings, Fault, Transport, Value};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

pub const HOST: &str = "erp.test";
pub const DATABASE: &str = "prod";
pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "secret";
pub const UID: i64 = 2;

/// One call seen by the mock transport.
#[derive(Debug, Clone)]
pub struct Call {
    pub url: String,
    pub method: String,
    pub params: Vec<Value>,
}

impl Call {
    /// Model method of an `execute_kw` call (`search`, `create`, ...).
    pub fn model_method(&self) -> Option<&str> {
        if self.method != "execute_kw" {
            return None;
        }
        self.params.get(4).and_then(Value::as_str)
    }

    pub fn model(&self) -> Option<&str> {
        self.params.get(3).and_then(Value::as_str)
    }

    /// Positional arguments of an `execute_kw` call.
    pub fn args(&self) -> &[Value] {
        self.params.get(5).and_then(Value::as_array).unwrap_or(&[])
    }

    /// Keyword arguments of an `execute_kw` call.
    pub fn kwargs(&self) -> BTreeMap<String, Value> {
        self.params
            .get(6)
            .and_then(Value::as_struct)
            .cloned()
            .unwrap_or_default()
    }

    /// Key used to look up scripted responses.
    fn key(&self) -> &str {
        self.model_method().unwrap_or(&self.method)
    }
}

#[derive(Default)]
struct MockState {
    calls: Vec<Call>,
    queued: HashMap<String, VecDeque<Result<Value, ConnectionError>>>,
    fallback: HashMap<String, Result<Value, ConnectionError>>,
}

/// Transport answering from scripted responses, keyed by XML-RPC method or,
/// for `execute_kw`, by model method. Clones share state so a test can keep
/// one handle while the connection owns another.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Rc<RefCell<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that completes the handshake for `server_version`.
    pub fn with_server(server_version: &str) -> Self {
        let mock = Self::new();
        mock.always("server_version", Value::from(server_version));
        mock.always("version", Value::empty_struct());
        mock.always("authenticate", Value::Int(UID));
        mock
    }

    /// Answer the next `key` call with `value`.
    pub fn respond(&self, key: &str, value: Value) {
        self.queue(key, Ok(value));
    }

    /// Answer the next `key` call with a server fault.
    pub fn fault(&self, key: &str, code: &str, message: &str) {
        self.queue(key, Err(ConnectionError::Fault(Fault::new(code, message))));
    }

    /// Answer the next `key` call with an arbitrary error.
    pub fn fail(&self, key: &str, err: ConnectionError) {
        self.queue(key, Err(err));
    }

    /// Answer every `key` call (once the queue is empty) with `value`.
    pub fn always(&self, key: &str, value: Value) {
        self.state.borrow_mut().fallback.insert(key.to_string(), Ok(value));
    }

    fn queue(&self, key: &str, response: Result<Value, ConnectionError>) {
        self.state
            .borrow_mut()
            .queued
            .entry(key.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    /// Calls whose key (method or model method) is `key`.
    pub fn calls_to(&self, key: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|call| call.key() == key).collect()
    }

    pub fn count(&self, key: &str) -> usize {
        self.calls_to(key).len()
    }

    /// The `execute_kw` calls, in order.
    pub fn object_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.method == "execute_kw")
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }
}

impl Transport for MockTransport {
    fn call(&mut self, url: &str, method: &str, params: Vec<Value>) -> Result<Value, ConnectionError> {
        let call = Call {
            url: url.to_string(),
            method: method.to_string(),
            params,
        };
        let key = call.key().to_string();

        let mut state = self.state.borrow_mut();
        state.calls.push(call);
        if let Some(response) = state.queued.get_mut(&key).and_then(VecDeque::pop_front) {
            return response;
        }
        state.fallback.get(&key).cloned().unwrap_or_else(|| {
            Err(ConnectionError::Fault(Fault::new(
                "1",
                format!("Traceback\nNo scripted response\n{}", key),
            )))
        })
    }
}

pub fn settings() -> ConnectionSettings {
    ConnectionSettings {
        host: HOST.to_string(),
        port: "8069".to_string(),
        database: DATABASE.to_string(),
        username: USERNAME.to_string(),
        password: PASSWORD.to_string(),
        language: "fr_FR".to_string(),
        timeout: Duration::from_secs(5),
    }
}

/// YAML configuration matching [`settings`].
pub fn config_yaml() -> String {
    format!(
        "odoo_host: {}\nodoo_port: 8069\ndb_name: {}\nodoo_username: {}\nodoo_password: {}\n",
        HOST, DATABASE, USERNAME, PASSWORD
    )
}

/// A record with the given fields.
pub fn record(fields: &[(&str, Value)]) -> BTreeMap<String, Value> {
    fields
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

/// Test environment: a connection backed by a scripted transport.
pub struct TestEnv {
    pub mock: MockTransport,
    pub connection: Connection,
}

impl TestEnv {
    /// Environment talking to a modern server (16.0).
    pub fn new() -> Self {
        Self::with_server("16.0")
    }

    pub fn with_server(server_version: &str) -> Self {
        let mock = MockTransport::with_server(server_version);
        let connection = Connection::new(settings()).with_transport(mock.clone());
        Self { mock, connection }
    }

    /// Authenticate and forget the handshake calls.
    pub fn connected() -> Self {
        let mut env = Self::new();
        assert!(env.connection.connect().is_some(), "handshake failed");
        env.mock.clear_calls();
        env
    }

    /// Take the connection out, leaving a fresh unauthenticated one behind.
    pub fn take_connection(&mut self) -> Connection {
        std::mem::replace(
            &mut self.connection,
            Connection::new(settings()).with_transport(self.mock.clone()),
        )
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
