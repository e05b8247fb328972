//! Client for a remote Odoo server.
//!
//! A [`Connection`] authenticates once, lazily, and then forwards every
//! operation as a single `execute_kw` call. Faults raised by the server never
//! escape the public operations: they are logged and turned into an empty,
//! `None` or `false` result.

use crate::config::Config;
use crate::error::ConnectionError;
use crate::transport::{DEFAULT_TIMEOUT, HttpTransport, Transport};
use crate::types::{Domain, Ids, Record, RecordId, Value};
use log::Level;
use std::collections::BTreeMap;
use std::time::Duration;

/// Port served over TLS.
pub const SECURE_PORT: &str = "443";

/// Locale sent with every call when the configuration has none.
pub const DEFAULT_LANGUAGE: &str = "fr_FR";

/// Default log target for connection messages.
const DEFAULT_LOG_TARGET: &str = "odootools::client";

// =============================================================================
// Settings
// =============================================================================

/// Everything needed to reach and authenticate against a server.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: String,
    pub database: String,
    pub username: String,
    pub password: String,
    pub language: String,
    pub timeout: Duration,
}

impl ConnectionSettings {
    /// Read the `odoo_*`, `db_name`, `language` and `rpc_timeout` keys.
    pub fn from_config(config: &Config) -> Result<Self, ConnectionError> {
        let required = |key: &'static str| {
            config
                .get(key, None, None)
                .ok_or(ConnectionError::MissingConnectionInfo(key))
        };

        let timeout = config
            .get("rpc_timeout", None, None)
            .and_then(|secs| secs.trim().parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64)
            .unwrap_or(DEFAULT_TIMEOUT);

        Ok(Self {
            host: required("odoo_host")?,
            port: required("odoo_port")?,
            database: required("db_name")?,
            username: required("odoo_username")?,
            password: required("odoo_password")?,
            language: config
                .get("language", Some(DEFAULT_LANGUAGE), None)
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            timeout,
        })
    }

    /// `https://host` on the secure port, `http://host:port` otherwise.
    pub fn base_url(&self) -> String {
        if self.port == SECURE_PORT {
            format!("https://{}", self.host)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

// =============================================================================
// Capabilities
// =============================================================================

/// Protocol features that depend on the server version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// `search_read` exists; otherwise search then read.
    pub combined_search_read: bool,
    /// Services live under `/xmlrpc/2/`; otherwise under `/xmlrpc/`.
    pub versioned_endpoints: bool,
}

/// Servers strictly newer than the version in a row get its capabilities.
/// Servers matching no row (before `execute_kw` existed) are refused.
const CAPABILITY_TABLE: [(f64, Capabilities); 2] = [
    (
        8.0,
        Capabilities {
            combined_search_read: true,
            versioned_endpoints: true,
        },
    ),
    (
        6.0,
        Capabilities {
            combined_search_read: false,
            versioned_endpoints: false,
        },
    ),
];

impl Capabilities {
    /// Look up the capabilities of a server version.
    pub fn for_version(version: f64) -> Option<Self> {
        CAPABILITY_TABLE
            .iter()
            .find(|(threshold, _)| version > *threshold)
            .map(|(_, capabilities)| *capabilities)
    }

    /// URL of a service (`common`, `object`) on the server.
    pub fn endpoint(&self, base_url: &str, service: &str) -> String {
        if self.versioned_endpoints {
            format!("{}/xmlrpc/2/{}", base_url, service)
        } else {
            format!("{}/xmlrpc/{}", base_url, service)
        }
    }
}

/// Read `major.minor` from a server version string (`"16.0-20230101"`,
/// `"saas~17.1+e"`).
pub fn parse_server_version(text: &str) -> Option<f64> {
    let text = text.trim();
    let text = text.strip_prefix("saas~").unwrap_or(text);
    let numeric: String = text.chars().take_while(|c| c.is_ascii_digit() || *c == '.').collect();
    let major_minor: Vec<&str> = numeric.split('.').filter(|part| !part.is_empty()).take(2).collect();
    if major_minor.is_empty() {
        return None;
    }
    major_minor.join(".").parse().ok()
}

// =============================================================================
// Session
// =============================================================================

/// An authenticated session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub uid: i64,
    pub server_version: f64,
    pub capabilities: Capabilities,
    /// URL of the object (model access) service.
    pub object_url: String,
    /// Context sent with every call (`{"lang": ...}`).
    pub context: Value,
}

#[derive(Debug)]
enum SessionState {
    Unauthenticated,
    Authenticated(Session),
    /// The one handshake attempt did not succeed.
    Failed(ConnectionError),
}

/// Paging, ordering and field selection for [`Connection::search`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOptions {
    pub offset: Option<u32>,
    pub limit: Option<u32>,
    pub order: Option<String>,
    /// Fields to read; all fields when empty.
    pub fields: Vec<String>,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    pub fn with_fields(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    fn search_kwargs(&self) -> BTreeMap<String, Value> {
        let mut kwargs = BTreeMap::new();
        if let Some(offset) = self.offset {
            kwargs.insert("offset".to_string(), Value::Int(i64::from(offset)));
        }
        if let Some(limit) = self.limit {
            kwargs.insert("limit".to_string(), Value::Int(i64::from(limit)));
        }
        if let Some(order) = &self.order {
            kwargs.insert("order".to_string(), Value::String(order.clone()));
        }
        kwargs
    }

    fn read_kwargs(&self) -> BTreeMap<String, Value> {
        let mut kwargs = BTreeMap::new();
        if !self.fields.is_empty() {
            kwargs.insert("fields".to_string(), Value::from(self.fields.clone()));
        }
        kwargs
    }
}

// =============================================================================
// Connection
// =============================================================================

/// Connection to a remote server.
pub struct Connection {
    settings: Result<ConnectionSettings, ConnectionError>,
    transport: Option<Box<dyn Transport>>,
    state: SessionState,
    log_target: String,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("settings", &self.settings)
            .field("state", &self.state)
            .field("log_target", &self.log_target)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Create an unauthenticated connection.
    pub fn new(settings: ConnectionSettings) -> Self {
        Self::with_settings(Ok(settings))
    }

    /// Create a connection from script configuration.
    ///
    /// Missing connection parameters are reported on the first operation,
    /// before any network call.
    pub fn from_config(config: &Config) -> Self {
        Self::with_settings(ConnectionSettings::from_config(config))
    }

    fn with_settings(settings: Result<ConnectionSettings, ConnectionError>) -> Self {
        Self {
            settings,
            transport: None,
            state: SessionState::Unauthenticated,
            log_target: DEFAULT_LOG_TARGET.to_string(),
        }
    }

    /// Use `transport` instead of HTTP.
    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Log under `target` (usually the script name).
    pub fn with_log_target(mut self, target: impl Into<String>) -> Self {
        self.log_target = target.into();
        self
    }

    pub fn settings(&self) -> Option<&ConnectionSettings> {
        self.settings.as_ref().ok()
    }

    /// The session, if the handshake already succeeded.
    pub fn session(&self) -> Option<&Session> {
        match &self.state {
            SessionState::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    /// Why the handshake failed, if it did.
    pub fn handshake_error(&self) -> Option<&ConnectionError> {
        match &self.state {
            SessionState::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Authenticate if not done yet. Only the first call talks to the server;
    /// later calls return the memoized outcome.
    pub fn connect(&mut self) -> Option<&Session> {
        if matches!(self.state, SessionState::Unauthenticated) {
            self.state = match self.handshake() {
                Ok(session) => {
                    log::info!(
                        target: self.log_target.as_str(),
                        "Connected to odoo server version {} as uid {}",
                        session.server_version,
                        session.uid
                    );
                    SessionState::Authenticated(session)
                }
                Err(err) => {
                    log::error!(target: self.log_target.as_str(), "Cannot connect to odoo server: {}", err);
                    SessionState::Failed(err)
                }
            };
        }
        self.session()
    }

    fn handshake(&mut self) -> Result<Session, ConnectionError> {
        let settings = self.settings.clone()?;
        if self.transport.is_none() {
            self.transport = Some(Box::new(HttpTransport::new(settings.timeout)?));
        }
        let transport = self.transport.as_mut().ok_or(ConnectionError::NotConnected)?;
        let base_url = settings.base_url();

        let raw_version = transport.call(&format!("{}/xmlrpc/db", base_url), "server_version", Vec::new())?;
        let version_text = raw_version
            .as_str()
            .ok_or_else(|| ConnectionError::Protocol(format!("server_version returned {}", raw_version)))?;
        let server_version = parse_server_version(version_text)
            .ok_or_else(|| ConnectionError::UnsupportedVersion(version_text.to_string()))?;
        let capabilities = Capabilities::for_version(server_version)
            .ok_or_else(|| ConnectionError::UnsupportedVersion(version_text.to_string()))?;

        let common_url = capabilities.endpoint(&base_url, "common");
        transport.call(&common_url, "version", Vec::new())?;

        let mut context = BTreeMap::new();
        context.insert("lang".to_string(), Value::String(settings.language.clone()));
        let context = Value::Struct(context);

        let uid = transport.call(
            &common_url,
            "authenticate",
            vec![
                Value::String(settings.database.clone()),
                Value::String(settings.username.clone()),
                Value::String(settings.password.clone()),
                context.clone(),
            ],
        )?;

        match uid {
            Value::Int(uid) if uid > 0 => Ok(Session {
                uid,
                server_version,
                capabilities,
                object_url: capabilities.endpoint(&base_url, "object"),
                context,
            }),
            _ => Err(ConnectionError::AuthenticationRefused {
                username: settings.username,
            }),
        }
    }

    fn ensure_session(&mut self) -> Result<Capabilities, ConnectionError> {
        self.connect()
            .map(|session| session.capabilities)
            .ok_or(ConnectionError::NotConnected)
    }

    /// One `execute_kw` round trip; the session context is added to `kwargs`.
    fn execute_kw(
        &mut self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        mut kwargs: BTreeMap<String, Value>,
    ) -> Result<Value, ConnectionError> {
        self.ensure_session()?;
        let (SessionState::Authenticated(session), Ok(settings), Some(transport)) =
            (&self.state, &self.settings, self.transport.as_mut())
        else {
            return Err(ConnectionError::NotConnected);
        };

        kwargs.insert("context".to_string(), session.context.clone());
        let params = vec![
            Value::String(settings.database.clone()),
            Value::Int(session.uid),
            Value::String(settings.password.clone()),
            Value::String(model.to_string()),
            Value::String(method.to_string()),
            Value::Array(args),
            Value::Struct(kwargs),
        ];
        transport.call(&session.object_url, "execute_kw", params)
    }

    /// Log a failed operation and drop the error.
    fn contain<T>(&self, result: Result<T, ConnectionError>, level: Level, action: impl FnOnce() -> String) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(ConnectionError::Fault(fault)) => {
                log::log!(
                    target: self.log_target.as_str(),
                    level,
                    "error when {}: MSG: {} -> {}",
                    action(),
                    fault.code,
                    fault.summary()
                );
                None
            }
            Err(err) => {
                log::log!(target: self.log_target.as_str(), level, "error when {}: {}", action(), err);
                None
            }
        }
    }

    // -------------------------------------------------------------------------
    // Operations
    // -------------------------------------------------------------------------

    fn try_id_search(
        &mut self,
        model: &str,
        criteria: &Domain,
        options: &SearchOptions,
    ) -> Result<Vec<RecordId>, ConnectionError> {
        let found = self.execute_kw(model, "search", vec![Value::from(criteria)], options.search_kwargs())?;
        found
            .as_ids()
            .ok_or_else(|| ConnectionError::Protocol(format!("search returned {}", found)))
    }

    fn try_search(
        &mut self,
        model: &str,
        criteria: &Domain,
        options: &SearchOptions,
    ) -> Result<Vec<Record>, ConnectionError> {
        let capabilities = self.ensure_session()?;
        if capabilities.combined_search_read {
            let mut kwargs = options.search_kwargs();
            kwargs.extend(options.read_kwargs());
            let found = self.execute_kw(model, "search_read", vec![Value::from(criteria)], kwargs)?;
            return records_from_value(found);
        }

        let ids = self.try_id_search(model, criteria, options)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let found = self.execute_kw(model, "read", vec![Value::from(ids)], options.read_kwargs())?;
        records_from_value(found)
    }

    /// Full records matching `criteria`. Empty on any failure.
    pub fn search(&mut self, model: &str, criteria: &Domain, options: &SearchOptions) -> Vec<Record> {
        let result = self.try_search(model, criteria, options);
        self.contain(result, Level::Error, || {
            format!("searching for object: {} -> {}", model, criteria)
        })
        .unwrap_or_default()
    }

    /// Ids of the records matching `criteria`. Empty on any failure.
    pub fn id_search(&mut self, model: &str, criteria: &Domain) -> Vec<RecordId> {
        let result = self.try_id_search(model, criteria, &SearchOptions::default());
        self.contain(result, Level::Error, || {
            format!("searching for object: {} -> {}", model, criteria)
        })
        .unwrap_or_default()
    }

    /// Read full records.
    pub fn read(&mut self, model: &str, ids: impl Into<Ids>) -> Option<Vec<Record>> {
        let ids = ids.into();
        let result = self
            .execute_kw(model, "read", vec![Value::from(&ids)], BTreeMap::new())
            .and_then(records_from_value);
        self.contain(result, Level::Error, || format!("reading object: {} -> {}", model, ids))
    }

    /// Update one record. `None` when the server refused.
    pub fn write(&mut self, model: &str, id: RecordId, values: &Record) -> Option<bool> {
        let result = self.execute_kw(
            model,
            "write",
            vec![Value::from(vec![id]), Value::Struct(values.clone())],
            BTreeMap::new(),
        );
        self.contain(result, Level::Error, || {
            format!("writing object: {} ({}) -> {}", model, id, Value::Struct(values.clone()))
        })
        .map(|ack| ack.is_truthy())
    }

    /// Create a record and return its id.
    pub fn create(&mut self, model: &str, values: &Record) -> Option<RecordId> {
        let result = self
            .execute_kw(model, "create", vec![Value::Struct(values.clone())], BTreeMap::new())
            .and_then(|created| match &created {
                Value::Int(id) => Ok(*id),
                Value::Array(ids) => match ids.as_slice() {
                    [Value::Int(id)] => Ok(*id),
                    _ => Err(ConnectionError::Protocol(format!("create returned {}", created))),
                },
                _ => Err(ConnectionError::Protocol(format!("create returned {}", created))),
            });
        self.contain(result, Level::Error, || {
            format!("creating object: {} -> {}", model, Value::Struct(values.clone()))
        })
    }

    /// Delete one or several records.
    pub fn delete(&mut self, model: &str, ids: impl Into<Ids>) -> Option<bool> {
        let ids = ids.into();
        let result = self.execute_kw(model, "unlink", vec![Value::from(&ids)], BTreeMap::new());
        self.contain(result, Level::Warn, || format!("deleting object: {} -> {}", model, ids))
            .map(|ack| ack.is_truthy())
    }

    /// Call any public method on records: `method(ids, *parameters)`.
    pub fn execute(&mut self, model: &str, method: &str, ids: impl Into<Ids>, parameters: &[Value]) -> Option<Value> {
        let ids = ids.into();
        let mut args = vec![Value::from(&ids)];
        args.extend_from_slice(parameters);
        let result = self.execute_kw(model, method, args, BTreeMap::new());
        self.contain(result, Level::Error, || {
            format!("executing {} on object: {} {} -> {}", method, model, ids, Value::from(parameters.to_vec()))
        })
    }

    /// Find the one record matching `criteria`, then create or update it.
    ///
    /// - no match: create it with `values`;
    /// - one match: write `values` onto it unless `create_only`;
    /// - several matches: nothing is changed, a warning is logged.
    ///
    /// Returns the id of the created or matched record, `None` when the
    /// search, the create or the write failed, or the match was ambiguous.
    pub fn search_create_or_write(
        &mut self,
        model: &str,
        criteria: &Domain,
        values: &Record,
        create_only: bool,
        include_archived: bool,
    ) -> Option<RecordId> {
        let criteria = if include_archived {
            criteria.clone().including_archived()
        } else {
            criteria.clone()
        };

        // two are enough to tell "one" from "too many"
        let found = self.try_id_search(model, &criteria, &SearchOptions::new().with_limit(2));
        let found = self.contain(found, Level::Error, || {
            format!(
                "looking for a record for model: {} [ {} ]",
                model,
                Value::Struct(values.clone())
            )
        })?;

        match found.as_slice() {
            [] => self.create(model, values),
            [id] => {
                if !create_only {
                    self.write(model, *id, values)?;
                }
                Some(*id)
            }
            _ => {
                log::warn!(
                    target: self.log_target.as_str(),
                    "Failed to update record ( {} ) too many objects found for {}",
                    model,
                    criteria
                );
                None
            }
        }
    }
}

fn records_from_value(value: Value) -> Result<Vec<Record>, ConnectionError> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Struct(record) => Ok(record),
                other => Err(ConnectionError::Protocol(format!("expected a record, found {}", other))),
            })
            .collect(),
        other => Err(ConnectionError::Protocol(format!("expected a list of records, found {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(text: &str) -> Config {
        Config::from_yaml_str(text).unwrap()
    }

    const FULL: &str = "odoo_host: erp.local\nodoo_port: 8069\ndb_name: prod\nodoo_username: admin\nodoo_password: secret\n";

    #[test]
    fn test_settings_from_config() {
        let settings = ConnectionSettings::from_config(&config(FULL)).unwrap();
        assert_eq!(settings.base_url(), "http://erp.local:8069");
        assert_eq!(settings.language, DEFAULT_LANGUAGE);
        assert_eq!(settings.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_settings_secure_port() {
        let text = FULL.replace("8069", "443") + "language: en_US\nrpc_timeout: 2.5\n";
        let settings = ConnectionSettings::from_config(&config(&text)).unwrap();
        assert_eq!(settings.base_url(), "https://erp.local");
        assert_eq!(settings.language, "en_US");
        assert_eq!(settings.timeout, Duration::from_millis(2500));
    }

    #[test]
    fn test_settings_missing_key() {
        let err = ConnectionSettings::from_config(&config("odoo_host: erp.local\n")).unwrap_err();
        assert_eq!(err, ConnectionError::MissingConnectionInfo("odoo_port"));
    }

    #[test]
    fn test_parse_server_version() {
        assert_eq!(parse_server_version("16.0"), Some(16.0));
        assert_eq!(parse_server_version("8.0-20171001"), Some(8.0));
        assert_eq!(parse_server_version("saas~17.1+e"), Some(17.1));
        assert_eq!(parse_server_version("12.0.1"), Some(12.0));
        assert_eq!(parse_server_version("7"), Some(7.0));
        assert_eq!(parse_server_version("master"), None);
    }

    #[test]
    fn test_capability_table() {
        let modern = Capabilities::for_version(16.0).unwrap();
        assert!(modern.combined_search_read);
        assert_eq!(modern.endpoint("http://h:1", "object"), "http://h:1/xmlrpc/2/object");

        let legacy = Capabilities::for_version(8.0).unwrap();
        assert!(!legacy.combined_search_read);
        assert_eq!(legacy.endpoint("http://h:1", "common"), "http://h:1/xmlrpc/common");

        assert!(Capabilities::for_version(7.0).is_some());
        assert!(Capabilities::for_version(6.0).is_none());
        assert!(Capabilities::for_version(5.0).is_none());
    }

    #[test]
    fn test_search_options_kwargs() {
        let options = SearchOptions::new()
            .with_offset(10)
            .with_limit(5)
            .with_order("name asc")
            .with_fields(["name", "email"]);
        let search = options.search_kwargs();
        assert_eq!(search["offset"], Value::Int(10));
        assert_eq!(search["limit"], Value::Int(5));
        assert_eq!(search["order"], Value::String("name asc".into()));
        assert!(!search.contains_key("fields"));
        assert_eq!(
            options.read_kwargs()["fields"],
            Value::Array(vec!["name".into(), "email".into()])
        );
        assert!(SearchOptions::default().search_kwargs().is_empty());
    }

    #[test]
    fn test_missing_settings_fail_without_transport_call() {
        let mut connection = Connection::from_config(&config("odoo_host: erp.local\n"));
        assert!(connection.connect().is_none());
        assert_eq!(
            connection.handshake_error(),
            Some(&ConnectionError::MissingConnectionInfo("odoo_port"))
        );
        assert!(connection.id_search("res.partner", &Domain::new()).is_empty());
    }
}
