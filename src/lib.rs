//! odootools: scripting toolkit for remote Odoo servers.
//!
//! A [`Connection`] talks XML-RPC to a server, authenticating once and lazily.
//! Server faults are logged and turned into empty or `None` results, so a
//! script keeps going when one record fails. Scripts implement [`Script`] and
//! are driven by a [`ScriptRunner`], which loads the configuration and sets up
//! logging.
//!
//! # Example
//!
//! ```no_run
//! use odootools::{Config, Connection, Domain, Record, Value};
//! use std::path::Path;
//!
//! let config = Config::load(Path::new("odoo.yaml")).unwrap();
//! let mut odoo = Connection::from_config(&config);
//!
//! let mut values = Record::new();
//! values.insert("name".to_string(), Value::from("Acme"));
//! values.insert("ref".to_string(), Value::from("ACME"));
//!
//! // Create the partner, or update it if it already exists
//! let domain = Domain::new().filter("ref", "=", "ACME");
//! let id = odoo.search_create_or_write("res.partner", &domain, &values, false, true);
//! assert!(id.is_some());
//! ```

pub mod client;
pub mod config;
pub mod convert;
pub mod database;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod script;
pub mod scripts;
pub mod transport;
pub mod types;

// Re-export public API
pub use client::{Capabilities, Connection, ConnectionSettings, SearchOptions, Session};
pub use config::Config;
pub use database::{DatabaseConnection, DatabaseSettings, Row, ToSql};
pub use error::{ConnectionError, Fault};
pub use logging::LogConfig;
pub use script::{Script, ScriptContext, ScriptRunner};
pub use transport::{HttpTransport, Transport};
pub use types::{Domain, Ids, Record, RecordId, Term, Value};
