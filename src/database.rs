//! Direct PostgreSQL access to the server's database.
//!
//! Reads the `db_*` configuration keys. Calls block like the rest of the
//! crate: each statement runs to completion on a private single-threaded
//! runtime.

use crate::config::Config;
use crate::transport::DEFAULT_TIMEOUT;
use eyre::{Context, Result, eyre};
use tokio::runtime::{Builder, Runtime};
use tokio_postgres::{Client, NoTls};

pub use tokio_postgres::Row;
pub use tokio_postgres::types::ToSql;

/// PostgreSQL port used when `db_port` is not set.
pub const DEFAULT_DB_PORT: u16 = 5432;

/// Socket directory used for `db_local: 1`.
pub const LOCAL_SOCKET_DIR: &str = "/var/run/postgresql";

/// Where and as whom to connect.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseSettings {
    /// TCP host; `None` for the local socket.
    pub host: Option<String>,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: Option<String>,
}

impl DatabaseSettings {
    /// Read `db_name`, `db_host`, `db_port`, `db_local`, `db_username` and
    /// `db_password`. A local connection ignores host and password.
    pub fn from_config(config: &Config) -> Result<Self> {
        let required = |key: &str| {
            config
                .get(key, None, None)
                .ok_or_else(|| eyre!("Missing '{}' in configuration", key))
        };

        let local = config.flag("db_local");
        let port = match config.get("db_port", None, None) {
            Some(port) => port
                .trim()
                .parse()
                .with_context(|| format!("Invalid db_port: {}", port))?,
            None => DEFAULT_DB_PORT,
        };

        Ok(Self {
            host: if local { None } else { Some(required("db_host")?) },
            port,
            database: required("db_name")?,
            username: required("db_username")?,
            password: if local {
                None
            } else {
                config.get("db_password", None, None)
            },
        })
    }

    pub fn is_local(&self) -> bool {
        self.host.is_none()
    }

    /// `host:port`, or the socket directory.
    pub fn location(&self) -> String {
        match &self.host {
            Some(host) => format!("{}:{}", host, self.port),
            None => LOCAL_SOCKET_DIR.to_string(),
        }
    }

    /// Driver configuration for these settings.
    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut pg = tokio_postgres::Config::new();
        pg.host(self.host.as_deref().unwrap_or(LOCAL_SOCKET_DIR))
            .port(self.port)
            .dbname(&self.database)
            .user(&self.username)
            .connect_timeout(DEFAULT_TIMEOUT);
        if let Some(password) = &self.password {
            pg.password(password);
        }
        pg
    }
}

/// An open database connection.
pub struct DatabaseConnection {
    runtime: Runtime,
    client: Client,
}

impl DatabaseConnection {
    pub fn connect(settings: &DatabaseSettings) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to create database runtime")?;

        let pg = settings.pg_config();
        let (client, connection) = runtime.block_on(pg.connect(NoTls)).with_context(|| {
            format!(
                "Cannot connect to database {} on {}",
                settings.database,
                settings.location()
            )
        })?;

        // Drives the socket; runs whenever a statement is being awaited
        runtime.spawn(async move {
            if let Err(e) = connection.await {
                log::error!("Database connection error: {}", e);
            }
        });

        log::info!("Connected to database {} on {}", settings.database, settings.location());
        Ok(Self { runtime, client })
    }

    /// Run one statement, returning the number of rows affected.
    pub fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64> {
        self.runtime
            .block_on(self.client.execute(sql, params))
            .with_context(|| format!("Statement failed: {}", sql))
    }

    /// Run one query and collect its rows.
    pub fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Row>> {
        self.runtime
            .block_on(self.client.query(sql, params))
            .with_context(|| format!("Query failed: {}", sql))
    }

    /// Run several `;`-separated statements without parameters.
    pub fn batch_execute(&self, sql: &str) -> Result<()> {
        self.runtime
            .block_on(self.client.batch_execute(sql))
            .context("Batch failed")
    }
}
