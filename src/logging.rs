//! Log setup for scripts.

use crate::config::Config;
use chrono::{Local, NaiveDate};
use eyre::{Context, Result};
use log::LevelFilter;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

/// How a script logs: built once from the configuration, then installed.
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// Script name, used for the log file name.
    pub name: String,
    pub level: LevelFilter,
    /// Directory receiving `<name>_<date>.log`; console only when unset.
    pub output_directory: Option<PathBuf>,
}

impl LogConfig {
    /// Console-only logging of errors.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: LevelFilter::Error,
            output_directory: None,
        }
    }

    /// Read `DEBUG`, `INTERACTIVE` and `output_directory` from the config.
    pub fn from_config(name: impl Into<String>, config: &Config) -> Self {
        let level = if config.flag("DEBUG") {
            LevelFilter::Debug
        } else if config.flag("INTERACTIVE") {
            LevelFilter::Info
        } else {
            LevelFilter::Error
        };

        Self {
            name: name.into(),
            level,
            output_directory: config.get("output_directory", None, None).map(PathBuf::from),
        }
    }

    /// Log file for a run started on `date`.
    pub fn log_file(&self, date: NaiveDate) -> Option<PathBuf> {
        self.output_directory
            .as_ref()
            .map(|dir| dir.join(format!("{}_{}.log", self.name, date.format("%Y-%m-%d"))))
    }

    /// Install the global logger. `RUST_LOG` overrides the configured level.
    ///
    /// Returns the log file in use, if any. Installing a second logger in the
    /// same process is refused with a warning.
    pub fn init(&self) -> Result<Option<PathBuf>> {
        let log_file = self.log_file(Local::now().date_naive());

        let mut builder = env_logger::Builder::new();
        builder
            .filter_level(self.level)
            .parse_default_env()
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{} - {} - {}",
                    Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
                    record.level(),
                    record.args()
                )
            });

        // opened without truncation; emptied only once this logger is installed
        let mut truncate_on_install = None;
        if let Some(path) = &log_file {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir).context("Failed to create log directory")?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            truncate_on_install = Some(file.try_clone().context("Failed to open log file")?);
            builder.target(env_logger::Target::Pipe(Box::new(Tee { file })));
        }

        if builder.try_init().is_err() {
            log::warn!("Logging has already been initialized");
            return Ok(None);
        }

        if let Some(file) = truncate_on_install {
            file.set_len(0).context("Failed to truncate log file")?;
        }

        log::info!("Logging initialized for {}", self.name);
        Ok(log_file)
    }
}

/// Copies every log line to stderr and to the log file.
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}
