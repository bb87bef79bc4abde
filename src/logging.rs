//! Logging configuration.
//!
//! The library only emits `tracing` events. [`LogConfig::dispatch`] turns a
//! configuration into a [`tracing::Dispatch`] that callers hand to
//! [`crate::FetchLoop::with_dispatch`] (scoped to a run) or install
//! process-wide with [`init_logging`].
//!
//! ```no_run
//! use catdata_opendata::logging::{LogConfig, LogLevel};
//!
//! let dispatch = LogConfig::builder().level(LogLevel::Debug).build().dispatch()?;
//! tracing::dispatcher::with_default(&dispatch, || tracing::info!("hello"));
//! # Ok::<(), catdata_opendata::Error>(())
//! ```

use std::io;

use serde::{Deserialize, Serialize};
use tracing::Dispatch;
use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{Error, Result};

/// Minimum severity that reaches the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = Error;

    /// Also accepts `CRITICAL`, `WARNING` and `NOTSET`.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "trace" | "notset" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" | "critical" => Ok(LogLevel::Error),
            _ => Err(Error::InvalidRequest(format!("invalid log level: {s}"))),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(Error::InvalidRequest(format!("invalid log format: {s}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Extra `EnvFilter` directives, comma separated (e.g. `reqwest=warn`).
    pub filter_directives: Option<String>,
    pub include_targets: bool,
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Text,
            filter_directives: None,
            include_targets: false,
            ansi: true,
        }
    }
}

impl LogConfig {
    pub fn builder() -> LogConfigBuilder {
        LogConfigBuilder::default()
    }

    /// Subscriber writing to stderr.
    pub fn dispatch(&self) -> Result<Dispatch> {
        self.dispatch_with_writer(io::stderr)
    }

    /// Subscriber writing to an arbitrary sink.
    pub fn dispatch_with_writer<W>(&self, writer: W) -> Result<Dispatch>
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let filter = self.filter()?;
        let layer = fmt::layer()
            .with_writer(writer)
            .with_target(self.include_targets)
            .with_ansi(self.ansi);

        let dispatch = match self.format {
            LogFormat::Text => Dispatch::new(tracing_subscriber::registry().with(filter).with(layer)),
            LogFormat::Json => {
                Dispatch::new(tracing_subscriber::registry().with(filter).with(layer.json()))
            }
        };
        Ok(dispatch)
    }

    fn filter(&self) -> Result<EnvFilter> {
        let mut filter = EnvFilter::new(self.level.to_string());
        if let Some(directives) = &self.filter_directives {
            for directive in directives.split(',').filter(|d| !d.trim().is_empty()) {
                let parsed: Directive = directive.trim().parse().map_err(|_| {
                    Error::InvalidRequest(format!("invalid filter directive: {directive}"))
                })?;
                filter = filter.add_directive(parsed);
            }
        }
        Ok(filter)
    }
}

#[derive(Debug, Default)]
pub struct LogConfigBuilder {
    config: LogConfig,
}

impl LogConfigBuilder {
    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn filter_directives(mut self, filter: impl Into<String>) -> Self {
        self.config.filter_directives = Some(filter.into());
        self
    }

    pub fn include_targets(mut self, include: bool) -> Self {
        self.config.include_targets = include;
        self
    }

    pub fn ansi(mut self, ansi: bool) -> Self {
        self.config.ansi = ansi;
        self
    }

    pub fn build(self) -> LogConfig {
        self.config
    }
}

/// Install `config` as the process-wide subscriber. Fails if one is already set.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let dispatch = config.dispatch()?;
    tracing::dispatcher::set_global_default(dispatch)
        .map_err(|e| Error::InvalidRequest(format!("logging already initialised: {e}")))
}
