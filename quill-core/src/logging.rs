use std::env;
use std::fmt;

use crate::config::SemaConfig;

pub const TRACE_ENV: &str = "QUILL_TRACE";
pub const LOG_LEVEL_ENV: &str = "QUILL_LOG_LEVEL";

/// Logging verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn parse(spec: &str) -> Option<Self> {
        match spec.trim().to_ascii_lowercase().as_str() {
            "error" | "err" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            "trace" | "verbose" => Some(Self::Trace),
            _ => None,
        }
    }

    pub fn as_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        f.write_str(text)
    }
}

/// Which definitions get per-definition analysis traces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceOptions {
    pub level: Option<LogLevel>,
    pub trace_all: bool,
    pub defns: Vec<String>,
    pub instantiation: bool,
}

impl TraceOptions {
    pub fn from_config(config: &SemaConfig) -> Self {
        Self::from_config_with(config, |key| env::var(key).ok())
    }

    /// Like `from_config`, reading the environment through `lookup`.
    pub fn from_config_with(
        config: &SemaConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let mut options = TraceOptions {
            level: None,
            trace_all: false,
            defns: config.traced_defns.clone(),
            instantiation: config.trace_instantiation,
        };
        if let Some(spec) = lookup(TRACE_ENV) {
            for name in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                if name == "*" {
                    options.trace_all = true;
                } else if !options.defns.iter().any(|d| d == name) {
                    options.defns.push(name.to_string());
                }
            }
        }
        if let Some(level) = lookup(LOG_LEVEL_ENV) {
            options.level = LogLevel::parse(&level);
        }
        options
    }

    pub fn is_trace_enabled(&self, qualified_name: &str) -> bool {
        self.trace_all || self.defns.iter().any(|d| d == qualified_name)
    }
}
