use std::io::IsTerminal;

use crate::logger::{error::LoggerError, format::LoggerFormat};

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directive, e.g. `info` or `hive_core=debug,info`.
    pub level: String,
    pub with_targets: bool,
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: true,
            use_color: cfg!(test) || std::io::stdout().is_terminal(),
        }
    }
}

impl LoggerConfig {
    pub fn with_format(mut self, format: LoggerFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }
}

impl LoggerConfig {
    /// Check the filter directive without installing anything.
    pub fn validate(&self) -> Result<(), LoggerError> {
        crate::logger::log::filter(&self.level).map(|_| ())
    }
}
