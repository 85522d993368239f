mod config;
mod error;
mod format;
mod log;

pub use config::LoggerConfig;
pub use error::LoggerError;
pub use format::LoggerFormat;

/// Install the process-wide subscriber described by `cfg`.
///
/// Only the first call in a process can succeed; later ones return
/// [`LoggerError::AlreadyInstalled`].
pub fn logger_init(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    let filter = log::filter(&cfg.level)?;
    match cfg.format {
        LoggerFormat::Text => log::install_text(cfg, filter),
        LoggerFormat::Json => log::install_json(cfg, filter),
        LoggerFormat::Journald => log::install_journald(filter),
    }
}
