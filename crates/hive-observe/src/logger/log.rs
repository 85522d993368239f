use time::{UtcOffset, format_description::well_known::Rfc3339};
use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, fmt, fmt::time::OffsetTime, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::logger::{config::LoggerConfig, error::LoggerError};

/// Identifier journald entries are tagged with.
#[cfg(all(target_os = "linux", feature = "journald"))]
const SYSLOG_IDENTIFIER: &str = "hive-agentd";

pub(crate) fn install_text(cfg: &LoggerConfig, filter: EnvFilter) -> Result<(), LoggerError> {
    let output = fmt::layer()
        .with_ansi(cfg.use_color)
        .with_target(cfg.with_targets)
        .with_timer(local_timer());
    install(tracing_subscriber::registry().with(filter).with(output))
}

/// One JSON object per event, with the enclosing span (e.g. the job a supervisor runs).
pub(crate) fn install_json(cfg: &LoggerConfig, filter: EnvFilter) -> Result<(), LoggerError> {
    let output = fmt::layer()
        .json()
        .with_ansi(false)
        .with_target(cfg.with_targets)
        .with_current_span(true)
        .with_timer(local_timer());
    install(tracing_subscriber::registry().with(filter).with(output))
}

#[cfg(all(target_os = "linux", feature = "journald"))]
pub(crate) fn install_journald(filter: EnvFilter) -> Result<(), LoggerError> {
    let journald = tracing_journald::layer()
        .map_err(|e| LoggerError::Install(format!("journald socket: {e}")))?
        .with_syslog_identifier(SYSLOG_IDENTIFIER.to_string());
    install(tracing_subscriber::registry().with(filter).with(journald))
}

#[cfg(not(all(target_os = "linux", feature = "journald")))]
pub(crate) fn install_journald(_filter: EnvFilter) -> Result<(), LoggerError> {
    Err(LoggerError::JournaldUnavailable)
}

pub(crate) fn filter(directive: &str) -> Result<EnvFilter, LoggerError> {
    EnvFilter::try_new(directive).map_err(|e| LoggerError::InvalidFilter {
        directive: directive.to_string(),
        reason: e.to_string(),
    })
}

/// RFC 3339 timestamps in the local offset; UTC when the offset cannot be determined.
fn local_timer() -> OffsetTime<Rfc3339> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, Rfc3339)
}

fn install<S>(subscriber: S) -> Result<(), LoggerError>
where
    S: Subscriber + Send + Sync + 'static,
{
    subscriber.try_init().map_err(|e| {
        let msg = e.to_string();
        if msg.contains("global default") || msg.contains("SetGlobalDefaultError") {
            LoggerError::AlreadyInstalled
        } else {
            LoggerError::Install(msg)
        }
    })
}
