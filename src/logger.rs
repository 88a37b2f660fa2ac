//! Logging initialisation via tracing-subscriber.
//!
//! Call [`init`] once at startup, after config is resolved. Stdout carries
//! answers and JSON only, so logs go to stderr or to the configured file.
//!
//! Filter precedence: `-v` flags, then `RUST_LOG`, then the config level.
//! A bare level also caps the HTTP connection pool at `info`, which would
//! otherwise log every socket event at `debug` and drown the answer stream.

use std::path::Path;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

const TRANSPORT_DIRECTIVES: &str = "hyper_util=info,hyper=info";

/// Initialise the global tracing subscriber and return the filter directives
/// in effect.
///
/// `config_level` is a level name (`"info"`) or a full `EnvFilter` directive
/// string (`"answer_stream=debug,reqwest=info"`). `verbosity` is the number of
/// `-v` flags on the command line.
pub fn init(config_level: &str, verbosity: u8, log_file: Option<&Path>) -> Result<String, AppError> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directives = effective_directives(config_level, verbosity, rust_log.as_deref())?;
    let filter = EnvFilter::try_new(&directives)
        .map_err(|e| AppError::Logger(format!("invalid log filter '{directives}': {e}")))?;

    let writer = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    AppError::Logger(format!("failed to open log file '{}': {e}", path.display()))
                })?;
            BoxMakeWriter::new(file)
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(log_file.is_none())
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))?;

    Ok(directives)
}

/// Map repeated `-v` flags to a level, one tier per flag.
fn level_for_verbosity(verbosity: u8) -> Option<LevelFilter> {
    match verbosity {
        0 => None,
        1 => Some(LevelFilter::WARN),
        2 => Some(LevelFilter::INFO),
        3 => Some(LevelFilter::DEBUG),
        _ => Some(LevelFilter::TRACE),
    }
}

fn effective_directives(
    config_level: &str,
    verbosity: u8,
    rust_log: Option<&str>,
) -> Result<String, AppError> {
    if let Some(level) = level_for_verbosity(verbosity) {
        return Ok(with_transport_capped(level));
    }
    if let Some(env) = rust_log.map(str::trim).filter(|s| !s.is_empty()) {
        return Ok(env.to_string());
    }

    let config_level = config_level.trim();
    if config_level.contains(['=', ',']) {
        return Ok(config_level.to_string());
    }
    // EnvFilter reads a lone unknown word as a target name; reject it here.
    let level = config_level
        .parse::<LevelFilter>()
        .map_err(|_| AppError::Logger(format!("unrecognised log level: '{config_level}'")))?;
    Ok(with_transport_capped(level))
}

fn with_transport_capped(level: LevelFilter) -> String {
    if level > LevelFilter::INFO {
        format!("{level},{TRANSPORT_DIRECTIVES}")
    } else {
        level.to_string()
    }
}
