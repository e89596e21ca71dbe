//! Logger set up
//!
//! Every record goes to the console and to a log file. The console copy has a coloured level tag,
//! the file copy is plain text so it can be grepped after a run. Records from the noisier
//! modules (the simulator, the steering worker) can be capped at a quieter level than the rest.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use colored::{ColoredString, Colorize};
use log::{info, Level, Record};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Logger configuration.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Level of every module not listed in `module_levels`. Must be `Info` or more verbose.
    pub level: LevelFilter,

    /// Per-module caps, as `(module path prefix, level)`.
    pub module_levels: Vec<(String, LevelFilter)>,

    pub file_path: PathBuf,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("The log level must be at least as verbose as INFO, found {0}")]
    InvalidMinLogLevel(LevelFilter),

    #[error("Cannot open the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("A logger is already installed: {0}")]
    FernInitError(log::SetLoggerError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LoggerConfig {
    /// Default configuration writing to `file_path`.
    ///
    /// Simulator and steering worker records are capped at `Info` unless `level` is `Trace`.
    pub fn new<P: AsRef<Path>>(level: LevelFilter, file_path: P) -> Self {
        let module_levels = if level == LevelFilter::Trace {
            Vec::new()
        } else {
            vec![
                ("mat_lib::sim".to_string(), LevelFilter::Info),
                ("mat_lib::move_ctrl::steering".to_string(), LevelFilter::Info),
            ]
        };

        Self {
            level,
            module_levels,
            file_path: file_path.as_ref().to_path_buf(),
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution, writing to the session's log file.
///
/// # Safety
///
/// - This function must only be called once to prevent corrupting logs.
pub fn logger_init(
    min_level: LevelFilter,
    session: &session::Session,
) -> Result<(), LoggerInitError> {
    logger_init_with(LoggerConfig::new(min_level, &session.log_file_path))
}

/// Initialise the logger with an explicit log file instead of the session one.
pub fn logger_init_with_file<P: AsRef<Path>>(
    min_level: LevelFilter,
    log_file_path: P,
) -> Result<(), LoggerInitError> {
    logger_init_with(LoggerConfig::new(min_level, log_file_path))
}

/// Initialise the logger from a full configuration.
pub fn logger_init_with(config: LoggerConfig) -> Result<(), LoggerInitError> {
    if config.level < Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(config.level));
    }

    let log_file =
        fern::log_file(&config.file_path).map_err(LoggerInitError::LogFileInitError)?;

    let console = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{:10.6} {}] {}",
                elapsed(),
                level_tag(record.level()),
                Body(record, message)
            ))
        })
        .chain(std::io::stdout());

    let file = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{:10.6} {}] {}",
                elapsed(),
                record.level(),
                Body(record, message)
            ))
        })
        .chain(log_file);

    let mut root = fern::Dispatch::new().level(config.level);
    for (module, level) in config.module_levels.iter() {
        root = root.level_for(module.clone(), *level);
    }

    root.chain(console)
        .chain(file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    if let Ok(epoch) = session::try_epoch() {
        info!("    Session epoch: {}", epoch);
    }
    info!("    Log level: {:?}", config.level);
    for (module, level) in config.module_levels.iter() {
        info!("    {} capped at {:?}", module, level);
    }
    info!("    Log file path: {:?}", config.file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Seconds since the session epoch, or 0 before a session exists.
fn elapsed() -> f64 {
    session::try_elapsed_seconds().unwrap_or(0.0)
}

/// Record body, with the target prefixed on debug and trace records.
struct Body<'a, 'b>(&'a Record<'b>, &'a fmt::Arguments<'a>);

impl fmt::Display for Body<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.level() > Level::Info {
            write!(f, "{}: {}", self.0.target(), self.1)
        } else {
            write!(f, "{}", self.1)
        }
    }
}

fn level_tag(level: Level) -> ColoredString {
    match level {
        Level::Trace => "TRC".dimmed().italic(),
        Level::Debug => "DBG".dimmed(),
        Level::Info => "INF".normal(),
        Level::Warn => "WRN".yellow(),
        Level::Error => "ERR".red().bold(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_quiet_modules() {
        let config = LoggerConfig::new(LevelFilter::Debug, "/tmp/x.log");
        assert!(config
            .module_levels
            .iter()
            .any(|(m, l)| m == "mat_lib::sim" && *l == LevelFilter::Info));

        let config = LoggerConfig::new(LevelFilter::Trace, "/tmp/x.log");
        assert!(config.module_levels.is_empty());
    }
}
