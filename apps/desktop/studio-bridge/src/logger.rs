//! Logging for the bridge process.
//!
//! Every record goes to colored stdout and to a plain `studio-bridge.log` in the
//! log directory. The global logger can only be installed once per process; the
//! first successful [`initialize`] wins and later calls are no-ops.

use crate::error::AppError;

use common::ErrorLocation;

use std::fmt::Arguments;
use std::io::stdout;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use fern::colors::Color::{Blue, Green, Magenta, Red, Yellow};
use fern::colors::ColoredLevelConfig;
use fern::{Dispatch, FormatCallback};
use humantime::format_rfc3339;
use log::{LevelFilter, Record, info, warn};

pub const LOG_FILE_NAME: &str = "studio-bridge.log";

/// Log file of the installed logger, `None` until [`initialize`] succeeds.
static INSTALLED: Mutex<Option<PathBuf>> = Mutex::new(None);

#[cfg(debug_assertions)]
const LOG_LEVEL: LevelFilter = LevelFilter::Debug;

#[cfg(not(debug_assertions))]
const LOG_LEVEL: LevelFilter = LevelFilter::Info;

/// Per-frame debug output from the WebSocket stack drowns out the IPC log.
const QUIET_TARGETS: [&str; 2] = ["tungstenite", "tokio_tungstenite"];

/// Install the global logger writing to stdout and `{log_dir}/studio-bridge.log`.
///
/// Calling this again after a successful install logs a warning and returns `Ok`,
/// whatever `log_dir` is passed.
///
/// # Errors
///
/// Returns [`AppError::Startup`] if the log file cannot be created or another
/// logger already owns the `log` facade.
pub fn initialize(log_dir: &Path) -> Result<(), AppError> {
    let mut installed = INSTALLED.lock().unwrap_or_else(PoisonError::into_inner);

    if let Some(path) = installed.as_ref() {
        warn!("Logger already writing to {}", path.display());
        return Ok(());
    }

    build_dispatch(log_dir)?
        .apply()
        .map_err(|e| AppError::Startup {
            message: format!("Failed to install logger: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    let path = log_dir.join(LOG_FILE_NAME);
    info!("Logging at {LOG_LEVEL:?} to stdout and {}", path.display());
    *installed = Some(path);
    Ok(())
}

/// Path of the file the installed logger writes to.
pub fn installed_log_file() -> Option<PathBuf> {
    INSTALLED
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Build the stdout + file dispatch without installing it.
///
/// Creates (or appends to) the log file.
#[track_caller]
pub fn build_dispatch(log_dir: &Path) -> Result<Dispatch, AppError> {
    let log_file_path = log_dir.join(LOG_FILE_NAME);
    let log_file = fern::log_file(&log_file_path).map_err(|e| AppError::Startup {
        message: format!(
            "Failed to create log file {}: {e}",
            log_file_path.display()
        ),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let colors = ColoredLevelConfig::new()
        .debug(Blue)
        .info(Green)
        .warn(Yellow)
        .error(Red)
        .trace(Magenta);

    let dispatch = QUIET_TARGETS
        .iter()
        .fold(Dispatch::new().level(LOG_LEVEL), |dispatch, target| {
            dispatch.level_for(*target, LevelFilter::Info)
        });

    Ok(dispatch
        .chain(
            Dispatch::new()
                .format(line_format(Some(colors)))
                .chain(stdout()),
        )
        .chain(Dispatch::new().format(line_format(None)).chain(log_file)))
}

/// `[<rfc3339> - LEVEL] message [file:line]`, with the level colored when `colors` is set.
fn line_format(
    colors: Option<ColoredLevelConfig>,
) -> impl Fn(FormatCallback<'_>, &Arguments<'_>, &Record<'_>) + Send + Sync + 'static {
    move |out: FormatCallback<'_>, message: &Arguments<'_>, record: &Record<'_>| {
        let date = format_rfc3339(SystemTime::now());
        let file = record.file().unwrap_or("unknown");
        let line = record.line().unwrap_or(0);
        match colors.as_ref() {
            Some(colors) => out.finish(format_args!(
                "[{date} - {}] {message} [{file}:{line}]",
                colors.color(record.level())
            )),
            None => out.finish(format_args!(
                "[{date} - {}] {message} [{file}:{line}]",
                record.level()
            )),
        }
    }
}
