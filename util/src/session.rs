//! Run sessions
//!
//! Each execution of the robot software gets a session: a timestamped directory holding the log
//! file and the measurement log of that run, and a process-wide epoch that log records and
//! measurements are timed against.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use conquer_once::OnceCell;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::time;

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

static SESSION_EPOCH: OnceCell<DateTime<Utc>> = OnceCell::uninit();

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Timestamp format used in session directory names and rotated file names.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Name of the measurement log inside the session directory.
const MEAS_LOG_FILE: &str = "measurements.csv";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Directory and files of the current run.
#[derive(Clone, Debug)]
pub struct Session {
    /// `<sessions dir>/<exec>_<timestamp>`
    pub session_root: PathBuf,

    pub log_file_path: PathBuf,

    pub meas_log_path: PathBuf,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("WRO_SW_ROOT is not set, cannot place the session directory")]
    SwRootNotSet,

    #[error("Cannot create the session directory {0:?}: {1}")]
    CannotCreateDir(PathBuf, std::io::Error),

    #[error("A session was already started in this process ({0})")]
    CannotInitEpoch(conquer_once::TryInitError),

    #[error("No session has been started in this process")]
    CannotGetEpoch,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Session {
    /// Start the session in `$WRO_SW_ROOT/<sessions_dir>`.
    pub fn new(exec_name: &str, sessions_dir: &str) -> Result<Self, SessionError> {
        let root = crate::host::get_sw_root().map_err(|_| SessionError::SwRootNotSet)?;

        Self::in_dir(exec_name, root.join(sessions_dir))
    }

    /// Start the session inside an explicit sessions directory.
    ///
    /// Only one session may be started per process.
    pub fn in_dir<P: AsRef<Path>>(exec_name: &str, sessions_dir: P) -> Result<Self, SessionError> {
        SESSION_EPOCH
            .try_init_once(Utc::now)
            .map_err(SessionError::CannotInitEpoch)?;
        let epoch = try_epoch()?;

        let session_root = sessions_dir
            .as_ref()
            .join(format!("{}_{}", exec_name, epoch.format(TIMESTAMP_FORMAT)));

        fs::create_dir_all(&session_root)
            .map_err(|e| SessionError::CannotCreateDir(session_root.clone(), e))?;

        Ok(Session {
            log_file_path: session_root.join(format!("{}.log", exec_name)),
            meas_log_path: session_root.join(MEAS_LOG_FILE),
            session_root,
        })
    }

    /// End the session.
    pub fn exit(self) {
        info!(
            "Session {:?} closed after {:.03} s",
            self.session_root,
            try_elapsed_seconds().unwrap_or(f64::NAN)
        );
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Seconds since the session epoch, `None` before a session is started.
pub fn try_elapsed_seconds() -> Option<f64> {
    SESSION_EPOCH
        .get()
        .map(|e| time::duration_to_seconds(Utc::now() - *e).unwrap_or(f64::NAN))
}

/// The session epoch, or an error before a session is started.
pub fn try_epoch() -> Result<&'static DateTime<Utc>, SessionError> {
    SESSION_EPOCH.get().ok_or(SessionError::CannotGetEpoch)
}
