//! # Orientation calibration record
//!
//! Gyro biases and magnetometer hard-iron offsets persisted between runs as a small JSON file.
//! Missing fields read as zero so older or hand-written records still load.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// File name of the calibration record in the user's home directory
pub const DEFAULT_CALIB_FILE_NAME: &str = ".wro_orientation_cal.json";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A persisted orientation calibration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationRecord {
    /// Units: degrees/second
    pub roll_offset_deg_per_s: f64,

    /// Units: degrees/second
    pub pitch_offset_deg_per_s: f64,

    /// Units: degrees/second
    pub yaw_offset_deg_per_s: f64,

    pub mag_bias_x: f64,
    pub mag_bias_y: f64,
    pub mag_bias_z: f64,

    /// Units: degrees
    pub mag_declination_deg: f64,

    /// UNIX time at which the gyro was sampled.
    ///
    /// Units: seconds
    pub timestamp: f64,

    /// Units: seconds
    pub recal_interval_sec: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CalibError {
    #[error("No calibration record at {0:?}")]
    Missing(PathBuf),

    #[error("Calibration record is {age_s:.0} s old, the limit is {limit_s:.0} s")]
    Stale { age_s: f64, limit_s: f64 },

    #[error("Could not access the calibration record: {0}")]
    Io(std::io::Error),

    #[error("Calibration record is malformed: {0}")]
    Malformed(serde_json::Error),

    #[error("Cannot locate the home directory for the calibration record")]
    NoHome,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CalibrationRecord {
    /// Load a record from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CalibError> {
        let path = path.as_ref();

        let s = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CalibError::Missing(path.to_path_buf()))
            }
            Err(e) => return Err(CalibError::Io(e)),
        };

        serde_json::from_str(&s).map_err(CalibError::Malformed)
    }

    /// Check the record is younger than its recalibration interval.
    ///
    /// A record without an interval uses `default_interval_s`.
    pub fn check_fresh(&self, now_s: f64, default_interval_s: f64) -> Result<(), CalibError> {
        let limit_s = if self.recal_interval_sec > 0.0 {
            self.recal_interval_sec
        } else {
            default_interval_s
        };
        let age_s = now_s - self.timestamp;

        if (0.0..limit_s).contains(&age_s) {
            Ok(())
        } else {
            Err(CalibError::Stale { age_s, limit_s })
        }
    }

    /// Write the record, replacing any previous one atomically.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CalibError> {
        let path = path.as_ref();
        let tmp = path.with_extension("json.tmp");

        let s = serde_json::to_string_pretty(self).map_err(CalibError::Malformed)?;
        fs::write(&tmp, s).map_err(CalibError::Io)?;
        fs::rename(&tmp, path).map_err(CalibError::Io)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Default location of the calibration record.
pub fn default_calib_path() -> Result<PathBuf, CalibError> {
    std::env::var_os("HOME")
        .map(|h| PathBuf::from(h).join(DEFAULT_CALIB_FILE_NAME))
        .ok_or(CalibError::NoHome)
}
