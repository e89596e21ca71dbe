//! Parameters structure for the orientation estimator

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the orientation estimator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrientParams {
    // ---- TIMING ----
    /// Period of the background updater thread.
    ///
    /// Units: seconds
    pub update_period_s: f64,

    /// Largest time step accepted by the filter, longer steps are replaced by the nominal step.
    ///
    /// Units: seconds
    pub max_dt_s: f64,

    /// Time step used when the measured one is out of bounds.
    ///
    /// Units: seconds
    pub nominal_dt_s: f64,

    // ---- ROLL/PITCH ----
    /// Process variance of the accelerometer angle smoothers
    pub kalman_process_var: f64,

    /// Measurement variance of the accelerometer angle smoothers
    pub kalman_meas_var: f64,

    /// Weight of the gyro prediction in the roll/pitch complementary filter
    pub alpha_roll_pitch: f64,

    // ---- GYRO BIAS ----
    /// Rate below which every gyro axis must sit for a sample to count as stationary.
    ///
    /// Units: radians/second
    pub stationary_rate_rads: f64,

    /// Number of consecutive stationary samples before the yaw bias is refined
    pub stationary_samples: usize,

    /// Weight of the new mean in the yaw bias refinement
    pub bias_refine_gain: f64,

    /// Number of gyro samples averaged by `calibrate()`
    pub calib_samples: usize,

    /// Time between gyro samples during `calibrate()`.
    ///
    /// Units: seconds
    pub calib_sample_period_s: f64,

    // ---- MAGNETOMETER ----
    /// Yaw complementary weight while stationary
    pub mag_alpha_stationary: f64,

    /// Yaw complementary weight while moving
    pub mag_alpha_moving: f64,

    /// Scale applied to the magnetometer correction
    pub mag_sensitivity: f64,

    /// Weight of a new sample in the heading low pass filter
    pub mag_lpf_alpha: f64,

    /// Magnetometer axis feeding each IMU axis
    pub mag_axis_map: [usize; 3],

    /// Sign applied to each remapped magnetometer axis
    pub mag_axis_sign: [f64; 3],

    // ---- CALIBRATION FILE ----
    /// Path to the calibration record, `~/.wro_orientation_cal.json` if not set
    pub calib_file: Option<PathBuf>,

    /// Age after which a calibration record must be regenerated.
    ///
    /// Units: seconds
    pub recal_interval_s: f64,

    /// How long a gyro reset waits for the deferred zero to be captured.
    ///
    /// Units: seconds
    pub zero_wait_timeout_s: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for OrientParams {
    fn default() -> Self {
        Self {
            update_period_s: 0.008,
            max_dt_s: 0.1,
            nominal_dt_s: 0.01,
            kalman_process_var: 1e-3,
            kalman_meas_var: 5e-2,
            alpha_roll_pitch: 0.98,
            stationary_rate_rads: 0.05,
            stationary_samples: 50,
            bias_refine_gain: 0.05,
            calib_samples: 200,
            calib_sample_period_s: 0.005,
            mag_alpha_stationary: 0.60,
            mag_alpha_moving: 0.80,
            mag_sensitivity: 0.1,
            mag_lpf_alpha: 0.2,
            mag_axis_map: [0, 1, 2],
            mag_axis_sign: [1.0, 1.0, 1.0],
            calib_file: None,
            recal_interval_s: 86400.0,
            zero_wait_timeout_s: 0.5,
        }
    }
}
