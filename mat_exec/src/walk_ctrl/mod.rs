//! # Walk controllers
//!
//! Steering helpers turning a [`SensorSnapshot`] into a steering demand. All of them fuse a
//! lateral distance error with a heading error:
//!
//! ```text
//! fused = w_distance * distance_error + w_gyro * (k_gyro * heading_error)
//! ```
//!
//! and pass the result through a [`PidController`]. A positive distance error means the robot is
//! right of where it should be and a positive heading error means it points right of the demanded
//! yaw. With the default negative gains both steer left (negative).
//!
//! - [`EquiWalker`] holds the robot between two side targets.
//! - [`GyroWithMinDistance`] holds a heading and only reacts to walls inside a minimum band.
//! - [`FixedTurnWalker`] turns at a constant angle towards a heading, falling back to the gyro
//!   helper when a wall gets too close.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod equi;
mod fixed_turn;
mod gyro_min;
mod params;
mod pid;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use util::maths::ang_diff_deg;

use crate::sens_agg::SensorSnapshot;

pub use equi::EquiWalker;
pub use fixed_turn::FixedTurnWalker;
pub use gyro_min::GyroWithMinDistance;
pub use params::WalkCtrlParams;
pub use pid::PidController;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A steering helper consulted once per control loop iteration.
pub trait SteeringHelper: Send {
    /// Steering demand for the snapshot, `None` if no change is needed.
    ///
    /// Units: degrees
    fn process(&mut self, snap: &SensorSnapshot) -> Option<f64>;

    /// Forget controller history.
    fn reset(&mut self);

    /// The heading being held.
    ///
    /// Units: degrees
    fn def_yaw(&self) -> f64;

    fn set_def_yaw(&mut self, def_yaw: f64);
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// True if a side reading and its target can both be used.
///
/// Readings at or above the sensor maximum, non-positive readings and targets outside
/// `[0, max_distance)` disqualify the side.
pub fn side_usable(reading: f64, target: f64, max_distance: f64) -> bool {
    reading > 0.0 && reading < max_distance && target >= 0.0 && target < max_distance
}

/// True if a reading is valid and at or inside its minimum band.
pub(crate) fn inside_band(reading: f64, min: f64, max_distance: f64) -> bool {
    reading > 0.0 && reading < max_distance && reading <= min
}

/// Add the hard proximity bias for any wall inside its band.
pub(crate) fn proximity_bias(
    snap: &SensorSnapshot,
    min_left: f64,
    min_right: f64,
    max_distance: f64,
    params: &WalkCtrlParams,
) -> f64 {
    let mut bias = 0.0;

    if inside_band(snap.left_cm, min_left, max_distance) {
        bias -= params.proximity_bias_cm;
    }
    if inside_band(snap.right_cm, min_right, max_distance) {
        bias += params.proximity_bias_cm;
    }

    bias
}

/// Run the fused error through the PID, or `None` inside the deadband.
pub(crate) fn fused_output(
    pid: &mut PidController,
    distance_error: f64,
    yaw_deg: f64,
    def_yaw: f64,
    params: &WalkCtrlParams,
) -> Option<f64> {
    let heading_error = ang_diff_deg(yaw_deg, def_yaw);

    if distance_error.abs() < params.deadband_cm && heading_error.abs() < params.deadband_deg {
        return None;
    }

    let fused =
        params.w_distance * distance_error + params.w_gyro * (params.k_gyro * heading_error);

    Some(pid.get(fused))
}
