//! # Mat navigation library.
//!
//! This library holds the navigation core of the mat executable so that the binary, the
//! integration tests and the simulator can share it.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Boot and shutdown lifecycle
pub mod bot;

/// Camera border estimator and its pipeline thread
pub mod cam;

/// Mat intelligence - tracks the location round the mat and learns the corridor widths
pub mod mat_intel;

/// Measurement logger thread
pub mod meas_log;

/// Movement controller - serialises drive and steering commands
pub mod move_ctrl;

/// Orientation estimator - fuses the IMU into roll, pitch and yaw
pub mod orient;

/// Executable parameters
pub mod params;

/// Bot positioner - target distance policy near walls
pub mod positioner;

/// Sensor aggregator - fuses the rangefinders and camera into one snapshot
pub mod sens_agg;

/// Simulated hardware
pub mod sim;

/// Walker helpers - PID steering fusion
pub mod walk_ctrl;

/// Walker state machine
pub mod walker;
