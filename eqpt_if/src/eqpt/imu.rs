//! # Inertial Measurement Unit

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector3;

use super::EqptError;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Accelerometer, gyroscope and (optionally) magnetometer.
///
/// Axes are in the body frame: X forward, Y left, Z up. Yaw rates about Z are positive for a
/// clockwise (rightward) rotation seen from above.
pub trait Imu: Send + Sync {
    /// Specific force, units of g. Reads roughly `(0, 0, 1)` when level and still.
    fn acceleration(&self) -> Result<Vector3<f64>, EqptError>;

    /// Angular rate.
    ///
    /// Units: radians/second
    fn gyro(&self) -> Result<Vector3<f64>, EqptError>;

    /// Magnetic field, units of microtesla.
    ///
    /// Robots without a magnetometer return [`EqptError::Unavailable`].
    fn magnetometer(&self) -> Result<Vector3<f64>, EqptError> {
        Err(EqptError::Unavailable("magnetometer"))
    }
}
