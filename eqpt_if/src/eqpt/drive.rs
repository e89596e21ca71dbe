//! # Drive base
//!
//! A single drive axle and a single steering axle (Ackermann).

use super::EqptError;

/// The drive motor and the steering actuator.
///
/// Speeds are percentages of full drive (0 to 100). Steering angles are in degrees, positive
/// turns the robot to the right.
pub trait DriveBase: Send + Sync {
    fn drive_forward(&self, speed: f64) -> Result<(), EqptError>;

    fn drive_backward(&self, speed: f64) -> Result<(), EqptError>;

    fn drive_stop(&self) -> Result<(), EqptError>;

    /// Command the steering to an absolute angle, blocking until the actuator has moved.
    ///
    /// Implementations make a single attempt, callers check the result with
    /// [`DriveBase::steering_angle`].
    fn set_steering(&self, angle_deg: f64) -> Result<(), EqptError>;

    /// Measured steering angle in degrees.
    fn steering_angle(&self) -> f64;
}
