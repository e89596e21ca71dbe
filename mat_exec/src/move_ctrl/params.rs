//! Parameters structure for MoveCtrl

use serde::Deserialize;

/// Parameters for the movement controller.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MoveParams {
    /// Distance travelled per second per unit of drive speed.
    ///
    /// Units: centimetres/second/speed unit
    pub cm_per_s_per_speed: f64,

    /// Default absolute steering limit.
    ///
    /// Units: degrees
    pub max_turn_angle_deg: f64,

    /// Hardware steering limit, no command ever exceeds this.
    ///
    /// Units: degrees
    pub hw_max_turn_angle_deg: f64,

    /// Steering position tolerance after a command.
    ///
    /// Units: degrees
    pub steer_tolerance_deg: f64,

    /// Number of residual corrections made when the steering misses its target
    pub steer_retries: usize,

    /// A steering change larger than this coerces the speed to `min_speed` when speedcheck is
    /// requested.
    ///
    /// Units: degrees
    pub speedcheck_delta_deg: f64,

    /// Slowest useful drive speed
    pub min_speed: f64,
}

impl Default for MoveParams {
    fn default() -> Self {
        Self {
            cm_per_s_per_speed: 0.84,
            max_turn_angle_deg: 24.4,
            hw_max_turn_angle_deg: 38.0,
            steer_tolerance_deg: 2.0,
            steer_retries: 3,
            speedcheck_delta_deg: 10.0,
            min_speed: 35.0,
        }
    }
}
