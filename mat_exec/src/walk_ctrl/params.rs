//! Parameters structure for the walk controllers

use serde::Deserialize;

/// Gains and limits shared by the steering helpers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WalkCtrlParams {
    /// Proportional gain
    pub k_p: f64,

    /// Integral gain
    pub k_i: f64,

    /// Derivative gain
    pub k_d: f64,

    /// Weight of the distance error in the fused error
    pub w_distance: f64,

    /// Weight of the heading error in the fused error
    pub w_gyro: f64,

    /// Scale applied to the heading error before fusion.
    ///
    /// Units: centimetres/degree
    pub k_gyro: f64,

    /// Output limit of every helper.
    ///
    /// Units: degrees
    pub max_angle_deg: f64,

    /// Extra distance error added when a wall is inside its minimum band.
    ///
    /// Units: centimetres
    pub proximity_bias_cm: f64,

    /// Default minimum clearance to either wall.
    ///
    /// Units: centimetres
    pub min_wall_cm: f64,

    /// No command is produced while the distance error is below this...
    ///
    /// Units: centimetres
    pub deadband_cm: f64,

    /// ...and the heading error below this.
    ///
    /// Units: degrees
    pub deadband_deg: f64,

    /// The fixed turn output is halved once the heading is this close to the target.
    ///
    /// Units: degrees
    pub halving_band_deg: f64,

    /// Bounds on the controller time step.
    ///
    /// Units: seconds
    pub min_dt_s: f64,
    pub max_dt_s: f64,
}

impl Default for WalkCtrlParams {
    fn default() -> Self {
        Self {
            k_p: -4.0,
            k_i: 0.0,
            k_d: -0.05,
            w_distance: 0.5,
            w_gyro: 0.5,
            k_gyro: 5.5,
            max_angle_deg: 30.0,
            proximity_bias_cm: 5.0,
            min_wall_cm: 15.0,
            deadband_cm: 0.5,
            deadband_deg: 0.05,
            halving_band_deg: 20.0,
            min_dt_s: 0.001,
            max_dt_s: 0.1,
        }
    }
}
