//! Parameters structure for the simulated hardware

use serde::Deserialize;

/// Arena, robot and sensor parameters of the simulator.
///
/// Positions are in the mat frame: origin at the south-west corner, X east, Y north. Headings are
/// measured clockwise from north.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Side of the square mat.
    ///
    /// Units: centimetres
    pub mat_size_cm: f64,

    /// Width of the corridor between the outer and inner walls.
    ///
    /// Units: centimetres
    pub corridor_cm: f64,

    /// Distance between the axles.
    ///
    /// Units: centimetres
    pub wheelbase_cm: f64,

    /// The robot stops short of a wall closer than this.
    ///
    /// Units: centimetres
    pub body_radius_cm: f64,

    /// Range cap of every rangefinder.
    ///
    /// Units: centimetres
    pub max_range_cm: f64,

    /// Speed per unit of drive demand.
    ///
    /// Units: centimetres/second/speed unit
    pub cm_per_s_per_speed: f64,

    /// Hardware steering limit.
    ///
    /// Units: degrees
    pub max_steering_deg: f64,

    /// Constant gyro Z bias.
    ///
    /// Units: radians/second
    pub gyro_bias_rads: f64,

    /// Line band inset from the corner entrance, and its width.
    ///
    /// Units: centimetres
    pub band_inset_cm: f64,
    pub band_width_cm: f64,

    /// Longest integration step.
    ///
    /// Units: seconds
    pub max_step_s: f64,

    /// Synthesised camera frame size.
    ///
    /// Units: pixels
    pub frame_width: u32,
    pub frame_height: u32,

    /// Attach the synthesised camera
    pub camera: bool,

    /// Start pose.
    ///
    /// Units: centimetres, degrees
    pub start_x_cm: f64,
    pub start_y_cm: f64,
    pub start_heading_deg: f64,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            mat_size_cm: 300.0,
            corridor_cm: 100.0,
            wheelbase_cm: 15.0,
            body_radius_cm: 8.0,
            max_range_cm: 200.0,
            cm_per_s_per_speed: 0.84,
            max_steering_deg: 38.0,
            gyro_bias_rads: 0.0,
            band_inset_cm: 5.0,
            band_width_cm: 3.0,
            max_step_s: 0.002,
            frame_width: 64,
            frame_height: 48,
            camera: true,
            start_x_cm: 150.0,
            start_y_cm: 50.0,
            start_heading_deg: 270.0,
        }
    }
}
