//! Parameters structure for the bot positioner

use serde::Deserialize;

/// Clearances and biases used when adjusting side targets.
///
/// Units: centimetres and degrees
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PositionerParams {
    /// Minimum clearance given to a readable inside wall when the other side is out of range
    pub inside_clearance_cm: f64,

    /// Minimum clearance given to a readable outside wall when the other side is out of range
    pub outside_clearance_cm: f64,

    /// A wall this close triggers a shift away from it
    pub near_wall_cm: f64,

    /// Size of that shift
    pub shift_cm: f64,

    /// Yaw bias applied with the shift, towards the farther wall
    pub shift_yaw_bias_deg: f64,

    /// Lenient pass for long sides: learned total and minimum actual on both sides
    pub lenient_long_total_cm: f64,
    pub lenient_long_min_cm: f64,

    /// Lenient pass for medium sides: learned total and minimum actual on both sides
    pub lenient_medium_total_cm: f64,
    pub lenient_medium_min_cm: f64,

    /// Learned and actual totals closer than this are treated as equal
    pub total_tolerance_cm: f64,

    /// Learned totals below this are not trusted
    pub min_learned_total_cm: f64,

    /// Largest reduction of the wider side when the corridor reads wider than learned
    pub max_reduction_cm: f64,

    /// Reduction of the readable side when the other reads its maximum
    pub sentinel_reduction_cm: f64,

    /// Yaw bias towards the readable side when the other reads its maximum
    pub sentinel_yaw_bias_deg: f64,

    /// Any adjusted target below this aborts the adjustment
    pub min_result_cm: f64,
}

impl Default for PositionerParams {
    fn default() -> Self {
        Self {
            inside_clearance_cm: 25.0,
            outside_clearance_cm: 30.0,
            near_wall_cm: 20.0,
            shift_cm: 4.0,
            shift_yaw_bias_deg: 0.75,
            lenient_long_total_cm: 90.0,
            lenient_long_min_cm: 30.0,
            lenient_medium_total_cm: 60.0,
            lenient_medium_min_cm: 20.0,
            total_tolerance_cm: 2.0,
            min_learned_total_cm: 40.0,
            max_reduction_cm: 10.0,
            sentinel_reduction_cm: 5.0,
            sentinel_yaw_bias_deg: 0.5,
            min_result_cm: 10.0,
        }
    }
}
