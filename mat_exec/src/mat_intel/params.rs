//! Parameters structure for MatIntel

use serde::Deserialize;

/// Parameters for the mat intelligence.
///
/// All distances in centimetres.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatIntelParams {
    /// Wall-to-wall sums below this value mean the robot is inside a mat corridor
    pub mat_max_cm: f64,

    /// How long `location_complete` waits for queued readings to be processed.
    ///
    /// Units: seconds
    pub drain_timeout_s: f64,

    // ---- SIDE CLASSIFICATION ----
    pub short_side_min_cm: f64,
    pub short_side_max_cm: f64,
    pub long_side_min_cm: f64,
    pub long_side_max_cm: f64,

    // ---- DEFAULT TARGETS ----
    /// Front distance at which a side ends by default
    pub side_front_cm: f64,

    /// Front distance at which a side ends when the next side is short
    pub short_side_front_cm: f64,

    /// Front distance at which a corner is entered by default
    pub corner_front_cm: f64,

    /// Inside wall distance in a corner by default
    pub corner_inside_cm: f64,

    /// Corner front and inside distances when the following side is long
    pub long_corner_front_cm: f64,
    pub long_corner_inside_cm: f64,

    /// Corner front and inside distances when the following side is short
    pub short_corner_front_cm: f64,
    pub short_corner_inside_cm: f64,
}

impl Default for MatIntelParams {
    fn default() -> Self {
        Self {
            mat_max_cm: 110.0,
            drain_timeout_s: 2.0,
            short_side_min_cm: 35.0,
            short_side_max_cm: 65.0,
            long_side_min_cm: 50.0,
            long_side_max_cm: 130.0,
            side_front_cm: 100.0,
            short_side_front_cm: 70.0,
            corner_front_cm: 20.0,
            corner_inside_cm: 30.0,
            long_corner_front_cm: 30.0,
            long_corner_inside_cm: 35.0,
            short_corner_front_cm: 20.0,
            short_corner_inside_cm: 25.0,
        }
    }
}
