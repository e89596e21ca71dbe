//! Parameters for the camera border estimator and its pipeline thread

use serde::Deserialize;

/// Parameters for the border estimator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BorderParams {
    /// Camera is mounted upside-down, the floor is at the top of the frame
    pub upside_down: bool,

    /// A pixel is dark if every channel is below this value
    pub dark_threshold: u8,

    /// Dark-fraction thresholds (percent) and the distance (cm) reported above each, in
    /// decreasing order of threshold
    pub pct_to_distance: Vec<(f64, f64)>,

    /// Centre dark-fraction above which only the centre distance is reported.
    ///
    /// Units: percent
    pub center_priority_pct: f64,
}

/// Parameters for the camera pipeline thread.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CamPipelineParams {
    /// Rate while any border distance is valid
    pub fast_fps: f64,

    /// Rate while every border distance is invalid
    pub slow_fps: f64,
}

impl Default for BorderParams {
    fn default() -> Self {
        Self {
            upside_down: false,
            dark_threshold: 50,
            pct_to_distance: vec![(95.0, 5.0), (85.0, 10.0), (75.0, 20.0), (50.0, 30.0)],
            center_priority_pct: 50.0,
        }
    }
}

impl Default for CamPipelineParams {
    fn default() -> Self {
        Self {
            fast_fps: 30.0,
            slow_fps: 15.0,
        }
    }
}
