//! Heading hold that only reacts to walls inside their minimum band

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use crate::sens_agg::SensorSnapshot;

use super::{
    fused_output, inside_band, proximity_bias, PidController, SteeringHelper, WalkCtrlParams,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Holds `def_yaw`, pushing away from a wall only once it is within `min_left`/`min_right`.
#[derive(Debug, Clone)]
pub struct GyroWithMinDistance {
    params: WalkCtrlParams,
    pid: PidController,

    min_left: f64,
    min_right: f64,

    def_yaw: f64,
    max_distance: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl GyroWithMinDistance {
    pub fn new(
        min_left: f64,
        min_right: f64,
        def_yaw: f64,
        max_distance: f64,
        params: &WalkCtrlParams,
    ) -> Self {
        Self {
            params: params.clone(),
            pid: PidController::from_params(params),
            min_left,
            min_right,
            def_yaw,
            max_distance,
        }
    }

    /// True if either wall is inside its band.
    pub fn band_violated(&self, snap: &SensorSnapshot) -> bool {
        inside_band(snap.left_cm, self.min_left, self.max_distance)
            || inside_band(snap.right_cm, self.min_right, self.max_distance)
    }

    /// The lateral error, zero while both walls are outside their bands.
    pub fn distance_error(&self, snap: &SensorSnapshot) -> f64 {
        let mut error = 0.0;

        if inside_band(snap.left_cm, self.min_left, self.max_distance) {
            error += snap.left_cm - self.min_left;
        }
        if inside_band(snap.right_cm, self.min_right, self.max_distance) {
            error -= snap.right_cm - self.min_right;
        }

        error
            + proximity_bias(
                snap,
                self.min_left,
                self.min_right,
                self.max_distance,
                &self.params,
            )
    }
}

impl SteeringHelper for GyroWithMinDistance {
    fn process(&mut self, snap: &SensorSnapshot) -> Option<f64> {
        let error = self.distance_error(snap);
        fused_output(&mut self.pid, error, snap.yaw_deg, self.def_yaw, &self.params)
    }

    fn reset(&mut self) {
        self.pid.reset();
    }

    fn def_yaw(&self) -> f64 {
        self.def_yaw
    }

    fn set_def_yaw(&mut self, def_yaw: f64) {
        self.def_yaw = def_yaw;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_outside_band_heading_only() {
        let p = WalkCtrlParams::default();
        let mut gyro = GyroWithMinDistance::new(15.0, 15.0, 0.0, 200.0, &p);

        let s = SensorSnapshot::from_distances(100.0, 30.0, 70.0, 0.0);
        assert_eq!(gyro.distance_error(&s), 0.0);
        assert_eq!(gyro.process(&s), None);

        let s = SensorSnapshot::from_distances(100.0, 30.0, 70.0, -4.0);
        assert!(gyro.process(&s).unwrap() > 0.0);
    }

    #[test]
    fn test_inside_band_pushes_away() {
        let p = WalkCtrlParams::default();
        let mut gyro = GyroWithMinDistance::new(15.0, 15.0, 0.0, 200.0, &p);

        // Left wall 5 cm inside its band: -5 - 5
        let s = SensorSnapshot::from_distances(100.0, 10.0, 90.0, 0.0);
        assert!(gyro.band_violated(&s));
        assert_eq!(gyro.distance_error(&s), -10.0);
        assert!(gyro.process(&s).unwrap() > 0.0);

        let s = SensorSnapshot::from_distances(100.0, 90.0, 12.0, 0.0);
        assert_eq!(gyro.distance_error(&s), 8.0);
    }
}
