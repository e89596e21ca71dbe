//! Side following between two wall targets

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use crate::sens_agg::SensorSnapshot;

use super::{
    fused_output, proximity_bias, side_usable, PidController, SteeringHelper, WalkCtrlParams,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Holds the robot at `target_left`/`target_right` from the walls on a constant heading.
///
/// When one side cannot be used (reading at the sensor maximum, invalid, or target unset) the
/// other side's error is doubled so a single wall still centres the robot.
#[derive(Debug, Clone)]
pub struct EquiWalker {
    params: WalkCtrlParams,
    pid: PidController,

    target_left: f64,
    target_right: f64,

    min_left: f64,
    min_right: f64,

    def_yaw: f64,
    max_distance: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl EquiWalker {
    pub fn new(
        target_left: f64,
        target_right: f64,
        def_yaw: f64,
        max_distance: f64,
        params: &WalkCtrlParams,
    ) -> Self {
        Self {
            params: params.clone(),
            pid: PidController::from_params(params),
            target_left,
            target_right,
            min_left: params.min_wall_cm,
            min_right: params.min_wall_cm,
            def_yaw,
            max_distance,
        }
    }

    /// Override the minimum wall bands.
    pub fn with_min(mut self, min_left: f64, min_right: f64) -> Self {
        self.min_left = min_left;
        self.min_right = min_right;
        self
    }

    pub fn set_targets(&mut self, target_left: f64, target_right: f64) {
        self.target_left = target_left;
        self.target_right = target_right;
    }

    pub fn targets(&self) -> (f64, f64) {
        (self.target_left, self.target_right)
    }

    /// The lateral error before the PID, positive when the robot is right of its targets.
    pub fn distance_error(&self, snap: &SensorSnapshot) -> f64 {
        let left_ok = side_usable(snap.left_cm, self.target_left, self.max_distance);
        let right_ok = side_usable(snap.right_cm, self.target_right, self.max_distance);

        let left_delta = snap.left_cm - self.target_left;
        let right_delta = snap.right_cm - self.target_right;

        let error = match (left_ok, right_ok) {
            (true, true) => left_delta - right_delta,
            (true, false) => 2.0 * left_delta,
            (false, true) => -2.0 * right_delta,
            (false, false) => 0.0,
        };

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

impl SteeringHelper for EquiWalker {
    /// Positive output steers right (clockwise), negative steers left. A robot closer to the left
    /// wall than its targets ask for, or pointing left of the demand, gets a positive output.
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

    fn snap(l: f64, r: f64, yaw: f64) -> SensorSnapshot {
        SensorSnapshot::from_distances(150.0, l, r, yaw)
    }

    #[test]
    fn test_on_target_no_command() {
        let p = WalkCtrlParams::default();
        let mut walker = EquiWalker::new(48.0, 48.0, 0.0, 200.0, &p);

        assert_eq!(walker.process(&snap(48.0, 48.0, 0.0)), None);
        assert_eq!(walker.process(&snap(48.2, 48.0, 0.01)), None);

        let mut walker = EquiWalker::new(40.0, 40.0, 12.0, 200.0, &p);
        assert_eq!(walker.process(&snap(40.0, 40.0, 12.0)), None);
    }

    #[test]
    fn test_lost_right_sensor() {
        let p = WalkCtrlParams::default();
        let mut walker = EquiWalker::new(40.0, 40.0, 0.0, 200.0, &p);

        // Right at the maximum is ignored, left on target
        assert_eq!(walker.distance_error(&snap(40.0, 200.0, 0.0)), 0.0);
        assert_eq!(walker.process(&snap(40.0, 200.0, 0.0)), None);

        // Left drifting out is doubled, and pulls the robot back left
        assert_eq!(walker.distance_error(&snap(43.0, 200.0, 0.0)), 6.0);
        let out = walker.process(&snap(43.0, 200.0, 0.0)).unwrap();
        assert!((out - -12.0).abs() < 1e-9);
    }

    #[test]
    fn test_unset_target_uses_other_side() {
        let p = WalkCtrlParams::default();
        let walker = EquiWalker::new(-1.0, 35.0, 0.0, 200.0, &p);

        assert_eq!(walker.distance_error(&snap(60.0, 30.0, 0.0)), 10.0);
    }

    #[test]
    fn test_proximity_bias() {
        let p = WalkCtrlParams::default();
        let walker = EquiWalker::new(-1.0, -1.0, 0.0, 200.0, &p);

        assert_eq!(walker.distance_error(&snap(10.0, 80.0, 0.0)), -5.0);
        assert_eq!(walker.distance_error(&snap(80.0, 15.0, 0.0)), 5.0);
    }

    #[test]
    fn test_heading_correction_sign() {
        let p = WalkCtrlParams::default();
        let mut walker = EquiWalker::new(50.0, 50.0, 0.0, 200.0, &p);

        // Pointing right of the demand steers left
        assert!(walker.process(&snap(50.0, 50.0, 2.0)).unwrap() < 0.0);
        walker.reset();
        assert!(walker.process(&snap(50.0, 50.0, -2.0)).unwrap() > 0.0);
    }

    #[test]
    fn test_steers_away_from_closer_wall() {
        let p = WalkCtrlParams::default();
        let mut walker = EquiWalker::new(48.0, 48.0, 0.0, 200.0, &p);

        assert!(walker.process(&snap(40.0, 56.0, 0.0)).unwrap() > 0.0);
        walker.reset();
        assert!(walker.process(&snap(56.0, 40.0, 0.0)).unwrap() < 0.0);
    }

    #[test]
    fn test_output_clamped() {
        let p = WalkCtrlParams::default();
        let mut walker = EquiWalker::new(50.0, 50.0, 0.0, 200.0, &p);

        let out = walker.process(&snap(90.0, 10.0, 0.0)).unwrap();
        assert_eq!(out, -30.0);
    }
}
