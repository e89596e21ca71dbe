//! Constant angle turn towards a heading

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;

use util::maths::ang_diff_deg;

use crate::sens_agg::SensorSnapshot;

use super::{GyroWithMinDistance, SteeringHelper, WalkCtrlParams};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Turns at `turn_angle` towards `target_yaw`, halving the angle once within the halving band.
///
/// If either wall enters its minimum band the output comes from a [`GyroWithMinDistance`]
/// holding the target heading instead.
#[derive(Debug, Clone)]
pub struct FixedTurnWalker {
    turn_angle: f64,
    target_yaw: f64,
    halving_band: f64,

    fallback: GyroWithMinDistance,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FixedTurnWalker {
    pub fn new(
        turn_angle: f64,
        target_yaw: f64,
        min_left: f64,
        min_right: f64,
        max_distance: f64,
        params: &WalkCtrlParams,
    ) -> Self {
        Self {
            turn_angle: turn_angle.abs(),
            target_yaw,
            halving_band: params.halving_band_deg,
            fallback: GyroWithMinDistance::new(
                min_left,
                min_right,
                target_yaw,
                max_distance,
                params,
            ),
        }
    }

    /// Heading still to turn, signed.
    ///
    /// Units: degrees
    pub fn remaining(&self, yaw_deg: f64) -> f64 {
        ang_diff_deg(self.target_yaw, yaw_deg)
    }

    pub fn turn_angle(&self) -> f64 {
        self.turn_angle
    }

    pub fn set_turn_angle(&mut self, turn_angle: f64) {
        self.turn_angle = turn_angle.abs();
    }
}

impl SteeringHelper for FixedTurnWalker {
    fn process(&mut self, snap: &SensorSnapshot) -> Option<f64> {
        if self.fallback.band_violated(snap) {
            trace!("Fixed turn: wall inside band, holding heading");
            return self.fallback.process(snap);
        }

        let remaining = self.remaining(snap.yaw_deg);

        let magnitude = if remaining.abs() <= self.halving_band {
            self.turn_angle / 2.0
        } else {
            self.turn_angle
        };

        Some(magnitude * remaining.signum())
    }

    fn reset(&mut self) {
        self.fallback.reset();
    }

    fn def_yaw(&self) -> f64 {
        self.target_yaw
    }

    fn set_def_yaw(&mut self, def_yaw: f64) {
        self.target_yaw = def_yaw;
        self.fallback.set_def_yaw(def_yaw);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clockwise_turn() {
        let p = WalkCtrlParams::default();
        let mut turn = FixedTurnWalker::new(24.4, 90.0, 10.0, 10.0, 200.0, &p);

        let at = |yaw| SensorSnapshot::from_distances(60.0, 35.0, 60.0, yaw);

        assert_eq!(turn.process(&at(0.0)), Some(24.4));
        assert_eq!(turn.process(&at(65.0)), Some(24.4));
        assert_eq!(turn.process(&at(75.0)), Some(12.2));

        // Overshoot reverses
        assert_eq!(turn.process(&at(100.0)), Some(-12.2));
    }

    #[test]
    fn test_counter_clockwise_turn() {
        let p = WalkCtrlParams::default();
        let mut turn = FixedTurnWalker::new(20.0, -90.0, 10.0, 10.0, 200.0, &p);

        let s = SensorSnapshot::from_distances(60.0, 60.0, 35.0, -10.0);
        assert_eq!(turn.process(&s), Some(-20.0));
    }

    #[test]
    fn test_band_falls_back() {
        let p = WalkCtrlParams::default();
        let mut turn = FixedTurnWalker::new(24.4, 90.0, 10.0, 10.0, 200.0, &p);

        // Right wall too close at the target heading: push away instead of turning
        let s = SensorSnapshot::from_distances(60.0, 60.0, 8.0, 90.0);
        let out = turn.process(&s).unwrap();
        assert!(out.abs() <= 30.0);
        assert!(out < 0.0, "{}", out);
    }
}
