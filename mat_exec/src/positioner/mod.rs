//! # Bot positioner
//!
//! Policy for adjusting side-following targets when the robot starts a side off centre, close
//! to a wall, or with one side out of sensor range. Every adjustment returns a [`Correction`];
//! `changed == false` means the caller's targets and heading should be kept.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod params;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::debug;

use crate::mat_intel::{Direction, Wall, NO_TARGET};

pub use params::PositionerParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Result of a positioning decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction {
    pub changed: bool,

    /// Heading to hold.
    ///
    /// Units: degrees
    pub yaw: f64,

    /// Side targets, [`NO_TARGET`] where a side should be ignored.
    ///
    /// Units: centimetres
    pub left: f64,
    pub right: f64,
}

pub struct Positioner {
    params: PositionerParams,

    /// Sensor maximum, readings at or above it are out of range
    max_distance: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Correction {
    fn unchanged(yaw: f64, left: f64, right: f64) -> Self {
        Self {
            changed: false,
            yaw,
            left,
            right,
        }
    }

    fn changed(yaw: f64, left: f64, right: f64) -> Self {
        Self {
            changed: true,
            yaw,
            left,
            right,
        }
    }
}

impl Positioner {
    pub fn new(params: PositionerParams, max_distance: f64) -> Self {
        Self {
            params,
            max_distance,
        }
    }

    /// Adjust targets from the actual distances alone.
    ///
    /// - One side out of range: the readable side keeps at least the inside or outside clearance
    ///   and the other side is ignored.
    /// - A wall within `near_wall_cm`: shift away from the closer wall and bias the heading
    ///   towards the farther one.
    /// - Otherwise the actual distances are returned unchanged.
    pub fn center_bot_correction(
        &self,
        left: f64,
        right: f64,
        prev_yaw: f64,
        direction: Direction,
    ) -> Correction {
        let p = &self.params;
        let left_max = self.at_max(left);
        let right_max = self.at_max(right);

        match (left_max, right_max) {
            (true, true) => return Correction::unchanged(prev_yaw, left, right),
            (true, false) => {
                let clearance = self.clearance(Wall::Right, direction);
                return Correction::changed(prev_yaw, NO_TARGET, right.max(clearance));
            }
            (false, true) => {
                let clearance = self.clearance(Wall::Left, direction);
                return Correction::changed(prev_yaw, left.max(clearance), NO_TARGET);
            }
            (false, false) => (),
        }

        if left <= p.near_wall_cm || right <= p.near_wall_cm {
            // Left closer: targets move right, heading biased right
            let sign = if left <= right { 1.0 } else { -1.0 };

            let corr = Correction::changed(
                prev_yaw + sign * p.shift_yaw_bias_deg,
                left + sign * p.shift_cm,
                right - sign * p.shift_cm,
            );
            debug!("Near wall, shifting targets to {:.1}/{:.1}", corr.left, corr.right);
            return corr;
        }

        Correction::unchanged(prev_yaw, left, right)
    }

    /// Reconcile the learned side targets with the distances actually seen at the side start.
    pub fn side_bot_centering(
        &self,
        learned: (f64, f64),
        actual: (f64, f64),
        prev_yaw: f64,
        lenient: bool,
        direction: Direction,
    ) -> Correction {
        let p = &self.params;
        let (learned_left, learned_right) = learned;
        let (left, right) = actual;

        let keep = Correction::unchanged(prev_yaw, learned_left, learned_right);

        let learned_total = learned_left + learned_right;
        let actual_total = left + right;

        if lenient {
            let long_ok = learned_total >= p.lenient_long_total_cm
                && left > p.lenient_long_min_cm
                && right > p.lenient_long_min_cm;
            let medium_ok = learned_total >= p.lenient_medium_total_cm
                && left > p.lenient_medium_min_cm
                && right > p.lenient_medium_min_cm;

            if long_ok || medium_ok {
                return keep;
            }
        }

        let corr = match (self.at_max(left), self.at_max(right)) {
            (true, true) => return keep,

            // Bias towards the wall still in view
            (true, false) => Correction::changed(
                prev_yaw + p.sentinel_yaw_bias_deg,
                NO_TARGET,
                right - p.sentinel_reduction_cm,
            ),
            (false, true) => Correction::changed(
                prev_yaw - p.sentinel_yaw_bias_deg,
                left - p.sentinel_reduction_cm,
                NO_TARGET,
            ),

            (false, false) => {
                let diff = actual_total - learned_total;

                if diff.abs() < p.total_tolerance_cm || learned_total < p.min_learned_total_cm {
                    self.center_bot_correction(left, right, prev_yaw, direction)
                } else if diff < 0.0 {
                    let mid = actual_total / 2.0;
                    Correction::changed(prev_yaw, mid, mid)
                } else {
                    let reduction = diff.min(p.max_reduction_cm);
                    if left >= right {
                        Correction::changed(prev_yaw, left - reduction, right)
                    } else {
                        Correction::changed(prev_yaw, left, right - reduction)
                    }
                }
            }
        };

        let too_small = |v: f64| v != NO_TARGET && v < p.min_result_cm;
        if corr.changed && (too_small(corr.left) || too_small(corr.right)) {
            debug!(
                "Centering result {:.1}/{:.1} too close to a wall, keeping learned targets",
                corr.left, corr.right
            );
            return keep;
        }

        corr
    }

    fn at_max(&self, distance: f64) -> bool {
        distance >= self.max_distance
    }

    /// Clearance for a wall, unknown direction counts as outside.
    fn clearance(&self, wall: Wall, direction: Direction) -> f64 {
        if direction.inside_wall() == Some(wall) {
            self.params.inside_clearance_cm
        } else {
            self.params.outside_clearance_cm
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn positioner() -> Positioner {
        Positioner::new(PositionerParams::default(), 200.0)
    }

    #[test]
    fn test_center_one_side_out_of_range() {
        let pos = positioner();

        // Clockwise, right is inside
        let c = pos.center_bot_correction(200.0, 18.0, 0.0, Direction::Clockwise);
        assert_eq!(c, Correction::changed(0.0, NO_TARGET, 25.0));

        let c = pos.center_bot_correction(200.0, 18.0, 0.0, Direction::CounterClockwise);
        assert_eq!(c, Correction::changed(0.0, NO_TARGET, 30.0));

        let c = pos.center_bot_correction(45.0, 200.0, 0.0, Direction::Unknown);
        assert_eq!(c, Correction::changed(0.0, 45.0, NO_TARGET));

        let c = pos.center_bot_correction(200.0, 200.0, 3.0, Direction::Unknown);
        assert!(!c.changed);
    }

    #[test]
    fn test_center_near_wall() {
        let pos = positioner();

        let c = pos.center_bot_correction(15.0, 60.0, 0.0, Direction::Clockwise);
        assert_eq!(c, Correction::changed(0.75, 19.0, 56.0));

        let c = pos.center_bot_correction(60.0, 15.0, 0.0, Direction::Clockwise);
        assert_eq!(c, Correction::changed(-0.75, 56.0, 19.0));

        let c = pos.center_bot_correction(40.0, 45.0, 1.0, Direction::Clockwise);
        assert_eq!(c, Correction::unchanged(1.0, 40.0, 45.0));
    }

    #[test]
    fn test_side_narrower_than_learned() {
        let pos = positioner();

        let c = pos.side_bot_centering(
            (48.0, 48.0),
            (60.0, 25.0),
            0.0,
            false,
            Direction::Clockwise,
        );
        assert_eq!(c, Correction::changed(0.0, 42.5, 42.5));
    }

    #[test]
    fn test_side_wider_than_learned() {
        let pos = positioner();

        let c = pos.side_bot_centering(
            (40.0, 40.0),
            (70.0, 30.0),
            0.0,
            false,
            Direction::Clockwise,
        );
        assert_eq!(c, Correction::changed(0.0, 60.0, 30.0));

        let c = pos.side_bot_centering(
            (40.0, 40.0),
            (40.0, 44.0),
            0.0,
            false,
            Direction::Clockwise,
        );
        assert_eq!(c, Correction::changed(0.0, 40.0, 40.0));
    }

    #[test]
    fn test_side_lenient_and_equal() {
        let pos = positioner();

        let c = pos.side_bot_centering(
            (48.0, 48.0),
            (60.0, 25.0),
            0.0,
            true,
            Direction::Clockwise,
        );
        assert!(!c.changed);
        assert_eq!((c.left, c.right), (48.0, 48.0));

        // Equal totals defer to the actual-distance correction
        let c = pos.side_bot_centering(
            (48.0, 48.0),
            (80.0, 17.0),
            0.0,
            false,
            Direction::Clockwise,
        );
        assert_eq!(c, Correction::changed(-0.75, 76.0, 21.0));
    }

    #[test]
    fn test_side_defers_to_distances() {
        let pos = positioner();

        for (actual, yaw) in [((80.0, 17.0), 0.0), ((17.0, 80.0), 2.0), ((45.0, 52.0), -1.0)] {
            let c = pos.side_bot_centering((48.0, 48.0), actual, yaw, false, Direction::Clockwise);
            assert_eq!(
                c,
                pos.center_bot_correction(actual.0, actual.1, yaw, Direction::Clockwise)
            );
        }
    }

    #[test]
    fn test_side_sentinel_and_abort() {
        let pos = positioner();

        let c = pos.side_bot_centering(
            (48.0, 48.0),
            (40.0, 200.0),
            0.0,
            false,
            Direction::Clockwise,
        );
        assert_eq!(c, Correction::changed(-0.5, 35.0, NO_TARGET));

        // Reading 12 off the left wall, 5 less would put the target under 10
        let c = pos.side_bot_centering(
            (48.0, 48.0),
            (12.0, 200.0),
            2.0,
            false,
            Direction::Clockwise,
        );
        assert_eq!(c, Correction::unchanged(2.0, 48.0, 48.0));
    }
}
