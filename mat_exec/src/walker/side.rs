//! Side following

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

use util::maths::ang_diff_deg;

use crate::{
    mat_intel::{is_set, Direction, GenericLocation, Location, Targets, Wall},
    move_ctrl::SteerOpts,
    sens_agg::SensorSnapshot,
    walk_ctrl::{EquiWalker, GyroWithMinDistance, SteeringHelper},
};

use super::{MinSignal, Walker, WalkerError, WalkerMode, WalkerParams};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// How one attempt at a side ended.
#[derive(Debug, Clone, Copy, PartialEq)]
enum SideOutcome {
    Done,
    WalkBack,
    NearWall,
    Drift,
    Timeout,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Walker {
    /// Follow the current side until its front target is reached.
    ///
    /// An attempt ending next to a wall or off heading is followed by a walk-back and a fresh
    /// attempt, up to `side_retries` attempts. The side is left either way.
    pub fn walk_side(&mut self) -> Result<(), WalkerError> {
        self.set_mode(WalkerMode::SideFollow);
        self.move_ctrl.reset_distance();

        if self.params.reset_gyro_at_side_start {
            self.reset_gyro()?;
        }

        let norm = self.params.side_normalise_steering_deg;
        let steering = self.move_ctrl.last_steering();
        if steering.abs() > norm {
            self.steer(norm * steering.signum(), SteerOpts::asynchronous())?;
        }

        let snap = self.sens.read_state(GenericLocation::Side);
        if needs_walk_back(&snap, self.state.direction, &self.params) {
            self.walk_back()?;
        }

        let signal = Arc::new(MinSignal::default());
        self.intel.register_callback(signal.callback());

        let mut outcome = SideOutcome::Timeout;
        for attempt in 0..self.params.side_retries {
            outcome = self.follow_side(&signal, attempt)?;

            match outcome {
                SideOutcome::Done => break,
                SideOutcome::WalkBack | SideOutcome::NearWall | SideOutcome::Drift => {
                    info!("Side attempt {} ended with {:?}", attempt + 1, outcome);
                    self.walk_back()?;
                    self.set_mode(WalkerMode::SideFollow);
                }
                SideOutcome::Timeout => {
                    warn!("Side attempt {} timed out", attempt + 1);
                    break;
                }
            }
        }

        self.intel.unregister_callback();

        if outcome != SideOutcome::Done {
            warn!(
                "Leaving {:?} after {:?}, {:.0} cm travelled",
                self.state.location,
                outcome,
                self.move_ctrl.get_distance()
            );
        }

        Ok(())
    }

    /// Initial targets for a side attempt.
    fn plan_side(
        &self,
        learned: &Targets,
        snap: &SensorSnapshot,
        def_yaw: f64,
    ) -> (f64, f64, f64) {
        let direction = self.state.direction;

        if is_set(learned.left) && is_set(learned.right) {
            let corr = self.positioner.side_bot_centering(
                (learned.left, learned.right),
                (snap.left_cm, snap.right_cm),
                def_yaw,
                self.state.lap > 1,
                direction,
            );
            return (corr.left, corr.right, corr.yaw);
        }

        let corr = self.positioner.center_bot_correction(
            snap.left_cm,
            snap.right_cm,
            def_yaw,
            direction,
        );

        if corr.changed {
            return (corr.left, corr.right, corr.yaw);
        }

        let mid = snap.total_width() / 2.0;
        (mid, mid, def_yaw)
    }

    fn side_helper(&self, left: f64, right: f64, def_yaw: f64) -> Box<dyn SteeringHelper> {
        let max = self.sens.max_range_cm();

        if self.state.lap > 1 {
            let band = |target: f64| {
                if is_set(target) {
                    let margin = self.params.gyro_walk_band_margin_cm;
                    (target - margin).max(self.ctrl_params.min_wall_cm)
                } else {
                    self.ctrl_params.min_wall_cm
                }
            };
            Box::new(GyroWithMinDistance::new(
                band(left),
                band(right),
                def_yaw,
                max,
                &self.ctrl_params,
            ))
        } else {
            Box::new(EquiWalker::new(left, right, def_yaw, max, &self.ctrl_params))
        }
    }

    fn follow_side(
        &mut self,
        signal: &MinSignal,
        attempt: usize,
    ) -> Result<SideOutcome, WalkerError> {
        let learned = self.intel.get_learned_distances(None);
        let base_yaw = self.target_yaw();

        let snap = self.sens.read_state(GenericLocation::Side);
        let (mut target_left, mut target_right, def_yaw) =
            self.plan_side(&learned, &snap, base_yaw);
        let mut helper = self.side_helper(target_left, target_right, def_yaw);

        debug!(
            "Side {:?} attempt {}: targets {:.1}/{:.1}, front {:.1}, yaw {:.1}",
            self.state.location,
            attempt + 1,
            target_left,
            target_right,
            learned.front,
            def_yaw
        );

        let min_front = learned.front;
        let closing = self.state.location == Location::Side1 && self.intel.is_closing_lap();
        if closing {
            info!("Closing on the starting square at front {:.1}", min_front);
        }
        let max = self.sens.max_range_cm();
        let start = Instant::now();
        let timeout = Duration::from_secs_f64(self.params.side_timeout_s);
        let near_wall_time = Duration::from_secs_f64(self.params.side_near_wall_time_s);

        let mut speed = 0.0;
        let mut near_since: Option<Instant> = None;
        let mut prev_total: Option<f64> = None;

        // Stale notifications belong to an earlier attempt
        signal.take();

        loop {
            self.check_stop()?;

            let snap = self.sens.read_state(GenericLocation::Side);
            self.learn(&snap);

            let distance = self.move_ctrl.get_distance();

            if needs_walk_back(&snap, self.state.direction, &self.params) {
                self.move_ctrl.stop_walking()?;
                return Ok(SideOutcome::WalkBack);
            }

            if side_done(snap.front_cm, min_front, distance, closing, &self.params) {
                debug!(
                    "Side done at front {:.1} after {:.1} cm",
                    snap.front_cm, distance
                );
                return Ok(SideOutcome::Done);
            }

            // Stop conditions
            let near = snap.left_cm <= self.params.side_near_wall_cm
                || snap.right_cm <= self.params.side_near_wall_cm;
            near_since = match (near, near_since) {
                (true, None) => Some(Instant::now()),
                (true, s) => s,
                (false, _) => None,
            };
            if near_since.map_or(false, |t| t.elapsed() > near_wall_time) {
                self.move_ctrl.stop_walking()?;
                return Ok(SideOutcome::NearWall);
            }

            if distance >= self.params.side_drift_after_cm
                && ang_diff_deg(snap.yaw_deg, helper.def_yaw()).abs() > self.params.side_drift_deg
            {
                self.move_ctrl.stop_walking()?;
                return Ok(SideOutcome::Drift);
            }

            if start.elapsed() > timeout {
                self.move_ctrl.stop_walking()?;
                return Ok(SideOutcome::Timeout);
            }

            // Re-plan on a narrower corridor
            let both_valid = snap.left_cm < max && snap.right_cm < max;
            let mut replan = false;

            if let Some(half) = signal.take() {
                if is_set(target_left)
                    && is_set(target_right)
                    && 2.0 * half < target_left + target_right - self.params.side_replan_delta_cm
                {
                    replan = true;
                }
            }
            if let (Some(prev), true) = (prev_total, both_valid) {
                if prev - snap.total_width() > self.params.side_total_drop_cm {
                    replan = true;
                }
            }
            prev_total = if both_valid { Some(snap.total_width()) } else { None };

            if replan && both_valid && is_set(target_left) && is_set(target_right) {
                let corr = self.positioner.side_bot_centering(
                    (target_left, target_right),
                    (snap.left_cm, snap.right_cm),
                    base_yaw,
                    false,
                    self.state.direction,
                );

                if corr.changed {
                    debug!("Re-planned side targets {:.1}/{:.1}", corr.left, corr.right);
                    target_left = corr.left;
                    target_right = corr.right;
                    helper = self.side_helper(target_left, target_right, corr.yaw);
                }
            }

            // Steering
            let mut turned = false;
            if let Some(angle) = helper.process(&snap) {
                let opts = SteerOpts::asynchronous()
                    .max_delta(self.params.side_steer_max_delta_deg)
                    .speedcheck(speed);
                if let Some(cmd) = self.steer(angle, opts)? {
                    turned = cmd.abs() > self.params.side_slow_turn_deg;
                }
            }

            let want = if snap.front_cm < min_front + self.params.side_slow_margin_cm || turned {
                self.params.min_speed
            } else {
                self.params.default_speed
            };
            self.walk_at(want, &mut speed)?;

            self.tick()?;
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// True once a side walk has reached its front target.
///
/// A side normally needs `side_min_travel_cm` of travel first, so the far wall of a corner seen
/// at the start of the side does not end it, unless the front is already at the hard stop. On the
/// closing pass the target is the starting square and is met as soon as the front reaches it.
pub fn side_done(
    front_cm: f64,
    target_front_cm: f64,
    distance_cm: f64,
    closing: bool,
    params: &WalkerParams,
) -> bool {
    if front_cm > target_front_cm {
        return false;
    }

    closing
        || distance_cm >= params.side_min_travel_cm
        || front_cm <= params.side_hard_stop_front_cm
}

/// True if the robot is too close to a wall to keep driving forward.
///
/// The inside wall may be approached much closer than the outside one. With an unknown direction
/// both side walls use the inside limit.
pub fn needs_walk_back(snap: &SensorSnapshot, direction: Direction, params: &WalkerParams) -> bool {
    if snap.front_cm < params.walk_back_front_cm {
        return true;
    }

    let (inside, outside) = match direction.inside_wall() {
        Some(Wall::Right) => (snap.right_cm, Some(snap.left_cm)),
        Some(Wall::Left) => (snap.left_cm, Some(snap.right_cm)),
        None => (snap.left_cm.min(snap.right_cm), None),
    };

    inside < params.walk_back_inside_cm
        || outside.map_or(false, |d| d < params.walk_back_outside_cm)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_needs_walk_back() {
        let p = WalkerParams::default();
        let snap = |f, l, r| SensorSnapshot::from_distances(f, l, r, 0.0);

        assert!(needs_walk_back(&snap(18.0, 50.0, 50.0), Direction::Clockwise, &p));
        assert!(!needs_walk_back(&snap(20.0, 50.0, 50.0), Direction::Clockwise, &p));

        // Clockwise: right is inside, left outside
        assert!(!needs_walk_back(&snap(100.0, 50.0, 5.0), Direction::Clockwise, &p));
        assert!(needs_walk_back(&snap(100.0, 15.0, 80.0), Direction::Clockwise, &p));
        assert!(needs_walk_back(&snap(100.0, 80.0, 0.5), Direction::Clockwise, &p));

        assert!(needs_walk_back(&snap(100.0, 50.0, 15.0), Direction::CounterClockwise, &p));
        assert!(!needs_walk_back(&snap(100.0, 15.0, 50.0), Direction::Unknown, &p));
    }

    #[test]
    fn test_side_done_on_closing_pass() {
        let p = WalkerParams::default();

        // Just past the corner the far wall of the next side can already be at the target
        assert!(!side_done(48.0, 50.0, 10.0, false, &p));
        assert!(side_done(48.0, 50.0, p.side_min_travel_cm, false, &p));
        assert!(side_done(25.0, 50.0, 10.0, false, &p));

        // Returning to the starting square stops on the front target alone
        assert!(side_done(149.0, 150.0, 10.0, true, &p));
        assert!(!side_done(151.0, 150.0, 10.0, true, &p));
        assert!(side_done(113.0, 150.0, 60.0, true, &p));
    }
}
