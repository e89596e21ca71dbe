//! Corner approach and turn

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{
    mat_intel::{GenericLocation, Location, Targets, Wall},
    move_ctrl::SteerOpts,
    walk_ctrl::{EquiWalker, FixedTurnWalker, SteeringHelper},
};

use super::{MinSignal, Walker, WalkerError, WalkerMode};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// A corner turns the robot a quarter turn.
///
/// Units: degrees
const QUARTER_TURN_DEG: f64 = 90.0;

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Walker {
    /// Drive on into the corner until the side walls open up.
    ///
    /// The inside wall is ignored so the robot keeps its line along the outside wall. Ends when
    /// the side walls total more than `corner_open_total_cm`, the front target is reached or
    /// `walk_to_corner_max_cm` has been covered.
    pub fn walk_to_corner(&mut self) -> Result<(), WalkerError> {
        self.set_mode(WalkerMode::CornerApproach);

        let targets = self.intel.get_learned_distances(None);
        let (left, right) = match self.state.direction.inside_wall() {
            Some(Wall::Right) => (targets.left, self.params.ignored_wall_cm),
            Some(Wall::Left) => (self.params.ignored_wall_cm, targets.right),
            None => (targets.left, targets.right),
        };

        let mut walker = EquiWalker::new(
            left,
            right,
            self.target_yaw(),
            self.sens.max_range_cm(),
            &self.ctrl_params,
        );

        let start_distance = self.move_ctrl.get_distance();
        let mut speed = self.move_ctrl.speed();

        loop {
            self.check_stop()?;

            let snap = self.sens.read_state(GenericLocation::Corner);
            let travelled = self.move_ctrl.get_distance() - start_distance;

            if snap.total_width() >= self.params.corner_open_total_cm
                || snap.front_cm <= targets.front
                || travelled >= self.params.walk_to_corner_max_cm
            {
                debug!(
                    "Corner approach done: width {:.1}, front {:.1}, {:.1} cm",
                    snap.total_width(),
                    snap.front_cm,
                    travelled
                );
                return Ok(());
            }

            if let Some(angle) = walker.process(&snap) {
                let max_delta = self.params.side_steer_max_delta_deg;
                self.steer(angle, SteerOpts::asynchronous().max_delta(max_delta))?;
            }

            self.walk_at(self.params.walk_to_corner_speed, &mut speed)?;
            self.tick()?;
        }
    }

    /// Turn the corner onto the next side.
    pub fn walk_corner(&mut self) -> Result<(), WalkerError> {
        self.set_mode(WalkerMode::CornerTurn);

        let direction = self.state.direction;
        let location = self.intel.location();

        self.state.global_yaw_intent += QUARTER_TURN_DEG * direction.sign();

        // The first corner of a run turns from the frame the run started in
        if !(self.state.lap == 1 && location == Location::Corner1) {
            self.reset_gyro()?;
        }

        let targets = self.intel.get_learned_distances(None);
        let snap = self.sens.read_state(GenericLocation::Corner);

        let inside = direction.inside_wall().map(|w| snap.wall(w));
        let tight = snap.front_cm <= self.params.corner_front_proximity_cm
            || inside.map_or(false, |d| d <= self.params.corner_inside_proximity_cm);

        let mut target_yaw = self.target_yaw();
        let mut fixed = self.params.corner_turn_angle_deg;

        if tight {
            let extra = if direction.is_known() {
                self.params.corner_proximity_extra_deg * direction.sign()
            } else {
                self.params.corner_unknown_extra_deg
            };
            target_yaw += extra;
            fixed = self.move_ctrl.params().max_turn_angle_deg;

            info!(
                "Tight corner (front {:.1}, inside {:?}), turning at {:.1} to {:.1}",
                snap.front_cm, inside, fixed, target_yaw
            );
        }

        self.execute_turn(target_yaw, fixed, &targets, true)
    }

    fn execute_turn(
        &mut self,
        target_yaw: f64,
        fixed: f64,
        targets: &Targets,
        allow_retry: bool,
    ) -> Result<(), WalkerError> {
        let max = self.sens.max_range_cm();
        let min_wall = self.params.corner_min_wall_cm;
        let mut helper =
            FixedTurnWalker::new(fixed, target_yaw, min_wall, min_wall, max, &self.ctrl_params);

        let max_turn = fixed.max(self.move_ctrl.params().max_turn_angle_deg);
        let callback_at = self.params.corner_callback_fraction * QUARTER_TURN_DEG;

        // Steering first, then motion
        let snap = self.sens.read_state(GenericLocation::Corner);
        if let Some(angle) = helper.process(&snap) {
            self.steer(angle, SteerOpts::asynchronous().max_turn_angle(max_turn))?;
        }

        let start_distance = self.move_ctrl.get_distance();
        let mut speed = 0.0;
        self.walk_at(self.params.min_speed, &mut speed)?;

        let signal = Arc::new(MinSignal::default());
        let mut registered = false;
        let start = Instant::now();
        let timeout = Duration::from_secs_f64(self.params.corner_timeout_s);

        let result = loop {
            if let Err(e) = self.check_stop() {
                break Err(e);
            }

            let snap = self.sens.read_state(GenericLocation::Corner);
            let remaining = helper.remaining(snap.yaw_deg);
            let travelled = self.move_ctrl.get_distance() - start_distance;

            if !registered && remaining.abs() < callback_at {
                self.intel.register_callback(signal.callback());
                registered = true;
                self.walk_at(self.params.walk_to_corner_speed, &mut speed)?;
            }

            if registered {
                self.learn(&snap);
            }

            if snap.front_cm <= targets.front {
                if allow_retry && remaining.abs() > self.params.corner_early_exit_yaw_deg {
                    warn!(
                        "Front at {:.1} with {:.1} deg still to turn, backing off",
                        snap.front_cm, remaining
                    );
                    self.intel.unregister_callback();
                    self.walk_back()?;
                    self.set_mode(WalkerMode::CornerTurn);
                    return self.execute_turn(
                        target_yaw,
                        fixed + self.params.corner_retry_extra_deg,
                        targets,
                        false,
                    );
                }

                debug!("Turn ended on front {:.1}", snap.front_cm);
                break Ok(());
            }

            if signal.take().is_some() && remaining.abs() <= self.ctrl_params.halving_band_deg {
                debug!("Turn ended on a new minimum width, {:.1} deg left", remaining);
                break Ok(());
            }

            if remaining.abs() < self.params.corner_exit_yaw_deg {
                debug!("Turn complete after {:.1} cm", travelled);
                break Ok(());
            }

            if travelled >= self.params.corner_max_cm || start.elapsed() > timeout {
                warn!(
                    "Turn cut short after {:.1} cm, {:.1} deg left",
                    travelled, remaining
                );
                break Ok(());
            }

            if let Some(angle) = helper.process(&snap) {
                self.steer(angle, SteerOpts::asynchronous().max_turn_angle(max_turn))?;
            }

            if let Err(e) = self.tick() {
                break Err(e);
            }
        };

        self.intel.unregister_callback();
        result
    }
}
