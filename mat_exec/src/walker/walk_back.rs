//! Reverse away from a wall

use log::{debug, info};
use std::time::{Duration, Instant};

use crate::move_ctrl::SteerOpts;

use super::{needs_walk_back, Walker, WalkerError, WalkerMode};

impl Walker {
    /// Reverse with straight steering until clear of the walls or `walk_back_max_cm` back.
    pub fn walk_back(&mut self) -> Result<(), WalkerError> {
        self.set_mode(WalkerMode::WalkBack);

        self.move_ctrl.stop_walking()?;
        self.steer(0.0, SteerOpts::default())?;

        let start_distance = self.move_ctrl.get_distance();
        let speed = self.params.min_speed + self.params.walk_back_speed_offset;
        self.move_ctrl.start_backward(speed)?;

        let start = Instant::now();
        let timeout = Duration::from_secs_f64(self.params.walk_back_timeout_s);
        let location = self.state.location.generic();

        info!("Walking back at {:.0}", speed);

        loop {
            self.check_stop()?;

            let snap = self.sens.read_state(location);
            let back = start_distance - self.move_ctrl.get_distance();

            if !needs_walk_back(&snap, self.state.direction, &self.params) {
                debug!("Walk-back clear at front {:.1} after {:.1} cm", snap.front_cm, back);
                break;
            }

            if back >= self.params.walk_back_max_cm || start.elapsed() > timeout {
                debug!("Walk-back limit reached after {:.1} cm", back);
                break;
            }

            self.tick()?;
        }

        self.move_ctrl.stop_walking()?;

        Ok(())
    }
}
