//! Direction discovery and floor colour reading

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info, warn};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use eqpt_if::eqpt::{ColorSensor, MatColor};
use util::sync::StopEvent;

use crate::{
    mat_intel::{Direction, GenericLocation},
    move_ctrl::SteerOpts,
    walk_ctrl::{EquiWalker, GyroWithMinDistance, SteeringHelper},
};

use super::{Walker, WalkerError, WalkerMode};

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Walker {
    /// Find the travel direction on Side1.
    ///
    /// Centres the robot, walks until the front distance reaches `discovery_front_cm`, then
    /// reads the floor line colour. The direction is reported to the intelligence, which moves
    /// on to Corner1.
    pub fn discover_direction(&mut self) -> Result<Direction, WalkerError> {
        self.set_mode(WalkerMode::DirectionDiscovery);

        let snap = self.sens.read_state(GenericLocation::Side);
        let corr = self.positioner.center_bot_correction(
            snap.left_cm,
            snap.right_cm,
            self.target_yaw(),
            Direction::Unknown,
        );

        let (left, right, def_yaw) = if corr.changed {
            (corr.left, corr.right, corr.yaw)
        } else {
            let mid = snap.total_width() / 2.0;
            (mid, mid, self.target_yaw())
        };

        info!(
            "Discovering direction from front {:.1}, targets {:.1}/{:.1}",
            snap.front_cm, left, right
        );

        let max = self.sens.max_range_cm();
        let mut walker = EquiWalker::new(left, right, def_yaw, max, &self.ctrl_params);
        let mut speed = 0.0;
        self.move_ctrl.reset_distance();

        loop {
            self.check_stop()?;

            let snap = self.sens.read_state(GenericLocation::Side);
            self.learn(&snap);

            if snap.front_cm <= self.params.discovery_front_cm {
                break;
            }

            if let Some(angle) = walker.process(&snap) {
                let max_delta = self.params.side_steer_max_delta_deg;
                self.steer(angle, SteerOpts::asynchronous().max_delta(max_delta))?;
            }

            self.walk_at(self.params.default_speed, &mut speed)?;
            self.tick()?;
        }

        let color = self.color_read()?;
        let snap = self.sens.read_state(GenericLocation::Side);

        let direction = match color {
            Some(MatColor::Orange) => Direction::Clockwise,
            Some(MatColor::Blue) => Direction::CounterClockwise,

            // The side with less room is the inside of the mat
            _ => {
                warn!(
                    "No line colour read, choosing direction from L {:.1} / R {:.1}",
                    snap.left_cm, snap.right_cm
                );
                if snap.right_cm < snap.left_cm {
                    Direction::Clockwise
                } else {
                    Direction::CounterClockwise
                }
            }
        };

        info!(
            "Direction {:?} (colour {:?}) after {:.1} cm",
            direction,
            color,
            self.move_ctrl.get_distance()
        );

        self.state.direction = direction;
        self.sens.set_direction(direction);
        self.intel.report_direction_side1(direction)?;
        self.sync_from_intel();

        Ok(direction)
    }

    /// Creep forward reading the floor until a line colour is seen.
    ///
    /// A sampler thread reads the colour sensor every `color_sample_period_s` while the robot
    /// holds its heading at minimum speed. The walk ends on the first line colour, at
    /// `color_read_min_front_cm` or after `color_read_max_cm`. A second sample after stopping
    /// settles the result.
    pub fn color_read(&mut self) -> Result<Option<MatColor>, WalkerError> {
        self.set_mode(WalkerMode::ColorRead);
        self.move_ctrl.stop_walking()?;

        let mut gyro = GyroWithMinDistance::new(
            self.ctrl_params.min_wall_cm,
            self.ctrl_params.min_wall_cm,
            self.target_yaw(),
            self.sens.max_range_cm(),
            &self.ctrl_params,
        );

        let found: Arc<Mutex<Option<MatColor>>> = Arc::new(Mutex::new(None));
        let sampler_stop = StopEvent::new();

        let sampler = {
            let color = self.color.clone();
            let found = found.clone();
            let stop = sampler_stop.clone();
            let period = Duration::from_secs_f64(self.params.color_sample_period_s);

            thread::Builder::new()
                .name("color_sampler".into())
                .spawn(move || color_sampler(color, found, stop, period))
        };

        let sampler = match sampler {
            Ok(jh) => Some(jh),
            Err(e) => {
                warn!("Colour sampler not started ({}), reading inline", e);
                None
            }
        };

        let start_distance = self.move_ctrl.get_distance();
        let mut speed = 0.0;

        let walk = loop {
            if let Err(e) = self.check_stop() {
                break Err(e);
            }

            if sampler.is_none() {
                if let Some(c) = read_color(self.color.as_ref()).filter(|c| c.is_line()) {
                    *found.lock().unwrap_or_else(|p| p.into_inner()) = Some(c);
                }
            }

            let snap = self.sens.read_state(GenericLocation::Side);
            self.learn(&snap);

            let travelled = self.move_ctrl.get_distance() - start_distance;
            let seen = found.lock().unwrap_or_else(|p| p.into_inner()).is_some();

            if seen
                || snap.front_cm <= self.params.color_read_min_front_cm
                || travelled >= self.params.color_read_max_cm
            {
                debug!(
                    "Colour read walk ended: seen {}, front {:.1}, {:.1} cm",
                    seen, snap.front_cm, travelled
                );
                break Ok(());
            }

            if let Some(angle) = gyro.process(&snap) {
                if let Err(e) = self.steer(angle, SteerOpts::asynchronous()) {
                    break Err(e);
                }
            }

            if let Err(e) = self.walk_at(self.params.min_speed, &mut speed) {
                break Err(e);
            }

            if let Err(e) = self.tick() {
                break Err(e);
            }
        };

        sampler_stop.set();
        if let Some(jh) = sampler {
            if jh.join().is_err() {
                warn!("Colour sampler panicked");
            }
        }

        self.move_ctrl.stop_walking()?;
        walk?;

        let first = *found.lock().unwrap_or_else(|p| p.into_inner());
        let second = read_color(self.color.as_ref());

        debug!("Colour samples: walking {:?}, stopped {:?}", first, second);

        Ok(match second {
            Some(c) if c.is_line() => Some(c),
            _ => first,
        })
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn read_color(sensor: &dyn ColorSensor) -> Option<MatColor> {
    match sensor.bottom_color_rgbi() {
        Ok(rgbi) => Some(MatColor::classify(rgbi)),
        Err(e) => {
            warn!("Colour read failed: {}", e);
            None
        }
    }
}

/// Record the first line colour seen, then exit.
fn color_sampler(
    sensor: Arc<dyn ColorSensor>,
    found: Arc<Mutex<Option<MatColor>>>,
    stop: StopEvent,
    period: Duration,
) {
    loop {
        if let Some(c) = read_color(sensor.as_ref()).filter(|c| c.is_line()) {
            *found.lock().unwrap_or_else(|p| p.into_inner()) = Some(c);
            debug!("Sampler saw {:?}", c);
            return;
        }

        if stop.wait_timeout(period) {
            return;
        }
    }
}
