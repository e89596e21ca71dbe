//! # Walker
//!
//! The navigation state machine. Drives the side → corner → side sequence round the mat,
//! discovering the travel direction on the first side, learning the corridor widths through
//! [`MatIntel`] and closing the run on the square it started from.
//!
//! All actuation goes through [`MoveCtrl`]. The walker holds the heading
//! `global_yaw_intent - cumulative_yaw_after_resets` in the current gyro frame: the first term
//! sums the intended quarter turns, the second sums the yaw read just before each gyro zero.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod corner;
mod discovery;
mod params;
mod side;
mod walk_back;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use eqpt_if::eqpt::ColorSensor;
use util::{
    maths::wrap_deg,
    sync::{AtomicF64, StopEvent},
};

use crate::{
    mat_intel::{Direction, Location, MatIntel, MatIntelError, MinCallback},
    move_ctrl::{MoveCtrl, MoveCtrlError, SteerOpts},
    orient::{OrientError, Orientation, ResetMode},
    positioner::Positioner,
    sens_agg::{SensorAggregator, SensorSnapshot},
    walk_ctrl::WalkCtrlParams,
};

pub use params::WalkerParams;
pub use side::needs_walk_back;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The walker state machine.
pub struct Walker {
    params: WalkerParams,
    ctrl_params: WalkCtrlParams,
    positioner: Positioner,

    color: Arc<dyn ColorSensor>,
    orient: Arc<Orientation>,
    sens: Arc<SensorAggregator>,
    intel: Arc<MatIntel>,
    move_ctrl: Arc<MoveCtrl>,

    state: WalkerState,

    /// Copy of `state` published for other threads
    status: Arc<Mutex<WalkerState>>,

    stop: StopEvent,
}

/// Navigation state of the walker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WalkerState {
    pub location: Location,
    pub direction: Direction,
    pub lap: u32,

    /// Sum of the intended quarter turns, never reset.
    ///
    /// Units: degrees
    pub global_yaw_intent: f64,

    /// Sum of the yaw read immediately before each gyro zero.
    ///
    /// Units: degrees
    pub cumulative_yaw_after_resets: f64,

    /// Last steering command issued.
    ///
    /// Units: degrees
    pub last_steering: f64,

    pub mode: WalkerMode,
}

/// Result of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WalkSummary {
    pub laps_completed: u32,
    pub direction: Direction,
    pub final_location: Location,
}

/// Latest new-minimum notification from [`MatIntel`].
#[derive(Debug, Default)]
pub(crate) struct MinSignal {
    fired: AtomicBool,
    half_cm: AtomicF64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WalkerMode {
    Idle,
    DirectionDiscovery,
    ColorRead,
    SideFollow,
    WalkBack,
    CornerApproach,
    CornerTurn,
    LapComplete,
    Done,
}

#[derive(Debug, thiserror::Error)]
pub enum WalkerError {
    #[error("The walker was stopped")]
    Stopped,

    #[error("Movement controller error: {0}")]
    MoveCtrlError(#[from] MoveCtrlError),

    #[error("Mat intelligence error: {0}")]
    MatIntelError(#[from] MatIntelError),

    #[error("Orientation error: {0}")]
    OrientError(#[from] OrientError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MinSignal {
    /// A callback for [`MatIntel::register_callback`] which records into this signal.
    pub fn callback(self: &Arc<Self>) -> MinCallback {
        let signal = self.clone();
        Arc::new(move |left, _right| {
            signal.half_cm.store(left);
            signal.fired.store(true, Ordering::Release);
        })
    }

    /// The reported half width if a notification arrived since the last call.
    pub fn take(&self) -> Option<f64> {
        if self.fired.swap(false, Ordering::AcqRel) {
            Some(self.half_cm.load())
        } else {
            None
        }
    }
}

impl Walker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        params: WalkerParams,
        ctrl_params: WalkCtrlParams,
        positioner: Positioner,
        color: Arc<dyn ColorSensor>,
        orient: Arc<Orientation>,
        sens: Arc<SensorAggregator>,
        intel: Arc<MatIntel>,
        move_ctrl: Arc<MoveCtrl>,
        stop: StopEvent,
    ) -> Self {
        let state = WalkerState {
            location: intel.location(),
            direction: intel.direction(),
            lap: intel.lap(),
            global_yaw_intent: 0.0,
            cumulative_yaw_after_resets: 0.0,
            last_steering: move_ctrl.last_steering(),
            mode: WalkerMode::Idle,
        };

        Self {
            params,
            ctrl_params,
            positioner,
            color,
            orient,
            sens,
            intel,
            move_ctrl,
            state,
            status: Arc::new(Mutex::new(state)),
            stop,
        }
    }

    /// Walk every lap and close on the starting square.
    pub fn run(&mut self) -> Result<WalkSummary, WalkerError> {
        info!(
            "Walker starting at {:?}, {} lap(s)",
            self.intel.location(),
            self.intel.total_laps()
        );

        self.sync_from_intel();

        if self.state.location == Location::Side1
            && self.state.lap == 1
            && !self.state.direction.is_known()
        {
            self.discover_direction()?;
            self.sync_from_intel();
        }

        loop {
            self.check_stop()?;

            let location = self.intel.location();

            if location == Location::Side1 && self.intel.is_closing_lap() {
                info!("Every lap done, closing on the starting square");
                self.walk_side()?;
                self.move_ctrl.stop_walking()?;
                self.set_mode(WalkerMode::Done);
                break;
            }

            if location.is_side() {
                self.walk_side()?;
            } else {
                self.walk_to_corner()?;
                self.walk_corner()?;
            }

            let lap_before = self.state.lap;
            self.intel.location_complete()?;
            self.sync_from_intel();

            if self.state.lap != lap_before {
                self.set_mode(WalkerMode::LapComplete);
                info!("Lap {} complete", lap_before);
            }
        }

        let summary = WalkSummary {
            laps_completed: self.state.lap.saturating_sub(1),
            direction: self.state.direction,
            final_location: self.state.location,
        };

        info!("Walk complete: {:?}", summary);

        Ok(summary)
    }

    pub fn state(&self) -> WalkerState {
        self.state
    }

    /// Shared copy of the state, updated on every mode change.
    pub fn status(&self) -> Arc<Mutex<WalkerState>> {
        self.status.clone()
    }

    pub fn stop_event(&self) -> StopEvent {
        self.stop.clone()
    }

    /// Continue from a known location and direction instead of discovering the direction.
    ///
    /// The current heading becomes the heading of the location.
    pub fn resume_at(&mut self, location: Location, direction: Direction) {
        info!("Resuming at {:?}, {:?}", location, direction);

        self.intel.resume_at(location, direction);
        self.sens.set_direction(direction);
        self.state.global_yaw_intent = self.orient.get_yaw();
        self.state.cumulative_yaw_after_resets = 0.0;
        self.sync_from_intel();
    }

    /// Heading to hold in the current gyro frame.
    ///
    /// Units: degrees
    pub fn target_yaw(&self) -> f64 {
        wrap_deg(self.state.global_yaw_intent - self.state.cumulative_yaw_after_resets)
    }

    /// Zero the gyro, remembering the yaw it had.
    ///
    /// Uses the deferred zero so the reference is a fused value, falling back to an immediate
    /// zero if no update captures it in time.
    pub fn reset_gyro(&mut self) -> Result<(), WalkerError> {
        let yaw = self.orient.get_yaw();
        self.state.cumulative_yaw_after_resets += yaw;

        self.orient.reset_yaw(ResetMode::Deferred)?;

        if !self.orient.wait_for_zero(self.orient.zero_wait_timeout()) {
            warn!("Deferred yaw zero not captured in time, zeroing immediately");
            self.orient.reset_yaw(ResetMode::Immediate)?;
        }

        debug!(
            "Gyro zeroed at {:.1}, cumulative {:.1}, target now {:.1}",
            yaw,
            self.state.cumulative_yaw_after_resets,
            self.target_yaw()
        );

        self.publish();
        Ok(())
    }

    // ---- INTERNALS ----

    fn set_mode(&mut self, mode: WalkerMode) {
        if self.state.mode != mode {
            debug!("Walker mode {:?} -> {:?}", self.state.mode, mode);
        }
        self.state.mode = mode;
        self.publish();
    }

    fn publish(&self) {
        *self.status.lock().unwrap_or_else(|p| p.into_inner()) = self.state;
    }

    fn sync_from_intel(&mut self) {
        self.state.location = self.intel.location();
        self.state.direction = self.intel.direction();
        self.state.lap = self.intel.lap();
        self.publish();
    }

    fn check_stop(&self) -> Result<(), WalkerError> {
        if self.stop.is_set() {
            Err(WalkerError::Stopped)
        } else {
            Ok(())
        }
    }

    /// Sleep one loop period, returning early if stopped.
    fn tick(&self) -> Result<(), WalkerError> {
        if self
            .stop
            .wait_timeout(Duration::from_secs_f64(self.params.loop_period_s))
        {
            Err(WalkerError::Stopped)
        } else {
            Ok(())
        }
    }

    /// Command the steering and remember the command.
    fn steer(&mut self, angle_deg: f64, opts: SteerOpts) -> Result<Option<f64>, WalkerError> {
        let cmd = self.move_ctrl.turn_steering(angle_deg, opts)?;
        if let Some(a) = cmd {
            self.state.last_steering = a;
        }
        Ok(cmd)
    }

    /// Feed a snapshot to the intelligence. A stopped worker only loses the reading.
    fn learn(&self, snap: &SensorSnapshot) {
        if let Err(e) = self
            .intel
            .add_reading(snap.front_cm, snap.left_cm, snap.right_cm)
        {
            warn!("Reading not queued: {}", e);
        }
    }

    /// Start or change the forward drive if the speed differs from `current`.
    fn walk_at(&self, speed: f64, current: &mut f64) -> Result<(), WalkerError> {
        if (speed - *current).abs() > f64::EPSILON || !self.move_ctrl.is_walking() {
            self.move_ctrl.start_walking(speed)?;
            *current = speed;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_min_signal() {
        let signal = Arc::new(MinSignal::default());
        assert_eq!(signal.take(), None);

        let cb = signal.callback();
        cb(47.5, 47.5);
        cb(46.0, 46.0);

        assert_eq!(signal.take(), Some(46.0));
        assert_eq!(signal.take(), None);
    }
}
