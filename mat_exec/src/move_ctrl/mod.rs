//! # Movement Controller
//!
//! The only component that writes to the drive base. Maintains the forward/backward drive,
//! integrates the wheel distance from the commanded speed and serialises steering commands
//! through a dedicated worker.
//!
//! Steering commands are clamped twice: first to `max_delta` around the previous command, then
//! absolutely to the turn limit. A command equal to the previous one is suppressed. Drive
//! transitions wait for the steering worker to go idle so steering and drive never contend.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod params;
mod steering;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, error, trace};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use eqpt_if::eqpt::{DriveBase, EqptError};
use util::maths::clamp;

pub use params::MoveParams;
use steering::{apply_steering, steering_worker, SteerMailbox};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Default per-call steering change limit.
///
/// Units: degrees
pub const DEFAULT_MAX_DELTA_DEG: f64 = 90.0;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct MoveCtrl {
    params: MoveParams,
    drive: Arc<dyn DriveBase>,

    motion: Mutex<Motion>,

    /// The last steering command accepted, after clamping
    last_cmd: Mutex<f64>,

    mailbox: Arc<SteerMailbox>,
    steer_jh: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Debug, Clone, Copy)]
struct Motion {
    mode: DriveMode,
    speed: f64,

    /// Time of the last speed change
    since: Instant,

    /// Signed distance accumulated up to `since`.
    ///
    /// Units: centimetres
    distance_cm: f64,
}

/// Options for [`MoveCtrl::turn_steering`].
#[derive(Debug, Clone, Copy)]
pub struct SteerOpts {
    /// Speed to resume at after a speedcheck coerced the drive down
    pub current_speed: Option<f64>,

    /// Largest change from the previous command allowed in this call.
    ///
    /// Units: degrees
    pub max_delta: f64,

    /// Drop to the minimum speed when the change is large
    pub speedcheck: bool,

    /// Absolute steering limit for this call, `None` for the default. Always capped at the
    /// hardware limit.
    ///
    /// Units: degrees
    pub max_turn_angle: Option<f64>,

    /// Post to the steering worker instead of applying before returning
    pub asynchronous: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveMode {
    Stopped,
    Forward,
    Backward,
}

#[derive(Debug, thiserror::Error)]
pub enum MoveCtrlError {
    #[error("Drive base error: {0}")]
    DriveError(#[from] EqptError),

    #[error("Could not start the steering worker: {0}")]
    ThreadSpawnError(std::io::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for SteerOpts {
    fn default() -> Self {
        Self {
            current_speed: None,
            max_delta: DEFAULT_MAX_DELTA_DEG,
            speedcheck: false,
            max_turn_angle: None,
            asynchronous: false,
        }
    }
}

impl SteerOpts {
    pub fn asynchronous() -> Self {
        Self {
            asynchronous: true,
            ..Self::default()
        }
    }

    pub fn max_delta(mut self, max_delta: f64) -> Self {
        self.max_delta = max_delta;
        self
    }

    pub fn max_turn_angle(mut self, max_turn_angle: f64) -> Self {
        self.max_turn_angle = Some(max_turn_angle);
        self
    }

    pub fn speedcheck(mut self, current_speed: f64) -> Self {
        self.speedcheck = true;
        self.current_speed = Some(current_speed);
        self
    }
}

impl Motion {
    fn signed_speed(&self) -> f64 {
        match self.mode {
            DriveMode::Stopped => 0.0,
            DriveMode::Forward => self.speed,
            DriveMode::Backward => -self.speed,
        }
    }

    /// Distance including the run since the last speed change.
    fn distance_at(&self, now: Instant, cm_per_s_per_speed: f64) -> f64 {
        let elapsed = now.saturating_duration_since(self.since).as_secs_f64();
        self.distance_cm + self.signed_speed() * cm_per_s_per_speed * elapsed
    }
}

impl MoveCtrl {
    /// Create the controller and start the steering worker. The drive is commanded to stop.
    pub fn new(drive: Arc<dyn DriveBase>, params: MoveParams) -> Result<Self, MoveCtrlError> {
        drive.drive_stop()?;

        let mailbox = Arc::new(SteerMailbox::default());

        let jh = {
            let mailbox = mailbox.clone();
            let drive = drive.clone();
            let tolerance = params.steer_tolerance_deg;
            let retries = params.steer_retries;

            thread::Builder::new()
                .name("steering".into())
                .spawn(move || steering_worker(mailbox, drive, tolerance, retries))
                .map_err(MoveCtrlError::ThreadSpawnError)?
        };

        let initial_steering = drive.steering_angle();

        Ok(Self {
            params,
            drive,
            motion: Mutex::new(Motion {
                mode: DriveMode::Stopped,
                speed: 0.0,
                since: Instant::now(),
                distance_cm: 0.0,
            }),
            last_cmd: Mutex::new(initial_steering),
            mailbox,
            steer_jh: Mutex::new(Some(jh)),
        })
    }

    pub fn params(&self) -> &MoveParams {
        &self.params
    }

    /// Drive forward at `speed`. Waits for pending steering first.
    pub fn start_walking(&self, speed: f64) -> Result<(), MoveCtrlError> {
        self.set_motion(DriveMode::Forward, speed)
    }

    /// Drive backward at `speed`. Waits for pending steering first.
    pub fn start_backward(&self, speed: f64) -> Result<(), MoveCtrlError> {
        self.set_motion(DriveMode::Backward, speed)
    }

    /// Stop the drive and fold the current run into the distance.
    pub fn stop_walking(&self) -> Result<(), MoveCtrlError> {
        self.set_motion(DriveMode::Stopped, 0.0)
    }

    pub fn is_walking(&self) -> bool {
        self.lock_motion().mode != DriveMode::Stopped
    }

    pub fn drive_mode(&self) -> DriveMode {
        self.lock_motion().mode
    }

    /// Current commanded speed, 0 when stopped.
    pub fn speed(&self) -> f64 {
        let motion = self.lock_motion();
        match motion.mode {
            DriveMode::Stopped => 0.0,
            _ => motion.speed,
        }
    }

    pub fn reset_distance(&self) {
        let mut motion = self.lock_motion();
        motion.distance_cm = 0.0;
        motion.since = Instant::now();
    }

    /// Signed distance since the last reset, backward travel subtracts.
    ///
    /// Units: centimetres
    pub fn get_distance(&self) -> f64 {
        self.lock_motion()
            .distance_at(Instant::now(), self.params.cm_per_s_per_speed)
    }

    /// Command the steering.
    ///
    /// Returns the angle actually commanded, or `None` if the clamped command equalled the
    /// previous one and was suppressed.
    pub fn turn_steering(
        &self,
        angle_deg: f64,
        opts: SteerOpts,
    ) -> Result<Option<f64>, MoveCtrlError> {
        let max_turn = opts
            .max_turn_angle
            .unwrap_or(self.params.max_turn_angle_deg)
            .abs()
            .min(self.params.hw_max_turn_angle_deg);
        let max_delta = opts.max_delta.abs();

        let (angle, delta) = {
            let mut last = self.last_cmd.lock().unwrap_or_else(|p| p.into_inner());

            let stepped = clamp(&angle_deg, &(*last - max_delta), &(*last + max_delta));
            let angle = clamp(&stepped, &-max_turn, &max_turn);

            if (angle - *last).abs() < f64::EPSILON {
                trace!("Steering {:.2} suppressed, unchanged", angle);
                return Ok(None);
            }

            let delta = angle - *last;
            *last = angle;
            (angle, delta)
        };

        if opts.speedcheck && delta.abs() > self.params.speedcheck_delta_deg {
            self.coerce_min_speed(opts.current_speed)?;
        }

        if opts.asynchronous {
            self.mailbox.post(angle);
        } else {
            self.mailbox.join();
            apply_steering(
                self.drive.as_ref(),
                angle,
                self.params.steer_tolerance_deg,
                self.params.steer_retries,
            )?;
        }

        debug!("Steering {:.1} (requested {:.1})", angle, angle_deg);

        Ok(Some(angle))
    }

    /// Wait until no steering command is pending or executing.
    pub fn join_steering(&self) {
        self.mailbox.join();
    }

    /// The last accepted steering command.
    ///
    /// Units: degrees
    pub fn last_steering(&self) -> f64 {
        *self.last_cmd.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// The measured steering angle.
    ///
    /// Units: degrees
    pub fn steering_angle(&self) -> f64 {
        self.drive.steering_angle()
    }

    /// Stop the drive, discard queued steering and join the worker.
    pub fn shutdown(&self) {
        self.mailbox.stop();

        if let Err(e) = self.stop_walking() {
            error!("Could not stop the drive during shutdown: {}", e);
        }

        let jh = self.steer_jh.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(jh) = jh {
            if jh.join().is_err() {
                error!("Steering worker panicked");
            }
        }
    }

    fn set_motion(&self, mode: DriveMode, speed: f64) -> Result<(), MoveCtrlError> {
        self.mailbox.join();

        let mut motion = self.lock_motion();

        let unchanged = motion.mode == mode
            && (mode == DriveMode::Stopped || (motion.speed - speed).abs() < f64::EPSILON);
        if unchanged {
            return Ok(());
        }

        match mode {
            DriveMode::Stopped => self.drive.drive_stop()?,
            DriveMode::Forward => self.drive.drive_forward(speed)?,
            DriveMode::Backward => self.drive.drive_backward(speed)?,
        }

        let now = Instant::now();
        motion.distance_cm = motion.distance_at(now, self.params.cm_per_s_per_speed);
        motion.since = now;
        motion.mode = mode;
        motion.speed = speed;

        debug!("Drive {:?} at {:.0}, {:.1} cm so far", mode, speed, motion.distance_cm);

        Ok(())
    }

    /// Drop the drive to the minimum speed for a large steering change.
    fn coerce_min_speed(&self, current_speed: Option<f64>) -> Result<(), MoveCtrlError> {
        let mut motion = self.lock_motion();
        let mode = motion.mode;
        let running = current_speed.unwrap_or(motion.speed);

        if mode == DriveMode::Stopped || running <= self.params.min_speed {
            return Ok(());
        }

        trace!("Speedcheck: {:.0} -> {:.0}", running, self.params.min_speed);

        match mode {
            DriveMode::Backward => self.drive.drive_backward(self.params.min_speed)?,
            _ => self.drive.drive_forward(self.params.min_speed)?,
        }

        let now = Instant::now();
        motion.distance_cm = motion.distance_at(now, self.params.cm_per_s_per_speed);
        motion.since = now;
        motion.speed = self.params.min_speed;

        Ok(())
    }

    fn lock_motion(&self) -> MutexGuard<'_, Motion> {
        self.motion.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Drop for MoveCtrl {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    #[derive(Default)]
    struct MockDrive {
        angle: Mutex<f64>,
        log: Mutex<Vec<String>>,
    }

    impl DriveBase for MockDrive {
        fn drive_forward(&self, speed: f64) -> Result<(), EqptError> {
            self.log.lock().unwrap().push(format!("fwd {}", speed));
            Ok(())
        }
        fn drive_backward(&self, speed: f64) -> Result<(), EqptError> {
            self.log.lock().unwrap().push(format!("bwd {}", speed));
            Ok(())
        }
        fn drive_stop(&self) -> Result<(), EqptError> {
            self.log.lock().unwrap().push("stop".into());
            Ok(())
        }
        fn set_steering(&self, angle_deg: f64) -> Result<(), EqptError> {
            *self.angle.lock().unwrap() = angle_deg;
            Ok(())
        }
        fn steering_angle(&self) -> f64 {
            *self.angle.lock().unwrap()
        }
    }

    fn ctrl() -> (Arc<MockDrive>, MoveCtrl) {
        let drive = Arc::new(MockDrive::default());
        let ctrl = MoveCtrl::new(drive.clone(), MoveParams::default()).unwrap();
        (drive, ctrl)
    }

    #[test]
    fn test_distance_integration() {
        let (_, ctrl) = ctrl();

        ctrl.start_walking(50.0).unwrap();
        thread::sleep(Duration::from_millis(400));
        ctrl.stop_walking().unwrap();

        let expected = 50.0 * 0.4 * 0.84;
        let d = ctrl.get_distance();
        assert!((d - expected).abs() < expected * 0.05, "{} vs {}", d, expected);

        // Stopped, the distance holds
        thread::sleep(Duration::from_millis(50));
        assert!((ctrl.get_distance() - d).abs() < 1e-9);

        ctrl.start_backward(50.0).unwrap();
        thread::sleep(Duration::from_millis(400));
        ctrl.stop_walking().unwrap();
        assert!(ctrl.get_distance().abs() < expected * 0.1);

        ctrl.reset_distance();
        assert!(ctrl.get_distance().abs() < 1e-9);
    }

    #[test]
    fn test_drive_only_on_change() {
        let (drive, ctrl) = ctrl();

        ctrl.start_walking(50.0).unwrap();
        ctrl.start_walking(50.0).unwrap();
        ctrl.start_walking(40.0).unwrap();
        assert!(ctrl.is_walking());
        ctrl.stop_walking().unwrap();
        ctrl.stop_walking().unwrap();
        assert!(!ctrl.is_walking());

        assert_eq!(
            *drive.log.lock().unwrap(),
            vec!["stop", "fwd 50", "fwd 40", "stop"]
        );
    }

    #[test]
    fn test_steering_clamps() {
        let (drive, ctrl) = ctrl();

        // Per-call delta
        let delta = SteerOpts::default().max_delta(8.0);
        assert_eq!(ctrl.turn_steering(20.0, delta).unwrap(), Some(8.0));
        assert_eq!(ctrl.turn_steering(20.0, delta).unwrap(), Some(16.0));

        // Absolute limit
        assert_eq!(ctrl.turn_steering(40.0, SteerOpts::default()).unwrap(), Some(24.4));
        assert_eq!(ctrl.turn_steering(-40.0, SteerOpts::default()).unwrap(), Some(-24.4));

        // Caller limit never exceeds the hardware cap
        assert_eq!(
            ctrl.turn_steering(60.0, SteerOpts::default().max_turn_angle(45.0)).unwrap(),
            Some(38.0)
        );

        // Suppressed
        let limit = SteerOpts::default().max_turn_angle(45.0);
        assert_eq!(ctrl.turn_steering(38.0, limit).unwrap(), None);

        assert!((drive.steering_angle() - 38.0).abs() < 1e-9);
        assert!((ctrl.last_steering() - 38.0).abs() < 1e-9);
    }

    #[test]
    fn test_async_steering_joined_by_drive() {
        let (drive, ctrl) = ctrl();

        ctrl.turn_steering(10.0, SteerOpts::asynchronous()).unwrap();
        ctrl.start_walking(40.0).unwrap();

        assert!((drive.steering_angle() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_speedcheck() {
        let (drive, ctrl) = ctrl();

        ctrl.start_walking(60.0).unwrap();

        // Small change keeps the speed
        ctrl.turn_steering(5.0, SteerOpts::default().speedcheck(60.0)).unwrap();
        assert_eq!(ctrl.speed(), 60.0);

        ctrl.turn_steering(-15.0, SteerOpts::default().speedcheck(60.0)).unwrap();
        assert_eq!(ctrl.speed(), 35.0);
        assert_eq!(drive.log.lock().unwrap().last().unwrap(), "fwd 35");
    }

    #[test]
    fn test_speedcheck_keeps_drive_mode() {
        let (drive, ctrl) = ctrl();

        // Stopped, a large change never starts the drive
        ctrl.turn_steering(20.0, SteerOpts::default().speedcheck(60.0)).unwrap();
        assert_eq!(ctrl.drive_mode(), DriveMode::Stopped);
        assert_eq!(*drive.log.lock().unwrap(), vec!["stop"]);

        ctrl.start_backward(55.0).unwrap();
        ctrl.turn_steering(-20.0, SteerOpts::default().speedcheck(55.0)).unwrap();
        assert_eq!(ctrl.drive_mode(), DriveMode::Backward);
        assert_eq!(ctrl.speed(), 35.0);
        assert_eq!(drive.log.lock().unwrap().last().unwrap(), "bwd 35");
    }
}
