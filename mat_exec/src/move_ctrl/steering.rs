//! # Steering worker
//!
//! Asynchronous steering commands go through a single-slot mailbox to a dedicated worker thread.
//! Posting to a full mailbox replaces the command waiting there, so the worker always moves
//! towards the newest demand. [`SteerMailbox::join`] blocks until the mailbox is empty and the
//! worker idle, which is the barrier used before any drive transition.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, error, warn};
use std::sync::{Arc, Condvar, Mutex};

use eqpt_if::eqpt::{DriveBase, EqptError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Default)]
pub(super) struct SteerMailbox {
    slot: Mutex<Slot>,
    cvar: Condvar,
}

#[derive(Default)]
struct Slot {
    pending: Option<f64>,
    busy: bool,
    stop: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SteerMailbox {
    /// Post a command, replacing any command not yet taken by the worker.
    pub fn post(&self, angle_deg: f64) {
        let mut slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(old) = slot.pending.replace(angle_deg) {
            debug!("Steering command {:.1} superseded by {:.1}", old, angle_deg);
        }
        self.cvar.notify_all();
    }

    /// Block until no command is pending or executing.
    pub fn join(&self) {
        let slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        let _slot = self
            .cvar
            .wait_while(slot, |s| !s.stop && (s.pending.is_some() || s.busy))
            .unwrap_or_else(|p| p.into_inner());
    }

    /// Ask the worker to exit, discarding any pending command.
    pub fn stop(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        slot.pending = None;
        slot.stop = true;
        self.cvar.notify_all();
    }

    /// Wait for the next command, `None` once stopped.
    fn take(&self) -> Option<f64> {
        let slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        let mut slot = self
            .cvar
            .wait_while(slot, |s| !s.stop && s.pending.is_none())
            .unwrap_or_else(|p| p.into_inner());

        if slot.stop {
            return None;
        }

        slot.busy = true;
        slot.pending.take()
    }

    fn done(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        slot.busy = false;
        self.cvar.notify_all();
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

pub(super) fn steering_worker(
    mailbox: Arc<SteerMailbox>,
    drive: Arc<dyn DriveBase>,
    tolerance_deg: f64,
    retries: usize,
) {
    while let Some(angle) = mailbox.take() {
        if let Err(e) = apply_steering(drive.as_ref(), angle, tolerance_deg, retries) {
            error!("Steering command {:.1} failed: {}", angle, e);
        }
        mailbox.done();
    }

    debug!("Steering worker stopped");
}

/// Command the steering and correct any residual error.
///
/// If the measured angle is more than `tolerance_deg` off, the command is offset by the residual
/// and resent, up to `retries` times. Missing the target after that is only a warning.
pub(super) fn apply_steering(
    drive: &dyn DriveBase,
    angle_deg: f64,
    tolerance_deg: f64,
    retries: usize,
) -> Result<(), EqptError> {
    let mut command = angle_deg;
    drive.set_steering(command)?;

    for _ in 0..retries {
        let residual = angle_deg - drive.steering_angle();
        if residual.abs() <= tolerance_deg {
            return Ok(());
        }

        command += residual;
        drive.set_steering(command)?;
    }

    let residual = angle_deg - drive.steering_angle();
    if residual.abs() > tolerance_deg {
        warn!(
            "Steering at {:.1} deg after {} retries, wanted {:.1}",
            drive.steering_angle(),
            retries,
            angle_deg
        );
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::thread;
    use std::time::Duration;

    /// Steering that only reaches 80% of any command.
    struct SloppySteering {
        angle: Mutex<f64>,
        commands: Mutex<Vec<f64>>,
    }

    impl DriveBase for SloppySteering {
        fn drive_forward(&self, _: f64) -> Result<(), EqptError> {
            Ok(())
        }
        fn drive_backward(&self, _: f64) -> Result<(), EqptError> {
            Ok(())
        }
        fn drive_stop(&self) -> Result<(), EqptError> {
            Ok(())
        }
        fn set_steering(&self, angle_deg: f64) -> Result<(), EqptError> {
            self.commands.lock().unwrap().push(angle_deg);
            *self.angle.lock().unwrap() = 0.8 * angle_deg;
            Ok(())
        }
        fn steering_angle(&self) -> f64 {
            *self.angle.lock().unwrap()
        }
    }

    fn sloppy() -> SloppySteering {
        SloppySteering {
            angle: Mutex::new(0.0),
            commands: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn test_residual_retries() {
        let drive = sloppy();
        apply_steering(&drive, 20.0, 2.0, 3).unwrap();

        // 20 -> 16, resend 24 -> 19.2, within tolerance
        assert_eq!(*drive.commands.lock().unwrap(), vec![20.0, 24.0]);
        assert!((drive.steering_angle() - 19.2).abs() < 1e-9);
    }

    #[test]
    fn test_retries_bounded() {
        let drive = sloppy();
        apply_steering(&drive, 100.0, 0.001, 3).unwrap();

        assert_eq!(drive.commands.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_mailbox_join() {
        let mailbox = Arc::new(SteerMailbox::default());
        let drive: Arc<SloppySteering> = Arc::new(sloppy());

        let (mb, dr) = (mailbox.clone(), drive.clone());
        let jh = thread::spawn(move || steering_worker(mb, dr, 50.0, 0));

        mailbox.post(5.0);
        mailbox.post(10.0);
        mailbox.join();

        // The newest command is always executed last
        assert_eq!(drive.commands.lock().unwrap().last(), Some(&10.0));

        mailbox.stop();
        jh.join().unwrap();

        // Join never blocks once stopped
        mailbox.post(1.0);
        thread::sleep(Duration::from_millis(5));
        mailbox.join();
    }
}
