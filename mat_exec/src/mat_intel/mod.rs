//! # Mat intelligence
//!
//! Tracks where on the mat the robot is, which way round it is travelling and how many laps it
//! has done, and learns target distances for every location from the readings the walker feeds
//! it.
//!
//! Readings are queued with [`MatIntel::add_reading`] and processed by a single worker thread,
//! which maintains the running minimum wall-to-wall width of the current location. A single
//! listener may register to be told whenever a new minimum inside a mat corridor is found.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod location;
mod map;
mod params;
mod worker;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, error, info, warn};
use std::sync::mpsc::{channel, SendError, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub use location::{Direction, GenericLocation, Location, Wall};
pub use map::{classify_side, default_targets, is_set, LearnedMap, SideClass, Targets, NO_TARGET};
pub use params::MatIntelParams;

use worker::{worker_thread, WorkerSignal};

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

/// Listener for new minimum widths, called with the evenly split `(left, right)` pair.
pub type MinCallback = Arc<dyn Fn(f64, f64) + Send + Sync>;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The mat intelligence.
pub struct MatIntel {
    shared: Arc<Shared>,
    sender: Mutex<Sender<WorkerSignal>>,
    worker_jh: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    params: MatIntelParams,
    state: Mutex<IntelState>,

    /// Notified whenever the pending reading count drops
    drained: Condvar,
}

struct IntelState {
    location: Location,
    direction: Direction,
    lap: u32,
    total_laps: u32,

    learned: LearnedMap,

    /// First valid reading of the run, where the final side must stop
    closing_square: Option<Targets>,

    /// Smallest left + right seen in the current location
    current_min_total: Option<f64>,

    /// Readings queued but not yet processed
    pending: usize,

    callback: Option<MinCallback>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum MatIntelError {
    #[error("The direction can only be reported on Side1, the robot is on {0:?}")]
    NotAtSide1(Location),

    #[error("Cannot report an unknown direction")]
    UnknownDirection,

    #[error("Could not start the worker thread: {0}")]
    ThreadSpawnError(std::io::Error),

    #[error("The worker thread has stopped")]
    WorkerStopped,

    #[error("MatIntel state lock is poisoned")]
    PoisonError,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MatIntel {
    /// Create the intelligence for a run of `total_laps` laps, starting on Side1 with an unknown
    /// direction.
    pub fn new(params: MatIntelParams, total_laps: u32) -> Result<Self, MatIntelError> {
        let shared = Arc::new(Shared {
            params,
            state: Mutex::new(IntelState {
                location: Location::Side1,
                direction: Direction::Unknown,
                lap: 1,
                total_laps,
                learned: LearnedMap::default(),
                closing_square: None,
                current_min_total: None,
                pending: 0,
                callback: None,
            }),
            drained: Condvar::new(),
        });

        let (sender, receiver) = channel();
        let worker_shared = shared.clone();
        let jh = thread::Builder::new()
            .name("mat_intel".into())
            .spawn(move || worker_thread(worker_shared, receiver))
            .map_err(MatIntelError::ThreadSpawnError)?;

        Ok(Self {
            shared,
            sender: Mutex::new(sender),
            worker_jh: Mutex::new(Some(jh)),
        })
    }

    /// Queue a reading for processing. Never blocks on the processing itself.
    pub fn add_reading(&self, front: f64, left: f64, right: f64) -> Result<(), MatIntelError> {
        self.lock_state()?.pending += 1;

        let sent = self
            .sender
            .lock()
            .map_err(|_| MatIntelError::PoisonError)?
            .send(WorkerSignal::Reading { front, left, right });

        if let Err(SendError(_)) = sent {
            let mut state = self.lock_state()?;
            state.pending = state.pending.saturating_sub(1);
            return Err(MatIntelError::WorkerStopped);
        }

        Ok(())
    }

    /// Record the direction found on Side1, freeze Side1's targets and move on to Corner1.
    pub fn report_direction_side1(&self, direction: Direction) -> Result<(), MatIntelError> {
        if !direction.is_known() {
            return Err(MatIntelError::UnknownDirection);
        }

        let mut state = self.wait_drained()?;

        if state.location != Location::Side1 {
            return Err(MatIntelError::NotAtSide1(state.location));
        }

        let mid = state.current_min_total.map(|t| t / 2.0).unwrap_or(NO_TARGET);
        let side1 = Targets::new(self.shared.params.side_front_cm, mid, mid);

        state.direction = direction;
        state.learned.set(Location::Side1, side1);
        state.current_min_total = None;
        state.location = Location::Corner1;

        info!(
            "Direction {:?}, Side1 learned as {:?}, now at Corner1",
            direction, side1
        );

        Ok(())
    }

    /// Mark the current location as complete and advance to the next one.
    ///
    /// Waits up to `drain_timeout_s` for queued readings, then learns from the current location's
    /// minimum width. Completing Corner4 counts a lap and reprocesses the map.
    pub fn location_complete(&self) -> Result<Location, MatIntelError> {
        let mut state = self.wait_drained()?;
        let params = &self.shared.params;

        let completed = state.location;
        let direction = state.direction;
        let mid = state.current_min_total.map(|t| t / 2.0);

        if let Some(mid) = mid {
            if completed.is_side() {
                state.learned.learn_side(completed, mid, direction, params);
            } else {
                state.learned.assign_side(completed.next(), mid, direction, params);
            }
        }

        state.current_min_total = None;
        state.location = completed.next();

        if completed == Location::Corner4 {
            state.lap += 1;
            state.learned.reprocess(direction, params);
            info!("Lap complete, starting lap {}", state.lap);
        }

        debug!(
            "{:?} complete (mid {:?}), now at {:?}",
            completed, mid, state.location
        );

        Ok(state.location)
    }

    /// Targets for a location, the current one if `None`.
    ///
    /// Once every lap is done Side1 returns the closing square, the position the run started
    /// from.
    pub fn get_learned_distances(&self, location: Option<Location>) -> Targets {
        let state = self.lock_state_or_recover();
        let location = location.unwrap_or(state.location);

        if location == Location::Side1 && state.lap > state.total_laps {
            if let Some(sq) = state.closing_square {
                return sq;
            }
        }

        state
            .learned
            .get_or_default(location, state.direction, &self.shared.params)
    }

    /// Overwrite the targets for a location.
    pub fn set_learned_distances(&self, location: Location, targets: Targets) {
        self.lock_state_or_recover().learned.set(location, targets);
    }

    /// Recompute side and corner targets from the learned corridor widths.
    pub fn reprocess_map(&self) {
        let mut state = self.lock_state_or_recover();
        let direction = state.direction;
        state.learned.reprocess(direction, &self.shared.params);
    }

    /// Register the single new-minimum listener, replacing any previous one.
    pub fn register_callback(&self, callback: MinCallback) {
        self.lock_state_or_recover().callback = Some(callback);
    }

    pub fn unregister_callback(&self) {
        self.lock_state_or_recover().callback = None;
    }

    /// Continue a run from a known location and direction, e.g. after a restart mid-mat.
    pub fn resume_at(&self, location: Location, direction: Direction) {
        let mut state = self.lock_state_or_recover();
        state.location = location;
        state.direction = direction;
        state.current_min_total = None;
    }

    pub fn location(&self) -> Location {
        self.lock_state_or_recover().location
    }

    pub fn direction(&self) -> Direction {
        self.lock_state_or_recover().direction
    }

    pub fn lap(&self) -> u32 {
        self.lock_state_or_recover().lap
    }

    pub fn total_laps(&self) -> u32 {
        self.lock_state_or_recover().total_laps
    }

    /// True once every lap has been driven and the robot is on the closing side.
    pub fn is_closing_lap(&self) -> bool {
        let state = self.lock_state_or_recover();
        state.lap > state.total_laps
    }

    pub fn closing_square(&self) -> Option<Targets> {
        self.lock_state_or_recover().closing_square
    }

    /// Smallest wall-to-wall sum seen in the current location.
    pub fn current_min_total(&self) -> Option<f64> {
        self.lock_state_or_recover().current_min_total
    }

    /// Stop the worker thread. Queued readings are discarded.
    pub fn shutdown(&self) {
        if let Ok(sender) = self.sender.lock() {
            // The worker may already have gone, which is what we want anyway
            let _ = sender.send(WorkerSignal::Stop);
        }

        if let Ok(mut jh) = self.worker_jh.lock() {
            if let Some(h) = jh.take() {
                if h.join().is_err() {
                    error!("MatIntel worker thread panicked");
                }
            }
        }
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, IntelState>, MatIntelError> {
        self.shared
            .state
            .lock()
            .map_err(|_| MatIntelError::PoisonError)
    }

    /// Accessors recover from poisoning, the state is plain data and still usable.
    fn lock_state_or_recover(&self) -> MutexGuard<'_, IntelState> {
        self.shared.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Lock the state once the queue has drained or the drain timeout elapsed.
    fn wait_drained(&self) -> Result<MutexGuard<'_, IntelState>, MatIntelError> {
        let timeout = Duration::from_secs_f64(self.shared.params.drain_timeout_s);
        let state = self.lock_state()?;

        let (state, res) = self
            .shared
            .drained
            .wait_timeout_while(state, timeout, |s| s.pending > 0)
            .map_err(|_| MatIntelError::PoisonError)?;

        if res.timed_out() {
            warn!(
                "{} readings still queued after {:.1} s, advancing anyway",
                state.pending, self.shared.params.drain_timeout_s
            );
        }

        Ok(state)
    }
}

impl Drop for MatIntel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn intel(laps: u32) -> MatIntel {
        MatIntel::new(MatIntelParams::default(), laps).unwrap()
    }

    #[test]
    fn test_full_lap() {
        let mi = intel(3);
        mi.report_direction_side1(Direction::Clockwise).unwrap();

        // Side1 was done by the report, 7 more locations to get back
        for _ in 0..7 {
            mi.location_complete().unwrap();
        }

        assert_eq!(mi.location(), Location::Side1);
        assert_eq!(mi.lap(), 2);
    }

    #[test]
    fn test_eight_completions_count_one_lap() {
        let mi = intel(3);
        mi.resume_at(Location::Side1, Direction::CounterClockwise);

        for _ in 0..8 {
            mi.location_complete().unwrap();
        }

        assert_eq!(mi.location(), Location::Side1);
        assert_eq!(mi.lap(), 2);
    }

    #[test]
    fn test_report_direction_only_on_side1() {
        let mi = intel(1);
        mi.resume_at(Location::Side2, Direction::Unknown);

        assert!(matches!(
            mi.report_direction_side1(Direction::Clockwise),
            Err(MatIntelError::NotAtSide1(Location::Side2))
        ));
        assert!(matches!(
            mi.report_direction_side1(Direction::Unknown),
            Err(MatIntelError::UnknownDirection)
        ));
    }

    #[test]
    fn test_side1_frozen_from_running_minimum() {
        let mi = intel(1);

        mi.add_reading(140.0, 55.0, 55.0).unwrap();
        mi.add_reading(120.0, 50.0, 52.0).unwrap();
        mi.add_reading(100.0, -1.0, 40.0).unwrap();
        mi.add_reading(95.0, 54.0, 56.0).unwrap();

        mi.report_direction_side1(Direction::Clockwise).unwrap();

        assert_eq!(mi.location(), Location::Corner1);
        assert_eq!(mi.direction(), Direction::Clockwise);
        assert_eq!(
            mi.get_learned_distances(Some(Location::Side1)),
            Targets::new(100.0, 51.0, 51.0)
        );
        assert_eq!(mi.closing_square(), Some(Targets::new(140.0, 55.0, 55.0)));
    }

    #[test]
    fn test_corner_assigns_next_side() {
        let mi = intel(1);
        mi.resume_at(Location::Corner1, Direction::Clockwise);

        mi.add_reading(80.0, 45.0, 47.0).unwrap();
        mi.location_complete().unwrap();

        assert_eq!(
            mi.get_learned_distances(Some(Location::Side2)),
            Targets::new(100.0, 46.0, 46.0)
        );
        assert_eq!(mi.current_min_total(), None);
    }

    #[test]
    fn test_defaults_when_unlearned() {
        let mi = intel(1);
        mi.resume_at(Location::Corner2, Direction::CounterClockwise);

        assert_eq!(
            mi.get_learned_distances(None),
            Targets::new(20.0, 30.0, -1.0)
        );
    }

    #[test]
    fn test_closing_square_after_last_lap() {
        let mi = intel(1);
        mi.add_reading(140.0, 50.0, 50.0).unwrap();
        mi.report_direction_side1(Direction::Clockwise).unwrap();

        for _ in 0..7 {
            mi.location_complete().unwrap();
        }

        assert!(mi.is_closing_lap());
        assert_eq!(mi.get_learned_distances(None), Targets::new(140.0, 50.0, 50.0));
    }

    #[test]
    fn test_callback_on_new_minimum() {
        let mi = intel(1);
        let calls = Arc::new(AtomicUsize::new(0));
        let last = Arc::new(Mutex::new((0.0, 0.0)));

        let (c, l) = (calls.clone(), last.clone());
        mi.register_callback(Arc::new(move |left, right| {
            c.fetch_add(1, Ordering::SeqCst);
            *l.lock().unwrap() = (left, right);
        }));

        // Above the mat maximum, new minimum but no call
        mi.add_reading(100.0, 100.0, 100.0).unwrap();
        // New minimum below the maximum
        mi.add_reading(100.0, 40.0, 60.0).unwrap();
        // Not a new minimum
        mi.add_reading(100.0, 50.0, 60.0).unwrap();
        // Negative, ignored
        mi.add_reading(100.0, -1.0, 10.0).unwrap();

        mi.location_complete().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*last.lock().unwrap(), (50.0, 50.0));

        mi.unregister_callback();
        mi.add_reading(100.0, 20.0, 20.0).unwrap();
        mi.location_complete().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
