//! Worker thread processing the queued readings.

// -----------------------------------------------------------------------------------------------
// INCLUDES
// -----------------------------------------------------------------------------------------------

use log::{debug, trace};
use std::sync::{mpsc::Receiver, Arc};

use super::{Shared, Targets};

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

#[derive(Debug)]
pub enum WorkerSignal {
    /// The worker should stop
    Stop,

    /// A raw distance triple
    Reading { front: f64, left: f64, right: f64 },
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

pub(super) fn worker_thread(shared: Arc<Shared>, receiver: Receiver<WorkerSignal>) {
    while let Ok(signal) = receiver.recv() {
        let (front, left, right) = match signal {
            WorkerSignal::Stop => break,
            WorkerSignal::Reading { front, left, right } => (front, left, right),
        };

        // Update under the lock, call the listener outside it
        let notify = {
            let mut state = shared.state.lock().unwrap_or_else(|p| p.into_inner());

            if front < 0.0 || left < 0.0 || right < 0.0 {
                None
            } else {
                if state.closing_square.is_none() {
                    let mid = (left + right) / 2.0;
                    state.closing_square = Some(Targets::new(front, mid, mid));
                    debug!("Closing square set to ({:.1}, {:.1}, {:.1})", front, mid, mid);
                }

                let total = left + right;
                let new_min = match state.current_min_total {
                    Some(min) => total < min,
                    None => true,
                };

                if new_min {
                    state.current_min_total = Some(total);
                    trace!("New minimum width {:.1}", total);
                }

                if new_min && total < shared.params.mat_max_cm {
                    state.callback.clone().map(|cb| (cb, total / 2.0))
                } else {
                    None
                }
            }
        };

        if let Some((cb, half)) = notify {
            cb(half, half);
        }

        let mut state = shared.state.lock().unwrap_or_else(|p| p.into_inner());
        state.pending = state.pending.saturating_sub(1);
        shared.drained.notify_all();
    }

    debug!("MatIntel worker stopped");
}
