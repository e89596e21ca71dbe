//! # Measurement logger
//!
//! Background thread writing one CSV row per period with the latest sensor snapshot and the
//! walker's progress. The platform thermal state is polled on the same period.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use util::{
    archive::{ArchiveError, Archiver},
    host::{self, ThermalState},
    session,
    sync::StopEvent,
};

use crate::{
    mat_intel::{Direction, Location},
    move_ctrl::MoveCtrl,
    sens_agg::{SensorAggregator, SensorSnapshot},
    walker::{WalkerMode, WalkerState},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MeasLogParams {
    pub enabled: bool,

    /// Units: seconds
    pub period_s: f64,
}

/// One row of the measurement log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasRecord {
    pub left_distance: f64,
    pub right_distance: f64,
    pub front_distance: f64,
    pub steering_angle: f64,
    pub yaw: f64,
    pub timestamp: f64,

    /// [`ExtraMetrics`] as a JSON string
    pub extra_metrics: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtraMetrics {
    pub location: Location,
    pub direction: Direction,
    pub lap: u32,
    pub mode: WalkerMode,
    pub distance_cm: f64,
    pub temp_c: Option<f64>,
    pub throttled: bool,
}

/// Handle to the logger thread.
pub struct MeasLogger {
    path: PathBuf,
    stop: StopEvent,
    jh: Mutex<Option<JoinHandle<()>>>,
}

/// Everything the logger thread reads from.
struct Sources {
    sens: Arc<SensorAggregator>,
    move_ctrl: Arc<MoveCtrl>,
    status: Arc<Mutex<WalkerState>>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum MeasLogError {
    #[error("Could not open the measurement log: {0}")]
    ArchiveError(#[from] ArchiveError),

    #[error("Could not start the measurement logger thread: {0}")]
    ThreadSpawnError(std::io::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for MeasLogParams {
    fn default() -> Self {
        Self {
            enabled: true,
            period_s: 1.0,
        }
    }
}

impl MeasRecord {
    pub fn new(snap: &SensorSnapshot, timestamp: f64, metrics: &ExtraMetrics) -> Self {
        Self {
            left_distance: snap.left_cm,
            right_distance: snap.right_cm,
            front_distance: snap.front_cm,
            steering_angle: snap.steering_deg,
            yaw: snap.yaw_deg,
            timestamp,
            extra_metrics: serde_json::to_string(metrics).unwrap_or_else(|_| String::from("{}")),
        }
    }
}

impl MeasLogger {
    /// Open the log at `path` and start the logger thread.
    pub fn start<P: AsRef<Path>>(
        params: &MeasLogParams,
        path: P,
        sens: Arc<SensorAggregator>,
        move_ctrl: Arc<MoveCtrl>,
        status: Arc<Mutex<WalkerState>>,
    ) -> Result<Self, MeasLogError> {
        let archiver = Archiver::from_path(path)?;
        let path = archiver.path().to_path_buf();
        let stop = StopEvent::new();
        let period = Duration::from_secs_f64(params.period_s.max(0.01));

        let sources = Sources {
            sens,
            move_ctrl,
            status,
        };

        let thread_stop = stop.clone();
        let jh = thread::Builder::new()
            .name("meas_log".into())
            .spawn(move || logger_thread(archiver, sources, thread_stop, period))
            .map_err(MeasLogError::ThreadSpawnError)?;

        info!("Measurement log started at {:?}", path);

        Ok(Self {
            path,
            stop,
            jh: Mutex::new(Some(jh)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn shutdown(&self) {
        self.stop.set();

        if let Ok(mut jh) = self.jh.lock() {
            if let Some(h) = jh.take() {
                if h.join().is_err() {
                    error!("Measurement logger thread panicked");
                }
            }
        }
    }
}

impl Drop for MeasLogger {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn logger_thread(mut archiver: Archiver, sources: Sources, stop: StopEvent, period: Duration) {
    let mut throttled = false;

    loop {
        let thermal = host::thermal_state();
        log_thermal(&thermal, &mut throttled);

        match sources.sens.latest() {
            Some(snap) => {
                let state = *sources.status.lock().unwrap_or_else(|p| p.into_inner());
                let metrics = ExtraMetrics {
                    location: state.location,
                    direction: state.direction,
                    lap: state.lap,
                    mode: state.mode,
                    distance_cm: sources.move_ctrl.get_distance(),
                    temp_c: thermal.temp_c,
                    throttled: thermal.throttled,
                };
                let timestamp = session::try_elapsed_seconds().unwrap_or(snap.timestamp);

                if let Err(e) = archiver.serialise(MeasRecord::new(&snap, timestamp, &metrics)) {
                    warn!("Could not write a measurement row: {}", e);
                }
            }
            None => debug!("No snapshot to log yet"),
        }

        if stop.wait_timeout(period) {
            break;
        }
    }

    debug!("Measurement logger stopped");
}

/// Log the start and end of each throttling episode.
fn log_thermal(thermal: &ThermalState, throttled: &mut bool) {
    if thermal.throttled && !*throttled {
        warn!("Platform is thermally throttled (temperature {:?} C)", thermal.temp_c);
    } else if !thermal.throttled && *throttled {
        info!("Platform no longer throttled");
    }
    *throttled = thermal.throttled;
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    fn metrics() -> ExtraMetrics {
        ExtraMetrics {
            location: Location::Side2,
            direction: Direction::Clockwise,
            lap: 1,
            mode: WalkerMode::SideFollow,
            distance_cm: 42.5,
            temp_c: None,
            throttled: false,
        }
    }

    #[test]
    fn test_record() {
        let snap = SensorSnapshot::from_distances(120.0, 40.0, 55.0, 3.5);
        let rec = MeasRecord::new(&snap, 12.0, &metrics());

        assert_eq!(rec.left_distance, 40.0);
        assert_eq!(rec.right_distance, 55.0);
        assert_eq!(rec.front_distance, 120.0);
        assert_eq!(rec.yaw, 3.5);

        let extra: serde_json::Value = serde_json::from_str(&rec.extra_metrics).unwrap();
        assert_eq!(extra["location"], "Side2");
        assert_eq!(extra["direction"], "Clockwise");
        assert_eq!(extra["lap"], 1);
        assert_eq!(extra["mode"], "SideFollow");
    }

    #[test]
    fn test_csv_row() {
        let path = std::env::temp_dir().join(format!("meas_log_test_{}.csv", std::process::id()));
        let _ = fs::remove_file(&path);

        {
            let mut arch = Archiver::from_path(&path).unwrap();
            let snap = SensorSnapshot::from_distances(120.0, 40.0, 55.0, 0.0);
            arch.serialise(MeasRecord::new(&snap, 1.0, &metrics())).unwrap();
        }

        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some(
                "left_distance,right_distance,front_distance,steering_angle,yaw,timestamp,\
                 extra_metrics"
            )
        );

        // The JSON column is quoted with its quotes doubled
        let row = lines.next().unwrap();
        assert!(row.starts_with("40.0,55.0,120.0,"));
        assert!(row.contains("\"{\"\"location\"\":\"\"Side2\"\""));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_thermal_episodes() {
        let mut throttled = false;
        let hot = ThermalState {
            temp_c: Some(85.0),
            throttled: true,
        };

        log_thermal(&hot, &mut throttled);
        assert!(throttled);
        log_thermal(&ThermalState::default(), &mut throttled);
        assert!(!throttled);
    }
}
