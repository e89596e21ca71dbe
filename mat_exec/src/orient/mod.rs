//! # Orientation estimator
//!
//! Fuses the accelerometer, gyroscope and (when fitted) magnetometer into roll, pitch and yaw.
//! A background thread steps the [`OrientFilter`] every `update_period_s` and publishes the
//! outputs as lock-free scalars, so any thread may read the attitude without blocking the
//! updater. Readers accept that roll, pitch and yaw may come from neighbouring updates.
//!
//! Yaw is reported relative to a zero reference which the walker moves on every gyro reset.
//! Resets should use [`ResetMode::Deferred`] followed by [`Orientation::wait_for_zero`] so that
//! the new zero is taken from a fused sample rather than a stale one.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod calib;
mod filter;
mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, error, info, warn};
use nalgebra::Vector3;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use eqpt_if::eqpt::{EqptError, Imu};
use util::sync::{AtomicF64, StopEvent};
use util::time::{clamp_dt, unix_now_s};

pub use calib::{default_calib_path, CalibError, CalibrationRecord};
pub use filter::{FilterOutput, OrientFilter, ScalarKalman};
pub use params::OrientParams;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The orientation estimator.
pub struct Orientation {
    shared: Arc<Shared>,
    calib_path: PathBuf,
    calib_status: CalibStatus,
    updater_jh: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    params: OrientParams,
    imu: Arc<dyn Imu>,

    filter: Mutex<FilterState>,

    roll_deg: AtomicF64,
    pitch_deg: AtomicF64,
    yaw_deg: AtomicF64,

    /// Mirrors the filter's pending zero so waiters don't contend for the filter lock
    zero_pending: AtomicBool,

    stop: StopEvent,
}

struct FilterState {
    filter: OrientFilter,
    last_update: Option<Instant>,
    mag_unavailable_logged: bool,

    /// Timestamp and interval of the record the biases came from
    calib_timestamp: f64,
    calib_interval: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// How a yaw reset takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    /// Zero the current estimate now
    Immediate,

    /// Zero the estimate produced by the next filter update
    Deferred,
}

/// Where the gyro biases in use came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibStatus {
    /// A fresh record was loaded from disk
    Loaded,

    /// The gyro was sampled at boot
    Recalibrated,
}

#[derive(Debug, thiserror::Error)]
pub enum OrientError {
    #[error("Could not read the IMU: {0}")]
    ImuError(EqptError),

    #[error("Calibration error: {0}")]
    CalibError(CalibError),

    #[error("Could not start the orientation updater thread: {0}")]
    ThreadSpawnError(std::io::Error),

    #[error("Orientation filter lock is poisoned")]
    PoisonError,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Orientation {
    /// Create the estimator, loading the calibration record or regenerating it if it is missing
    /// or stale.
    ///
    /// The robot must be still while this runs if recalibration is needed.
    pub fn new(imu: Arc<dyn Imu>, params: OrientParams) -> Result<Self, OrientError> {
        let calib_path = match params.calib_file {
            Some(ref p) => p.clone(),
            None => default_calib_path().map_err(OrientError::CalibError)?,
        };

        let mut state = FilterState {
            filter: OrientFilter::new(params.clone()),
            last_update: None,
            mag_unavailable_logged: false,
            calib_timestamp: 0.0,
            calib_interval: params.recal_interval_s,
        };

        let loaded = CalibrationRecord::load(&calib_path).and_then(|rec| {
            rec.check_fresh(unix_now_s(), params.recal_interval_s)
                .map(|_| rec)
        });

        let calib_status = match loaded {
            Ok(rec) => {
                info!(
                    "Loaded orientation calibration from {:?} (yaw offset {:.4} deg/s)",
                    calib_path, rec.yaw_offset_deg_per_s
                );
                apply_record(&mut state, &rec);
                CalibStatus::Loaded
            }
            Err(e) => {
                match e {
                    CalibError::Missing(_) | CalibError::Stale { .. } => info!("{}", e),
                    _ => warn!("{}, recalibrating", e),
                }

                let bias = sample_gyro_bias(imu.as_ref(), &params)?;
                state.filter.set_gyro_bias_rads(bias);
                state.calib_timestamp = unix_now_s();
                state.calib_interval = params.recal_interval_s;

                if let Err(e) = build_record(&state).save(&calib_path) {
                    warn!("Could not save the orientation calibration: {}", e);
                }

                CalibStatus::Recalibrated
            }
        };

        Ok(Self {
            shared: Arc::new(Shared {
                params,
                imu,
                filter: Mutex::new(state),
                roll_deg: AtomicF64::new(0.0),
                pitch_deg: AtomicF64::new(0.0),
                yaw_deg: AtomicF64::new(0.0),
                zero_pending: AtomicBool::new(false),
                stop: StopEvent::new(),
            }),
            calib_path,
            calib_status,
            updater_jh: Mutex::new(None),
        })
    }

    /// Start the background updater thread.
    pub fn start(&self) -> Result<(), OrientError> {
        let mut jh = self.updater_jh.lock().map_err(|_| OrientError::PoisonError)?;
        if jh.is_some() {
            return Ok(());
        }

        let shared = self.shared.clone();
        *jh = Some(
            thread::Builder::new()
                .name("orient_updater".into())
                .spawn(move || updater_thread(shared))
                .map_err(OrientError::ThreadSpawnError)?,
        );

        debug!("Orientation updater started");
        Ok(())
    }

    /// Stop the updater thread and persist the calibration.
    pub fn shutdown(&self) {
        self.shared.stop.set();

        if let Ok(mut jh) = self.updater_jh.lock() {
            if let Some(h) = jh.take() {
                if h.join().is_err() {
                    error!("Orientation updater thread panicked");
                }
            }
        }

        match self.shared.lock_filter() {
            Ok(state) => match build_record(&state).save(&self.calib_path) {
                Ok(_) => info!("Orientation calibration saved to {:?}", self.calib_path),
                Err(e) => warn!("Could not save the orientation calibration: {}", e),
            },
            Err(e) => warn!("Could not save the orientation calibration: {}", e),
        }
    }

    /// Fuse one IMU sample.
    pub fn update(&self) -> Result<FilterOutput, OrientError> {
        self.shared.update()
    }

    /// Yaw relative to the last zero reference, in `[-180, 180)`.
    pub fn get_yaw(&self) -> f64 {
        self.shared.yaw_deg.load()
    }

    pub fn get_roll(&self) -> f64 {
        self.shared.roll_deg.load()
    }

    pub fn get_pitch(&self) -> f64 {
        self.shared.pitch_deg.load()
    }

    /// Move the yaw zero reference.
    pub fn reset_yaw(&self, mode: ResetMode) -> Result<(), OrientError> {
        let mut state = self.shared.lock_filter()?;

        match mode {
            ResetMode::Immediate => {
                state.filter.reset_yaw_immediate();
                self.shared.zero_pending.store(false, Ordering::Release);
                self.shared.yaw_deg.store(state.filter.yaw_deg());
            }
            ResetMode::Deferred => {
                state.filter.request_zero();
                self.shared.zero_pending.store(true, Ordering::Release);
            }
        }

        Ok(())
    }

    /// Wait until a deferred zero has been captured.
    ///
    /// Returns false if the timeout elapsed first.
    pub fn wait_for_zero(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        while self.shared.zero_pending.load(Ordering::Acquire) {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }

        true
    }

    /// Timeout used by callers of [`Orientation::wait_for_zero`].
    pub fn zero_wait_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.shared.params.zero_wait_timeout_s)
    }

    /// Re-seed all filters, keeping the calibration.
    pub fn reset_full(&self) -> Result<(), OrientError> {
        let mut state = self.shared.lock_filter()?;
        state.filter.reset_full();
        state.last_update = None;

        self.shared.zero_pending.store(false, Ordering::Release);
        self.shared.roll_deg.store(0.0);
        self.shared.pitch_deg.store(0.0);
        self.shared.yaw_deg.store(0.0);

        Ok(())
    }

    /// Sample the gyro at rest and use the mean as the new bias.
    ///
    /// Stillness is not checked.
    pub fn calibrate(&self) -> Result<Vector3<f64>, OrientError> {
        let bias = sample_gyro_bias(self.shared.imu.as_ref(), &self.shared.params)?;

        let mut state = self.shared.lock_filter()?;
        state.filter.set_gyro_bias_rads(bias);
        state.calib_timestamp = unix_now_s();
        state.calib_interval = self.shared.params.recal_interval_s;

        info!(
            "Gyro calibrated, bias ({:.5}, {:.5}, {:.5}) rad/s",
            bias.x, bias.y, bias.z
        );

        Ok(bias)
    }

    /// Current gyro bias.
    ///
    /// Units: radians/second
    pub fn gyro_bias(&self) -> Result<Vector3<f64>, OrientError> {
        Ok(self.shared.lock_filter()?.filter.gyro_bias_rads())
    }

    pub fn calib_status(&self) -> CalibStatus {
        self.calib_status
    }
}

impl Shared {
    fn lock_filter(&self) -> Result<MutexGuard<'_, FilterState>, OrientError> {
        self.filter.lock().map_err(|_| OrientError::PoisonError)
    }

    fn update(&self) -> Result<FilterOutput, OrientError> {
        let accel = self.imu.acceleration().map_err(OrientError::ImuError)?;
        let gyro = self.imu.gyro().map_err(OrientError::ImuError)?;
        let mag_result = self.imu.magnetometer();

        let mut state = self.lock_filter()?;

        let mag = match mag_result {
            Ok(m) => Some(m),
            Err(EqptError::Unavailable(_)) => {
                if !state.mag_unavailable_logged {
                    debug!("No magnetometer, yaw is gyro only");
                    state.mag_unavailable_logged = true;
                }
                None
            }
            Err(e) => {
                debug!("Magnetometer read failed, gyro only for this step: {}", e);
                None
            }
        };

        let now = Instant::now();
        let nominal = Duration::from_secs_f64(self.params.nominal_dt_s);
        let dt = match state.last_update {
            Some(t) => clamp_dt(
                now - t,
                Duration::from_secs_f64(self.params.max_dt_s),
                nominal,
            ),
            None => nominal,
        };
        state.last_update = Some(now);

        let out = state.filter.update(accel, gyro, mag, dt.as_secs_f64());

        self.roll_deg.store(out.roll_deg);
        self.pitch_deg.store(out.pitch_deg);
        self.yaw_deg.store(out.yaw_deg);
        self.zero_pending
            .store(state.filter.zero_pending(), Ordering::Release);

        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn updater_thread(shared: Arc<Shared>) {
    let period = Duration::from_secs_f64(shared.params.update_period_s);
    let mut last_error_logged = false;

    loop {
        let start = Instant::now();

        match shared.update() {
            Ok(_) => last_error_logged = false,
            Err(e) => {
                if !last_error_logged {
                    error!("Orientation update failed: {}", e);
                    last_error_logged = true;
                }
            }
        }

        let sleep = period.checked_sub(start.elapsed()).unwrap_or_default();
        if shared.stop.wait_timeout(sleep) {
            break;
        }
    }

    debug!("Orientation updater stopped");
}

fn sample_gyro_bias(imu: &dyn Imu, params: &OrientParams) -> Result<Vector3<f64>, OrientError> {
    let n = params.calib_samples.max(1);
    let period = Duration::from_secs_f64(params.calib_sample_period_s);
    let mut sum = Vector3::zeros();

    for _ in 0..n {
        sum += imu.gyro().map_err(OrientError::ImuError)?;
        thread::sleep(period);
    }

    Ok(sum / n as f64)
}

fn apply_record(state: &mut FilterState, rec: &CalibrationRecord) {
    state.filter.set_gyro_bias_rads(Vector3::new(
        rec.roll_offset_deg_per_s.to_radians(),
        rec.pitch_offset_deg_per_s.to_radians(),
        rec.yaw_offset_deg_per_s.to_radians(),
    ));
    state.filter.set_mag_calibration(
        Vector3::new(rec.mag_bias_x, rec.mag_bias_y, rec.mag_bias_z),
        rec.mag_declination_deg,
    );
    state.calib_timestamp = rec.timestamp;
    if rec.recal_interval_sec > 0.0 {
        state.calib_interval = rec.recal_interval_sec;
    }
}

fn build_record(state: &FilterState) -> CalibrationRecord {
    let bias = state.filter.gyro_bias_rads();
    let (mag_bias, declination) = state.filter.mag_calibration();

    CalibrationRecord {
        roll_offset_deg_per_s: bias.x.to_degrees(),
        pitch_offset_deg_per_s: bias.y.to_degrees(),
        yaw_offset_deg_per_s: bias.z.to_degrees(),
        mag_bias_x: mag_bias.x,
        mag_bias_y: mag_bias.y,
        mag_bias_z: mag_bias.z,
        mag_declination_deg: declination,
        timestamp: state.calib_timestamp,
        recal_interval_sec: state.calib_interval,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// An IMU sitting still with a constant yaw rate.
    struct StillImu {
        gz: f64,
    }

    impl Imu for StillImu {
        fn acceleration(&self) -> Result<Vector3<f64>, EqptError> {
            Ok(Vector3::new(0.0, 0.0, 1.0))
        }

        fn gyro(&self) -> Result<Vector3<f64>, EqptError> {
            Ok(Vector3::new(0.0, 0.0, self.gz))
        }
    }

    fn params(name: &str) -> OrientParams {
        let path =
            std::env::temp_dir().join(format!("orient_mod_{}_{}.json", name, std::process::id()));
        let _ = std::fs::remove_file(&path);

        OrientParams {
            calib_file: Some(path),
            calib_samples: 10,
            calib_sample_period_s: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_reload_fresh_calibration() {
        let params = params("reload");
        let rec = CalibrationRecord {
            yaw_offset_deg_per_s: 0.3,
            timestamp: unix_now_s() - 3600.0,
            recal_interval_sec: 86400.0,
            ..Default::default()
        };
        rec.save(params.calib_file.as_ref().unwrap()).unwrap();

        // The IMU reads a very different rate, so a recalibration would be obvious
        let orient = Orientation::new(Arc::new(StillImu { gz: 0.1 }), params).unwrap();

        assert_eq!(orient.calib_status(), CalibStatus::Loaded);
        assert!((orient.gyro_bias().unwrap().z - 0.3f64.to_radians()).abs() < 1e-9);
    }

    #[test]
    fn test_stale_calibration_regenerated() {
        let params = params("stale");
        let path = params.calib_file.clone().unwrap();
        let rec = CalibrationRecord {
            yaw_offset_deg_per_s: 0.3,
            timestamp: unix_now_s() - 10.0 * 86400.0,
            recal_interval_sec: 86400.0,
            ..Default::default()
        };
        rec.save(&path).unwrap();

        let orient = Orientation::new(Arc::new(StillImu { gz: 0.002 }), params).unwrap();

        assert_eq!(orient.calib_status(), CalibStatus::Recalibrated);
        assert!((orient.gyro_bias().unwrap().z - 0.002).abs() < 1e-9);

        let saved = CalibrationRecord::load(&path).unwrap();
        assert!((saved.yaw_offset_deg_per_s - 0.002f64.to_degrees()).abs() < 1e-9);
        assert!(saved.check_fresh(unix_now_s(), 1.0).is_ok());
    }

    #[test]
    fn test_bias_removed_from_yaw() {
        let orient = Orientation::new(Arc::new(StillImu { gz: 0.01 }), params("bias")).unwrap();

        for _ in 0..100 {
            orient.update().unwrap();
        }

        assert!(orient.get_yaw().abs() < 0.05);
    }

    #[test]
    fn test_immediate_and_deferred_reset() {
        let orient = Orientation::new(Arc::new(StillImu { gz: 0.0 }), params("reset")).unwrap();
        orient.reset_yaw(ResetMode::Immediate).unwrap();
        assert!(orient.get_yaw().abs() <= 0.01);

        orient.reset_yaw(ResetMode::Deferred).unwrap();
        assert!(!orient.wait_for_zero(Duration::from_millis(5)));

        orient.start().unwrap();
        assert!(orient.wait_for_zero(Duration::from_secs(1)));
        assert!(orient.get_yaw().abs() <= 0.01);
        orient.shutdown();
    }
}
