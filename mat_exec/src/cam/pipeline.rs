//! # Camera pipeline thread
//!
//! Captures frames, runs the border estimator and publishes the coarse distances for the sensor
//! aggregator. The frame rate drops while nothing is in view.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, error, warn};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use eqpt_if::eqpt::Camera;
use util::sync::{AtomicF64, StopEvent};

use super::{BorderEstimator, BorderMeasurement, BorderParams, CamPipelineParams};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Latest camera border distances, written by the pipeline thread only.
#[derive(Debug)]
pub struct BorderShared {
    pub front_cm: AtomicF64,
    pub left_cm: AtomicF64,
    pub right_cm: AtomicF64,
}

/// Handle to the running pipeline thread.
pub struct CamPipeline {
    shared: Arc<BorderShared>,
    stop: StopEvent,
    jh: Mutex<Option<JoinHandle<()>>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl BorderShared {
    pub fn new() -> Self {
        Self {
            front_cm: AtomicF64::new(-1.0),
            left_cm: AtomicF64::new(-1.0),
            right_cm: AtomicF64::new(-1.0),
        }
    }

    /// Publish a measurement, the centre distance is the front distance.
    pub fn publish(&self, m: &BorderMeasurement) {
        self.front_cm.store(m.center_cm);
        self.left_cm.store(m.left_cm);
        self.right_cm.store(m.right_cm);
    }

    /// Returns (front, left, right).
    pub fn load(&self) -> (f64, f64, f64) {
        (
            self.front_cm.load(),
            self.left_cm.load(),
            self.right_cm.load(),
        )
    }
}

impl Default for BorderShared {
    fn default() -> Self {
        Self::new()
    }
}

impl CamPipeline {
    /// Spawn the pipeline thread.
    pub fn start(
        camera: Arc<dyn Camera>,
        border_params: BorderParams,
        params: CamPipelineParams,
    ) -> Result<Self, std::io::Error> {
        Self::start_with(Arc::new(BorderShared::new()), camera, border_params, params)
    }

    /// Spawn the pipeline thread publishing into an existing shared block.
    pub fn start_with(
        shared: Arc<BorderShared>,
        camera: Arc<dyn Camera>,
        border_params: BorderParams,
        params: CamPipelineParams,
    ) -> Result<Self, std::io::Error> {
        let stop = StopEvent::new();

        let thread_shared = shared.clone();
        let thread_stop = stop.clone();
        let jh = thread::Builder::new()
            .name("cam_pipeline".into())
            .spawn(move || {
                pipeline_thread(camera, border_params, params, thread_shared, thread_stop)
            })?;

        Ok(Self {
            shared,
            stop,
            jh: Mutex::new(Some(jh)),
        })
    }

    pub fn shared(&self) -> Arc<BorderShared> {
        self.shared.clone()
    }

    pub fn shutdown(&self) {
        self.stop.set();

        if let Ok(mut jh) = self.jh.lock() {
            if let Some(h) = jh.take() {
                if h.join().is_err() {
                    error!("Camera pipeline thread panicked");
                }
            }
        }

        // Stale distances must not outlive the thread
        self.shared.publish(&BorderMeasurement::none());
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Frame period for the given rate, at least 1 ms.
fn frame_period(fps: f64) -> Duration {
    Duration::from_secs_f64(1.0 / fps.max(1.0)).max(Duration::from_millis(1))
}

fn pipeline_thread(
    camera: Arc<dyn Camera>,
    border_params: BorderParams,
    params: CamPipelineParams,
    shared: Arc<BorderShared>,
    stop: StopEvent,
) {
    let mut estimator = BorderEstimator::new(border_params);
    let mut fps = params.slow_fps;
    let mut capture_failing = false;

    loop {
        let start = Instant::now();

        match camera.capture_frame() {
            Ok(frame) => {
                capture_failing = false;

                let m = estimator.measure_border(&frame.image);
                shared.publish(&m);

                let new_fps = if m.any_valid() {
                    params.fast_fps
                } else {
                    params.slow_fps
                };
                if new_fps != fps {
                    debug!("Camera pipeline now at {} FPS", new_fps);
                    fps = new_fps;
                }
            }
            Err(e) => {
                if !capture_failing {
                    warn!("Camera capture failed: {}", e);
                    capture_failing = true;
                }
            }
        }

        let sleep = frame_period(fps)
            .checked_sub(start.elapsed())
            .unwrap_or_default();
        if stop.wait_timeout(sleep) {
            break;
        }
    }

    debug!("Camera pipeline stopped");
}

#[cfg(test)]
mod test {
    use super::*;
    use eqpt_if::eqpt::{CamImage, EqptError};
    use image::{Rgb, RgbImage};

    struct BlackCamera;

    impl Camera for BlackCamera {
        fn capture_frame(&self) -> Result<CamImage, EqptError> {
            Ok(CamImage::now(RgbImage::from_pixel(32, 24, Rgb([0, 0, 0]))))
        }
    }

    #[test]
    fn test_frame_period() {
        assert_eq!(frame_period(30.0), Duration::from_secs_f64(1.0 / 30.0));
        assert_eq!(frame_period(0.0), Duration::from_secs(1));
    }

    #[test]
    fn test_pipeline_publishes() {
        let pipeline = CamPipeline::start(
            Arc::new(BlackCamera),
            BorderParams::default(),
            CamPipelineParams::default(),
        )
        .unwrap();
        let shared = pipeline.shared();

        let start = Instant::now();
        while shared.load().0 < 0.0 && start.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(shared.load(), (5.0, -1.0, -1.0));

        pipeline.shutdown();
        assert_eq!(shared.load(), (-1.0, -1.0, -1.0));
    }
}
