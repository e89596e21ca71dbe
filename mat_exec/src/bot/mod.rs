//! # Bot
//!
//! Boot and shutdown lifecycle. [`Bot::init`] builds the components on top of the robot's
//! [`Hardware`] in dependency order, [`Bot::run`] drives the walker to completion, and
//! [`Bot::shutdown`] stops everything in the reverse order.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod button;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{error, info, warn};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use eqpt_if::eqpt::{BeepPattern, Hardware, LedColour};
use util::sync::StopEvent;

use crate::{
    cam::{BorderShared, CamPipeline},
    mat_intel::{MatIntel, MatIntelError},
    meas_log::{MeasLogError, MeasLogger},
    move_ctrl::{MoveCtrl, MoveCtrlError},
    orient::{OrientError, Orientation},
    params::BotParams,
    positioner::Positioner,
    sens_agg::{SensAggError, SensorAggregator},
    walker::{WalkSummary, Walker, WalkerError},
};

pub use button::ButtonWatcher;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct Bot {
    hw: Hardware,
    params: BotParams,

    orient: Arc<Orientation>,
    sens: Arc<SensorAggregator>,
    intel: Arc<MatIntel>,
    move_ctrl: Arc<MoveCtrl>,
    cam: Option<CamPipeline>,
    meas_log: Option<MeasLogger>,
    walker: Walker,

    stop: StopEvent,
    shut_down: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum BotInitError {
    #[error("A run needs at least one lap")]
    NoLaps,

    #[error("Could not initialise the orientation estimator: {0}")]
    OrientError(#[from] OrientError),

    #[error("Could not initialise the mat intelligence: {0}")]
    MatIntelError(#[from] MatIntelError),

    #[error("Could not initialise the movement controller: {0}")]
    MoveCtrlError(#[from] MoveCtrlError),

    #[error("Could not start the camera pipeline: {0}")]
    CamPipelineError(std::io::Error),

    #[error("Could not start the measurement log: {0}")]
    MeasLogError(#[from] MeasLogError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Bot {
    /// Build every component for a run of `laps` laps.
    pub fn init(hw: Hardware, params: BotParams, laps: u32) -> Result<Self, BotInitError> {
        if laps == 0 {
            return Err(BotInitError::NoLaps);
        }

        info!("Initialising for {} lap(s)", laps);

        let orient = Arc::new(Orientation::new(hw.imu.clone(), params.orient.clone())?);
        orient.start()?;
        info!("Orientation estimator ready ({:?})", orient.calib_status());

        let border = hw.camera.as_ref().map(|_| Arc::new(BorderShared::new()));
        let sens = Arc::new(SensorAggregator::new(
            params.sens_agg.clone(),
            hw.range.clone(),
            hw.drive.clone(),
            orient.clone(),
            border.clone(),
        ));

        let intel = Arc::new(MatIntel::new(params.mat_intel.clone(), laps)?);
        let move_ctrl = Arc::new(MoveCtrl::new(hw.drive.clone(), params.move_ctrl.clone())?);

        let cam = match (hw.camera.clone(), border) {
            (Some(camera), Some(shared)) => Some(
                CamPipeline::start_with(
                    shared,
                    camera,
                    params.border.clone(),
                    params.cam_pipeline.clone(),
                )
                .map_err(BotInitError::CamPipelineError)?,
            ),
            _ => {
                info!("No camera fitted, running on rangefinders only");
                None
            }
        };

        let stop = StopEvent::new();
        let walker = Walker::new(
            params.walker.clone(),
            params.walk_ctrl.clone(),
            Positioner::new(params.positioner.clone(), hw.range.max_range_cm()),
            hw.color.clone(),
            orient.clone(),
            sens.clone(),
            intel.clone(),
            move_ctrl.clone(),
            stop.clone(),
        );

        info!("Initialisation complete");

        Ok(Self {
            hw,
            params,
            orient,
            sens,
            intel,
            move_ctrl,
            cam,
            meas_log: None,
            walker,
            stop,
            shut_down: false,
        })
    }

    /// Start the measurement log at `path`, if enabled.
    pub fn start_meas_log<P: AsRef<Path>>(&mut self, path: P) -> Result<(), BotInitError> {
        if !self.params.meas_log.enabled || self.meas_log.is_some() {
            return Ok(());
        }

        self.meas_log = Some(MeasLogger::start(
            &self.params.meas_log,
            path,
            self.sens.clone(),
            self.move_ctrl.clone(),
            self.walker.status(),
        )?);

        Ok(())
    }

    /// Boot check of the distance sensors.
    pub fn validate(&self) -> Result<(), SensAggError> {
        self.sens.validate_sensors()
    }

    /// Run the walker until every lap is done or the button is pressed.
    pub fn run(&mut self) -> Result<WalkSummary, WalkerError> {
        let button = match ButtonWatcher::start(
            self.hw.panel.clone(),
            self.stop.clone(),
            Duration::from_secs_f64(self.params.panel.launch_grace_s),
            Duration::from_secs_f64(self.params.panel.button_poll_s),
        ) {
            Ok(b) => Some(b),
            Err(e) => {
                warn!(
                    "Button watcher not started, the run cannot be stopped from the panel: {}",
                    e
                );
                None
            }
        };

        self.hw.panel.set_led(LedColour::Green);
        self.hw.panel.beep(BeepPattern::Ready);

        let result = self.walker.run();

        if let Some(ref b) = button {
            if b.shutdown_requested() {
                info!("Run stopped from the panel");
            }
            b.shutdown();
        }

        if let Err(e) = self.move_ctrl.stop_walking() {
            error!("Could not stop the drive: {}", e);
        }

        match result {
            Ok(_) => {
                self.hw.panel.set_led(LedColour::Off);
                self.hw.panel.beep(BeepPattern::Done);
            }
            Err(WalkerError::Stopped) => self.hw.panel.set_led(LedColour::Yellow),
            Err(_) => self.fail(),
        }

        result
    }

    /// Show the fatal error indication.
    pub fn fail(&self) {
        self.hw.panel.set_led(LedColour::Red);
        self.hw.panel.beep(BeepPattern::Fatal);
    }

    /// Stop every component, in the reverse order of [`Bot::init`].
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        info!("Shutting down");

        self.stop.set();
        self.move_ctrl.shutdown();

        if let Some(ref cam) = self.cam {
            cam.shutdown();
        }
        if let Some(ref log) = self.meas_log {
            log.shutdown();
        }

        self.intel.shutdown();
        self.orient.shutdown();

        info!("Shutdown complete");
    }

    pub fn walker(&mut self) -> &mut Walker {
        &mut self.walker
    }

    pub fn stop_event(&self) -> StopEvent {
        self.stop.clone()
    }

    pub fn intel(&self) -> &Arc<MatIntel> {
        &self.intel
    }

    pub fn move_ctrl(&self) -> &Arc<MoveCtrl> {
        &self.move_ctrl
    }

    pub fn sens(&self) -> &Arc<SensorAggregator> {
        &self.sens
    }

    pub fn orient(&self) -> &Arc<Orientation> {
        &self.orient
    }
}

impl Drop for Bot {
    fn drop(&mut self) {
        self.shutdown();
    }
}
