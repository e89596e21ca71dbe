//! # Equipment Interface
//!
//! This module defines the traits implemented by each piece of equipment on the robot, and the
//! [`Hardware`] bundle handed to the navigation core at boot.
//!
//! All traits take `&self` and are `Send + Sync`: implementations are shared between the walker
//! and the background threads, and must do their own locking around bus access.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod cam;
pub mod color;
pub mod drive;
pub mod imu;
pub mod panel;
pub mod range;

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::sync::Arc;
use thiserror::Error;

pub use cam::{CamImage, Camera};
pub use color::{ColorSensor, MatColor, Rgbi};
pub use drive::DriveBase;
pub use imu::Imu;
pub use panel::{BeepPattern, LedColour, Panel};
pub use range::RangeFinders;

// -----------------------------------------------------------------------------------------------
// STRUCTS
// -----------------------------------------------------------------------------------------------

/// All equipment used by the navigation core.
///
/// The camera is optional, without it the core runs on rangefinders alone.
#[derive(Clone)]
pub struct Hardware {
    pub range: Arc<dyn RangeFinders>,
    pub imu: Arc<dyn Imu>,
    pub drive: Arc<dyn DriveBase>,
    pub color: Arc<dyn ColorSensor>,
    pub camera: Option<Arc<dyn Camera>>,
    pub panel: Arc<dyn Panel>,
}

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

/// Errors raised by equipment implementations.
#[derive(Debug, Error)]
pub enum EqptError {
    #[error("The {0} has not been initialised")]
    NotInitialised(&'static str),

    #[error("The {0} is not fitted to this robot")]
    Unavailable(&'static str),

    #[error("Failed to read the {device}: {reason}")]
    ReadFailed {
        device: &'static str,
        reason: String,
    },

    #[error("The {device} rejected a command: {reason}")]
    CommandFailed {
        device: &'static str,
        reason: String,
    },
}
