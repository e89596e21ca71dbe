//! # Camera Equipment Module

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use image::RgbImage;

use super::EqptError;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A frame acquired from the forward camera.
#[derive(Clone)]
pub struct CamImage {
    /// UTC timestamp at which the frame was acquired
    pub timestamp: DateTime<Utc>,

    /// The image itself, RGB order
    pub image: RgbImage,
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// The forward-facing camera.
pub trait Camera: Send + Sync {
    /// Acquire a single frame, blocking until it is available.
    fn capture_frame(&self) -> Result<CamImage, EqptError>;
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CamImage {
    /// Wrap an image acquired now.
    pub fn now(image: RgbImage) -> Self {
        Self {
            timestamp: Utc::now(),
            image,
        }
    }
}
