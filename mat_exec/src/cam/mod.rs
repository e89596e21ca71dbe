//! # Camera module
//!
//! The forward camera acts as an auxiliary rangefinder: [`BorderEstimator`] converts dark floor
//! fractions into coarse distances, [`CamPipeline`] runs it continuously in the background.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod border;
mod params;
mod pipeline;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use border::{BorderEstimator, BorderMeasurement};
pub use params::{BorderParams, CamPipelineParams};
pub use pipeline::{BorderShared, CamPipeline};
