//! Parameters structure for the sensor aggregator

use serde::Deserialize;

/// Parameters for the sensor aggregator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SensAggParams {
    /// The camera front distance is only trusted while the inside wall is at least this far away.
    ///
    /// Units: centimetres
    pub front_trust_inside_open_cm: f64,

    /// Number of reads made by the boot validation
    pub validation_checks: usize,

    /// Validation fails if more than this many reads have every distance at the sensor maximum
    pub stall_limit: usize,

    /// Time between validation reads.
    ///
    /// Units: seconds
    pub validation_period_s: f64,
}

impl Default for SensAggParams {
    fn default() -> Self {
        Self {
            front_trust_inside_open_cm: 65.0,
            validation_checks: 10,
            stall_limit: 5,
            validation_period_s: 0.05,
        }
    }
}
