//! # Mat Executable Parameters
//!
//! This module aggregates the parameters of every component of the executable, loaded from
//! `mat_exec.toml`. Each table is optional and missing fields take their defaults.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use crate::{
    cam::{BorderParams, CamPipelineParams},
    mat_intel::MatIntelParams,
    meas_log::MeasLogParams,
    move_ctrl::MoveParams,
    orient::OrientParams,
    positioner::PositionerParams,
    sens_agg::SensAggParams,
    sim::SimParams,
    walk_ctrl::WalkCtrlParams,
    walker::WalkerParams,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BotParams {
    pub orient: OrientParams,
    pub sens_agg: SensAggParams,
    pub mat_intel: MatIntelParams,
    pub border: BorderParams,
    pub cam_pipeline: CamPipelineParams,
    pub move_ctrl: MoveParams,
    pub walk_ctrl: WalkCtrlParams,
    pub positioner: PositionerParams,
    pub walker: WalkerParams,
    pub meas_log: MeasLogParams,
    pub panel: PanelParams,
    pub sim: SimParams,
}

/// Start/stop button handling.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PanelParams {
    /// Presses this soon after the run starts are the launch press and are ignored.
    ///
    /// Units: seconds
    pub launch_grace_s: f64,

    /// Units: seconds
    pub button_poll_s: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for PanelParams {
    fn default() -> Self {
        Self {
            launch_grace_s: 0.5,
            button_poll_s: 0.05,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_partial_file() {
        let params: BotParams = util::params::parse(
            r#"
            [walker]
            default_speed = 60.0
            walk_back_timeout_s = 1.5

            [panel]
            launch_grace_s = 1.0
            "#,
        )
        .unwrap();

        assert_eq!(params.walker.default_speed, 60.0);
        assert_eq!(params.walker.min_speed, WalkerParams::default().min_speed);
        assert_eq!(params.walker.walk_back_timeout_s, 1.5);
        assert_eq!(WalkerParams::default().walk_back_timeout_s, 3.0);
        assert_eq!(params.panel.launch_grace_s, 1.0);
        assert_eq!(params.panel.button_poll_s, 0.05);
        assert_eq!(params.sim.mat_size_cm, 300.0);
    }
}
