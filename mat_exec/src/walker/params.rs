//! Parameters structure for the Walker

use serde::Deserialize;

/// Speeds, thresholds and limits of the walker state machine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WalkerParams {
    // ---- SPEEDS ----
    /// Cruising speed along a side
    pub default_speed: f64,

    /// Slowest useful speed, used near walls and during turns
    pub min_speed: f64,

    /// Speed when approaching and finishing a corner
    pub walk_to_corner_speed: f64,

    /// Walk-back runs at `min_speed` plus this
    pub walk_back_speed_offset: f64,

    /// Control loop period.
    ///
    /// Units: seconds
    pub loop_period_s: f64,

    // ---- DIRECTION DISCOVERY ----
    /// Discovery walks until the front distance drops to this, then reads the floor.
    ///
    /// Units: centimetres
    pub discovery_front_cm: f64,

    /// The colour read stops at this front distance...
    ///
    /// Units: centimetres
    pub color_read_min_front_cm: f64,

    /// ...or after this much travel.
    ///
    /// Units: centimetres
    pub color_read_max_cm: f64,

    /// Colour sampling period.
    ///
    /// Units: seconds
    pub color_sample_period_s: f64,

    // ---- WALK BACK ----
    /// Minimum front clearance before walking back.
    ///
    /// Units: centimetres
    pub walk_back_front_cm: f64,

    /// Minimum inside wall clearance before walking back.
    ///
    /// Units: centimetres
    pub walk_back_inside_cm: f64,

    /// Minimum outside wall clearance before walking back.
    ///
    /// Units: centimetres
    pub walk_back_outside_cm: f64,

    /// Longest walk-back.
    ///
    /// Units: centimetres
    pub walk_back_max_cm: f64,

    /// Longest time a walk-back may take, on top of its distance limit.
    ///
    /// Units: seconds
    pub walk_back_timeout_s: f64,

    // ---- SIDES ----
    /// A side is never left before this much travel.
    ///
    /// Units: centimetres
    pub side_min_travel_cm: f64,

    /// The side ends regardless of travel at this front distance.
    ///
    /// Units: centimetres
    pub side_hard_stop_front_cm: f64,

    /// Speed drops to `min_speed` within this margin of the side's front target.
    ///
    /// Units: centimetres
    pub side_slow_margin_cm: f64,

    /// Speed drops to `min_speed` after a steering command larger than this.
    ///
    /// Units: degrees
    pub side_slow_turn_deg: f64,

    /// Either wall this close for longer than `side_near_wall_time_s` aborts the attempt.
    ///
    /// Units: centimetres
    pub side_near_wall_cm: f64,
    pub side_near_wall_time_s: f64,

    /// Heading drift that aborts the attempt once `side_drift_after_cm` has been travelled.
    ///
    /// Units: degrees and centimetres
    pub side_drift_deg: f64,
    pub side_drift_after_cm: f64,

    /// A new minimum width this far below the targets triggers a re-plan.
    ///
    /// Units: centimetres
    pub side_replan_delta_cm: f64,

    /// A drop in width larger than this between two reads triggers a re-plan.
    ///
    /// Units: centimetres
    pub side_total_drop_cm: f64,

    /// Attempts at a side before moving on
    pub side_retries: usize,

    /// Per-call steering change limit while following a side.
    ///
    /// Units: degrees
    pub side_steer_max_delta_deg: f64,

    /// Steering beyond this is pulled back at the start of a side.
    ///
    /// Units: degrees
    pub side_normalise_steering_deg: f64,

    /// Gap between the learned targets and the minimum bands of the gyro walk after lap 1.
    ///
    /// Units: centimetres
    pub gyro_walk_band_margin_cm: f64,

    /// Zero the gyro at the start of every side
    pub reset_gyro_at_side_start: bool,

    /// Longest time spent on a single side attempt.
    ///
    /// Units: seconds
    pub side_timeout_s: f64,

    // ---- CORNERS ----
    /// The corner approach ends once the side walls open up beyond this total.
    ///
    /// Units: centimetres
    pub corner_open_total_cm: f64,

    /// Longest corner approach.
    ///
    /// Units: centimetres
    pub walk_to_corner_max_cm: f64,

    /// Target given to the wall ignored during the approach.
    ///
    /// Units: centimetres
    pub ignored_wall_cm: f64,

    /// Normal fixed turn angle.
    ///
    /// Units: degrees
    pub corner_turn_angle_deg: f64,

    /// Front or inside distances at or below these at the corner start tighten the turn.
    ///
    /// Units: centimetres
    pub corner_front_proximity_cm: f64,
    pub corner_inside_proximity_cm: f64,

    /// Heading overshoot added when the turn is tightened, and its value for an unknown
    /// direction.
    ///
    /// Units: degrees
    pub corner_proximity_extra_deg: f64,
    pub corner_unknown_extra_deg: f64,

    /// The new-minimum listener is registered once the remaining turn is below this fraction of
    /// a quarter turn.
    pub corner_callback_fraction: f64,

    /// The turn is complete within this of the target heading.
    ///
    /// Units: degrees
    pub corner_exit_yaw_deg: f64,

    /// Hitting the front target with more than this left to turn triggers a walk-back and a
    /// tighter retry.
    ///
    /// Units: degrees
    pub corner_early_exit_yaw_deg: f64,

    /// Added to the fixed turn angle on that retry.
    ///
    /// Units: degrees
    pub corner_retry_extra_deg: f64,

    /// Minimum wall bands during a turn.
    ///
    /// Units: centimetres
    pub corner_min_wall_cm: f64,

    /// Longest turn, by distance and time.
    ///
    /// Units: centimetres and seconds
    pub corner_max_cm: f64,
    pub corner_timeout_s: f64,
}

impl Default for WalkerParams {
    fn default() -> Self {
        Self {
            default_speed: 50.0,
            min_speed: 35.0,
            walk_to_corner_speed: 40.0,
            walk_back_speed_offset: 10.0,
            loop_period_s: 0.01,

            discovery_front_cm: 120.0,
            color_read_min_front_cm: 40.0,
            color_read_max_cm: 120.0,
            color_sample_period_s: 0.02,

            walk_back_front_cm: 20.0,
            walk_back_inside_cm: 1.0,
            walk_back_outside_cm: 20.0,
            walk_back_max_cm: 15.0,
            walk_back_timeout_s: 3.0,

            side_min_travel_cm: 100.0,
            side_hard_stop_front_cm: 30.0,
            side_slow_margin_cm: 10.0,
            side_slow_turn_deg: 2.0,
            side_near_wall_cm: 15.0,
            side_near_wall_time_s: 0.5,
            side_drift_deg: 10.0,
            side_drift_after_cm: 20.0,
            side_replan_delta_cm: 2.0,
            side_total_drop_cm: 10.0,
            side_retries: 3,
            side_steer_max_delta_deg: 8.0,
            side_normalise_steering_deg: 5.0,
            gyro_walk_band_margin_cm: 20.0,
            reset_gyro_at_side_start: false,
            side_timeout_s: 20.0,

            corner_open_total_cm: 150.0,
            walk_to_corner_max_cm: 100.0,
            ignored_wall_cm: 200.0,
            corner_turn_angle_deg: 20.0,
            corner_front_proximity_cm: 30.0,
            corner_inside_proximity_cm: 20.0,
            corner_proximity_extra_deg: 4.0,
            corner_unknown_extra_deg: 2.0,
            corner_callback_fraction: 2.0 / 3.0,
            corner_exit_yaw_deg: 1.0,
            corner_early_exit_yaw_deg: 10.0,
            corner_retry_extra_deg: 5.0,
            corner_min_wall_cm: 10.0,
            corner_max_cm: 100.0,
            corner_timeout_s: 10.0,
        }
    }
}
