//! # PID controller
//!
//! Time-aware PID used by every steering helper. The output is limited to `±max_out` and, when
//! the integral gain is nonzero, the integral is limited so that its contribution alone can never
//! exceed that range.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;
use std::time::Instant;

use util::maths::clamp;

use super::WalkCtrlParams;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A PID controller
#[derive(Debug, Serialize, Clone)]
pub struct PidController {
    /// Previous instant that the error was passed in
    #[serde(skip)]
    prev_time: Option<Instant>,

    /// Proportional gain
    k_p: f64,

    /// Integral gain
    k_i: f64,

    /// Derivative gain
    k_d: f64,

    /// Output limit
    max_out: f64,

    /// Time step limits
    min_dt_s: f64,
    max_dt_s: f64,

    /// Previous error
    prev_error: Option<f64>,

    /// The integral accumulation
    integral: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidController {
    /// Create a new controller with the given gains and the limits from the parameters.
    pub fn new(k_p: f64, k_i: f64, k_d: f64, params: &WalkCtrlParams) -> Self {
        Self {
            k_p,
            k_i,
            k_d,
            max_out: params.max_angle_deg.abs(),
            min_dt_s: params.min_dt_s,
            max_dt_s: params.max_dt_s,
            integral: 0f64,
            prev_time: None,
            prev_error: None,
        }
    }

    /// The controller with the standard steering gains.
    pub fn from_params(params: &WalkCtrlParams) -> Self {
        Self::new(params.k_p, params.k_i, params.k_d, params)
    }

    /// Get the value of the controller for the given error.
    ///
    /// This function is time-aware so there is no need to pass in a delta-time value.
    pub fn get(&mut self, error: f64) -> f64 {
        let curr_time = Instant::now();

        let dt = self
            .prev_time
            .map(|t0| curr_time.saturating_duration_since(t0).as_secs_f64());

        self.prev_time = Some(curr_time);
        self.step(error, dt)
    }

    /// Get the value of the controller for an explicit time step, `None` for the first sample.
    pub fn step(&mut self, error: f64, dt: Option<f64>) -> f64 {
        let dt = dt.map(|t| clamp(&t, &self.min_dt_s, &self.max_dt_s));

        // No integral or derivative without a time difference, either would spike
        if let Some(t) = dt {
            self.integral += error * t;

            if self.k_i != 0.0 {
                let limit = self.max_out / self.k_i.abs();
                self.integral = clamp(&self.integral, &-limit, &limit);
            }
        }

        let deriv = match (self.prev_error, dt) {
            (Some(e), Some(t)) => (error - e) / t,
            _ => 0f64,
        };

        let out = self.k_p * error + self.k_i * self.integral + self.k_d * deriv;

        self.prev_error = Some(error);

        clamp(&out, &-self.max_out, &self.max_out)
    }

    /// Zero the integrator and forget the derivative history.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = None;
        self.prev_time = None;
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_proportional_first_step() {
        let p = WalkCtrlParams::default();
        let mut pid = PidController::from_params(&p);

        assert!((pid.step(2.0, None) - -8.0).abs() < 1e-9);
        assert!((pid.step(-20.0, Some(0.01)).abs() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_derivative_dt_clamped() {
        let p = WalkCtrlParams::default();
        let mut pid = PidController::new(0.0, 0.0, 1.0, &p);

        pid.step(0.0, None);

        // dt of 0 is raised to 1 ms: 0.01 / 0.001 = 10
        assert!((pid.step(0.01, Some(0.0)) - 10.0).abs() < 1e-9);

        // dt of 1 s is cut to 100 ms
        assert!((pid.step(0.11, Some(1.0)) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_anti_windup() {
        let p = WalkCtrlParams::default();
        let mut pid = PidController::new(0.0, 2.0, 0.0, &p);

        for _ in 0..1000 {
            pid.step(100.0, Some(0.1));
        }

        assert!((pid.integral() - 15.0).abs() < 1e-9);
        assert!((pid.step(100.0, Some(0.1)) - 30.0).abs() < 1e-9);

        pid.reset();
        assert_eq!(pid.integral(), 0.0);
    }
}
