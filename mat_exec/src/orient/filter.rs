//! # Orientation filter
//!
//! The attitude estimation maths, free of any threading or I/O so that it can be stepped by hand.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector3;
use util::maths::{ang_diff_deg, circular_lpf_deg, wrap_deg};

use super::OrientParams;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A one dimensional Kalman smoother with a constant state model.
#[derive(Debug, Clone)]
pub struct ScalarKalman {
    process_var: f64,
    meas_var: f64,
    estimate: Option<f64>,
    error_var: f64,
}

/// Output of a single filter step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FilterOutput {
    /// Units: degrees
    pub roll_deg: f64,

    /// Units: degrees
    pub pitch_deg: f64,

    /// Yaw relative to the zero reference, in `[-180, 180)`.
    ///
    /// Units: degrees
    pub yaw_deg: f64,

    /// True if the sample counted towards the stationary bias estimate
    pub stationary: bool,
}

/// Roll/pitch/yaw estimator.
#[derive(Debug, Clone)]
pub struct OrientFilter {
    params: OrientParams,

    roll_kf: ScalarKalman,
    pitch_kf: ScalarKalman,

    roll_deg: f64,
    pitch_deg: f64,

    /// Yaw in the filter's own frame, wrapped
    yaw_abs_deg: f64,

    /// Value of `yaw_abs_deg` which reads as zero
    yaw_ref_deg: f64,

    zero_pending: bool,
    seeded: bool,

    /// Units: radians/second
    gyro_bias_rads: Vector3<f64>,

    mag_bias: Vector3<f64>,
    mag_declination_deg: f64,

    /// Low passed magnetic heading
    mag_heading_deg: Option<f64>,

    /// Difference between the magnetic heading and `yaw_abs_deg`, captured on the first heading
    mag_offset_deg: Option<f64>,

    still_count: usize,
    still_sum_gz: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ScalarKalman {
    pub fn new(process_var: f64, meas_var: f64) -> Self {
        Self {
            process_var,
            meas_var,
            estimate: None,
            error_var: meas_var,
        }
    }

    /// Fold in a new measurement and return the smoothed value.
    pub fn update(&mut self, measurement: f64) -> f64 {
        let prev = match self.estimate {
            Some(x) => x,
            None => {
                self.estimate = Some(measurement);
                self.error_var = self.meas_var;
                return measurement;
            }
        };

        let p = self.error_var + self.process_var;
        let gain = p / (p + self.meas_var);
        let x = prev + gain * (measurement - prev);

        self.error_var = (1.0 - gain) * p;
        self.estimate = Some(x);

        x
    }

    pub fn reset(&mut self) {
        self.estimate = None;
        self.error_var = self.meas_var;
    }
}

impl OrientFilter {
    pub fn new(params: OrientParams) -> Self {
        Self {
            roll_kf: ScalarKalman::new(params.kalman_process_var, params.kalman_meas_var),
            pitch_kf: ScalarKalman::new(params.kalman_process_var, params.kalman_meas_var),
            params,
            roll_deg: 0.0,
            pitch_deg: 0.0,
            yaw_abs_deg: 0.0,
            yaw_ref_deg: 0.0,
            zero_pending: false,
            seeded: false,
            gyro_bias_rads: Vector3::zeros(),
            mag_bias: Vector3::zeros(),
            mag_declination_deg: 0.0,
            mag_heading_deg: None,
            mag_offset_deg: None,
            still_count: 0,
            still_sum_gz: 0.0,
        }
    }

    /// Fuse one sample.
    ///
    /// `accel` is in g, `gyro` in radians/second, `mag` (if any) in microtesla. `dt_s` must
    /// already be clamped by the caller.
    pub fn update(
        &mut self,
        accel: Vector3<f64>,
        gyro: Vector3<f64>,
        mag: Option<Vector3<f64>>,
        dt_s: f64,
    ) -> FilterOutput {
        // ---- ROLL/PITCH ----

        let accel_roll = accel.y.atan2(accel.z).to_degrees();
        let accel_pitch = (-accel.x)
            .atan2((accel.y * accel.y + accel.z * accel.z).sqrt())
            .to_degrees();

        let roll_meas = self.roll_kf.update(accel_roll);
        let pitch_meas = self.pitch_kf.update(accel_pitch);

        let rate = gyro - self.gyro_bias_rads;
        let alpha = self.params.alpha_roll_pitch;

        if self.seeded {
            self.roll_deg =
                alpha * (self.roll_deg + rate.x.to_degrees() * dt_s) + (1.0 - alpha) * roll_meas;
            self.pitch_deg =
                alpha * (self.pitch_deg + rate.y.to_degrees() * dt_s) + (1.0 - alpha) * pitch_meas;
        } else {
            self.roll_deg = roll_meas;
            self.pitch_deg = pitch_meas;
            self.seeded = true;
        }

        // ---- STATIONARY BIAS REFINEMENT ----

        let stationary = gyro
            .iter()
            .all(|g| g.abs() < self.params.stationary_rate_rads);

        if stationary {
            self.still_count += 1;
            self.still_sum_gz += gyro.z;

            if self.still_count >= self.params.stationary_samples.max(1) {
                let mean = self.still_sum_gz / self.still_count as f64;
                let gain = self.params.bias_refine_gain;
                self.gyro_bias_rads.z = (1.0 - gain) * self.gyro_bias_rads.z + gain * mean;
                self.still_count = 0;
                self.still_sum_gz = 0.0;
            }
        } else {
            self.still_count = 0;
            self.still_sum_gz = 0.0;
        }

        // ---- YAW ----

        self.yaw_abs_deg = wrap_deg(self.yaw_abs_deg + rate.z.to_degrees() * dt_s);

        if let Some(m) = mag {
            let heading = self.mag_heading(m);
            let heading = match self.mag_heading_deg {
                Some(prev) => circular_lpf_deg(prev, heading, self.params.mag_lpf_alpha),
                None => heading,
            };
            self.mag_heading_deg = Some(heading);

            match self.mag_offset_deg {
                None => self.mag_offset_deg = Some(ang_diff_deg(heading, self.yaw_abs_deg)),
                Some(offset) => {
                    let alpha_yaw = if stationary {
                        self.params.mag_alpha_stationary
                    } else {
                        self.params.mag_alpha_moving
                    };
                    let weight = (1.0 - alpha_yaw) * self.params.mag_sensitivity;
                    let diff = ang_diff_deg(heading - offset, self.yaw_abs_deg);

                    self.yaw_abs_deg = wrap_deg(self.yaw_abs_deg + weight * diff);
                }
            }
        }

        if self.zero_pending {
            self.yaw_ref_deg = self.yaw_abs_deg;
            self.zero_pending = false;
        }

        FilterOutput {
            roll_deg: self.roll_deg,
            pitch_deg: self.pitch_deg,
            yaw_deg: self.yaw_deg(),
            stationary,
        }
    }

    /// Yaw relative to the zero reference.
    pub fn yaw_deg(&self) -> f64 {
        ang_diff_deg(self.yaw_abs_deg, self.yaw_ref_deg)
    }

    /// Make the current yaw the zero reference.
    pub fn reset_yaw_immediate(&mut self) {
        self.yaw_ref_deg = self.yaw_abs_deg;
        self.zero_pending = false;
    }

    /// Make the yaw produced by the next update the zero reference.
    pub fn request_zero(&mut self) {
        self.zero_pending = true;
    }

    pub fn zero_pending(&self) -> bool {
        self.zero_pending
    }

    /// Re-seed every filter state. Calibration values are kept.
    pub fn reset_full(&mut self) {
        self.roll_kf.reset();
        self.pitch_kf.reset();
        self.roll_deg = 0.0;
        self.pitch_deg = 0.0;
        self.yaw_abs_deg = 0.0;
        self.yaw_ref_deg = 0.0;
        self.zero_pending = false;
        self.seeded = false;
        self.mag_heading_deg = None;
        self.mag_offset_deg = None;
        self.still_count = 0;
        self.still_sum_gz = 0.0;
    }

    pub fn gyro_bias_rads(&self) -> Vector3<f64> {
        self.gyro_bias_rads
    }

    pub fn set_gyro_bias_rads(&mut self, bias: Vector3<f64>) {
        self.gyro_bias_rads = bias;
    }

    pub fn mag_calibration(&self) -> (Vector3<f64>, f64) {
        (self.mag_bias, self.mag_declination_deg)
    }

    pub fn set_mag_calibration(&mut self, bias: Vector3<f64>, declination_deg: f64) {
        self.mag_bias = bias;
        self.mag_declination_deg = declination_deg;
    }

    /// Tilt compensated magnetic heading, clockwise from magnetic north plus declination.
    fn mag_heading(&self, raw: Vector3<f64>) -> f64 {
        let m = raw - self.mag_bias;
        let axis = |i: usize| {
            self.params.mag_axis_sign[i] * m[self.params.mag_axis_map[i].min(2)]
        };
        let (mx, my, mz) = (axis(0), axis(1), axis(2));

        let roll = self.roll_deg.to_radians();
        let pitch = self.pitch_deg.to_radians();

        let xh = mx * pitch.cos() + my * roll.sin() * pitch.sin() + mz * roll.cos() * pitch.sin();
        let yh = my * roll.cos() - mz * roll.sin();

        wrap_deg(yh.atan2(xh).to_degrees() + self.mag_declination_deg)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const DT: f64 = 0.01;

    fn level() -> Vector3<f64> {
        Vector3::new(0.0, 0.0, 1.0)
    }

    #[test]
    fn test_kalman_converges() {
        let mut kf = ScalarKalman::new(1e-3, 5e-2);
        assert_eq!(kf.update(10.0), 10.0);

        let mut x = 0.0;
        for _ in 0..500 {
            x = kf.update(20.0);
        }
        assert!((x - 20.0).abs() < 0.1);
    }

    #[test]
    fn test_accel_roll_pitch() {
        let mut f = OrientFilter::new(OrientParams::default());

        // Rolled 30 degrees about X
        let a = Vector3::new(0.0, 30f64.to_radians().sin(), 30f64.to_radians().cos());
        let mut out = FilterOutput::default();
        for _ in 0..200 {
            out = f.update(a, Vector3::zeros(), None, DT);
        }

        assert!((out.roll_deg - 30.0).abs() < 0.5);
        assert!(out.pitch_deg.abs() < 0.5);
    }

    #[test]
    fn test_yaw_integration_and_wrap() {
        let mut f = OrientFilter::new(OrientParams::default());

        // 90 deg/s clockwise for 2.5 s is 225 deg, which wraps to -135
        let g = Vector3::new(0.0, 0.0, 90f64.to_radians());
        for _ in 0..250 {
            f.update(level(), g, None, DT);
        }

        assert!((f.yaw_deg() + 135.0).abs() < 0.1);
    }

    #[test]
    fn test_deferred_zero() {
        let mut f = OrientFilter::new(OrientParams::default());
        let g = Vector3::new(0.0, 0.0, 1.0);

        for _ in 0..10 {
            f.update(level(), g, None, DT);
        }
        assert!(f.yaw_deg() > 5.0);

        f.request_zero();
        assert!(f.zero_pending());
        let out = f.update(level(), g, None, DT);

        assert!(!f.zero_pending());
        assert_eq!(out.yaw_deg, 0.0);

        f.update(level(), Vector3::zeros(), None, DT);
        f.reset_yaw_immediate();
        assert!(f.yaw_deg().abs() <= 0.01);
    }

    #[test]
    fn test_stationary_bias_refinement() {
        let params = OrientParams::default();
        let n = params.stationary_samples;
        let mut f = OrientFilter::new(params);

        let g = Vector3::new(0.0, 0.0, 0.01);
        for _ in 0..n {
            f.update(level(), g, None, DT);
        }

        // One refinement of 5% towards the 0.01 rad/s mean
        assert!((f.gyro_bias_rads().z - 0.0005).abs() < 1e-9);

        // Moving samples reset the run
        f.update(level(), Vector3::new(0.0, 0.0, 0.5), None, DT);
        for _ in 0..(n - 1) {
            f.update(level(), g, None, DT);
        }
        assert!((f.gyro_bias_rads().z - 0.0005).abs() < 1e-9);
    }

    #[test]
    fn test_mag_pulls_yaw() {
        let mut f = OrientFilter::new(OrientParams::default());

        // First heading only sets the offset
        let north = Vector3::new(30.0, 0.0, 0.0);
        f.update(level(), Vector3::zeros(), Some(north), DT);
        assert_eq!(f.yaw_deg(), 0.0);

        // Field now appears on the left, the robot has turned clockwise
        let east = Vector3::new(0.0, 30.0, 0.0);
        for _ in 0..500 {
            f.update(level(), Vector3::zeros(), Some(east), DT);
        }
        assert!((f.yaw_deg() - 90.0).abs() < 2.0);
    }

    #[test]
    fn test_reset_full_keeps_bias() {
        let mut f = OrientFilter::new(OrientParams::default());
        f.set_gyro_bias_rads(Vector3::new(0.0, 0.0, 0.02));
        f.update(level(), Vector3::new(0.0, 0.0, 1.0), None, DT);

        f.reset_full();

        assert_eq!(f.yaw_deg(), 0.0);
        assert_eq!(f.gyro_bias_rads().z, 0.02);
    }
}
