//! # Camera border estimator
//!
//! Uses the forward camera as a coarse rangefinder. The mat's border walls are black, so the
//! fraction of dark pixels in the floor half of the frame grows as a wall approaches. The floor
//! half is split into left, centre and right sections and each dark fraction is mapped to a
//! distance band.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use image::RgbImage;
use serde::Serialize;

use super::BorderParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Dark fractions and coarse distances from one frame. Distances of `-1` mean no estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BorderMeasurement {
    /// Units: percent
    pub center_pct: f64,
    pub left_pct: f64,
    pub right_pct: f64,

    /// Units: centimetres
    pub center_cm: f64,
    pub left_cm: f64,
    pub right_cm: f64,
}

/// Stateful estimator, owning a mask buffer reused between frames of the same size.
pub struct BorderEstimator {
    params: BorderParams,
    mask: Vec<bool>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl BorderEstimator {
    pub fn new(params: BorderParams) -> Self {
        Self {
            params,
            mask: Vec::new(),
        }
    }

    /// Preallocate the mask for frames of the given size.
    pub fn with_frame_size(params: BorderParams, width: u32, height: u32) -> Self {
        let mut est = Self::new(params);
        est.mask = vec![false; (width * (height / 2)) as usize];
        est
    }

    pub fn measure_border(&mut self, frame: &RgbImage) -> BorderMeasurement {
        let (w, h) = frame.dimensions();
        let roi_h = h / 2;

        if w < 4 || roi_h == 0 {
            return BorderMeasurement::none();
        }

        // Upside down cameras see the floor in the top half
        let row_start = if self.params.upside_down { 0 } else { h - roi_h };

        let len = (w * roi_h) as usize;
        if self.mask.len() != len {
            self.mask.resize(len, false);
        }

        let thresh = self.params.dark_threshold;
        for y in 0..roi_h {
            for x in 0..w {
                let p = frame.get_pixel(x, row_start + y);
                self.mask[(y * w + x) as usize] = p[0] < thresh && p[1] < thresh && p[2] < thresh;
            }
        }

        let q = w / 4;
        let mut left_pct = self.section_pct(w, roi_h, 0, q);
        let center_pct = self.section_pct(w, roi_h, q, 3 * q);
        let mut right_pct = self.section_pct(w, roi_h, 3 * q, w);

        if self.params.upside_down {
            std::mem::swap(&mut left_pct, &mut right_pct);
        }

        let (center_cm, left_cm, right_cm) = if center_pct > self.params.center_priority_pct {
            (self.pct_to_distance(center_pct), -1.0, -1.0)
        } else {
            (
                -1.0,
                self.pct_to_distance(left_pct),
                self.pct_to_distance(right_pct),
            )
        };

        BorderMeasurement {
            center_pct,
            left_pct,
            right_pct,
            center_cm,
            left_cm,
            right_cm,
        }
    }

    /// Map a dark fraction to a distance band, `-1` if it is below every threshold.
    pub fn pct_to_distance(&self, pct: f64) -> f64 {
        self.params
            .pct_to_distance
            .iter()
            .find(|(thresh, _)| pct > *thresh)
            .map(|(_, d)| *d)
            .unwrap_or(-1.0)
    }

    /// Percentage of dark pixels in columns `[x0, x1)` of the mask.
    fn section_pct(&self, w: u32, roi_h: u32, x0: u32, x1: u32) -> f64 {
        if x1 <= x0 {
            return 0.0;
        }

        let mut dark = 0usize;
        for y in 0..roi_h {
            let row = (y * w) as usize;
            dark += self.mask[row + x0 as usize..row + x1 as usize]
                .iter()
                .filter(|d| **d)
                .count();
        }

        100.0 * dark as f64 / ((x1 - x0) * roi_h) as f64
    }
}

impl BorderMeasurement {
    pub fn none() -> Self {
        Self {
            center_pct: 0.0,
            left_pct: 0.0,
            right_pct: 0.0,
            center_cm: -1.0,
            left_cm: -1.0,
            right_cm: -1.0,
        }
    }

    pub fn any_valid(&self) -> bool {
        self.center_cm > 0.0 || self.left_cm > 0.0 || self.right_cm > 0.0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use image::Rgb;

    const W: u32 = 40;
    const H: u32 = 20;

    /// A white frame with the given columns of the bottom half painted black.
    fn frame(dark_cols: std::ops::Range<u32>, bottom: bool) -> RgbImage {
        let mut img = RgbImage::from_pixel(W, H, Rgb([220, 220, 220]));
        let rows = if bottom { H / 2..H } else { 0..H / 2 };
        for y in rows {
            for x in dark_cols.clone() {
                img.put_pixel(x, y, Rgb([10, 20, 30]));
            }
        }
        img
    }

    #[test]
    fn test_center_wins() {
        let mut est = BorderEstimator::with_frame_size(BorderParams::default(), W, H);

        // Whole floor dark
        let m = est.measure_border(&frame(0..W, true));
        assert_eq!(m.center_pct, 100.0);
        assert_eq!(m.center_cm, 5.0);
        assert_eq!(m.left_cm, -1.0);
        assert_eq!(m.right_cm, -1.0);
    }

    #[test]
    fn test_sides_reported() {
        let mut est = BorderEstimator::new(BorderParams::default());

        // Left quarter dark only
        let m = est.measure_border(&frame(0..W / 4, true));
        assert_eq!(m.left_pct, 100.0);
        assert_eq!(m.center_pct, 0.0);
        assert_eq!(m.left_cm, 5.0);
        assert_eq!(m.right_cm, -1.0);
        assert_eq!(m.center_cm, -1.0);
        assert!(m.any_valid());

        // Dark pixels in the top half are ignored
        let m = est.measure_border(&frame(0..W, false));
        assert!(!m.any_valid());
    }

    #[test]
    fn test_upside_down() {
        let params = BorderParams {
            upside_down: true,
            ..Default::default()
        };
        let mut est = BorderEstimator::new(params);

        // Dark on the image's left of the top half is the robot's right
        let m = est.measure_border(&frame(0..W / 4, false));
        assert_eq!(m.right_pct, 100.0);
        assert_eq!(m.left_pct, 0.0);
        assert_eq!(m.right_cm, 5.0);
    }

    #[test]
    fn test_distance_monotonic() {
        let est = BorderEstimator::new(BorderParams::default());

        assert_eq!(est.pct_to_distance(96.0), 5.0);
        assert_eq!(est.pct_to_distance(90.0), 10.0);
        assert_eq!(est.pct_to_distance(80.0), 20.0);
        assert_eq!(est.pct_to_distance(60.0), 30.0);
        assert_eq!(est.pct_to_distance(50.0), -1.0);

        // Non-increasing over the valid bands
        let mut prev = f64::INFINITY;
        for pct in (51..=100).map(|p| p as f64) {
            let d = est.pct_to_distance(pct);
            assert!(d <= prev);
            prev = d;
        }
    }
}
