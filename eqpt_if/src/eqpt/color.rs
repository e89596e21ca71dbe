//! # Bottom colour sensor
//!
//! The mat floor is white, with short orange and blue line segments near each corner. The line
//! reached first tells the robot which way round the mat it is travelling.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::EqptError;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Minimum clear-channel intensity for a sample to count as white paint.
const WHITE_MIN_INTENSITY: f64 = 100.0;

/// Maximum spread between the largest and smallest channel ratio of a white sample.
const WHITE_MAX_SPREAD: f64 = 0.15;

/// Minimum blue ratio of a blue sample.
const BLUE_MIN_RATIO: f64 = 0.40;

/// Minimum red ratio of an orange sample.
const ORANGE_MIN_RED_RATIO: f64 = 0.45;

/// Maximum blue ratio of an orange sample.
const ORANGE_MAX_BLUE_RATIO: f64 = 0.25;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Raw sample from an RGB + clear (intensity) colour sensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgbi {
    pub r: u16,
    pub g: u16,
    pub b: u16,
    pub i: u16,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Floor colours the robot cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatColor {
    White,
    Blue,
    Orange,
    Other,
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// The downward-looking colour sensor.
pub trait ColorSensor: Send + Sync {
    fn bottom_color_rgbi(&self) -> Result<Rgbi, EqptError>;
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MatColor {
    /// Classify a raw sample by its channel ratios.
    pub fn classify(sample: Rgbi) -> Self {
        let sum = sample.r as f64 + sample.g as f64 + sample.b as f64;
        if sum <= 0.0 {
            return MatColor::Other;
        }

        let r = sample.r as f64 / sum;
        let g = sample.g as f64 / sum;
        let b = sample.b as f64 / sum;

        if b >= BLUE_MIN_RATIO && b > r && b > g {
            return MatColor::Blue;
        }

        if r >= ORANGE_MIN_RED_RATIO && b <= ORANGE_MAX_BLUE_RATIO {
            return MatColor::Orange;
        }

        let spread = r.max(g).max(b) - r.min(g).min(b);
        if spread <= WHITE_MAX_SPREAD && sample.i as f64 >= WHITE_MIN_INTENSITY {
            return MatColor::White;
        }

        MatColor::Other
    }

    /// True for the two direction-marking line colours.
    pub fn is_line(&self) -> bool {
        matches!(self, MatColor::Blue | MatColor::Orange)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn rgbi(r: u16, g: u16, b: u16, i: u16) -> Rgbi {
        Rgbi { r, g, b, i }
    }

    #[test]
    fn test_classify() {
        assert_eq!(MatColor::classify(rgbi(200, 200, 200, 600)), MatColor::White);
        assert_eq!(MatColor::classify(rgbi(220, 110, 40, 370)), MatColor::Orange);
        assert_eq!(MatColor::classify(rgbi(40, 70, 180, 290)), MatColor::Blue);
        assert_eq!(MatColor::classify(rgbi(0, 0, 0, 0)), MatColor::Other);

        // Balanced but dark is not white paint
        assert_eq!(MatColor::classify(rgbi(20, 20, 20, 60)), MatColor::Other);
    }

    #[test]
    fn test_is_line() {
        assert!(MatColor::Blue.is_line());
        assert!(MatColor::Orange.is_line());
        assert!(!MatColor::White.is_line());
        assert!(!MatColor::Other.is_line());
    }
}
