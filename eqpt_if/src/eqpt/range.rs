//! # Rangefinders

/// The distance sensors fitted to the robot.
///
/// All values are in centimetres. A value of `-1` (or any value `<= 0`) means the sensor produced
/// no reading, a value at [`RangeFinders::max_range_cm`] means nothing was seen within range.
pub trait RangeFinders: Send + Sync {
    fn right_ultra(&self) -> f64;
    fn right_laser(&self) -> f64;
    fn left_ultra(&self) -> f64;
    fn left_laser(&self) -> f64;
    fn front(&self) -> f64;

    /// The maximum range reported by the sensors, used as the "nothing seen" sentinel.
    fn max_range_cm(&self) -> f64 {
        200.0
    }
}
