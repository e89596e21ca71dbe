//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where
    T: Float,
{
    target_range.0
        + ((value - source_range.0) * (target_range.1 - target_range.0)
            / (source_range.1 - source_range.0))
}

/// Clamp a value into the range `[min, max]`.
pub fn clamp<T>(value: &T, min: &T, max: &T) -> T
where
    T: Float,
{
    let mut ret = *value;

    if ret > *max {
        ret = *max
    }
    if ret < *min {
        ret = *min
    }

    ret
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()` if `lhs` is much smaller than `rhs.abs()` in
/// magnitude and `lhs < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float,
{
    let r = lhs % rhs;
    if r < T::zero() {
        r + rhs.abs()
    } else {
        r
    }
}

/// Wrap an angle in degrees into the canonical range `[-180, 180)`.
pub fn wrap_deg<T>(angle_deg: T) -> T
where
    T: Float,
{
    let half = T::from(180.0).unwrap();
    let full = T::from(360.0).unwrap();

    let wrapped = rem_euclid(angle_deg + half, full) - half;

    // Round-off in rem_euclid can land exactly on +180
    if wrapped >= half {
        wrapped - full
    } else {
        wrapped
    }
}

/// Get the signed shortest angular distance `a - b` in degrees, in `[-180, 180)`.
pub fn ang_diff_deg<T>(a: T, b: T) -> T
where
    T: Float,
{
    wrap_deg(a - b)
}

/// Circular first order low pass filter on an angle in degrees.
///
/// `alpha` is the weight of the new sample, so `alpha = 1` returns `sample`.
pub fn circular_lpf_deg<T>(prev: T, sample: T, alpha: T) -> T
where
    T: Float,
{
    wrap_deg(prev + alpha * ang_diff_deg(sample, prev))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_wrap_deg() {
        assert_eq!(wrap_deg(0f64), 0f64);
        assert_eq!(wrap_deg(180f64), -180f64);
        assert_eq!(wrap_deg(-180f64), -180f64);
        assert_eq!(wrap_deg(190f64), -170f64);
        assert_eq!(wrap_deg(-190f64), 170f64);
        assert_eq!(wrap_deg(720f64 + 45f64), 45f64);
        assert!((wrap_deg(-0.5f64) + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_ang_diff_deg() {
        assert_eq!(ang_diff_deg(10f64, 350f64), 20f64);
        assert_eq!(ang_diff_deg(350f64, 10f64), -20f64);
        assert_eq!(ang_diff_deg(-170f64, 170f64), 20f64);
        assert_eq!(ang_diff_deg(90f64, 0f64), 90f64);
    }

    #[test]
    fn test_circular_lpf_crosses_wrap() {
        // Filtering from 170 towards -170 must go through 180, not through 0
        let out = circular_lpf_deg(170f64, -170f64, 0.5);
        assert!((out.abs() - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_lin_map() {
        assert_eq!(lin_map((0f64, 10f64), (0f64, 100f64), 2.5), 25f64);
        assert_eq!(lin_map((0f64, 200f64), (255f64, 0f64), 200f64), 0f64);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(&5f64, &-1f64, &1f64), 1f64);
        assert_eq!(clamp(&-5f64, &-1f64, &1f64), -1f64);
        assert_eq!(clamp(&0.5f64, &-1f64, &1f64), 0.5f64);
    }
}
