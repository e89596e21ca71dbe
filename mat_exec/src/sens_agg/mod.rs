//! # Sensor aggregator
//!
//! Samples every distance sensor, the steering angle and the yaw into an immutable
//! [`SensorSnapshot`]. Side distances fuse the ultrasonic and laser rangefinders, and the camera's
//! coarse border distances are substituted where they see something closer than the
//! rangefinders do.
//!
//! Invalid samples never propagate: the last valid value of each distance is kept instead.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{info, warn};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use eqpt_if::eqpt::{DriveBase, RangeFinders};
use util::time::unix_now_s;

use crate::cam::BorderShared;
use crate::mat_intel::{Direction, GenericLocation, Wall};
use crate::orient::Orientation;

pub use params::SensAggParams;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One atomic view of the robot's surroundings.
///
/// Distances are in centimetres, camera distances of `-1` mean the camera had no estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorSnapshot {
    pub front_cm: f64,
    pub left_cm: f64,
    pub right_cm: f64,

    pub camera_front_cm: f64,
    pub camera_left_cm: f64,
    pub camera_right_cm: f64,

    /// Yaw relative to the last gyro zero, in `[-180, 180)`
    pub yaw_deg: f64,

    /// Measured steering angle
    pub steering_deg: f64,

    /// UNIX time of the read.
    ///
    /// Units: seconds
    pub timestamp: f64,
}

/// Front, left and right distances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distances {
    pub front: f64,
    pub left: f64,
    pub right: f64,
}

/// The sensor aggregator.
pub struct SensorAggregator {
    params: SensAggParams,

    range: Arc<dyn RangeFinders>,
    drive: Arc<dyn DriveBase>,
    orient: Arc<Orientation>,
    border: Option<Arc<BorderShared>>,

    last_valid: Mutex<Distances>,
    direction: Mutex<Direction>,
    latest: Mutex<Option<SensorSnapshot>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SensAggError {
    #[error("Every distance sensor read its maximum on {checks} validation checks")]
    SensorStall { checks: usize },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SensorSnapshot {
    /// A snapshot with no camera data, timestamped now.
    pub fn from_distances(front_cm: f64, left_cm: f64, right_cm: f64, yaw_deg: f64) -> Self {
        Self {
            front_cm,
            left_cm,
            right_cm,
            camera_front_cm: -1.0,
            camera_left_cm: -1.0,
            camera_right_cm: -1.0,
            yaw_deg,
            steering_deg: 0.0,
            timestamp: unix_now_s(),
        }
    }

    /// Sum of the side distances.
    pub fn total_width(&self) -> f64 {
        self.left_cm + self.right_cm
    }

    pub fn wall(&self, wall: Wall) -> f64 {
        match wall {
            Wall::Left => self.left_cm,
            Wall::Right => self.right_cm,
        }
    }
}

impl SensorAggregator {
    pub fn new(
        params: SensAggParams,
        range: Arc<dyn RangeFinders>,
        drive: Arc<dyn DriveBase>,
        orient: Arc<Orientation>,
        border: Option<Arc<BorderShared>>,
    ) -> Self {
        let max = range.max_range_cm();

        Self {
            params,
            range,
            drive,
            orient,
            border,
            last_valid: Mutex::new(Distances {
                front: max,
                left: max,
                right: max,
            }),
            direction: Mutex::new(Direction::Unknown),
            latest: Mutex::new(None),
        }
    }

    /// Set the direction used to decide which camera distances are trusted.
    pub fn set_direction(&self, direction: Direction) {
        *self.direction.lock().unwrap_or_else(|p| p.into_inner()) = direction;
    }

    /// The sensor maximum, used as the "nothing in range" sentinel.
    pub fn max_range_cm(&self) -> f64 {
        self.range.max_range_cm()
    }

    /// Read every sensor into a new snapshot.
    pub fn read_state(&self, location: GenericLocation) -> SensorSnapshot {
        let max = self.range.max_range_cm();

        let raw = Distances {
            front: self.range.front(),
            left: fuse_side(self.range.left_ultra(), self.range.left_laser()),
            right: fuse_side(self.range.right_ultra(), self.range.right_laser()),
        };

        let dists = {
            let mut last = self.last_valid.lock().unwrap_or_else(|p| p.into_inner());
            last.front = valid_or(raw.front, last.front, max);
            last.left = valid_or(raw.left, last.left, max);
            last.right = valid_or(raw.right, last.right, max);
            *last
        };

        let cam = match self.border {
            Some(ref b) => {
                let (front, left, right) = b.load();
                Distances { front, left, right }
            }
            None => Distances {
                front: -1.0,
                left: -1.0,
                right: -1.0,
            },
        };

        let direction = *self.direction.lock().unwrap_or_else(|p| p.into_inner());
        let fused = substitute_camera(
            dists,
            cam,
            location,
            direction,
            self.params.front_trust_inside_open_cm,
        );

        let snapshot = SensorSnapshot {
            front_cm: fused.front,
            left_cm: fused.left,
            right_cm: fused.right,
            camera_front_cm: cam.front,
            camera_left_cm: cam.left,
            camera_right_cm: cam.right,
            yaw_deg: self.orient.get_yaw(),
            steering_deg: self.drive.steering_angle(),
            timestamp: unix_now_s(),
        };

        *self.latest.lock().unwrap_or_else(|p| p.into_inner()) = Some(snapshot);

        snapshot
    }

    /// Copy of the most recent snapshot.
    pub fn latest(&self) -> Option<SensorSnapshot> {
        *self.latest.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Boot check that the distance sensors are alive.
    ///
    /// Fails if more than `stall_limit` of the `validation_checks` reads have every distance at
    /// the sensor maximum.
    pub fn validate_sensors(&self) -> Result<(), SensAggError> {
        let max = self.range.max_range_cm();
        let period = Duration::from_secs_f64(self.params.validation_period_s);
        let mut stalled = 0;

        for i in 0..self.params.validation_checks {
            let s = self.read_state(GenericLocation::Side);
            if s.front_cm >= max && s.left_cm >= max && s.right_cm >= max {
                stalled += 1;
                warn!("Validation check {}: every distance at maximum", i + 1);
            }
            thread::sleep(period);
        }

        if stalled > self.params.stall_limit {
            return Err(SensAggError::SensorStall { checks: stalled });
        }

        info!(
            "Distance sensors validated ({} of {} checks at maximum)",
            stalled, self.params.validation_checks
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Fuse the ultrasonic and laser readings of one side.
///
/// Both positive gives the smaller. A non-positive reading is invalid and the other is used.
pub fn fuse_side(ultra: f64, laser: f64) -> f64 {
    if ultra > 0.0 && laser > 0.0 {
        ultra.min(laser)
    } else if laser <= 0.0 {
        ultra
    } else {
        laser.max(0.0)
    }
}

/// Replace rangefinder distances with closer camera distances.
///
/// - Sides: any side camera distance. The front is used when the direction is unknown, or when
///   the inside wall is more than `trust_open_cm` away.
/// - Corners: only the inside side.
pub fn substitute_camera(
    dists: Distances,
    cam: Distances,
    location: GenericLocation,
    direction: Direction,
    trust_open_cm: f64,
) -> Distances {
    let closer = |rf: f64, c: f64| if c > 0.0 && c < rf { c } else { rf };
    let mut out = dists;

    match (location, direction.inside_wall()) {
        (GenericLocation::Side, inside) => {
            out.left = closer(dists.left, cam.left);
            out.right = closer(dists.right, cam.right);

            let trust_front = match inside {
                None => true,
                Some(Wall::Left) => dists.left > trust_open_cm,
                Some(Wall::Right) => dists.right > trust_open_cm,
            };
            if trust_front {
                out.front = closer(dists.front, cam.front);
            }
        }
        (GenericLocation::Corner, Some(Wall::Left)) => out.left = closer(dists.left, cam.left),
        (GenericLocation::Corner, Some(Wall::Right)) => {
            out.right = closer(dists.right, cam.right)
        }
        (GenericLocation::Corner, None) => (),
    }

    out
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Keep `last` if `value` is not a valid distance, clamp to the sensor maximum.
fn valid_or(value: f64, last: f64, max: f64) -> f64 {
    if value > 0.0 && value.is_finite() {
        value.min(max)
    } else {
        last
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn d(front: f64, left: f64, right: f64) -> Distances {
        Distances { front, left, right }
    }

    #[test]
    fn test_fuse_side() {
        assert_eq!(fuse_side(30.0, 25.0), 25.0);
        assert_eq!(fuse_side(20.0, 25.0), 20.0);
        assert_eq!(fuse_side(30.0, 0.0), 30.0);
        assert_eq!(fuse_side(30.0, -1.0), 30.0);
        assert_eq!(fuse_side(0.0, 25.0), 25.0);
        assert_eq!(fuse_side(-1.0, 25.0), 25.0);
        assert_eq!(fuse_side(-1.0, -1.0), -1.0);
    }

    #[test]
    fn test_valid_or() {
        assert_eq!(valid_or(-1.0, 42.0, 200.0), 42.0);
        assert_eq!(valid_or(0.0, 42.0, 200.0), 42.0);
        assert_eq!(valid_or(f64::NAN, 42.0, 200.0), 42.0);
        assert_eq!(valid_or(250.0, 42.0, 200.0), 200.0);
        assert_eq!(valid_or(30.0, 42.0, 200.0), 30.0);
    }

    #[test]
    fn test_side_substitution() {
        let rf = d(150.0, 40.0, 80.0);
        let cam = d(30.0, 20.0, 90.0);

        // Unknown direction trusts everything closer
        let out = substitute_camera(rf, cam, GenericLocation::Side, Direction::Unknown, 65.0);
        assert_eq!(out, d(30.0, 20.0, 80.0));

        // Clockwise: inside (right) is open, front trusted
        let out = substitute_camera(rf, cam, GenericLocation::Side, Direction::Clockwise, 65.0);
        assert_eq!(out.front, 30.0);

        // Counter-clockwise: inside (left) at 40 is not open, front not trusted
        let out =
            substitute_camera(rf, cam, GenericLocation::Side, Direction::CounterClockwise, 65.0);
        assert_eq!(out.front, 150.0);
        assert_eq!(out.left, 20.0);
    }

    #[test]
    fn test_corner_substitution() {
        let rf = d(150.0, 40.0, 80.0);
        let cam = d(30.0, 20.0, 10.0);

        let out = substitute_camera(rf, cam, GenericLocation::Corner, Direction::Clockwise, 65.0);
        assert_eq!(out, d(150.0, 40.0, 10.0));

        let out =
            substitute_camera(rf, cam, GenericLocation::Corner, Direction::CounterClockwise, 65.0);
        assert_eq!(out, d(150.0, 20.0, 80.0));

        let out = substitute_camera(rf, cam, GenericLocation::Corner, Direction::Unknown, 65.0);
        assert_eq!(out, rf);
    }

    #[test]
    fn test_camera_invalid_ignored() {
        let rf = d(150.0, 40.0, 80.0);
        let cam = d(-1.0, -1.0, -1.0);

        let out = substitute_camera(rf, cam, GenericLocation::Side, Direction::Unknown, 65.0);
        assert_eq!(out, rf);
    }
}
