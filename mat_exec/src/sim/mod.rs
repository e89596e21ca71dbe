//! # Simulated hardware
//!
//! A kinematic simulation of the robot on the mat implementing every equipment trait, so the
//! whole navigation stack can run without a robot.
//!
//! The world advances lazily: every access from any equipment trait integrates the bicycle model
//! up to the current time in steps of at most `max_step_s`. The robot stops against a wall rather
//! than passing through it, counting each contact.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod arena;
mod params;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use image::{Rgb, RgbImage};
use log::{debug, trace, warn};
use nalgebra::{Vector2, Vector3};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use eqpt_if::eqpt::{
    BeepPattern, CamImage, Camera, ColorSensor, DriveBase, EqptError, Hardware, Imu, LedColour,
    MatColor, Panel, RangeFinders, Rgbi,
};
use util::maths::{lin_map, wrap_deg};

pub use arena::{heading_vector, Arena};
pub use params::SimParams;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

const WHITE: Rgbi = Rgbi { r: 200, g: 200, b: 200, i: 600 };
const ORANGE: Rgbi = Rgbi { r: 220, g: 110, b: 40, i: 370 };
const BLUE: Rgbi = Rgbi { r: 40, g: 70, b: 180, i: 290 };

/// Wall distance at which the synthesised frame is entirely dark.
///
/// Units: centimetres
const CAM_FULL_DARK_CM: f64 = 0.0;

/// Wall distance beyond which the synthesised frame shows no wall.
///
/// Units: centimetres
const CAM_NO_DARK_CM: f64 = 50.0;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Pose of the robot on the mat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Units: centimetres
    pub x_cm: f64,
    pub y_cm: f64,

    /// Clockwise from north.
    ///
    /// Units: degrees
    pub heading_deg: f64,
}

/// A drive command received by the simulated drive base.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriveCmd {
    Forward(f64),
    Backward(f64),
    Stop,
    Steer(f64),
}

/// The simulated world, shared by every simulated device.
pub struct SimWorld {
    params: SimParams,
    arena: Arena,
    state: Mutex<SimState>,
    button: AtomicBool,
}

struct SimState {
    pose: Pose,

    /// Signed speed.
    ///
    /// Units: centimetres/second
    velocity: f64,

    /// Units: degrees
    steering_deg: f64,

    /// Heading rate over the last step.
    ///
    /// Units: radians/second
    yaw_rate: f64,

    last_update: Instant,
    in_contact: bool,
    collisions: u32,

    commands: Vec<DriveCmd>,
    led: LedColour,
    beeps: Vec<BeepPattern>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimWorld {
    pub fn new(params: SimParams) -> Arc<Self> {
        let pose = Pose {
            x_cm: params.start_x_cm,
            y_cm: params.start_y_cm,
            heading_deg: wrap_deg(params.start_heading_deg),
        };

        debug!("Simulated mat {} cm, robot at {:?}", params.mat_size_cm, pose);

        Arc::new(Self {
            arena: Arena::new(&params),
            params,
            state: Mutex::new(SimState {
                pose,
                velocity: 0.0,
                steering_deg: 0.0,
                yaw_rate: 0.0,
                last_update: Instant::now(),
                in_contact: false,
                collisions: 0,
                commands: Vec::new(),
                led: LedColour::Off,
                beeps: Vec::new(),
            }),
            button: AtomicBool::new(false),
        })
    }

    /// Bundle the world as the robot's hardware.
    pub fn hardware(self: &Arc<Self>) -> Hardware {
        let camera: Option<Arc<dyn Camera>> = if self.params.camera {
            Some(self.clone())
        } else {
            None
        };

        Hardware {
            range: self.clone(),
            imu: self.clone(),
            drive: self.clone(),
            color: self.clone(),
            camera,
            panel: self.clone(),
        }
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn pose(&self) -> Pose {
        self.advance().pose
    }

    /// Move the robot, leaving its drive state untouched.
    pub fn set_pose(&self, pose: Pose) {
        let mut state = self.advance();
        state.pose = Pose {
            heading_deg: wrap_deg(pose.heading_deg),
            ..pose
        };
        state.in_contact = false;
    }

    /// Number of times the robot has run into a wall.
    pub fn collisions(&self) -> u32 {
        self.advance().collisions
    }

    /// Every drive and steering command received so far.
    pub fn commands(&self) -> Vec<DriveCmd> {
        self.advance().commands.clone()
    }

    pub fn led(&self) -> LedColour {
        self.lock().led
    }

    pub fn beeps(&self) -> Vec<BeepPattern> {
        self.lock().beeps.clone()
    }

    /// Hold the panel button down until the next read.
    pub fn press_button(&self) {
        self.button.store(true, Ordering::Release);
    }

    // ---- INTERNALS ----

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Lock the state after integrating it up to now.
    fn advance(&self) -> MutexGuard<'_, SimState> {
        let mut state = self.lock();

        let now = Instant::now();
        let mut remaining = now.duration_since(state.last_update).as_secs_f64();
        state.last_update = now;

        while remaining > 0.0 {
            let dt = remaining.min(self.params.max_step_s.max(1e-4));
            self.step(&mut state, dt);
            remaining -= dt;
        }

        state
    }

    fn step(&self, state: &mut SimState, dt: f64) {
        let v = state.velocity;
        let rate = v * state.steering_deg.to_radians().tan() / self.params.wheelbase_cm;
        state.yaw_rate = rate;

        if v == 0.0 {
            return;
        }

        let heading = state.pose.heading_deg + 0.5 * rate.to_degrees() * dt;
        let pos = Vector2::new(state.pose.x_cm, state.pose.y_cm);
        let next = pos + heading_vector(heading) * v * dt;

        // Moving closer to a wall than the body allows is blocked, moving away never is
        let now_clear = self.arena.clearance(pos);
        let next_clear = self.arena.clearance(next);

        if next_clear < self.params.body_radius_cm && next_clear < now_clear {
            if !state.in_contact {
                state.in_contact = true;
                state.collisions += 1;
                warn!(
                    "Simulated robot hit a wall at ({:.1}, {:.1})",
                    state.pose.x_cm, state.pose.y_cm
                );
            }
            state.yaw_rate = 0.0;
            return;
        }

        state.in_contact = false;
        state.pose.x_cm = next.x;
        state.pose.y_cm = next.y;
        state.pose.heading_deg = wrap_deg(state.pose.heading_deg + rate.to_degrees() * dt);
    }

    /// Distance from the robot centre along a bearing relative to its heading.
    fn ray(&self, relative_deg: f64) -> f64 {
        let pose = self.pose();
        self.arena.raycast(
            Vector2::new(pose.x_cm, pose.y_cm),
            pose.heading_deg + relative_deg,
            self.params.max_range_cm,
        )
    }

    fn push_command(&self, cmd: DriveCmd) {
        self.advance().commands.push(cmd);
    }
}

impl RangeFinders for SimWorld {
    fn right_ultra(&self) -> f64 {
        self.ray(90.0)
    }

    fn right_laser(&self) -> f64 {
        self.ray(90.0)
    }

    fn left_ultra(&self) -> f64 {
        self.ray(-90.0)
    }

    fn left_laser(&self) -> f64 {
        self.ray(-90.0)
    }

    fn front(&self) -> f64 {
        self.ray(0.0)
    }

    fn max_range_cm(&self) -> f64 {
        self.params.max_range_cm
    }
}

impl Imu for SimWorld {
    fn acceleration(&self) -> Result<Vector3<f64>, EqptError> {
        Ok(Vector3::new(0.0, 0.0, 1.0))
    }

    fn gyro(&self) -> Result<Vector3<f64>, EqptError> {
        let rate = self.advance().yaw_rate;
        Ok(Vector3::new(0.0, 0.0, rate + self.params.gyro_bias_rads))
    }
}

impl DriveBase for SimWorld {
    fn drive_forward(&self, speed: f64) -> Result<(), EqptError> {
        trace!("Sim drive forward {:.0}", speed);
        self.push_command(DriveCmd::Forward(speed));
        self.advance().velocity = speed.abs() * self.params.cm_per_s_per_speed;
        Ok(())
    }

    fn drive_backward(&self, speed: f64) -> Result<(), EqptError> {
        trace!("Sim drive backward {:.0}", speed);
        self.push_command(DriveCmd::Backward(speed));
        self.advance().velocity = -speed.abs() * self.params.cm_per_s_per_speed;
        Ok(())
    }

    fn drive_stop(&self) -> Result<(), EqptError> {
        trace!("Sim drive stop");
        self.push_command(DriveCmd::Stop);
        self.advance().velocity = 0.0;
        Ok(())
    }

    fn set_steering(&self, angle_deg: f64) -> Result<(), EqptError> {
        if !angle_deg.is_finite() {
            return Err(EqptError::CommandFailed {
                device: "steering",
                reason: format!("angle {} is not finite", angle_deg),
            });
        }

        let max = self.params.max_steering_deg;
        let angle = angle_deg.clamp(-max, max);

        self.push_command(DriveCmd::Steer(angle));
        self.advance().steering_deg = angle;
        Ok(())
    }

    fn steering_angle(&self) -> f64 {
        self.advance().steering_deg
    }
}

impl ColorSensor for SimWorld {
    fn bottom_color_rgbi(&self) -> Result<Rgbi, EqptError> {
        let pose = self.pose();
        Ok(match self.arena.floor_color(Vector2::new(pose.x_cm, pose.y_cm)) {
            MatColor::Orange => ORANGE,
            MatColor::Blue => BLUE,
            _ => WHITE,
        })
    }
}

impl Camera for SimWorld {
    /// A white frame whose floor half darkens, per section, as the wall in that direction nears.
    fn capture_frame(&self) -> Result<CamImage, EqptError> {
        let (w, h) = (self.params.frame_width, self.params.frame_height);
        let mut img = RgbImage::from_pixel(w, h, Rgb([220, 220, 220]));

        let q = w / 4;
        let sections = [
            (0, q, self.ray(-45.0)),
            (q, 3 * q, self.ray(0.0)),
            (3 * q, w, self.ray(45.0)),
        ];

        let roi_h = h / 2;
        for (x0, x1, dist) in sections.iter() {
            let frac =
                lin_map((CAM_FULL_DARK_CM, CAM_NO_DARK_CM), (1.0, 0.0), *dist).clamp(0.0, 1.0);
            let rows = (frac * roi_h as f64).round() as u32;

            for y in h - rows..h {
                for x in *x0..*x1 {
                    img.put_pixel(x, y, Rgb([15, 15, 15]));
                }
            }
        }

        Ok(CamImage::now(img))
    }
}

impl Panel for SimWorld {
    fn set_led(&self, colour: LedColour) {
        debug!("Sim LED {:?}", colour);
        self.lock().led = colour;
    }

    fn beep(&self, pattern: BeepPattern) {
        debug!("Sim beep {:?}", pattern);
        self.lock().beeps.push(pattern);
    }

    fn button_pressed(&self) -> bool {
        self.button.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn world() -> Arc<SimWorld> {
        SimWorld::new(SimParams::default())
    }

    #[test]
    fn test_start_ranges() {
        let w = world();

        // Heading west in the bottom corridor: the outer wall is on the left
        assert!((w.front() - 150.0).abs() < 1e-6);
        assert!((w.left_ultra() - 50.0).abs() < 1e-6);
        assert!((w.right_laser() - 50.0).abs() < 1e-6);
    }

    #[test]
    fn test_drive_straight() {
        let w = world();

        w.drive_forward(50.0).unwrap();
        thread::sleep(Duration::from_millis(200));
        w.drive_stop().unwrap();

        let p = w.pose();
        let moved = 150.0 - p.x_cm;
        assert!(moved > 5.0 && moved < 15.0, "moved {}", moved);
        assert!((p.y_cm - 50.0).abs() < 1e-6);
        assert_eq!(w.collisions(), 0);
    }

    #[test]
    fn test_right_turn_gyro_sign() {
        let w = world();

        w.set_steering(20.0).unwrap();
        w.drive_forward(50.0).unwrap();
        thread::sleep(Duration::from_millis(100));

        // Clockwise rotation reads positive
        let rate = w.gyro().unwrap().z;
        w.drive_stop().unwrap();

        assert!(rate > 0.0);
        let heading = w.pose().heading_deg;
        assert!(heading > 270.0 && heading < 300.0, "heading {}", heading);
    }

    #[test]
    fn test_wall_blocks() {
        let w = world();
        w.set_pose(Pose {
            x_cm: 20.0,
            y_cm: 50.0,
            heading_deg: 270.0,
        });

        w.drive_forward(100.0).unwrap();
        thread::sleep(Duration::from_millis(300));
        w.drive_stop().unwrap();

        let p = w.pose();
        assert!(p.x_cm >= w.params().body_radius_cm - 1.0);
        assert_eq!(w.collisions(), 1);
    }

    #[test]
    fn test_color_and_panel() {
        let w = world();
        assert_eq!(MatColor::classify(w.bottom_color_rgbi().unwrap()), MatColor::White);

        w.set_pose(Pose {
            x_cm: 93.5,
            y_cm: 50.0,
            heading_deg: 270.0,
        });
        assert_eq!(MatColor::classify(w.bottom_color_rgbi().unwrap()), MatColor::Orange);

        assert!(!w.button_pressed());
        w.press_button();
        assert!(w.button_pressed());
        assert!(!w.button_pressed());

        w.set_led(LedColour::Green);
        w.beep(BeepPattern::Ready);
        assert_eq!(w.led(), LedColour::Green);
        assert_eq!(w.beeps(), vec![BeepPattern::Ready]);
    }

    #[test]
    fn test_camera_darkens() {
        let w = world();
        let far = w.capture_frame().unwrap().image;

        w.set_pose(Pose {
            x_cm: 15.0,
            y_cm: 50.0,
            heading_deg: 270.0,
        });
        let near = w.capture_frame().unwrap().image;

        let dark = |img: &RgbImage| img.pixels().filter(|p| p[0] < 50).count();
        assert_eq!(dark(&far), 0);
        assert!(dark(&near) > 0);
    }
}
