//! Walker scenarios on the simulated mat
//!
//! Each test boots the full component stack on a simulated world and runs in real time. Most take
//! a few seconds, a full lap takes closer to a minute.

mod common;

use std::thread;
use std::time::Duration;

use common::Rig;
use eqpt_if::eqpt::LedColour;
use mat_lib::{
    mat_intel::{Direction, GenericLocation, Location, Targets},
    params::BotParams,
    sim::{DriveCmd, SimParams},
    walker::{needs_walk_back, WalkerError, WalkerParams},
};
use util::maths::ang_diff_deg;

#[test]
fn test_discover_clockwise() {
    let mut rig = Rig::new(
        "discover",
        SimParams {
            start_x_cm: 140.0,
            ..Default::default()
        },
        1,
    );

    let direction = rig.bot.walker().discover_direction().unwrap();
    rig.bot.move_ctrl().stop_walking().unwrap();

    assert_eq!(direction, Direction::Clockwise);
    assert_eq!(rig.bot.intel().location(), Location::Corner1);

    let side1 = rig.bot.intel().get_learned_distances(Some(Location::Side1));
    assert_eq!(side1.front, 100.0);
    assert!((side1.left - 50.0).abs() < 3.0, "left {}", side1.left);
    assert!((side1.right - 50.0).abs() < 3.0, "right {}", side1.right);

    // Stopped on the orange line of the first corner
    let pose = rig.world.pose();
    assert!(pose.x_cm > 60.0 && pose.x_cm < 100.0, "{:?}", pose);
    assert_eq!(rig.world.collisions(), 0);
}

#[test]
fn test_side_centres_in_narrow_corridor() {
    // Left 60, right 25 in an 85 cm corridor, heading north
    let mut rig = Rig::new(
        "side",
        SimParams {
            corridor_cm: 85.0,
            start_x_cm: 60.0,
            start_y_cm: 120.0,
            start_heading_deg: 0.0,
            ..Default::default()
        },
        1,
    );

    rig.bot
        .walker()
        .resume_at(Location::Side2, Direction::Clockwise);
    rig.bot
        .intel()
        .set_learned_distances(Location::Side2, Targets::new(100.0, 48.0, 48.0));

    rig.bot.walker().walk_side().unwrap();
    rig.bot.move_ctrl().stop_walking().unwrap();

    let first_steer = rig.world.commands().into_iter().find_map(|c| match c {
        DriveCmd::Steer(a) => Some(a),
        _ => None,
    });
    assert_eq!(first_steer, Some(-8.0));

    // Moved towards the 42.5 cm centre line
    let pose = rig.world.pose();
    assert!(pose.x_cm < 56.0, "{:?}", pose);
    assert!(pose.y_cm > 200.0, "{:?}", pose);
    assert_eq!(rig.world.collisions(), 0);
}

#[test]
fn test_corner_turn_clockwise() {
    let mut rig = Rig::new(
        "corner",
        SimParams {
            start_x_cm: 80.0,
            ..Default::default()
        },
        1,
    );

    rig.bot
        .walker()
        .resume_at(Location::Corner1, Direction::Clockwise);
    rig.bot.walker().walk_corner().unwrap();
    rig.bot.move_ctrl().stop_walking().unwrap();

    let state = rig.bot.walker().state();
    assert!(
        (state.global_yaw_intent - 90.0).abs() < 1.0,
        "intent {}",
        state.global_yaw_intent
    );

    let yaw = rig.bot.orient().get_yaw();
    assert!(yaw > 60.0 && yaw < 100.0, "yaw {}", yaw);

    // Now heading up the west side
    let pose = rig.world.pose();
    assert!(ang_diff_deg(pose.heading_deg, 0.0).abs() < 30.0, "{:?}", pose);
    assert_eq!(rig.world.collisions(), 0);

    assert_eq!(rig.bot.intel().location_complete().unwrap(), Location::Side2);
}

#[test]
fn test_walk_back_from_wall() {
    let mut rig = Rig::new(
        "walk_back",
        SimParams {
            start_x_cm: 18.0,
            ..Default::default()
        },
        1,
    );
    let params = WalkerParams::default();

    rig.bot
        .walker()
        .resume_at(Location::Side1, Direction::Clockwise);

    let snap = rig.bot.sens().read_state(GenericLocation::Side);
    assert!(needs_walk_back(&snap, Direction::Clockwise, &params));

    rig.bot.walker().walk_back().unwrap();

    let commands = rig.world.commands();
    assert!(commands.contains(&DriveCmd::Backward(45.0)));
    assert_eq!(commands.last(), Some(&DriveCmd::Stop));

    let pose = rig.world.pose();
    assert!(pose.x_cm >= 19.5 && pose.x_cm < 36.0, "{:?}", pose);

    let snap = rig.bot.sens().read_state(GenericLocation::Side);
    assert!(!needs_walk_back(&snap, Direction::Clockwise, &params));
}

#[test]
fn test_walk_back_time_limit() {
    let mut params = BotParams::default();
    params.sim.start_x_cm = 12.0;
    params.walker.walk_back_timeout_s = 0.1;
    let mut rig = Rig::with_params("walk_back_time", params, 1);

    rig.bot
        .walker()
        .resume_at(Location::Side1, Direction::Clockwise);
    rig.bot.walker().walk_back().unwrap();

    // Stopped on time, well short of both the clear front and the distance limit
    let pose = rig.world.pose();
    assert!(pose.x_cm > 12.5 && pose.x_cm < 19.0, "{:?}", pose);
    assert_eq!(rig.world.commands().last(), Some(&DriveCmd::Stop));
}

#[test]
fn test_button_stops_run() {
    let mut rig = Rig::new("button", SimParams::default(), 1);
    rig.bot.validate().unwrap();

    let world = rig.world.clone();
    let presser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(1000));
        world.press_button();
    });

    let result = rig.bot.run();
    presser.join().unwrap();

    assert!(matches!(result, Err(WalkerError::Stopped)));
    assert!(!rig.bot.move_ctrl().is_walking());
    assert_eq!(rig.world.led(), LedColour::Yellow);
    assert_eq!(rig.world.collisions(), 0);
}

/// Run one lap and check the robot stops back on its starting square.
fn run_one_lap(name: &str, sim: SimParams, direction: Direction) {
    let mut rig = Rig::new(name, sim, 1);
    rig.bot.validate().unwrap();

    let summary = rig.bot.run().unwrap();

    assert_eq!(summary.laps_completed, 1);
    assert_eq!(summary.direction, direction);
    assert_eq!(summary.final_location, Location::Side1);
    assert_eq!(rig.world.led(), LedColour::Off);
    assert_eq!(rig.world.collisions(), 0);

    let closing = rig.bot.intel().closing_square().unwrap();
    let front = rig.bot.sens().read_state(GenericLocation::Side).front_cm;
    assert!(
        (front - closing.front).abs() < 10.0,
        "stopped at front {:.1}, started at {:.1}, pose {:?}",
        front,
        closing.front,
        rig.world.pose()
    );
}

#[test]
fn test_full_lap_clockwise() {
    run_one_lap("lap_cw", SimParams::default(), Direction::Clockwise);
}

#[test]
fn test_full_lap_counter_clockwise() {
    run_one_lap(
        "lap_ccw",
        SimParams {
            start_heading_deg: 90.0,
            ..Default::default()
        },
        Direction::CounterClockwise,
    );
}
