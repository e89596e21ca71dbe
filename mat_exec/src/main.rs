//! Main mat executable entry point.
//!
//! # Architecture
//!
//! The execution consists of:
//!
//!     - Session, logger and parameter initialisation
//!     - Hardware acquisition (the simulator with `--sim`)
//!     - Component initialisation (`Bot::init`):
//!         - Orientation estimator
//!         - Sensor aggregator
//!         - Mat intelligence
//!         - Movement controller
//!         - Camera pipeline
//!         - Walker
//!     - Boot sensor validation
//!     - The walker run, until every lap is done or the panel button is pressed
//!     - Shutdown in reverse order
//!
//! The exit code is zero only if every lap was completed.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{info, warn};
use std::path::PathBuf;
use structopt::StructOpt;

// Internal
use eqpt_if::eqpt::Hardware;
use mat_lib::{bot::Bot, params::BotParams, sim::SimWorld, walker::WalkerError};
use util::{
    host,
    logger::{logger_init, logger_init_with_file, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Laps driven in the first round, and in every later round.
const ROUND_1_LAPS: u32 = 1;
const ROUND_N_LAPS: u32 = 3;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "mat_exec", about = "WRO mat navigation executable")]
struct Opt {
    /// Competition round, selects the default lap count
    #[structopt(long, default_value = "1")]
    round: u32,

    /// Number of laps, overriding the round default
    #[structopt(long)]
    laps: Option<u32>,

    /// Log at debug level
    #[structopt(long)]
    debug: bool,

    /// Log to this file instead of the session log
    #[structopt(long, parse(from_os_str))]
    log_file: Option<PathBuf>,

    /// Run against the simulated hardware
    #[structopt(long)]
    sim: bool,

    /// Start even if the boot sensor validation fails
    #[structopt(long)]
    force: bool,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    let session = Session::new("mat_exec", "sessions").wrap_err("Failed to create the session")?;

    let level = if opt.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    match opt.log_file {
        Some(ref path) => logger_init_with_file(level, path),
        None => logger_init(level, &session),
    }
    .wrap_err("Failed to initialise logging")?;

    info!("WRO Mat Navigation Executable\n");
    info!("Session directory: {:?}", session.session_root);
    info!("Platform thermal state: {:?}\n", host::thermal_state());

    // ---- LOAD PARAMETERS ----

    let params: BotParams = util::params::load_or_default("mat_exec.toml")
        .wrap_err("Could not load the executable params")?;

    let laps = opt.laps.unwrap_or(if opt.round <= 1 {
        ROUND_1_LAPS
    } else {
        ROUND_N_LAPS
    });

    info!("Round {}, {} lap(s)", opt.round, laps);

    // ---- HARDWARE ----

    let hw = acquire_hardware(&opt, &params)?;
    let panel = hw.panel.clone();

    // ---- INITIALISE ----

    let mut bot = match Bot::init(hw, params, laps) {
        Ok(b) => b,
        Err(e) => {
            panel.set_led(eqpt_if::eqpt::LedColour::Red);
            panel.beep(eqpt_if::eqpt::BeepPattern::Fatal);
            return Err(e).wrap_err("Failed to initialise the robot");
        }
    };

    if let Err(e) = bot.start_meas_log(&session.meas_log_path) {
        warn!("Running without a measurement log: {}", e);
    }

    if let Err(e) = bot.validate() {
        if opt.force {
            warn!("{}, starting anyway (--force)", e);
        } else {
            bot.fail();
            bot.shutdown();
            return Err(e).wrap_err("Boot sensor validation failed, use --force to override");
        }
    }

    // ---- RUN ----

    let result = bot.run();
    bot.shutdown();

    match result {
        Ok(summary) => info!(
            "Completed {} lap(s) {:?}, finished on {:?}",
            summary.laps_completed, summary.direction, summary.final_location
        ),
        Err(WalkerError::Stopped) => {
            session.exit();
            return Err(eyre!("The run was stopped before every lap was done"));
        }
        Err(e) => {
            session.exit();
            return Err(e).wrap_err("The walker failed");
        }
    }

    session.exit();

    Ok(())
}

fn acquire_hardware(opt: &Opt, params: &BotParams) -> Result<Hardware, Report> {
    if opt.sim {
        info!("Using the simulated hardware");
        Ok(SimWorld::new(params.sim.clone()).hardware())
    } else {
        Err(eyre!(
            "No device drivers are built into this executable, run with --sim"
        ))
    }
}
