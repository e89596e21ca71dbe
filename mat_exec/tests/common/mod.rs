//! Shared set up for the simulator scenario tests

use std::path::PathBuf;
use std::sync::Arc;

use mat_lib::{
    bot::Bot,
    params::BotParams,
    sim::{SimParams, SimWorld},
};

/// A bot running on a simulated mat.
pub struct Rig {
    pub world: Arc<SimWorld>,
    pub bot: Bot,
    calib_file: PathBuf,
}

impl Rig {
    pub fn new(name: &str, sim: SimParams, laps: u32) -> Self {
        let mut params = BotParams::default();
        params.sim = sim;
        Self::with_params(name, params, laps)
    }

    /// Rig with explicit parameters, the calibration settings are still overridden.
    pub fn with_params(name: &str, mut params: BotParams, laps: u32) -> Self {
        let calib_file = std::env::temp_dir().join(format!(
            "wro_orient_cal_{}_{}.json",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&calib_file);

        params.orient.calib_file = Some(calib_file.clone());
        params.orient.calib_samples = 50;

        let world = SimWorld::new(params.sim.clone());
        let bot = Bot::init(world.hardware(), params, laps).expect("bot init");

        Self {
            world,
            bot,
            calib_file,
        }
    }
}

impl Drop for Rig {
    fn drop(&mut self) {
        self.bot.shutdown();
        let _ = std::fs::remove_file(&self.calib_file);
    }
}
