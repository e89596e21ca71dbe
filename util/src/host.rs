//! Host platform (linux for example) utility functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::env;
use std::fs::read_to_string;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Environment variable pointing at the root of the software checkout.
pub const SW_ROOT_ENV_VAR: &str = "WRO_SW_ROOT";

/// Kernel interface for the SoC temperature, in milli-degrees celsius.
const THERMAL_ZONE_PATH: &str = "/sys/class/thermal/thermal_zone0/temp";

/// Raspberry Pi firmware throttle flags.
const THROTTLED_PATH: &str = "/sys/devices/platform/soc/soc:firmware/get_throttled";

/// Temperature above which the SoC starts soft throttling.
const SOFT_THROTTLE_TEMP_C: f64 = 80.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Result of a platform thermal query.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThermalState {
    /// SoC temperature, if the platform exposes it.
    ///
    /// Units: degrees celsius
    pub temp_c: Option<f64>,

    /// True if the firmware reports (or the temperature implies) throttling.
    pub throttled: bool,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the software root directory from the environment.
pub fn get_sw_root() -> Result<PathBuf, env::VarError> {
    env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}

/// Query the platform for its thermal state.
///
/// Platforms without the kernel interfaces report an unthrottled state with no temperature.
pub fn thermal_state() -> ThermalState {
    let temp_c = read_to_string(THERMAL_ZONE_PATH)
        .ok()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .map(|milli| milli / 1000.0);

    // The firmware flag is hex, e.g. "0x50005"; the low nibble holds the current state bits
    let fw_throttled = read_to_string(THROTTLED_PATH)
        .ok()
        .and_then(|s| u32::from_str_radix(s.trim().trim_start_matches("0x"), 16).ok())
        .map(|flags| flags & 0xF != 0)
        .unwrap_or(false);

    ThermalState {
        temp_c,
        throttled: fw_throttled || temp_c.map(|t| t >= SOFT_THROTTLE_TEMP_C).unwrap_or(false),
    }
}
