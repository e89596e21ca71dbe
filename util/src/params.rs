//! Parameter file loading
//!
//! Parameter files are TOML, found in `$WRO_PARAMS_DIR` if set and `$WRO_SW_ROOT/params`
//! otherwise.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{info, warn};
use serde::de::DeserializeOwned;
use std::env;
use std::fs::read_to_string;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Environment variable overriding the parameter directory.
pub const PARAMS_DIR_ENV_VAR: &str = "WRO_PARAMS_DIR";

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Neither WRO_PARAMS_DIR nor WRO_SW_ROOT is set")]
    SwRootNotSet,

    #[error("Cannot read the parameter file {0:?}: {1}")]
    FileLoadError(PathBuf, io::Error),

    #[error("Invalid parameters: {0}")]
    DeserialiseError(toml::de::Error),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// The directory parameter files are loaded from.
pub fn params_dir() -> Result<PathBuf, LoadError> {
    if let Some(dir) = env::var_os(PARAMS_DIR_ENV_VAR) {
        return Ok(PathBuf::from(dir));
    }

    crate::host::get_sw_root()
        .map(|root| root.join("params"))
        .map_err(|_| LoadError::SwRootNotSet)
}

/// Load a parameter file from the parameter directory.
pub fn load<P>(param_file_path: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned,
{
    load_from(params_dir()?.join(param_file_path))
}

/// Load a parameter file, using the defaults if it does not exist.
///
/// A file that exists but cannot be parsed is still an error.
pub fn load_or_default<P>(param_file_path: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned + Default,
{
    match load(param_file_path) {
        Err(LoadError::FileLoadError(path, e)) if e.kind() == io::ErrorKind::NotFound => {
            warn!("No parameter file at {:?}, using the defaults", path);
            Ok(P::default())
        }
        Err(LoadError::SwRootNotSet) => {
            warn!("No parameter directory set, using the defaults");
            Ok(P::default())
        }
        r => r,
    }
}

/// Load a parameter file from an explicit path.
pub fn load_from<P, F>(path: F) -> Result<P, LoadError>
where
    P: DeserializeOwned,
    F: AsRef<Path>,
{
    let path = path.as_ref();
    let params_str =
        read_to_string(path).map_err(|e| LoadError::FileLoadError(path.to_path_buf(), e))?;

    info!("Parameters loaded from {:?}", path);

    parse(&params_str)
}

/// Parse parameters from a TOML string.
pub fn parse<P>(params_str: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned,
{
    toml::from_str(params_str).map_err(LoadError::DeserialiseError)
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(default)]
    struct Limits {
        speed: f64,
        laps: u32,
    }

    #[test]
    fn test_parse_partial() {
        let p: Limits = parse("laps = 3").unwrap();
        assert_eq!(p, Limits { speed: 0.0, laps: 3 });

        assert!(matches!(
            parse::<Limits>("laps = \"three\""),
            Err(LoadError::DeserialiseError(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let path = std::env::temp_dir().join("wro_params_missing_file.toml");
        match load_from::<Limits, _>(&path) {
            Err(LoadError::FileLoadError(p, e)) => {
                assert_eq!(p, path);
                assert_eq!(e.kind(), io::ErrorKind::NotFound);
            }
            r => panic!("unexpected {:?}", r),
        }
    }
}
