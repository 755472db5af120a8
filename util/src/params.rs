//! Generic parameters functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::de::DeserializeOwned;
use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};
use thiserror::Error;
use toml;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("The software root environment variable (NAV_SW_ROOT) is not set")]
    SwRootNotSet,

    #[error("Cannot load the parmeter file: {0}")]
    FileLoadError(std::io::Error),

    #[error("Cannot read the parameter file: {0}")]
    DeserialiseError(toml::de::Error),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Load a parameter file
///
/// Relative paths are relative to the "$NAV_SW_ROOT/params" directory
pub fn load<P, F>(param_file_path: F) -> Result<P, LoadError>
where
    P: DeserializeOwned,
    F: AsRef<Path>,
{
    load_path(resolve(param_file_path)?)
}

/// Resolve a parameter file path. Absolute paths are returned unchanged, relative paths are
/// placed in the "$NAV_SW_ROOT/params" directory.
pub fn resolve<F: AsRef<Path>>(param_file_path: F) -> Result<PathBuf, LoadError> {
    let param_file_path = param_file_path.as_ref();

    if param_file_path.is_absolute() {
        return Ok(param_file_path.to_path_buf());
    }

    let mut path = crate::host::get_nav_sw_root().map_err(|_| LoadError::SwRootNotSet)?;
    path.push("params");
    path.push(param_file_path);

    Ok(path)
}

/// Load a parameter file from an explicit path, bypassing the software root.
pub fn load_path<P, F>(path: F) -> Result<P, LoadError>
where
    P: DeserializeOwned,
    F: AsRef<Path>,
{
    let params_str = read_to_string(path).map_err(LoadError::FileLoadError)?;

    from_str(&params_str)
}

/// Parse parameters from a TOML string.
pub fn from_str<P>(params_str: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned,
{
    toml::from_str(params_str).map_err(LoadError::DeserialiseError)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct TestParams {
        period_ticks: u64,
        origin_m: [f64; 2],
    }

    #[test]
    fn test_from_str() {
        let p: TestParams = from_str("period_ticks = 3\norigin_m = [-200.0, -200.0]").unwrap();
        assert_eq!(
            p,
            TestParams {
                period_ticks: 3,
                origin_m: [-200.0, -200.0]
            }
        );

        let bad: Result<TestParams, _> = from_str("period_ticks = \"three\"");
        assert!(matches!(bad, Err(LoadError::DeserialiseError(_))));
    }

    #[test]
    fn test_load_path_missing() {
        let r: Result<TestParams, _> = load_path("this/file/does/not/exist.toml");
        assert!(matches!(r, Err(LoadError::FileLoadError(_))));
    }

    #[test]
    fn test_resolve_absolute() {
        let abs = std::env::temp_dir().join("replan.toml");
        assert_eq!(resolve(&abs).unwrap(), abs);
    }
}
