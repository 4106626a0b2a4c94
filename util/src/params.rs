//! Generic parameters functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::de::DeserializeOwned;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use thiserror::Error;
use toml;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Cannot determine the software root directory: {0}")]
    SwRootNotFound(std::io::Error),

    #[error("Cannot load the parmeter file {0:?}: {1}")]
    FileLoadError(PathBuf, std::io::Error),

    #[error("Cannot read the parameter file {0:?}: {1}")]
    DeserialiseError(PathBuf, toml::de::Error),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Load a parameter file
///
/// The file path is relative to the `params` directory of the software root.
pub fn load<P>(param_file_path: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned,
{
    let mut dir = crate::host::get_uuv_sw_root().map_err(LoadError::SwRootNotFound)?;
    dir.push("params");

    load_from(dir, param_file_path)
}

/// Load a parameter file from the given directory.
pub fn load_from<P, D>(params_dir: D, param_file_path: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned,
    D: AsRef<Path>,
{
    let path = params_dir.as_ref().join(param_file_path);

    // Load the file into a string
    let params_str = read_to_string(&path).map_err(|e| LoadError::FileLoadError(path.clone(), e))?;

    // Parse the string into the parameter struct
    toml::from_str(params_str.as_str()).map_err(|e| LoadError::DeserialiseError(path, e))
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Debug, PartialEq)]
    struct Dummy {
        endpoint: String,
        period_s: f64,
    }

    #[test]
    fn test_load_from() {
        let dir = std::env::temp_dir().join("uuv_util_params_test");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("dummy.toml"),
            "endpoint = \"tcp://localhost:5000\"\nperiod_s = 0.05\n",
        )
        .unwrap();

        let p: Dummy = load_from(&dir, "dummy.toml").unwrap();
        assert_eq!(
            p,
            Dummy {
                endpoint: "tcp://localhost:5000".into(),
                period_s: 0.05
            }
        );

        match load_from::<Dummy, _>(&dir, "missing.toml") {
            Err(LoadError::FileLoadError(..)) => (),
            r => panic!("Expected a file load error, got {:?}", r),
        }
    }
}
