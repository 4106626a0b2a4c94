//! Session management
//!
//! A session is one execution of a program. It fixes the run's epoch, used to timestamp log lines,
//! and owns a directory in which the run's log file is written.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use chrono::{DateTime, Utc};
use conquer_once::OnceCell;
use log::info;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

// Internal imports
use crate::time;

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

static SESSION_EPOCH: OnceCell<DateTime<Utc>> = OnceCell::uninit();

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// A chrono format string which diplays a timestamp. See
/// https://docs.rs/chrono/0.4.11/chrono/format/strftime/index.html for more
/// information.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A struct storing information about the current session
#[derive(Clone, Debug)]
pub struct Session {
    /// The root directory for this session
    pub session_root: PathBuf,

    /// The path to the session's log file
    pub log_file_path: PathBuf,

    /// The name of the session, `{exec_name}_{tag}_{timestamp}`
    pub name: String,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors associated with the session module.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Cannot determine the software root directory: {0}")]
    SwRootNotFound(std::io::Error),

    #[error("Cannot create the session directory: {0}")]
    CannotCreateDir(std::io::Error),

    #[error(
        "Cannot initialise the session epoch, have you already initialised the \
         session? (conquer_once error: {0})"
    )]
    CannotInitEpoch(conquer_once::TryInitError),

    #[error("Cannot get the epoch time, did you forget to initialise the session?")]
    CannotGetEpoch,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Session {
    /// Start a new session within the given directory.
    ///
    /// `tag` distinguishes different kinds of run of the same executable (for example hardware and
    /// simulated runs). This will create a new session directory named
    /// `{exec_name}_{tag}_{timestamp}` holding a log file of the same name.
    pub fn new(exec_name: &str, sessions_dir: &str, tag: &str) -> Result<Self, SessionError> {
        // Set the session epoch
        SESSION_EPOCH
            .try_init_once(Utc::now)
            .map_err(SessionError::CannotInitEpoch)?;

        let epoch = SESSION_EPOCH.get().ok_or(SessionError::CannotGetEpoch)?;

        let name = session_name(exec_name, tag, epoch);

        // Get the root directory
        let root = crate::host::get_uuv_sw_root().map_err(SessionError::SwRootNotFound)?;

        // Create the session path
        let mut path: PathBuf = root;
        path.push(sessions_dir);
        path.push(&name);

        fs::create_dir_all(&path).map_err(SessionError::CannotCreateDir)?;

        let log_file_path = path.join(format!("{}.log", name));

        Ok(Session {
            session_root: path,
            log_file_path,
            name,
        })
    }

    /// Exit the session.
    pub fn exit(self) {
        info!(
            "Session {} ended after {:.03} s",
            self.name,
            get_elapsed_seconds()
        );
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the number of seconds elapsed since the start of the session.
///
/// If the session has not been started `NAN` is returned.
pub fn get_elapsed_seconds() -> f64 {
    match SESSION_EPOCH.get() {
        Some(e) => time::duration_to_seconds(Utc::now() - *e).unwrap_or(std::f64::NAN),
        None => std::f64::NAN,
    }
}

/// Return a reference to the session's epoch, if the session has been started.
pub fn get_epoch() -> Option<&'static DateTime<Utc>> {
    SESSION_EPOCH.get()
}

/// Build the session name from the executable name, tag and epoch.
pub fn session_name(exec_name: &str, tag: &str, epoch: &DateTime<Utc>) -> String {
    format!("{}_{}_{}", exec_name, tag, epoch.format(TIMESTAMP_FORMAT))
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_session_name() {
        let epoch = Utc.ymd(2026, 10, 18).and_hms(9, 5, 3);

        assert_eq!(
            session_name("uuv_exec", "sim", &epoch),
            "uuv_exec_sim_20261018_090503"
        );
        assert_eq!(
            session_name("uuv_exec", "hw", &epoch),
            "uuv_exec_hw_20261018_090503"
        );
    }
}
