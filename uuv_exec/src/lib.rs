//! # UUV library.
//!
//! This library allows other crates in the workspace, and the benchmarks, to access items defined
//! inside the UUV executable crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Axis control module - turns marker observations into commands for the four axes
pub mod axis_ctrl;

/// Cancellation token - lets other threads stop the control loop
pub mod cancel;

/// Vehicle link - hardware and simulated connections to the flight controller
pub mod link;

/// Orchestrator - sequences connection, arming, the control loop and shutdown
pub mod orch;

/// Parameters of the executable
pub mod params;

/// Run log - the per-run event record
pub mod run_log;

/// Vision client - live and recorded sources of marker observations
pub mod vision_client;
