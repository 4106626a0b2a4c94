//! # Control orchestrator
//!
//! Sequences a stabilisation run: connect to the vehicle, arm it, run the control loop until
//! cancelled, then shut the vehicle down. The shutdown sequence always runs to completion, and
//! is also attempted after a failed startup.
//!
//! ```text
//! INIT -> CONNECTING -> ARMING -> RUNNING -> SHUTTING_DOWN -> TERMINATED
//!              |            |                     ^
//!              +------------+-----> ERROR --------+
//! ```

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod state;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Serialize;
use std::fmt;

use crate::link::LinkError;

pub use state::*;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// States of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrchState {
    Init,
    Connecting,
    Arming,
    Running,
    ShuttingDown,
    Terminated,
    Error,
}

/// The steps of the shutdown sequence, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ShutdownStep {
    NeutralFrame,
    ResetOverride,
    Disarm,
    Disconnect,
}

/// Startup failures, which abort the run.
#[derive(Debug, thiserror::Error)]
pub enum OrchError {
    #[error("Could not connect to the vehicle: {0}")]
    LinkConnect(LinkError),

    #[error("Could not arm the vehicle: {0}")]
    LinkArm(LinkError),
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Totals for a run which started successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Number of control cycles run
    pub ticks: u64,

    /// Cycles in which no marker was available
    pub marker_absent_ticks: u64,

    /// Cycles whose frame could not be sent
    pub dispatch_failures: u64,

    /// Failures of the marker source
    pub vision_faults: u64,

    /// Shutdown steps which failed
    pub shutdown_failures: u64,

    pub final_state: OrchState,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ShutdownStep {
    pub const ALL: [ShutdownStep; 4] = [
        ShutdownStep::NeutralFrame,
        ShutdownStep::ResetOverride,
        ShutdownStep::Disarm,
        ShutdownStep::Disconnect,
    ];
}

impl Default for RunSummary {
    fn default() -> Self {
        Self {
            ticks: 0,
            marker_absent_ticks: 0,
            dispatch_failures: 0,
            vision_faults: 0,
            shutdown_failures: 0,
            final_state: OrchState::Init,
        }
    }
}

impl fmt::Display for OrchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrchState::Init => "INIT",
            OrchState::Connecting => "CONNECTING",
            OrchState::Arming => "ARMING",
            OrchState::Running => "RUNNING",
            OrchState::ShuttingDown => "SHUTTING_DOWN",
            OrchState::Terminated => "TERMINATED",
            OrchState::Error => "ERROR",
        };
        f.write_str(s)
    }
}

impl fmt::Display for ShutdownStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ShutdownStep::NeutralFrame => "neutral frame",
            ShutdownStep::ResetOverride => "override reset",
            ShutdownStep::Disarm => "disarm",
            ShutdownStep::Disconnect => "disconnect",
        };
        f.write_str(s)
    }
}
