//! # UUV Executable Parameters
//!
//! This module provide parameters for the UUV executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct UuvExecParams {
    /// Network endpoint of the flight-controller bridge
    pub link_endpoint: String,

    /// Which vehicle link to drive
    pub link: LinkKind,

    /// Network endpoint the vision server publishes marker messages on
    pub vision_endpoint: String,

    /// Observations older than this are treated as no marker.
    ///
    /// Units: seconds
    pub vision_stale_after_s: f64,

    /// Target duration of one control cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Number of consecutive vision faults after which the run is stopped
    pub max_consec_vision_errors: u32,

    /// Bypass the flight controller's pre-arm checks when arming
    pub force_arm: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The vehicle link variants.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// The real vehicle, through the flight-controller bridge
    Hardware,

    /// Print commands instead of sending them
    Simulated,
}

/// Invalid executable parameters.
#[derive(Debug, thiserror::Error)]
pub enum UuvExecParamsError {
    #[error("{0} must be positive and finite, got {1}")]
    NotPositive(&'static str, f64),

    #[error("max_consec_vision_errors must be at least 1")]
    NoVisionErrorAllowance,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for UuvExecParams {
    fn default() -> Self {
        Self {
            link_endpoint: "tcp://localhost:5760".into(),
            link: LinkKind::Hardware,
            vision_endpoint: "tcp://localhost:5770".into(),
            vision_stale_after_s: 0.5,
            cycle_period_s: 0.05,
            max_consec_vision_errors: 5,
            force_arm: false,
        }
    }
}

impl UuvExecParams {
    /// Check the parameters are usable.
    pub fn validate(&self) -> Result<(), UuvExecParamsError> {
        for (name, value) in [
            ("cycle_period_s", self.cycle_period_s),
            ("vision_stale_after_s", self.vision_stale_after_s),
        ]
        .iter()
        {
            if !value.is_finite() || *value <= 0.0 {
                return Err(UuvExecParamsError::NotPositive(*name, *value));
            }
        }

        if self.max_consec_vision_errors == 0 {
            return Err(UuvExecParamsError::NoVisionErrorAllowance);
        }

        Ok(())
    }
}

impl LinkKind {
    /// Tag identifying the kind of run in session and log names.
    pub fn tag(&self) -> &'static str {
        match self {
            LinkKind::Hardware => "hw",
            LinkKind::Simulated => "sim",
        }
    }
}
