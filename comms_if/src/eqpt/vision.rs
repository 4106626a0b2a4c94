//! # Vision Equipment Communications Module
//!
//! Marker geometry published by the vision process, one observation per processed frame.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{serde::ts_milliseconds, DateTime, Utc};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Geometric summary of the tracked fiducial marker in a single frame.
///
/// When `present` is `false` none of the geometry fields carry meaning.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct MarkerObservation {
    /// Whether a marker was detected in the frame.
    pub present: bool,

    /// Area enclosed by the marker's corners.
    ///
    /// Units: pixels^2
    #[serde(default)]
    pub area: f64,

    /// Length of the marker's left edge.
    ///
    /// Units: pixels
    #[serde(default)]
    pub left_edge_length: f64,

    /// Length of the marker's right edge.
    ///
    /// Units: pixels
    #[serde(default)]
    pub right_edge_length: f64,

    /// Horizontal position of the marker's centre, from the left of the frame.
    ///
    /// Units: pixels
    #[serde(default)]
    pub center_x: f64,

    /// Vertical position of the marker's centre, from the top of the frame.
    ///
    /// Units: pixels
    #[serde(default)]
    pub center_y: f64,

    /// Width of the frame the marker was found in.
    #[serde(default)]
    pub frame_width: u32,

    /// Height of the frame the marker was found in.
    #[serde(default)]
    pub frame_height: u32,
}

/// Message published by the vision server.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MarkerMsg {
    /// UTC timestamp at which the frame was acquired
    #[serde(with = "ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// The observation extracted from the frame
    pub observation: MarkerObservation,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MarkerObservation {
    /// An observation reporting that no marker is visible.
    pub fn absent() -> Self {
        Self {
            present: false,
            area: 0.0,
            left_edge_length: 0.0,
            right_edge_length: 0.0,
            center_x: 0.0,
            center_y: 0.0,
            frame_width: 0,
            frame_height: 0,
        }
    }
}

impl Default for MarkerObservation {
    fn default() -> Self {
        Self::absent()
    }
}
