//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the stabilisation software.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Command, observation and bridge message definitions for equipment
pub mod eqpt;

/// Network module
pub mod net;
