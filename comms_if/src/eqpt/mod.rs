//! # Equipment Interface
//!
//! This module defines the interface structures which are exchanged with the vehicle's equipment
//! processes (the flight-controller bridge and the vision server).

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod link;
pub mod vision;

// -----------------------------------------------------------------------------------------------
// EXPORTS
// -----------------------------------------------------------------------------------------------

pub use link::*;
pub use vision::*;
