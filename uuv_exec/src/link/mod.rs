//! # Vehicle link
//!
//! The orchestrator drives the vehicle through the [`VehicleLink`] trait. Two implementations
//! exist: [`BridgeLink`], which talks to the flight-controller bridge over the network, and
//! [`SimLink`], which prints what it would have sent. The variant is chosen once at startup.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod bridge;
mod sim;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{eqpt::ControlFrame, net::MonitoredSocketError};

pub use bridge::*;
pub use sim::*;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A connection to the vehicle's flight controller.
///
/// Every call reports success or failure, none of them panic. Failures of `dispatch` and of the
/// shutdown calls are recoverable for the caller, failures of `connect` and `arm` are not.
pub trait VehicleLink {
    /// Establish the connection to the flight controller at `endpoint`.
    fn connect(&mut self, endpoint: &str) -> Result<(), LinkError>;

    /// Arm the vehicle so that commands take physical effect.
    fn arm(&mut self) -> Result<(), LinkError>;

    /// Send one frame of commands.
    fn dispatch(&mut self, frame: &ControlFrame) -> Result<(), LinkError>;

    /// Hand every channel back to the flight controller.
    fn reset_override(&mut self) -> Result<(), LinkError>;

    /// Disarm the vehicle.
    fn disarm(&mut self) -> Result<(), LinkError>;

    /// Close the connection.
    fn disconnect(&mut self) -> Result<(), LinkError>;
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum LinkError {
    #[error("The link is not connected")]
    NotConnected,

    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("The bridge rejected the {0} request: {1}")]
    Rejected(&'static str, String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<L: VehicleLink + ?Sized> VehicleLink for Box<L> {
    fn connect(&mut self, endpoint: &str) -> Result<(), LinkError> {
        (**self).connect(endpoint)
    }

    fn arm(&mut self) -> Result<(), LinkError> {
        (**self).arm()
    }

    fn dispatch(&mut self, frame: &ControlFrame) -> Result<(), LinkError> {
        (**self).dispatch(frame)
    }

    fn reset_override(&mut self) -> Result<(), LinkError> {
        (**self).reset_override()
    }

    fn disarm(&mut self) -> Result<(), LinkError> {
        (**self).disarm()
    }

    fn disconnect(&mut self) -> Result<(), LinkError> {
        (**self).disconnect()
    }
}
