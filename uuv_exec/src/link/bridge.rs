//! # Flight-controller bridge link
//!
//! Hardware [`VehicleLink`] implementation. The flight controller's wire protocol is owned by a
//! separate bridge process, this link sends it JSON requests over a REQ socket and waits for the
//! response to each one.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info};

use comms_if::{
    eqpt::{ControlFrame, LinkRequest, LinkResponse, NUM_RC_CHANNELS, RC_IGNORE},
    net::{zmq, MonitoredSocket, SocketOptions},
};

use super::{LinkError, VehicleLink};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Link to the flight controller through the bridge process.
pub struct BridgeLink {
    ctx: zmq::Context,

    /// Request socket, `None` until `connect` succeeds
    socket: Option<MonitoredSocket>,

    /// Bypass the flight controller's pre-arm checks
    force_arm: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl BridgeLink {
    /// Create a new, unconnected, link.
    pub fn new(ctx: zmq::Context, force_arm: bool) -> Self {
        Self {
            ctx,
            socket: None,
            force_arm,
        }
    }

    /// Whether the link has a live connection to the bridge.
    pub fn connected(&self) -> bool {
        self.socket.as_ref().map(|s| s.connected()).unwrap_or(false)
    }

    /// Send a request and wait for the bridge's response.
    fn request(&self, name: &'static str, req: &LinkRequest) -> Result<(), LinkError> {
        let socket = match self.socket {
            Some(ref s) if s.connected() => s,
            _ => return Err(LinkError::NotConnected),
        };

        socket.send_json(req).map_err(LinkError::SocketError)?;

        match socket.recv_json().map_err(LinkError::SocketError)? {
            LinkResponse::Ok => Ok(()),
            LinkResponse::Rejected(reason) => Err(LinkError::Rejected(name, reason)),
        }
    }
}

impl VehicleLink for BridgeLink {
    fn connect(&mut self, endpoint: &str) -> Result<(), LinkError> {
        let socket_options = SocketOptions {
            connect_timeout: 2000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: 1000,
            send_timeout: 100,
            req_correlate: true,
            req_relaxed: true,
            ..Default::default()
        };

        debug!("Connecting to the flight-controller bridge at {}", endpoint);

        self.socket = Some(
            MonitoredSocket::new(&self.ctx, zmq::REQ, socket_options, endpoint)
                .map_err(LinkError::SocketError)?,
        );

        // The bridge only answers once it has a heartbeat from the flight controller
        self.request("connect", &LinkRequest::Connect)?;

        info!("Bridge connected to the flight controller");

        Ok(())
    }

    fn arm(&mut self) -> Result<(), LinkError> {
        self.request(
            "arm",
            &LinkRequest::Arm {
                force: self.force_arm,
            },
        )
    }

    fn dispatch(&mut self, frame: &ControlFrame) -> Result<(), LinkError> {
        self.request(
            "RC override",
            &LinkRequest::RcOverride {
                channels: frame.to_rc_channels(),
            },
        )
    }

    fn reset_override(&mut self) -> Result<(), LinkError> {
        self.request(
            "override reset",
            &LinkRequest::RcOverride {
                channels: [RC_IGNORE; NUM_RC_CHANNELS],
            },
        )
    }

    fn disarm(&mut self) -> Result<(), LinkError> {
        self.request("disarm", &LinkRequest::Disarm)
    }

    fn disconnect(&mut self) -> Result<(), LinkError> {
        let result = self.request("disconnect", &LinkRequest::Disconnect);

        // Drop the socket whatever the bridge said
        self.socket = None;

        result
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_unconnected_link_refuses_requests() {
        let mut link = BridgeLink::new(zmq::Context::new(), false);

        assert!(!link.connected());
        assert!(matches!(link.arm(), Err(LinkError::NotConnected)));
        assert!(matches!(
            link.dispatch(&ControlFrame::neutral()),
            Err(LinkError::NotConnected)
        ));
        assert!(matches!(link.disconnect(), Err(LinkError::NotConnected)));
    }
}
