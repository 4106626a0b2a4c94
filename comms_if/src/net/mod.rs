//! # Network Module
//!
//! This module provides networking abstractions over ZMQ, used to talk to the flight-controller
//! bridge and to receive marker observations from the vision server.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{de::DeserializeOwned, Serialize};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    thread,
};
use zmq::{Context, Socket, SocketEvent, SocketType};

// Export zmq
pub use zmq;

// ------------------------------------------------------------------------------------------------
// MACROS
// ------------------------------------------------------------------------------------------------

macro_rules! set_sockopts {
    ($socket:expr, $(($opt:ident, $val:expr)),+) => {
        $(
            $socket.$opt($val)
                .map_err(|e| MonitoredSocketError::SocketOptionError(stringify!($opt).into(), e))?;
        )+
    };
}

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// How long the monitor thread waits for an event before checking for shutdown.
///
/// Units: milliseconds
const MONITOR_POLL_TIMEOUT_MS: i64 = 100;

// ------------------------------------------------------------------------------------------------
// STATICS
// ------------------------------------------------------------------------------------------------

/// Number of monitors that are registered. Used to provide unique IDs for each mointor endpoint.
static NUM_MONITORS: AtomicUsize = AtomicUsize::new(0);

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A zmq socket which is monitored providing additional information.
///
/// A background thread is run in order to monitor activity on the socket and update visible
/// information to the user. Currently this is only whether or not the socket is connected.
pub struct MonitoredSocket {
    socket: Socket,

    join_handle: Option<thread::JoinHandle<()>>,

    shutdown: Arc<AtomicBool>,

    connected: Arc<AtomicBool>,
}

/// Represents options which can be set on a monitored socket.
///
/// Most options here correspond to those found in the
/// [`zmq_setsockopt`](http://api.zeromq.org/4-2:zmq-setsockopt) documentation.
pub struct SocketOptions {
    /// If true the socket will be bound to the endpoint rather than connected to it. A bound
    /// socket never blocks waiting for a peer.
    pub bind: bool,

    /// If true the `MonitoredSocket::new()` function will block until the socket is connected, or
    /// until the connect_timeout elapses. If the timeout elapses this function will return a
    /// `MonitoredSocketError::CouldNotConnect` error.
    ///
    /// The default value is `true`.
    pub block_on_first_connect: bool,

    /// `ZMQ_REQ_CORRELATE`: Match replies with requests
    pub req_correlate: bool,

    /// `ZMQ_REQ_RELAXED`: relax strict alternation between request and reply
    pub req_relaxed: bool,

    /// `ZMQ_LINGER`: Set linger period for socket shutdown
    pub linger: i32,

    /// `ZMQ_RECONNECT_IVL`: Set reconnection interval
    pub reconnect_ivl: i32,

    /// `ZMQ_CONNECT_TIMEOUT`: Set `connect()` timeout
    pub connect_timeout: i32,

    /// `ZMQ_RCVTIMEO`: Maximum time before a recv operation returns with `EAGAIN`
    pub recv_timeout: i32,

    /// `ZMQ_SNDTIMEO`: Maximum time before a send operation returns with `EAGAIN`
    pub send_timeout: i32,

    /// `ZMQ_HEARTBEAT_IVL`: Set interval between sending ZMTP heartbeats
    pub heartbeat_ivl: i32,

    /// `ZMQ_HEARTBEAT_TIMEOUT`: Set timeout for ZMTP heartbeats
    pub heartbeat_timeout: i32,

    /// `ZMQ_HEARTBEAT_TTL`: Set the TTL (time to live) value for ZMTP heartbeats
    pub heartbeat_ttl: i32,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum MonitoredSocketError {
    #[error("Error creating the socket: {0}")]
    CreateSocketError(zmq::Error),

    #[error("Error enabling monitoring for the socket: {0}")]
    MonitoringEnableError(zmq::Error),

    #[error("Could not connect the socket: {0:?}")]
    CouldNotConnect(Option<zmq::Error>),

    #[error("Could not read event from monitor socket: {0}")]
    EventReadError(zmq::Error),

    #[error("Could not set the {0} socket option: {1}")]
    SocketOptionError(String, zmq::Error),

    #[error("Could not send the message: {0}")]
    SendError(zmq::Error),

    #[error("Could not recieve a message: {0}")]
    RecvError(zmq::Error),

    #[error("Could not serialize the message: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not deserialize the message: {0}")]
    DeserializeError(serde_json::Error),

    #[error("Recieved a message which is not valid UTF-8")]
    NotUtf8,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MonitoredSocket {
    /// Create a new monitored socket and connect it to `endpoint`.
    ///
    /// ## Arguments
    /// - `ctx`: the zmq context which will be used to create the socket
    /// - `socket_type`: the type of zmq socket to create
    /// - `socket_options`: a [`SocketOptions`] struct specifying how to configure the socket
    /// - `endpoint`: a zmq endpoint string, such as `"tcp://localhost:4000"`
    pub fn new(
        ctx: &Context,
        socket_type: SocketType,
        socket_options: SocketOptions,
        endpoint: &str,
    ) -> Result<Self, MonitoredSocketError> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let connected = Arc::new(AtomicBool::new(false));

        let socket = ctx
            .socket(socket_type)
            .map_err(MonitoredSocketError::CreateSocketError)?;

        let monitor_endpoint = format!(
            "inproc://monitor_{}",
            NUM_MONITORS.fetch_add(1, Ordering::Relaxed)
        );

        // Enable, create, and connect monitor
        socket
            .monitor(&monitor_endpoint, SocketEvent::ALL as i32)
            .map_err(MonitoredSocketError::MonitoringEnableError)?;
        let monitor = ctx
            .socket(zmq::PAIR)
            .map_err(MonitoredSocketError::CreateSocketError)?;
        monitor
            .connect(&monitor_endpoint)
            .map_err(|e| MonitoredSocketError::CouldNotConnect(Some(e)))?;

        socket_options.set(&socket)?;

        if socket_options.bind {
            socket
                .bind(endpoint)
                .map_err(|e| MonitoredSocketError::CouldNotConnect(Some(e)))?;
        } else {
            socket
                .connect(endpoint)
                .map_err(|e| MonitoredSocketError::CouldNotConnect(Some(e)))?;
        }

        // Wait for the monitor to signal the connection if requested
        if socket_options.block_on_first_connect && !socket_options.bind {
            let deadline = std::time::Instant::now()
                + std::time::Duration::from_millis(socket_options.connect_timeout.max(0) as u64);

            loop {
                match poll_event(&monitor, MONITOR_POLL_TIMEOUT_MS)
                    .map_err(MonitoredSocketError::EventReadError)?
                {
                    Some(SocketEvent::CONNECTED) => break,
                    _ => (),
                }

                if std::time::Instant::now() > deadline {
                    return Err(MonitoredSocketError::CouldNotConnect(None));
                }
            }

            connected.store(true, Ordering::Relaxed);
        }

        let shutdown_clone = shutdown.clone();
        let connected_clone = connected.clone();

        let join_handle =
            thread::spawn(move || monitor_socket(monitor, shutdown_clone, connected_clone));

        Ok(Self {
            socket,
            join_handle: Some(join_handle),
            shutdown,
            connected,
        })
    }

    /// Return if the socket is connected or not.
    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Serialize `msg` as JSON and send it.
    pub fn send_json<T: Serialize>(&self, msg: &T) -> Result<(), MonitoredSocketError> {
        let msg_str =
            serde_json::to_string(msg).map_err(MonitoredSocketError::SerializationError)?;

        self.socket
            .send(msg_str.as_str(), 0)
            .map_err(MonitoredSocketError::SendError)
    }

    /// Recieve a JSON message, blocking for at most the socket's recieve timeout.
    pub fn recv_json<T: DeserializeOwned>(&self) -> Result<T, MonitoredSocketError> {
        self.recv_json_flags(0)
    }

    /// Recieve a JSON message if one is already waiting.
    ///
    /// Returns `Ok(None)` if no message is queued.
    pub fn try_recv_json<T: DeserializeOwned>(&self) -> Result<Option<T>, MonitoredSocketError> {
        match self.recv_json_flags(zmq::DONTWAIT) {
            Ok(m) => Ok(Some(m)),
            Err(MonitoredSocketError::RecvError(zmq::Error::EAGAIN)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn recv_json_flags<T: DeserializeOwned>(&self, flags: i32) -> Result<T, MonitoredSocketError> {
        let msg = self
            .socket
            .recv_msg(flags)
            .map_err(MonitoredSocketError::RecvError)?;

        let msg_str = msg.as_str().ok_or(MonitoredSocketError::NotUtf8)?;

        serde_json::from_str(msg_str).map_err(MonitoredSocketError::DeserializeError)
    }
}

impl Drop for MonitoredSocket {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        // The monitor polls with a timeout so it will notice the shutdown flag promptly
        if let Some(jh) = self.join_handle.take() {
            jh.join().ok();
        }
    }
}

impl SocketOptions {
    /// Set these options on the given socket.
    pub fn set(&self, socket: &Socket) -> Result<(), MonitoredSocketError> {
        set_sockopts!(
            socket,
            (set_connect_timeout, self.connect_timeout),
            (set_heartbeat_ivl, self.heartbeat_ivl),
            (set_heartbeat_timeout, self.heartbeat_timeout),
            (set_heartbeat_ttl, self.heartbeat_ttl),
            (set_linger, self.linger),
            (set_reconnect_ivl, self.reconnect_ivl),
            (set_rcvtimeo, self.recv_timeout),
            (set_sndtimeo, self.send_timeout)
        );

        // If the socket is a req type set the req-specific options
        if let Ok(SocketType::REQ) = socket.get_socket_type() {
            set_sockopts!(
                socket,
                (set_req_correlate, self.req_correlate),
                (set_req_relaxed, self.req_relaxed)
            );
        }

        // Subscribers get everything, filtering happens on the message contents
        if let Ok(SocketType::SUB) = socket.get_socket_type() {
            set_sockopts!(socket, (set_subscribe, b""));
        }

        Ok(())
    }
}

impl Default for SocketOptions {
    fn default() -> Self {
        // Defaults for sockopts taken from http://api.zeromq.org/4-2:zmq-setsockopt
        Self {
            bind: false,
            block_on_first_connect: true,
            connect_timeout: 0,
            heartbeat_ivl: 0,
            heartbeat_timeout: 0,
            heartbeat_ttl: 0,
            linger: 30_000,
            reconnect_ivl: 100,
            recv_timeout: -1,
            req_correlate: false,
            req_relaxed: false,
            send_timeout: 0,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Wait up to `timeout_ms` for an event on the monitor socket.
fn poll_event(monitor: &Socket, timeout_ms: i64) -> Result<Option<SocketEvent>, zmq::Error> {
    if monitor.poll(zmq::POLLIN, timeout_ms)? == 0 {
        return Ok(None);
    }

    let msg = monitor.recv_msg(0)?;

    if msg.len() < 2 {
        return Ok(None);
    }
    let event = u16::from_ne_bytes([msg[0], msg[1]]);

    // The second frame is the address, we'll ignore it
    if monitor.get_rcvmore()? {
        let _ = monitor.recv_msg(0)?;
    }

    Ok(Some(SocketEvent::from_raw(event)))
}

fn monitor_socket(monitor: Socket, shutdown: Arc<AtomicBool>, connected: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::Relaxed) {
        match poll_event(&monitor, MONITOR_POLL_TIMEOUT_MS) {
            Ok(Some(SocketEvent::CONNECTED)) | Ok(Some(SocketEvent::ACCEPTED)) => {
                connected.store(true, Ordering::Relaxed)
            }
            Ok(Some(SocketEvent::DISCONNECTED)) => connected.store(false, Ordering::Relaxed),
            Ok(_) => (),
            Err(_) => {
                // Monitor is gone, so we can no longer vouch for the connection
                connected.store(false, Ordering::Relaxed);
                break;
            }
        }
    }
}
