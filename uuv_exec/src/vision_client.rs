//! # Vision client
//!
//! Sources of marker observations for the control loop. [`VisionClient`] subscribes to the live
//! vision server, [`ReplaySource`] plays back a recorded session one observation per tick.
//!
//! A source never fails because the marker isn't visible, that's an `Ok` observation with
//! `present` set to `false`. An `Err` means the source itself is broken.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, trace};
use std::{
    collections::VecDeque,
    fs,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use comms_if::{
    eqpt::{MarkerMsg, MarkerObservation},
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Something which provides one marker observation per control cycle.
pub trait MarkerSource {
    /// Get the observation for this cycle.
    fn observe(&mut self) -> Result<MarkerObservation, VisionError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Subscriber to the vision server's marker messages.
pub struct VisionClient {
    socket: MonitoredSocket,

    /// Observations older than this are treated as no marker
    stale_after: Duration,

    /// Newest observation and when it was received
    latest: Option<(Instant, MarkerObservation)>,
}

/// Playback of recorded observations.
///
/// The file holds one JSON [`MarkerObservation`] per line. Blank lines and lines starting with
/// `#` are skipped.
pub struct ReplaySource {
    path: PathBuf,
    observations: VecDeque<MarkerObservation>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("The vision server is not connected")]
    NotConnected,

    #[error("Could not load the replay file {0:?}: {1}")]
    ReplayLoadError(PathBuf, std::io::Error),

    #[error("Invalid observation on line {0} of the replay file: {1}")]
    ReplayParseError(usize, serde_json::Error),

    #[error("The replay file has no observations")]
    ReplayEmpty,

    #[error("End of the replay file reached")]
    EndOfReplay,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl VisionClient {
    /// Connect to the vision server's publisher at `endpoint`.
    pub fn new(
        ctx: &zmq::Context,
        endpoint: &str,
        stale_after_s: f64,
    ) -> Result<Self, VisionError> {
        let socket_options = SocketOptions {
            connect_timeout: 2000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: 10,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::SUB, socket_options, endpoint)
            .map_err(VisionError::SocketError)?;

        debug!("Subscribed to the vision server at {}", endpoint);

        Ok(Self {
            socket,
            stale_after: Duration::try_from_secs_f64(stale_after_s).unwrap_or_default(),
            latest: None,
        })
    }
}

impl MarkerSource for VisionClient {
    fn observe(&mut self) -> Result<MarkerObservation, VisionError> {
        if !self.socket.connected() {
            return Err(VisionError::NotConnected);
        }

        // Drain everything queued since the last cycle, keeping only the newest
        while let Some(msg) = self
            .socket
            .try_recv_json::<MarkerMsg>()
            .map_err(VisionError::SocketError)?
        {
            trace!("Marker message from {}", msg.timestamp);
            self.latest = Some((Instant::now(), msg.observation));
        }

        Ok(fresh_or_absent(self.latest, self.stale_after, Instant::now()))
    }
}

impl ReplaySource {
    /// Load a replay file.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, VisionError> {
        let path = path.as_ref().to_path_buf();

        let content = fs::read_to_string(&path)
            .map_err(|e| VisionError::ReplayLoadError(path.clone(), e))?;

        let source = Self::from_str(&content)?;

        debug!(
            "Loaded {} observations from {:?}",
            source.observations.len(),
            path
        );

        Ok(Self { path, ..source })
    }

    /// Parse replay content held in memory.
    pub fn from_str(content: &str) -> Result<Self, VisionError> {
        let mut observations = VecDeque::new();

        for (i, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            observations.push_back(
                serde_json::from_str(line).map_err(|e| VisionError::ReplayParseError(i + 1, e))?,
            );
        }

        if observations.is_empty() {
            return Err(VisionError::ReplayEmpty);
        }

        Ok(Self {
            path: PathBuf::new(),
            observations,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of observations not yet played back.
    pub fn remaining(&self) -> usize {
        self.observations.len()
    }
}

impl MarkerSource for ReplaySource {
    fn observe(&mut self) -> Result<MarkerObservation, VisionError> {
        self.observations
            .pop_front()
            .ok_or(VisionError::EndOfReplay)
    }
}

impl<S: MarkerSource + ?Sized> MarkerSource for Box<S> {
    fn observe(&mut self) -> Result<MarkerObservation, VisionError> {
        (**self).observe()
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// The latest observation if it's recent enough, otherwise an absent one.
fn fresh_or_absent(
    latest: Option<(Instant, MarkerObservation)>,
    stale_after: Duration,
    now: Instant,
) -> MarkerObservation {
    match latest {
        Some((rx_time, obs)) if now.saturating_duration_since(rx_time) <= stale_after => obs,
        _ => MarkerObservation::absent(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const REPLAY: &str = r#"
        # Recorded at the test tank
        {"present": true, "area": 18000.0, "left_edge_length": 130.0, "right_edge_length": 134.0, "center_x": 350.0, "center_y": 230.0, "frame_width": 640, "frame_height": 480}

        {"present": false}
    "#;

    #[test]
    fn test_replay_plays_in_order_then_ends() {
        let mut src = ReplaySource::from_str(REPLAY).unwrap();
        assert_eq!(src.remaining(), 2);

        let first = src.observe().unwrap();
        assert!(first.present);
        assert_eq!(first.area, 18000.0);
        assert_eq!(first.frame_width, 640);

        assert!(!src.observe().unwrap().present);

        assert!(matches!(src.observe(), Err(VisionError::EndOfReplay)));
    }

    #[test]
    fn test_replay_errors() {
        assert!(matches!(
            ReplaySource::from_str("# nothing here\n\n"),
            Err(VisionError::ReplayEmpty)
        ));
        assert!(matches!(
            ReplaySource::from_str("{\"present\": true}\nnot json\n"),
            Err(VisionError::ReplayParseError(2, _))
        ));
        assert!(matches!(
            ReplaySource::new("/nonexistent/replay.jsonl"),
            Err(VisionError::ReplayLoadError(_, _))
        ));
    }

    #[test]
    fn test_stale_observations_are_absent() {
        let mut obs = MarkerObservation::absent();
        obs.present = true;
        obs.area = 100.0;

        let rx = Instant::now();
        let stale_after = Duration::from_millis(500);

        assert_eq!(fresh_or_absent(Some((rx, obs)), stale_after, rx), obs);
        assert_eq!(
            fresh_or_absent(Some((rx, obs)), stale_after, rx + Duration::from_millis(400)),
            obs
        );
        assert!(
            !fresh_or_absent(Some((rx, obs)), stale_after, rx + Duration::from_millis(600)).present
        );
        assert!(!fresh_or_absent(None, stale_after, rx).present);
    }
}
