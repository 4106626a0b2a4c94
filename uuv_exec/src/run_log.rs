//! # Run log
//!
//! The per-run event record. One line is appended for each event of the run (state changes,
//! connection and arming, a summary of every cycle, each shutdown step and each fault). Every
//! line starts with the seconds elapsed since the log was opened.
//!
//! Events are mirrored to the console logger. Writing to the run log never fails the run, failed
//! writes are counted and warned about.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, warn, Level};
use std::{
    fmt,
    fs::{File, OpenOptions},
    io::{self, BufWriter, Write},
    path::Path,
    time::Instant,
};

use comms_if::eqpt::ControlFrame;

use crate::orch::{OrchState, RunSummary, ShutdownStep};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An open run log writing to `W`.
pub struct RunLog<W: Write> {
    writer: W,

    opened: Instant,

    closed: bool,

    write_failures: u64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Something that happened during a run.
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// The orchestrator moved between states
    Transition(OrchState, OrchState),

    /// Result of connecting to the vehicle
    Connect {
        endpoint: String,
        error: Option<String>,
    },

    /// Result of arming the vehicle
    Arm { error: Option<String> },

    /// A completed control cycle
    Tick {
        tick: u64,
        dt_s: f64,
        marker_present: bool,
        frame: ControlFrame,
    },

    /// The frame of a cycle could not be sent
    DispatchFault { tick: u64, error: String },

    /// The marker source failed
    VisionFault { consecutive: u32, error: String },

    /// The run is stopping on its own
    Stopping { reason: String },

    /// Result of one shutdown step
    Shutdown {
        step: ShutdownStep,
        error: Option<String>,
    },

    /// The link shutdown steps were not attempted
    ShutdownSkipped { reason: String },

    /// Totals for the run
    Summary(RunSummary),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RunLog<BufWriter<File>> {
    /// Open the run log at `path`, appending if the file already exists.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;

        Ok(Self::from_writer(BufWriter::new(file)))
    }
}

impl<W: Write> RunLog<W> {
    /// Create a run log writing to any sink.
    pub fn from_writer(writer: W) -> Self {
        Self {
            writer,
            opened: Instant::now(),
            closed: false,
            write_failures: 0,
        }
    }

    /// Append an event to the log.
    pub fn record(&mut self, event: RunEvent) {
        log::log!(event.level(), "{}", event);

        if self.closed {
            warn!("Run log already closed, event not recorded");
            self.write_failures += 1;
            return;
        }

        let result = writeln!(
            self.writer,
            "[{:10.3}] {}",
            self.opened.elapsed().as_secs_f64(),
            event
        );

        if let Err(e) = result {
            self.write_failures += 1;
            warn!("Could not write to the run log: {}", e);
        }
    }

    /// Flush and close the log. Later events are not written.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }

        if let Err(e) = self.writer.flush() {
            self.write_failures += 1;
            warn!("Could not flush the run log: {}", e);
        }

        self.closed = true;
        debug!("Run log closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of events which could not be written.
    pub fn write_failures(&self) -> u64 {
        self.write_failures
    }

    /// Consume the log, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl RunEvent {
    /// Level the event is mirrored to the console at.
    fn level(&self) -> Level {
        match self {
            RunEvent::Tick { .. } => Level::Debug,
            RunEvent::Connect { error: Some(_), .. } | RunEvent::Arm { error: Some(_) } => {
                Level::Error
            }
            RunEvent::DispatchFault { .. }
            | RunEvent::VisionFault { .. }
            | RunEvent::Shutdown { error: Some(_), .. }
            | RunEvent::ShutdownSkipped { .. } => Level::Warn,
            _ => Level::Info,
        }
    }
}

impl fmt::Display for RunEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunEvent::Transition(from, to) => write!(f, "STATE {} -> {}", from, to),
            RunEvent::Connect {
                endpoint,
                error: None,
            } => write!(f, "CONNECT {} ok", endpoint),
            RunEvent::Connect {
                endpoint,
                error: Some(e),
            } => write!(f, "CONNECT {} failed: {}", endpoint, e),
            RunEvent::Arm { error: None } => write!(f, "ARM ok"),
            RunEvent::Arm { error: Some(e) } => write!(f, "ARM failed: {}", e),
            RunEvent::Tick {
                tick,
                dt_s,
                marker_present,
                frame,
            } => write!(
                f,
                "TICK {} dt={:.3} marker={} {}",
                tick,
                dt_s,
                match marker_present {
                    true => "yes",
                    false => "no",
                },
                frame
            ),
            RunEvent::DispatchFault { tick, error } => {
                write!(f, "DISPATCH tick {} failed: {}", tick, error)
            }
            RunEvent::VisionFault { consecutive, error } => {
                write!(f, "VISION fault ({} consecutive): {}", consecutive, error)
            }
            RunEvent::Stopping { reason } => write!(f, "STOPPING {}", reason),
            RunEvent::Shutdown { step, error: None } => write!(f, "SHUTDOWN {} ok", step),
            RunEvent::Shutdown {
                step,
                error: Some(e),
            } => write!(f, "SHUTDOWN {} failed: {}", step, e),
            RunEvent::ShutdownSkipped { reason } => write!(f, "SHUTDOWN skipped: {}", reason),
            RunEvent::Summary(s) => write!(
                f,
                "SUMMARY ticks={} marker_absent={} dispatch_failures={} vision_faults={} \
                 shutdown_failures={} final_state={}",
                s.ticks,
                s.marker_absent_ticks,
                s.dispatch_failures,
                s.vision_faults,
                s.shutdown_failures,
                s.final_state
            ),
        }
    }
}
