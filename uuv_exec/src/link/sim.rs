//! # Simulated link
//!
//! A [`VehicleLink`] which never touches a vehicle. Every call succeeds and prints a notice of
//! what would have happened, dispatched frames are shown as a per-channel status block at most
//! once per second.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;
use owo_colors::OwoColorize;
use std::{
    io::Write,
    time::{Duration, Instant},
};

use comms_if::eqpt::{ControlFrame, NUM_RC_CHANNELS, RC_IGNORE};

use super::{LinkError, VehicleLink};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Minimum time between two printed status blocks.
const PRINT_PERIOD: Duration = Duration::from_secs(1);

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Simulated link writing its output to `W`.
pub struct SimLink<W: Write> {
    sink: W,

    /// Highlight non-neutral commands with terminal colours
    colour: bool,

    last_print: Option<Instant>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<W: Write> SimLink<W> {
    pub fn new(sink: W, colour: bool) -> Self {
        Self {
            sink,
            colour,
            last_print: None,
        }
    }

    /// Consume the link, returning the sink.
    pub fn into_inner(self) -> W {
        self.sink
    }

    fn notice(&mut self, msg: &str) {
        self.emit(&format!("[SIM] {}", msg));
    }

    fn emit(&mut self, line: &str) {
        if let Err(e) = writeln!(self.sink, "{}", line) {
            warn!("Could not write simulated link output: {}", e);
        }
    }

    fn print_frame(&mut self, frame: &ControlFrame) {
        let channels = frame.to_rc_channels();

        self.emit("[SIM] ---- RC override ----");

        for ch in 1..=NUM_RC_CHANNELS {
            let value = channels[ch - 1];

            let axis = frame
                .iter()
                .find(|(_, cmd)| cmd.channel_id as usize == ch)
                .map(|(a, _)| a);

            let line = match axis {
                Some(a) if value != RC_IGNORE => {
                    let desc = format!("{:4} {} ({})", value, a.label(value), a);
                    match self.colour && !frame.get(a).is_neutral() {
                        true => format!("[SIM] Ch{}: {}", ch, desc.yellow().bold()),
                        false => format!("[SIM] Ch{}: {}", ch, desc),
                    }
                }
                _ => format!("[SIM] Ch{}: {:4} (ignore)", ch, value),
            };

            self.emit(&line);
        }

        if let Err(e) = self.sink.flush() {
            warn!("Could not flush simulated link output: {}", e);
        }
    }
}

impl<W: Write> VehicleLink for SimLink<W> {
    fn connect(&mut self, endpoint: &str) -> Result<(), LinkError> {
        self.notice(&format!("Connected to {} (simulated)", endpoint));
        Ok(())
    }

    fn arm(&mut self) -> Result<(), LinkError> {
        self.notice("Vehicle armed (simulated)");
        Ok(())
    }

    fn dispatch(&mut self, frame: &ControlFrame) -> Result<(), LinkError> {
        let due = match self.last_print {
            Some(t) => t.elapsed() >= PRINT_PERIOD,
            None => true,
        };

        if due {
            self.print_frame(frame);
            self.last_print = Some(Instant::now());
        }

        Ok(())
    }

    fn reset_override(&mut self) -> Result<(), LinkError> {
        self.notice("RC override released (simulated)");
        Ok(())
    }

    fn disarm(&mut self) -> Result<(), LinkError> {
        self.notice("Vehicle disarmed (simulated)");
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), LinkError> {
        self.notice("Disconnected (simulated)");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::eqpt::AxisCommand;

    fn output(link: SimLink<Vec<u8>>) -> String {
        String::from_utf8(link.into_inner()).unwrap()
    }

    #[test]
    fn test_status_block_rate_limited() {
        let mut link = SimLink::new(Vec::new(), false);

        let mut frame = ControlFrame::neutral();
        link.dispatch(&frame).unwrap();
        frame.forward = AxisCommand::new(5, 1650);
        link.dispatch(&frame).unwrap();

        let out = output(link);
        assert_eq!(out.matches("[SIM] Ch1:").count(), 1);
        assert!(!out.contains("FORWARD"));
    }

    #[test]
    fn test_status_block_contents() {
        let mut link = SimLink::new(Vec::new(), false);

        let mut frame = ControlFrame::neutral();
        frame.forward = AxisCommand::new(5, 1650);
        frame.throttle = AxisCommand::new(3, 1400);
        link.dispatch(&frame).unwrap();

        let out = output(link);
        assert!(out.contains("[SIM] Ch1:    0 (ignore)"));
        assert!(out.contains("[SIM] Ch3: 1400 DOWN (Throttle)"));
        assert!(out.contains("[SIM] Ch4: 1500 STRAIGHT (Yaw)"));
        assert!(out.contains("[SIM] Ch5: 1650 FORWARD (Forward)"));
        assert!(out.contains("[SIM] Ch6: 1500 CENTER (Lateral)"));
        assert!(out.contains("[SIM] Ch8:    0 (ignore)"));
    }

    #[test]
    fn test_calls_never_fail() {
        let mut link = SimLink::new(Vec::new(), true);

        assert!(link.connect("tcp://localhost:5760").is_ok());
        assert!(link.arm().is_ok());
        assert!(link.dispatch(&ControlFrame::neutral()).is_ok());
        assert!(link.reset_override().is_ok());
        assert!(link.disarm().is_ok());
        assert!(link.disconnect().is_ok());

        let out = output(link);
        assert!(out.contains("tcp://localhost:5760"));
        assert!(out.contains("disarmed"));
    }
}
