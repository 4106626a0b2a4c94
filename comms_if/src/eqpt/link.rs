//! # Vehicle Link Equipment Interface
//!
//! Actuator commands for the vehicle's flight controller and the messages exchanged with the
//! flight-controller bridge.
//!
//! Commands are PWM-style integers: `1500` is neutral, and every value sent to the vehicle lies in
//! `[1100, 1900]`. The flight controller exposes eight RC channels, four of which are driven by
//! the stabilisation loop.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::fmt;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Neutral command value, no actuation on the channel.
pub const PWM_NEUTRAL: u16 = 1500;

/// Lowest command value which may be sent.
pub const PWM_MIN: u16 = 1100;

/// Highest command value which may be sent.
pub const PWM_MAX: u16 = 1900;

/// Number of RC channels on the flight controller.
pub const NUM_RC_CHANNELS: usize = 8;

/// RC channel value meaning "do not override this channel".
pub const RC_IGNORE: u16 = 0;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The four axes driven by the stabilisation loop.
#[derive(Serialize, Deserialize, Debug, Hash, Eq, PartialEq, Copy, Clone)]
pub enum Axis {
    /// Surge, driven by the apparent size of the marker.
    Forward,

    /// Rotation about the vertical, driven by the marker's edge asymmetry.
    Yaw,

    /// Sway, driven by the horizontal offset of the marker.
    Lateral,

    /// Heave, driven by the vertical offset of the marker.
    Throttle,
}

/// Requests sent to the flight-controller bridge.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum LinkRequest {
    /// Open the flight-controller connection and wait for its heartbeat.
    Connect,

    /// Arm the vehicle. `force` bypasses the flight controller's pre-arm checks.
    Arm { force: bool },

    /// Override the RC channels. A value of [`RC_IGNORE`] releases the channel.
    RcOverride { channels: [u16; NUM_RC_CHANNELS] },

    /// Disarm the vehicle.
    Disarm,

    /// Close the flight-controller connection.
    Disconnect,
}

/// Response from the flight-controller bridge.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum LinkResponse {
    /// The request was carried out.
    Ok,

    /// The request was refused or failed, with the bridge's reason.
    Rejected(String),
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single actuator command, always within `[PWM_MIN, PWM_MAX]`.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct AxisCommand {
    /// RC channel the command is sent on (1-based).
    pub channel_id: u8,

    /// The command value.
    value: u16,
}

/// One command for each of the four axes.
///
/// A frame cannot be built partially, axes without a meaningful demand carry the neutral value.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct ControlFrame {
    pub forward: AxisCommand,
    pub yaw: AxisCommand,
    pub lateral: AxisCommand,
    pub throttle: AxisCommand,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Axis {
    /// All axes, in channel order of the default mapping.
    pub const ALL: [Axis; 4] = [Axis::Throttle, Axis::Yaw, Axis::Forward, Axis::Lateral];

    /// The RC channel the axis is wired to by default.
    pub fn default_channel(&self) -> u8 {
        match self {
            Axis::Throttle => 3,
            Axis::Yaw => 4,
            Axis::Forward => 5,
            Axis::Lateral => 6,
        }
    }

    /// Human readable direction for a command value on this axis.
    pub fn label(&self, value: u16) -> &'static str {
        let (above, below, neutral) = match self {
            Axis::Forward => ("FORWARD", "BACKWARD", "NEUTRAL"),
            Axis::Yaw => ("RIGHT", "LEFT", "STRAIGHT"),
            Axis::Lateral => ("RIGHT", "LEFT", "CENTER"),
            Axis::Throttle => ("UP", "DOWN", "CENTER"),
        };

        match value {
            v if v > PWM_NEUTRAL => above,
            v if v < PWM_NEUTRAL => below,
            _ => neutral,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::Forward => "Forward",
            Axis::Yaw => "Yaw",
            Axis::Lateral => "Lateral",
            Axis::Throttle => "Throttle",
        };
        f.write_str(name)
    }
}

impl AxisCommand {
    /// Create a command, saturating `value` into `[PWM_MIN, PWM_MAX]`.
    pub fn new(channel_id: u8, value: i64) -> Self {
        Self {
            channel_id,
            value: value.clamp(PWM_MIN as i64, PWM_MAX as i64) as u16,
        }
    }

    /// A neutral command on the given channel.
    pub fn neutral(channel_id: u8) -> Self {
        Self {
            channel_id,
            value: PWM_NEUTRAL,
        }
    }

    /// The command value.
    pub fn value(&self) -> u16 {
        self.value
    }

    pub fn is_neutral(&self) -> bool {
        self.value == PWM_NEUTRAL
    }
}

impl ControlFrame {
    /// A frame commanding neutral on every axis, using each axis' default channel.
    pub fn neutral() -> Self {
        Self {
            forward: AxisCommand::neutral(Axis::Forward.default_channel()),
            yaw: AxisCommand::neutral(Axis::Yaw.default_channel()),
            lateral: AxisCommand::neutral(Axis::Lateral.default_channel()),
            throttle: AxisCommand::neutral(Axis::Throttle.default_channel()),
        }
    }

    /// Get the command for an axis.
    pub fn get(&self, axis: Axis) -> &AxisCommand {
        match axis {
            Axis::Forward => &self.forward,
            Axis::Yaw => &self.yaw,
            Axis::Lateral => &self.lateral,
            Axis::Throttle => &self.throttle,
        }
    }

    /// Iterate over `(axis, command)` pairs in channel order of the default mapping.
    pub fn iter(&self) -> impl Iterator<Item = (Axis, &AxisCommand)> + '_ {
        Axis::ALL.iter().map(move |a| (*a, self.get(*a)))
    }

    /// True if every axis is commanding neutral.
    pub fn is_neutral(&self) -> bool {
        self.iter().all(|(_, c)| c.is_neutral())
    }

    /// Lay the frame out as a full RC override.
    ///
    /// Each command is placed in the slot of its channel, all other channels are
    /// [`RC_IGNORE`]. Commands with a channel outside `1..=NUM_RC_CHANNELS` are dropped.
    pub fn to_rc_channels(&self) -> [u16; NUM_RC_CHANNELS] {
        let mut channels = [RC_IGNORE; NUM_RC_CHANNELS];

        for (_, cmd) in self.iter() {
            let ch = cmd.channel_id as usize;
            if (1..=NUM_RC_CHANNELS).contains(&ch) {
                channels[ch - 1] = cmd.value;
            }
        }

        channels
    }
}

impl Default for ControlFrame {
    fn default() -> Self {
        Self::neutral()
    }
}

impl fmt::Display for ControlFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fwd={} yaw={} lat={} thr={}",
            self.forward.value, self.yaw.value, self.lateral.value, self.throttle.value
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_command_saturation() {
        assert_eq!(AxisCommand::new(5, 100_000).value(), PWM_MAX);
        assert_eq!(AxisCommand::new(5, -100_000).value(), PWM_MIN);
        assert_eq!(AxisCommand::new(5, 1620).value(), 1620);
    }

    #[test]
    fn test_rc_channel_layout() {
        let mut frame = ControlFrame::neutral();
        frame.throttle = AxisCommand::new(3, 1400);
        frame.lateral = AxisCommand::new(6, 1700);

        assert_eq!(
            frame.to_rc_channels(),
            [0, 0, 1400, 1500, 1500, 1700, 0, 0]
        );
    }

    #[test]
    fn test_labels() {
        assert_eq!(Axis::Forward.label(1600), "FORWARD");
        assert_eq!(Axis::Forward.label(1400), "BACKWARD");
        assert_eq!(Axis::Yaw.label(1500), "STRAIGHT");
        assert_eq!(Axis::Throttle.label(1501), "UP");
        assert_eq!(Axis::Lateral.label(1499), "LEFT");
    }

    #[test]
    fn test_bridge_message_json() {
        let req = LinkRequest::RcOverride {
            channels: ControlFrame::neutral().to_rc_channels(),
        };
        let s = serde_json::to_string(&req).unwrap();
        assert_eq!(serde_json::from_str::<LinkRequest>(&s).unwrap(), req);

        let resp: LinkResponse = serde_json::from_str(r#"{"Rejected":"no heartbeat"}"#).unwrap();
        assert_eq!(resp, LinkResponse::Rejected("no heartbeat".into()));
    }
}
