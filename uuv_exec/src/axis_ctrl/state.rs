//! Implementations for the AxisCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use serde::Serialize;
use std::fmt;

// Internal
use super::{AxisCtrlError, AxisCtrlParams, PidController, PidGains};
use comms_if::eqpt::{Axis, AxisCommand, MarkerObservation, PWM_MAX, PWM_MIN, PWM_NEUTRAL};
use util::module::State;

// ---------------------------------------------------------------------------
// TYPES
// ---------------------------------------------------------------------------

/// Function giving an axis' error from the marker geometry.
pub type ErrorFn = Box<dyn Fn(&MarkerObservation) -> f64 + Send>;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Controller for a single axis.
///
/// Turns a marker observation into a command for the axis' channel using its own PID controller.
pub struct AxisCtrl {
    axis: Axis,

    channel_id: u8,

    /// Negate the PID output before mapping to a command
    invert: bool,

    error_fn: ErrorFn,

    pid: PidController,
}

/// Input data to an axis controller.
#[derive(Debug, Clone, Copy)]
pub struct InputData {
    /// This cycle's observation
    pub observation: MarkerObservation,

    /// Time since the previous cycle, shared by every axis in the cycle.
    ///
    /// Units: seconds
    pub dt_s: f64,
}

/// Status report for one axis' processing.
#[derive(Clone, Copy, Default, Serialize, Debug, PartialEq)]
pub struct AxisStatusReport {
    /// Whether the marker was visible this cycle
    pub marker_present: bool,

    /// The axis error, zero if the marker wasn't visible
    pub error: f64,

    /// Raw PID output
    pub pid_output: f64,

    /// Whether the error was inside the deadband
    pub in_deadband: bool,

    /// The command value sent on the axis' channel
    pub value: u16,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for AxisCtrl {
    type InputData = InputData;
    type OutputData = AxisCommand;
    type StatusReport = AxisStatusReport;
    type ProcError = AxisCtrlError;

    /// Compute the axis command for this cycle.
    ///
    /// Without a marker the controller is reset and the command is neutral. A non-finite error is
    /// rejected before it reaches the PID, leaving the controller state as it was. An infinite PID
    /// output saturates the command, a NaN output is rejected.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let obs = &input_data.observation;

        if !obs.present {
            self.pid.reset();

            return Ok((
                AxisCommand::neutral(self.channel_id),
                AxisStatusReport {
                    value: PWM_NEUTRAL,
                    ..Default::default()
                },
            ));
        }

        let error = (self.error_fn)(obs);
        if !error.is_finite() {
            return Err(AxisCtrlError::NonFiniteError(self.axis, error));
        }

        let pid_output = self.pid.update(error, input_data.dt_s);
        if pid_output.is_nan() {
            return Err(AxisCtrlError::NonFiniteOutput(self.axis, pid_output));
        }

        let offset = match self.invert {
            true => -pid_output.round(),
            false => pid_output.round(),
        };

        // Saturate before the cast, an infinite offset still picks the right end of the range
        let value =
            (f64::from(PWM_NEUTRAL) + offset).clamp(f64::from(PWM_MIN), f64::from(PWM_MAX));
        let cmd = AxisCommand::new(self.channel_id, value as i64);

        trace!(
            "{} error: {:.2}, output: {:.2}, command: {}",
            self.axis,
            error,
            pid_output,
            cmd.value()
        );

        Ok((
            cmd,
            AxisStatusReport {
                marker_present: true,
                error,
                pid_output,
                in_deadband: self.pid.in_deadband(),
                value: cmd.value(),
            },
        ))
    }

    fn reset(&mut self) {
        self.pid.reset()
    }
}

impl AxisCtrl {
    /// Create a controller for `axis` from its parts.
    pub fn new(
        axis: Axis,
        channel_id: u8,
        gains: PidGains,
        invert: bool,
        error_fn: ErrorFn,
    ) -> Self {
        Self {
            axis,
            channel_id,
            invert,
            error_fn,
            pid: PidController::new(gains),
        }
    }

    /// Create the controller for `axis` as described by the parameters.
    pub fn from_params(axis: Axis, params: &AxisCtrlParams) -> Self {
        let p = params.axis(axis);

        let error_fn: ErrorFn = match axis {
            Axis::Forward => {
                let target_area = params.target_area;
                Box::new(move |obs| forward_error(obs, target_area))
            }
            Axis::Yaw => Box::new(yaw_error),
            Axis::Lateral => Box::new(lateral_error),
            Axis::Throttle => Box::new(throttle_error),
        };

        Self::new(axis, p.channel, p.gains(), p.invert, error_fn)
    }

    /// Compute this cycle's command, see [`State::proc`].
    pub fn compute(
        &mut self,
        observation: &MarkerObservation,
        dt_s: f64,
    ) -> Result<AxisCommand, AxisCtrlError> {
        self.proc(&InputData {
            observation: *observation,
            dt_s,
        })
        .map(|(cmd, _)| cmd)
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn channel_id(&self) -> u8 {
        self.channel_id
    }

    pub fn pid(&self) -> &PidController {
        &self.pid
    }
}

impl fmt::Debug for AxisCtrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AxisCtrl")
            .field("axis", &self.axis)
            .field("channel_id", &self.channel_id)
            .field("invert", &self.invert)
            .field("pid", &self.pid)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ERROR FUNCTIONS
// ---------------------------------------------------------------------------

/// Forward error, positive when the marker looks smaller than the target (too far away).
pub fn forward_error(obs: &MarkerObservation, target_area: f64) -> f64 {
    target_area - obs.area
}

/// Yaw error, positive when the marker's right edge is longer than its left.
pub fn yaw_error(obs: &MarkerObservation) -> f64 {
    obs.right_edge_length - obs.left_edge_length
}

/// Lateral error, positive when the marker is right of the frame centre.
pub fn lateral_error(obs: &MarkerObservation) -> f64 {
    obs.center_x - obs.frame_width as f64 / 2.0
}

/// Vertical error, positive when the marker is below the frame centre.
pub fn throttle_error(obs: &MarkerObservation) -> f64 {
    obs.center_y - obs.frame_height as f64 / 2.0
}
