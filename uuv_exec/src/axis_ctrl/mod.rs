//! # Axis control module
//!
//! Converts marker observations into one command per axis. Each of the forward, yaw, lateral and
//! throttle axes has its own PID controller, all four are stepped together with a shared `dt` so
//! that every cycle produces a complete [`ControlFrame`].

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod pid;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;
use serde::Serialize;

// Internal
use comms_if::eqpt::{Axis, AxisCommand, ControlFrame, MarkerObservation, PWM_NEUTRAL};
use util::module::State;

pub use params::*;
pub use pid::*;
pub use state::*;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The controllers for all four axes.
#[derive(Debug)]
pub struct AxisCtrls {
    forward: AxisCtrl,
    yaw: AxisCtrl,
    lateral: AxisCtrl,
    throttle: AxisCtrl,
}

/// Status of every axis for one cycle.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct FrameReport {
    pub forward: AxisStatusReport,
    pub yaw: AxisStatusReport,
    pub lateral: AxisStatusReport,
    pub throttle: AxisStatusReport,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur in axis control.
#[derive(Debug, thiserror::Error)]
pub enum AxisCtrlError {
    #[error("Target marker area must be positive and finite, got {0}")]
    InvalidTargetArea(f64),

    #[error("Channel {0} is used by both the {1} and {2} axes")]
    ChannelConflict(u8, Axis, Axis),

    #[error("The {0} axis uses channel {1}, which the flight controller doesn't have")]
    InvalidChannel(Axis, u8),

    #[error("Invalid {1} for the {0} axis: {2}")]
    InvalidParam(Axis, &'static str, f64),

    #[error("The {0} axis error is not finite ({1})")]
    NonFiniteError(Axis, f64),

    #[error("The {0} axis controller output is not a number ({1})")]
    NonFiniteOutput(Axis, f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl AxisCtrls {
    /// Build the four controllers from validated parameters.
    pub fn new(params: &AxisCtrlParams) -> Result<Self, AxisCtrlError> {
        params.validate()?;

        Ok(Self {
            forward: AxisCtrl::from_params(Axis::Forward, params),
            yaw: AxisCtrl::from_params(Axis::Yaw, params),
            lateral: AxisCtrl::from_params(Axis::Lateral, params),
            throttle: AxisCtrl::from_params(Axis::Throttle, params),
        })
    }

    /// Compute the frame for this cycle.
    ///
    /// An absent marker gives an all-neutral frame and resets every controller. An axis whose
    /// error can't be computed is reset and commanded to neutral while the others carry on.
    pub fn compute_frame(
        &mut self,
        observation: &MarkerObservation,
        dt_s: f64,
    ) -> (ControlFrame, FrameReport) {
        let input = InputData {
            observation: *observation,
            dt_s,
        };

        let (forward, forward_rpt) = Self::proc_axis(&mut self.forward, &input);
        let (yaw, yaw_rpt) = Self::proc_axis(&mut self.yaw, &input);
        let (lateral, lateral_rpt) = Self::proc_axis(&mut self.lateral, &input);
        let (throttle, throttle_rpt) = Self::proc_axis(&mut self.throttle, &input);

        (
            ControlFrame {
                forward,
                yaw,
                lateral,
                throttle,
            },
            FrameReport {
                forward: forward_rpt,
                yaw: yaw_rpt,
                lateral: lateral_rpt,
                throttle: throttle_rpt,
            },
        )
    }

    /// An all-neutral frame on the configured channels.
    pub fn neutral_frame(&self) -> ControlFrame {
        ControlFrame {
            forward: AxisCommand::neutral(self.forward.channel_id()),
            yaw: AxisCommand::neutral(self.yaw.channel_id()),
            lateral: AxisCommand::neutral(self.lateral.channel_id()),
            throttle: AxisCommand::neutral(self.throttle.channel_id()),
        }
    }

    /// Reset every controller.
    pub fn reset(&mut self) {
        self.forward.reset();
        self.yaw.reset();
        self.lateral.reset();
        self.throttle.reset();
    }

    /// Get the controller for an axis.
    pub fn get(&self, axis: Axis) -> &AxisCtrl {
        match axis {
            Axis::Forward => &self.forward,
            Axis::Yaw => &self.yaw,
            Axis::Lateral => &self.lateral,
            Axis::Throttle => &self.throttle,
        }
    }

    fn proc_axis(ctrl: &mut AxisCtrl, input: &InputData) -> (AxisCommand, AxisStatusReport) {
        match ctrl.proc(input) {
            Ok(r) => r,
            Err(e) => {
                warn!("{}, commanding neutral", e);
                ctrl.reset();
                (
                    AxisCommand::neutral(ctrl.channel_id()),
                    AxisStatusReport {
                        marker_present: true,
                        value: PWM_NEUTRAL,
                        ..Default::default()
                    },
                )
            }
        }
    }
}

impl FrameReport {
    /// Get the report for an axis.
    pub fn get(&self, axis: Axis) -> &AxisStatusReport {
        match axis {
            Axis::Forward => &self.forward,
            Axis::Yaw => &self.yaw,
            Axis::Lateral => &self.lateral,
            Axis::Throttle => &self.throttle,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::eqpt::{PWM_MAX, PWM_MIN};

    fn centred() -> MarkerObservation {
        MarkerObservation {
            present: true,
            area: 20_000.0,
            left_edge_length: 140.0,
            right_edge_length: 140.0,
            center_x: 320.0,
            center_y: 240.0,
            frame_width: 640,
            frame_height: 480,
        }
    }

    fn ctrls() -> AxisCtrls {
        AxisCtrls::new(&AxisCtrlParams::default()).unwrap()
    }

    #[test]
    fn test_absent_marker_is_neutral_and_resets() {
        let mut c = ctrls();

        let mut obs = centred();
        obs.center_x = 500.0;
        c.compute_frame(&obs, 0.1);
        c.compute_frame(&obs, 0.1);
        assert!(c.get(Axis::Lateral).pid().integral() != 0.0);

        let (frame, report) = c.compute_frame(&MarkerObservation::absent(), 0.1);

        assert!(frame.is_neutral());
        assert_eq!(frame.forward.channel_id, 5);
        assert_eq!(frame.yaw.channel_id, 4);
        assert_eq!(frame.lateral.channel_id, 6);
        assert_eq!(frame.throttle.channel_id, 3);
        for axis in Axis::ALL.iter() {
            assert!(!report.get(*axis).marker_present);
            assert_eq!(c.get(*axis).pid().integral(), 0.0);
            assert!(!c.get(*axis).pid().has_previous());
        }
    }

    #[test]
    fn test_centred_marker_is_neutral() {
        let mut c = ctrls();

        for _ in 0..20 {
            let (frame, report) = c.compute_frame(&centred(), 0.1);
            assert!(frame.is_neutral());
            assert!(report.forward.in_deadband);
        }
    }

    #[test]
    fn test_lateral_sign() {
        let mut obs = centred();
        obs.center_x = 400.0;

        let mut c = ctrls();
        let (frame, report) = c.compute_frame(&obs, 0.1);
        assert_eq!(report.lateral.error, 80.0);
        assert!(frame.lateral.value() > PWM_NEUTRAL);

        let mut params = AxisCtrlParams::default();
        params.lateral.invert = true;
        let mut c = AxisCtrls::new(&params).unwrap();
        let (frame, _) = c.compute_frame(&obs, 0.1);
        assert!(frame.lateral.value() < PWM_NEUTRAL);
    }

    #[test]
    fn test_large_errors_saturate() {
        let mut obs = centred();
        obs.center_x = 640.0;
        obs.center_y = 0.0;
        obs.area = 0.0;
        obs.right_edge_length = 400.0;

        let mut c = ctrls();
        let (frame, _) = c.compute_frame(&obs, 0.1);

        assert_eq!(frame.lateral.value(), PWM_MAX);
        assert_eq!(frame.throttle.value(), PWM_MIN);
        assert_eq!(frame.yaw.value(), PWM_MAX);
        assert_eq!(frame.forward.value(), PWM_MAX);
    }

    #[test]
    fn test_huge_errors_saturate_in_the_right_direction() {
        for edge in [1e19, 1e308].iter() {
            let mut obs = centred();
            obs.right_edge_length = *edge;

            let mut c = ctrls();
            for _ in 0..3 {
                let (frame, report) = c.compute_frame(&obs, 0.1);
                assert_eq!(frame.yaw.value(), PWM_MAX);
                assert_eq!(report.yaw.value, PWM_MAX);
            }

            let mut params = AxisCtrlParams::default();
            params.yaw.invert = true;
            let mut c = AxisCtrls::new(&params).unwrap();
            let (frame, _) = c.compute_frame(&obs, 0.1);
            assert_eq!(frame.yaw.value(), PWM_MIN);
        }
    }

    #[test]
    fn test_nan_output_is_contained() {
        let mut ctrl = AxisCtrl::new(
            Axis::Yaw,
            4,
            PidGains::new(10.0, 0.0, 1.0),
            false,
            Box::new(yaw_error),
        );

        let mut obs = centred();
        obs.right_edge_length = 1e308;
        assert_eq!(ctrl.compute(&obs, 0.1).unwrap().value(), PWM_MAX);

        // Proportional term is +inf, derivative term is -inf
        obs.right_edge_length = 5e307;
        match ctrl.compute(&obs, 1e-10) {
            Err(AxisCtrlError::NonFiniteOutput(Axis::Yaw, _)) => (),
            r => panic!("Expected a non-finite output error, got {:?}", r),
        }
    }

    #[test]
    fn test_forward_command_direction() {
        let mut c = ctrls();

        // Marker too small: too far away, drive forward
        let mut obs = centred();
        obs.area = 15_000.0;
        let (frame, _) = c.compute_frame(&obs, 0.1);
        assert_eq!(Axis::Forward.label(frame.forward.value()), "FORWARD");

        c.reset();

        obs.area = 25_000.0;
        let (frame, _) = c.compute_frame(&obs, 0.1);
        assert_eq!(Axis::Forward.label(frame.forward.value()), "BACKWARD");
    }

    #[test]
    fn test_non_finite_error_is_contained() {
        let mut c = ctrls();

        let mut obs = centred();
        obs.center_x = std::f64::NAN;
        obs.center_y = 300.0;

        let (frame, _) = c.compute_frame(&obs, 0.1);

        assert!(frame.lateral.is_neutral());
        assert_eq!(c.get(Axis::Lateral).pid().integral(), 0.0);
        assert!(frame.throttle.value() > PWM_NEUTRAL);
    }

    #[test]
    fn test_single_axis_state_impl() {
        let mut ctrl = AxisCtrl::new(
            Axis::Yaw,
            4,
            PidGains::new(1.0, 0.0, 0.0),
            false,
            Box::new(yaw_error),
        );

        let mut obs = centred();
        obs.right_edge_length = 150.0;

        let (cmd, rpt) = ctrl
            .proc(&InputData {
                observation: obs,
                dt_s: 0.1,
            })
            .unwrap();

        assert_eq!(cmd.value(), 1510);
        assert_eq!(rpt.value, 1510);
        assert_eq!(rpt.error, 10.0);
        assert_eq!(ctrl.compute(&MarkerObservation::absent(), 0.1).unwrap().value(), 1500);
    }
}
