//! Parameters structure for AxisCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::eqpt::{Axis, NUM_RC_CHANNELS};
use serde::Deserialize;

use super::{AxisCtrlError, PidGains};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the four axis controllers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AxisCtrlParams {
    /// Marker area the forward axis drives towards.
    ///
    /// Units: pixels^2
    pub target_area: f64,

    pub forward: AxisParams,

    pub yaw: AxisParams,

    pub lateral: AxisParams,

    pub throttle: AxisParams,
}

/// Parameters for a single axis.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AxisParams {
    /// RC channel the axis is commanded on (1-based).
    pub channel: u8,

    /// Proportional gain
    pub k_p: f64,

    /// Integral gain
    pub k_i: f64,

    /// Derivative gain
    pub k_d: f64,

    /// Error magnitude under which the axis is held at neutral.
    ///
    /// Units: those of the axis error (pixels^2 for forward, pixels otherwise)
    pub deadband: f64,

    /// Reverse the sign of the command, so that a positive error gives a command below neutral.
    #[serde(default)]
    pub invert: bool,

    /// Optional limit on the magnitude of the integral accumulation.
    #[serde(default)]
    pub integral_limit: Option<f64>,

    /// Optional limit on the magnitude of the PID output.
    #[serde(default)]
    pub output_limit: Option<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for AxisCtrlParams {
    fn default() -> Self {
        Self {
            target_area: 20_000.0,
            forward: AxisParams::default_for(Axis::Forward),
            yaw: AxisParams::default_for(Axis::Yaw),
            lateral: AxisParams::default_for(Axis::Lateral),
            throttle: AxisParams::default_for(Axis::Throttle),
        }
    }
}

impl AxisCtrlParams {
    /// Get the parameters of one axis.
    pub fn axis(&self, axis: Axis) -> &AxisParams {
        match axis {
            Axis::Forward => &self.forward,
            Axis::Yaw => &self.yaw,
            Axis::Lateral => &self.lateral,
            Axis::Throttle => &self.throttle,
        }
    }

    /// Check the parameters are usable.
    ///
    /// Gains and deadbands must be finite and non-negative, limits positive, and each axis must
    /// use its own channel within the flight controller's range.
    pub fn validate(&self) -> Result<(), AxisCtrlError> {
        if !self.target_area.is_finite() || self.target_area <= 0.0 {
            return Err(AxisCtrlError::InvalidTargetArea(self.target_area));
        }

        let mut used = [None; NUM_RC_CHANNELS];

        for axis in Axis::ALL.iter() {
            let p = self.axis(*axis);
            p.validate(*axis)?;

            let slot = &mut used[p.channel as usize - 1];
            if let Some(other) = slot {
                return Err(AxisCtrlError::ChannelConflict(p.channel, *other, *axis));
            }
            *slot = Some(*axis);
        }

        Ok(())
    }
}

impl AxisParams {
    /// The default tuning for an axis.
    pub fn default_for(axis: Axis) -> Self {
        let (k_p, k_i, k_d, deadband) = match axis {
            Axis::Forward => (0.02, 0.0005, 0.01, 200.0),
            Axis::Yaw => (5.0, 0.025, 1.0, 2.0),
            Axis::Lateral => (2.0, 0.02, 0.4, 15.0),
            Axis::Throttle => (2.0, 0.02, 0.4, 15.0),
        };

        Self {
            channel: axis.default_channel(),
            k_p,
            k_i,
            k_d,
            deadband,
            invert: false,
            integral_limit: None,
            output_limit: None,
        }
    }

    /// The PID gains described by these parameters.
    pub fn gains(&self) -> PidGains {
        PidGains {
            k_p: self.k_p,
            k_i: self.k_i,
            k_d: self.k_d,
            deadband: self.deadband,
            integral_limit: self.integral_limit,
            output_limit: self.output_limit,
        }
    }

    fn validate(&self, axis: Axis) -> Result<(), AxisCtrlError> {
        if !(1..=NUM_RC_CHANNELS).contains(&(self.channel as usize)) {
            return Err(AxisCtrlError::InvalidChannel(axis, self.channel));
        }

        for (name, value) in [
            ("k_p", self.k_p),
            ("k_i", self.k_i),
            ("k_d", self.k_d),
            ("deadband", self.deadband),
        ]
        .iter()
        {
            if !value.is_finite() || *value < 0.0 {
                return Err(AxisCtrlError::InvalidParam(axis, *name, *value));
            }
        }

        for (name, limit) in [
            ("integral_limit", self.integral_limit),
            ("output_limit", self.output_limit),
        ]
        .iter()
        {
            if let Some(l) = limit {
                if !l.is_finite() || *l <= 0.0 {
                    return Err(AxisCtrlError::InvalidParam(axis, *name, *l));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let p = AxisCtrlParams::default();
        p.validate().unwrap();

        assert_eq!(p.forward.channel, 5);
        assert_eq!(p.yaw.channel, 4);
        assert_eq!(p.lateral.channel, 6);
        assert_eq!(p.throttle.channel, 3);
        assert_eq!(p.yaw.k_p, 5.0);
        assert_eq!(p.forward.deadband, 200.0);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let p: AxisCtrlParams = toml::from_str(
            r#"
            target_area = 15000.0

            [lateral]
            channel = 6
            k_p = 1.5
            k_i = 0.01
            k_d = 0.2
            deadband = 10.0
            invert = true
            integral_limit = 500.0
            "#,
        )
        .unwrap();

        p.validate().unwrap();
        assert_eq!(p.target_area, 15000.0);
        assert!(p.lateral.invert);
        assert_eq!(p.lateral.integral_limit, Some(500.0));
        assert_eq!(p.yaw.k_p, 5.0);
    }

    #[test]
    fn test_validation_failures() {
        let mut p = AxisCtrlParams::default();
        p.lateral.channel = 4;
        match p.validate() {
            Err(AxisCtrlError::ChannelConflict(4, Axis::Yaw, Axis::Lateral)) => (),
            r => panic!("Expected a channel conflict, got {:?}", r),
        }

        let mut p = AxisCtrlParams::default();
        p.throttle.channel = 9;
        assert!(p.validate().is_err());

        let mut p = AxisCtrlParams::default();
        p.yaw.k_d = -1.0;
        assert!(p.validate().is_err());

        let mut p = AxisCtrlParams::default();
        p.forward.output_limit = Some(0.0);
        assert!(p.validate().is_err());
    }
}
