//! # PID controller
//!
//! Scalar PID controller with a hard-reset deadband.
//!
//! Inside the deadband the output is zero and the integrator is cleared, so that on leaving the
//! deadband the controller starts from a clean integral rather than carrying residual windup.
//! Time is supplied by the caller, so that several controllers stepped in the same cycle share one
//! `dt` and their integrators stay synchronised.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Gains and limits of a PID controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PidGains {
    /// Proportional gain
    pub k_p: f64,

    /// Integral gain
    pub k_i: f64,

    /// Derivative gain
    pub k_d: f64,

    /// Errors with a magnitude strictly below this value are treated as zero.
    pub deadband: f64,

    /// Optional symmetric limit on the integral accumulation.
    pub integral_limit: Option<f64>,

    /// Optional symmetric limit on the controller output.
    pub output_limit: Option<f64>,
}

/// A PID controller
#[derive(Debug, Clone, Serialize)]
pub struct PidController {
    gains: PidGains,

    /// The integral accumulation
    integral: f64,

    /// Previous error
    prev_error: f64,

    /// Whether `prev_error` holds a real sample, guards the derivative on the first update.
    has_previous: bool,

    /// Whether the last update fell inside the deadband
    in_deadband: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidGains {
    /// Gains with no deadband and no limits.
    pub fn new(k_p: f64, k_i: f64, k_d: f64) -> Self {
        Self {
            k_p,
            k_i,
            k_d,
            deadband: 0.0,
            integral_limit: None,
            output_limit: None,
        }
    }

    pub fn with_deadband(mut self, deadband: f64) -> Self {
        self.deadband = deadband;
        self
    }

    pub fn with_integral_limit(mut self, limit: f64) -> Self {
        self.integral_limit = Some(limit);
        self
    }

    pub fn with_output_limit(mut self, limit: f64) -> Self {
        self.output_limit = Some(limit);
        self
    }
}

impl PidController {
    /// Create a new controller with the given gains.
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            integral: 0f64,
            prev_error: 0f64,
            has_previous: false,
            in_deadband: false,
        }
    }

    /// Get the value of the controller for the given error.
    ///
    /// `dt` is the time since the previous update in seconds. A `dt` which is not positive
    /// (the first cycle, or a stalled clock) produces a proportional-only output and leaves the
    /// integral and derivative history untouched.
    pub fn update(&mut self, error: f64, dt: f64) -> f64 {
        // Inside the deadband: hard reset of the integrator, no output
        if error.abs() < self.gains.deadband {
            self.integral = 0f64;
            self.prev_error = error;
            self.has_previous = true;
            self.in_deadband = true;
            return 0f64;
        }

        self.in_deadband = false;

        if !(dt > 0f64) {
            return self.limit_output(self.gains.k_p * error);
        }

        // Accumulate the integral term
        self.integral += error * dt;
        if let Some(limit) = self.gains.integral_limit {
            self.integral = self.integral.clamp(-limit, limit);
        }

        // No derivative until there's a previous sample to difference against
        let deriv = match self.has_previous {
            true => (error - self.prev_error) / dt,
            false => 0f64,
        };

        let out = self.gains.k_p * error + self.gains.k_i * self.integral + self.gains.k_d * deriv;

        self.prev_error = error;
        self.has_previous = true;

        self.limit_output(out)
    }

    /// Clear all accumulated state.
    pub fn reset(&mut self) {
        self.integral = 0f64;
        self.prev_error = 0f64;
        self.has_previous = false;
        self.in_deadband = false;
    }

    pub fn gains(&self) -> &PidGains {
        &self.gains
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn prev_error(&self) -> f64 {
        self.prev_error
    }

    pub fn has_previous(&self) -> bool {
        self.has_previous
    }

    pub fn in_deadband(&self) -> bool {
        self.in_deadband
    }

    fn limit_output(&self, out: f64) -> f64 {
        match self.gains.output_limit {
            Some(limit) => out.clamp(-limit, limit),
            None => out,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_deadband_zeroes_output_and_integral() {
        let mut pid = PidController::new(PidGains::new(2.0, 0.5, 0.1).with_deadband(15.0));

        // Build up some integral outside the deadband
        for _ in 0..10 {
            pid.update(40.0, 0.1);
        }
        assert!(pid.integral() > 0.0);

        for e in [-14.9, -3.0, 0.0, 7.5, 14.99].iter() {
            assert_eq!(pid.update(*e, 0.1), 0.0);
            assert_eq!(pid.integral(), 0.0);
            assert!(pid.in_deadband());
        }
    }

    #[test]
    fn test_deadband_edge_is_outside() {
        let mut pid = PidController::new(PidGains::new(1.0, 0.0, 0.0).with_deadband(2.0));

        assert_eq!(pid.update(2.0, 0.1), 2.0);
        assert!(!pid.in_deadband());
    }

    #[test]
    fn test_integral_accumulation() {
        let mut pid = PidController::new(PidGains::new(0.0, 1.0, 0.0).with_deadband(1.0));

        let (e, dt, n) = (25.0, 0.05, 40);
        for _ in 0..n {
            pid.update(e, dt);
        }

        assert!((pid.integral() - e * n as f64 * dt).abs() < 1e-6);
    }

    #[test]
    fn test_first_update_has_no_derivative_kick() {
        let mut pid = PidController::new(PidGains::new(1.0, 0.0, 10.0));

        assert!((pid.update(5.0, 0.1) - 5.0).abs() < EPS);

        // Second sample differences against the first: 1*7 + 10*(7-5)/0.1
        assert!((pid.update(7.0, 0.1) - 207.0).abs() < EPS);
    }

    #[test]
    fn test_non_positive_dt_is_proportional_only() {
        let mut pid = PidController::new(PidGains::new(3.0, 1.0, 1.0));

        assert!((pid.update(4.0, 0.0) - 12.0).abs() < EPS);
        assert!((pid.update(4.0, -0.5) - 12.0).abs() < EPS);
        assert_eq!(pid.integral(), 0.0);
        assert!(!pid.has_previous());

        // History untouched, so the next real tick has no derivative either
        let out = pid.update(4.0, 0.1);
        assert!((out - (12.0 + 0.4)).abs() < EPS);
    }

    #[test]
    fn test_reset() {
        let mut pid = PidController::new(PidGains::new(1.0, 1.0, 1.0));
        pid.update(10.0, 0.1);
        pid.update(12.0, 0.1);

        pid.reset();

        assert_eq!(pid.integral(), 0.0);
        assert_eq!(pid.prev_error(), 0.0);
        assert!(!pid.has_previous());
    }

    #[test]
    fn test_limits() {
        let mut pid = PidController::new(
            PidGains::new(1.0, 1.0, 0.0)
                .with_integral_limit(2.0)
                .with_output_limit(50.0),
        );

        for _ in 0..100 {
            pid.update(30.0, 1.0);
        }
        assert!((pid.integral() - 2.0).abs() < EPS);

        assert!((pid.update(1000.0, 1.0) - 50.0).abs() < EPS);
        assert!((pid.update(-1000.0, 1.0) + 50.0).abs() < EPS);
    }
}
