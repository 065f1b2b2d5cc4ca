//! PID controller for kiln heating power
//!
//! Continuous-output controller feeding the time-proportioning relay
//! driver.  The output is the fraction of each duty window the elements
//! should be on.
//!
//! Anti-windup is two-fold: the integral only accumulates while the error
//! is inside a band around the setpoint (far below target it is held at
//! zero, so a cold kiln ramping up does not bank overshoot), and an
//! integration step that would push a saturated output further is undone.

use crate::config::PidGains;

/// Integrator and derivative memory.  Never persisted: a restart costs a
/// few cycles of transient inaccuracy at most.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PidState {
    pub integral: f64,
    pub prev_error: f64,
    /// False until the first update after a reset (no derivative yet).
    pub primed: bool,
}

/// Per-term breakdown of the last update, for telemetry and tuning logs.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PidTerms {
    pub p: f64,
    pub i: f64,
    pub d: f64,
    pub output: f64,
}

/// PID controller
pub struct PidController {
    gains: PidGains,
    integral_band: f64,
    state: PidState,
    last_terms: PidTerms,
}

impl PidController {
    pub fn new(gains: PidGains, integral_band: f64) -> Self {
        Self {
            gains,
            integral_band,
            state: PidState::default(),
            last_terms: PidTerms::default(),
        }
    }

    /// Compute the duty fraction in `[0, 1]` for one window of `dt` seconds.
    pub fn update(&mut self, setpoint: f64, measured: f64, dt: f64) -> f64 {
        if !setpoint.is_finite() || !measured.is_finite() {
            self.last_terms = PidTerms::default();
            return 0.0;
        }

        let error = setpoint - measured;

        // Proportional
        let p = self.gains.kp * error;

        // Integral, only near the setpoint
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let integrating = error.abs() <= self.integral_band;
        if integrating {
            self.state.integral += error * dt;
        } else {
            self.state.integral = 0.0;
        }
        let i = self.gains.ki * self.state.integral;

        // Derivative
        let derivative = if self.state.primed && dt > 0.0 {
            (error - self.state.prev_error) / dt
        } else {
            0.0
        };
        let d = self.gains.kd * derivative;

        self.state.prev_error = error;
        self.state.primed = true;

        let raw = p + i + d;
        let output = raw.clamp(0.0, 1.0);

        // Saturated and still being pushed further: stop integrating.
        if integrating && ((raw > 1.0 && error > 0.0) || (raw < 0.0 && error < 0.0)) {
            self.state.integral -= error * dt;
        }

        self.last_terms = PidTerms { p, i, d, output };
        output
    }

    /// Clear integrator and derivative memory (run start, resume, or a
    /// discontinuous setpoint jump such as skip-ahead).
    pub fn reset(&mut self) {
        self.state = PidState::default();
        self.last_terms = PidTerms::default();
    }

    pub fn state(&self) -> PidState {
        self.state
    }

    pub fn last_terms(&self) -> PidTerms {
        self.last_terms
    }
}
