//! Controller configuration parameters
//!
//! All tunable parameters for a kiln.  Loaded once at startup through
//! [`ConfigPort`](crate::app::ports::ConfigPort), validated, then passed by
//! reference into the components that need them.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::metrics::HEAT_RATE_SAMPLES;

/// PID gains.  The controller output is a duty fraction, so `kp` is
/// "fraction of full power per degree of error".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl Default for PidGains {
    fn default() -> Self {
        Self {
            kp: 0.025,
            ki: 0.000_15,
            kd: 0.8,
        }
    }
}

/// Core controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KilnConfig {
    // --- Timing ---
    /// Duty-cycle window W in seconds: sensor polling interval and relay period.
    /// Larger windows spare the contactor, smaller ones track more smoothly.
    pub duty_window_secs: f64,

    // --- PID ---
    pub pid: PidGains,
    /// The integral accumulates only while abs(error) is within this band (degrees).
    pub pid_integral_band: f64,

    // --- Skip-ahead ---
    /// Start the schedule where a warm kiln already is.
    pub seek_start: bool,
    /// Degrees above the t=0 target before skip-ahead applies.
    pub seek_start_margin: f64,

    // --- Shift ---
    /// Hold the schedule clock while the kiln is behind.
    pub catch_up_enabled: bool,
    /// Degrees below target that count as falling behind.
    pub catch_up_margin: f64,
    /// Seconds of continuous deficit tolerated before the schedule shifts.
    pub catch_up_grace_secs: f64,

    // --- Completion ---
    /// Degrees from the final target within which the run completes.
    pub completion_tolerance: f64,
    /// Seconds past the final point after which the run completes regardless.
    pub completion_timeout_secs: f64,
    /// Keep reading and reporting temperature after completion.
    pub monitor_after_complete: bool,

    // --- Recovery ---
    /// Resume a persisted RUNNING state on startup.
    pub automatic_restarts: bool,
    /// Maximum age (seconds) of a persisted state that may be resumed.
    pub restart_window_secs: f64,

    // --- Sensor ---
    /// Consecutive bad reads during which the last duty is held.
    pub sensor_fault_limit: u32,
    /// Upper bound on a single sensor read (milliseconds).
    pub sensor_timeout_ms: u32,
    /// Lowest physically plausible reading.
    pub min_valid_temp: f64,
    /// Highest physically plausible reading.
    pub max_valid_temp: f64,

    // --- Safety ---
    /// Any valid reading above this aborts the run with the relay off.
    pub emergency_shutoff_temp: f64,

    // --- Metrics ---
    /// Trailing window for the heating-rate estimate (seconds).
    pub heat_rate_window_secs: f64,
    /// Element power rating (kW).
    pub element_kw: f64,
    /// Energy price per kWh.
    pub cost_per_kwh: f64,
}

impl Default for KilnConfig {
    fn default() -> Self {
        Self {
            // Timing
            duty_window_secs: 2.0,

            // PID
            pid: PidGains::default(),
            pid_integral_band: 10.0,

            // Skip-ahead
            seek_start: true,
            seek_start_margin: 5.0,

            // Shift
            catch_up_enabled: true,
            catch_up_margin: 10.0,
            catch_up_grace_secs: 60.0,

            // Completion
            completion_tolerance: 5.0,
            completion_timeout_secs: 1800.0,
            monitor_after_complete: true,

            // Recovery
            automatic_restarts: true,
            restart_window_secs: 900.0, // 15 min

            // Sensor
            sensor_fault_limit: 3,
            sensor_timeout_ms: 1000,
            min_valid_temp: -50.0,
            max_valid_temp: 1600.0,

            // Safety
            emergency_shutoff_temp: 1350.0,

            // Metrics
            heat_rate_window_secs: 60.0,
            element_kw: 9.46,
            cost_per_kwh: 0.1319,
        }
    }
}

impl KilnConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(text).map_err(|_| ConfigError::Corrupted)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.5..=60.0).contains(&self.duty_window_secs) {
            return Err(ConfigError::ValidationFailed(
                "duty_window_secs must be 0.5–60",
            ));
        }
        let gains = [self.pid.kp, self.pid.ki, self.pid.kd];
        if gains.iter().any(|g| !g.is_finite() || *g < 0.0) {
            return Err(ConfigError::ValidationFailed(
                "pid gains must be finite and non-negative",
            ));
        }
        let non_negative = [
            self.pid_integral_band,
            self.seek_start_margin,
            self.catch_up_margin,
            self.catch_up_grace_secs,
            self.completion_tolerance,
            self.completion_timeout_secs,
            self.restart_window_secs,
            self.heat_rate_window_secs,
            self.element_kw,
            self.cost_per_kwh,
        ];
        if non_negative.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(ConfigError::ValidationFailed(
                "margins, windows and rates must be finite and non-negative",
            ));
        }
        let covered = (HEAT_RATE_SAMPLES - 1) as f64 * self.duty_window_secs;
        if self.heat_rate_window_secs > covered {
            return Err(ConfigError::ValidationFailed(
                "heat_rate_window_secs exceeds the sample buffer at this duty window",
            ));
        }
        if self.sensor_fault_limit == 0 {
            return Err(ConfigError::ValidationFailed(
                "sensor_fault_limit must be at least 1",
            ));
        }
        if !(10..=60_000).contains(&self.sensor_timeout_ms) {
            return Err(ConfigError::ValidationFailed(
                "sensor_timeout_ms must be 10–60000",
            ));
        }
        if self.min_valid_temp >= self.max_valid_temp {
            return Err(ConfigError::ValidationFailed(
                "min_valid_temp must be below max_valid_temp",
            ));
        }
        if !(self.min_valid_temp..=self.max_valid_temp).contains(&self.emergency_shutoff_temp) {
            return Err(ConfigError::ValidationFailed(
                "emergency_shutoff_temp must lie inside the valid range",
            ));
        }
        Ok(())
    }

    /// Duty window as a [`Duration`](core::time::Duration).
    pub fn duty_window(&self) -> core::time::Duration {
        core::time::Duration::from_secs_f64(self.duty_window_secs)
    }
}
