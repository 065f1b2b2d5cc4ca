//! Outbound runner events.
//!
//! The [`KilnRunner`](super::service::KilnRunner) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other side
//! decide what to do with them: log, publish, render.

use serde::{Deserialize, Serialize};

use crate::error::{CommandError, Fault};
use crate::fsm::RunStatus;
use crate::profile::ProfileName;

#[derive(Debug, Clone, PartialEq)]
pub enum KilnEvent {
    /// Per-tick telemetry snapshot.
    Telemetry(TelemetryData),

    /// The run moved between states.
    StateChanged { from: RunStatus, to: RunStatus },

    FaultRaised(Fault),

    FaultCleared(Fault),

    /// A command was refused; state unchanged.
    CommandRejected {
        command: &'static str,
        error: CommandError,
    },

    /// Startup recovery decision.
    Recovered { status: RunStatus, stale: bool },
}

/// Point-in-time telemetry record, produced once per tick.
///
/// Serialises to a flat JSON object for observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryData {
    /// Wall-clock time of the tick.
    pub timestamp: f64,
    pub status: RunStatus,
    /// Last valid reading, `None` before the first good read.
    pub temperature: Option<f64>,
    pub target: f64,
    pub duty_fraction: f64,
    /// Relay on at the start of this window.
    pub relay_on: bool,
    pub profile_name: Option<ProfileName>,
    /// Profile lookup time (skip-ahead offset plus unshifted run time).
    pub elapsed: f64,
    /// Wall seconds spent RUNNING.
    pub run_elapsed: f64,
    /// Profile duration.
    pub total_time: f64,
    pub time_remaining: f64,
    pub shift_secs: f64,
    /// Degrees per hour over the trailing window.
    pub heat_rate: f64,
    pub energy_kwh: f64,
    pub estimated_cost: f64,
    pub fault_flags: u8,
}

impl TelemetryData {
    /// Telemetry before the first tick.
    pub fn idle(timestamp: f64) -> Self {
        Self {
            timestamp,
            status: RunStatus::Idle,
            temperature: None,
            target: 0.0,
            duty_fraction: 0.0,
            relay_on: false,
            profile_name: None,
            elapsed: 0.0,
            run_elapsed: 0.0,
            total_time: 0.0,
            time_remaining: 0.0,
            shift_secs: 0.0,
            heat_rate: 0.0,
            energy_kwh: 0.0,
            estimated_cost: 0.0,
            fault_flags: 0,
        }
    }

    pub fn has_fault(&self, fault: Fault) -> bool {
        self.fault_flags & fault.mask() != 0
    }

    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}
