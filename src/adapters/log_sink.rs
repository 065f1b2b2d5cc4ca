//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured kiln events through the
//! `log` facade (stderr via [`ConsoleLogger`](super::console_logger) on a
//! host, any other logger when embedded).

use log::{info, warn};

use crate::app::events::KilnEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`KilnEvent`].
#[derive(Default)]
pub struct LogEventSink {
    /// Log every Nth telemetry record (1 = all).
    telemetry_every: u32,
    telemetry_seen: u32,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::with_telemetry_every(1)
    }

    pub fn with_telemetry_every(every: u32) -> Self {
        Self {
            telemetry_every: every.max(1),
            telemetry_seen: 0,
        }
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &KilnEvent) {
        match event {
            KilnEvent::Telemetry(t) => {
                self.telemetry_seen = self.telemetry_seen.wrapping_add(1);
                if self.telemetry_seen % self.telemetry_every.max(1) != 0 {
                    return;
                }
                let temp = t
                    .temperature
                    .map_or_else(|| "--".into(), |v| format!("{v:.1}"));
                info!(
                    "TELEM | {} | T={}/{:.1} | duty={:.2} relay={} | \
                     t={:.0}/{:.0}s shift={:.0}s | rate={:.0}/h | {:.2}kWh ${:.2} | \
                     faults=0b{:08b}",
                    t.status,
                    temp,
                    t.target,
                    t.duty_fraction,
                    if t.relay_on { "ON" } else { "off" },
                    t.elapsed,
                    t.total_time,
                    t.shift_secs,
                    t.heat_rate,
                    t.energy_kwh,
                    t.estimated_cost,
                    t.fault_flags,
                );
            }
            KilnEvent::StateChanged { from, to } => {
                info!("STATE | {} -> {}", from, to);
            }
            KilnEvent::FaultRaised(fault) => {
                warn!("FAULT | raised: {}", fault);
            }
            KilnEvent::FaultCleared(fault) => {
                info!("FAULT | cleared: {}", fault);
            }
            KilnEvent::CommandRejected { command, error } => {
                warn!("CMD   | {} rejected: {}", command, error);
            }
            KilnEvent::Recovered { status, stale } => {
                info!(
                    "RECOV | status={}{}",
                    status,
                    if *stale { " (stale run pending)" } else { "" }
                );
            }
        }
    }
}
