//! Mock kiln hardware for integration tests.
//!
//! Records every relay command so tests can assert on the full actuation
//! history, and plays back a script of thermocouple readings.

use core::time::Duration;
use std::collections::VecDeque;

use kilnctl::adapters::profiles::ProfileLibrary;
use kilnctl::adapters::storage::MemoryStore;
use kilnctl::app::events::KilnEvent;
use kilnctl::app::ports::{EventSink, RelaySink, TemperatureSource};
use kilnctl::app::service::KilnRunner;
use kilnctl::config::KilnConfig;
use kilnctl::error::{ActuatorError, SensorError};
use kilnctl::fsm::RunStatus;
use kilnctl::journal::StorageJournal;
use kilnctl::profile::Profile;

// ── Relay call record ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelayCall {
    pub on: Duration,
    pub window: Duration,
}

impl RelayCall {
    pub fn is_off(&self) -> bool {
        self.on.is_zero()
    }
}

// ── MockKiln ──────────────────────────────────────────────────

pub struct MockKiln {
    pub relay_calls: Vec<RelayCall>,
    /// Readings returned before falling back to `temperature`.
    pub script: VecDeque<Result<f64, SensorError>>,
    pub temperature: f64,
    pub relay_fails: bool,
    pub reads: u32,
}

#[allow(dead_code)]
impl MockKiln {
    pub fn at(temperature: f64) -> Self {
        Self {
            relay_calls: Vec::new(),
            script: VecDeque::new(),
            temperature,
            relay_fails: false,
            reads: 0,
        }
    }

    pub fn push_reading(&mut self, reading: Result<f64, SensorError>) {
        self.script.push_back(reading);
    }

    pub fn fail_reads(&mut self, n: usize) {
        for _ in 0..n {
            self.script.push_back(Err(SensorError::ReadFailed));
        }
    }

    pub fn last_relay(&self) -> Option<&RelayCall> {
        self.relay_calls.last()
    }

    pub fn relay_is_off(&self) -> bool {
        self.last_relay().is_none_or(RelayCall::is_off)
    }
}

impl TemperatureSource for MockKiln {
    fn read(&mut self) -> Result<f64, SensorError> {
        self.reads += 1;
        self.script.pop_front().unwrap_or(Ok(self.temperature))
    }
}

impl RelaySink for MockKiln {
    fn set(&mut self, on: Duration, window: Duration) -> Result<(), ActuatorError> {
        if self.relay_fails {
            return Err(ActuatorError::GpioWriteFailed);
        }
        self.relay_calls.push(RelayCall { on, window });
        Ok(())
    }
}

// ── Event recorder ────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<KilnEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transitions(&self) -> Vec<(RunStatus, RunStatus)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                KilnEvent::StateChanged { from, to } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }

    pub fn contains(&self, event: &KilnEvent) -> bool {
        self.events.contains(event)
    }

    pub fn rejections(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, KilnEvent::CommandRejected { .. }))
            .count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &KilnEvent) {
        self.events.push(event.clone());
    }
}

// ── Fixtures ──────────────────────────────────────────────────

pub type TestRunner = KilnRunner<StorageJournal<MemoryStore>, ProfileLibrary>;

/// 20 → 1000 over an hour, hold 30 min, cool to 800 over 30 min.
#[allow(dead_code)]
pub fn cone_profile() -> Profile {
    Profile::new(
        "cone",
        "Test Cone",
        &[
            (0.0, 20.0),
            (3600.0, 1000.0),
            (5400.0, 1000.0),
            (7200.0, 800.0),
        ],
    )
    .unwrap()
}

/// Ten minutes, flat at 100.
#[allow(dead_code)]
pub fn short_profile() -> Profile {
    Profile::new("short", "Short Hold", &[(0.0, 100.0), (600.0, 100.0)]).unwrap()
}

#[allow(dead_code)]
pub fn catalog() -> ProfileLibrary {
    ProfileLibrary::from_profiles([cone_profile(), short_profile()])
}

#[allow(dead_code)]
pub fn runner_with(config: KilnConfig, journal: StorageJournal<MemoryStore>) -> TestRunner {
    KilnRunner::new(config, journal, catalog())
}

/// A recovered, idle runner with an empty journal.
#[allow(dead_code)]
pub fn idle_runner(config: KilnConfig, hw: &mut MockKiln, sink: &mut RecordingSink) -> TestRunner {
    let mut runner = runner_with(config, StorageJournal::new(MemoryStore::new()));
    runner.recover(0.0, hw, sink);
    runner
}

/// Tick every `window` seconds from `from` for `n` ticks; returns the next
/// tick time.
#[allow(dead_code)]
pub fn tick_n(
    runner: &mut TestRunner,
    hw: &mut MockKiln,
    sink: &mut RecordingSink,
    from: f64,
    n: usize,
) -> f64 {
    let window = runner.window().as_secs_f64();
    let mut now = from;
    for _ in 0..n {
        runner.tick(now, hw, sink);
        now += window;
    }
    now
}
