//! Derived run metrics: heating rate and energy cost.
//!
//! Both are computed from the runner's own tick history and exposed only
//! through telemetry.

use heapless::Deque;
use log::warn;

/// Samples kept for the heating-rate window, one per duty window.  A
/// configured rate window must fit in `HEAT_RATE_SAMPLES - 1` intervals.
pub const HEAT_RATE_SAMPLES: usize = 128;

/// Trailing-window heating rate in degrees per hour.
#[derive(Debug, Clone)]
pub struct HeatRateTracker {
    window_secs: f64,
    samples: Deque<(f64, f64), HEAT_RATE_SAMPLES>,
}

impl HeatRateTracker {
    pub fn new(window_secs: f64) -> Self {
        Self {
            window_secs,
            samples: Deque::new(),
        }
    }

    /// Record a temperature taken at wall-clock time `at` (seconds).
    pub fn record(&mut self, at: f64, temperature: f64) {
        if let Some(&(last_at, _)) = self.samples.back() {
            if at < last_at {
                // Clock stepped backwards: history no longer comparable.
                self.samples.clear();
            }
        }
        if self.samples.is_full() {
            self.samples.pop_front();
        }
        if self.samples.push_back((at, temperature)).is_err() {
            warn!("HeatRate: sample buffer full, reading at {:.0}s dropped", at);
        }

        while let Some(&(oldest, _)) = self.samples.front() {
            if at - oldest > self.window_secs && self.samples.len() > 2 {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Degrees per hour across the window, 0 with fewer than two samples.
    pub fn rate_per_hour(&self) -> f64 {
        match (self.samples.front(), self.samples.back()) {
            (Some(&(t0, temp0)), Some(&(t1, temp1))) if t1 > t0 => {
                (temp1 - temp0) / ((t1 - t0) / 3600.0)
            }
            _ => 0.0,
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Energy and cost accumulated from commanded duty.
#[derive(Debug, Clone, Copy)]
pub struct CostMeter {
    element_kw: f64,
    cost_per_kwh: f64,
    energy_kwh: f64,
}

impl CostMeter {
    pub fn new(element_kw: f64, cost_per_kwh: f64) -> Self {
        Self {
            element_kw,
            cost_per_kwh,
            energy_kwh: 0.0,
        }
    }

    /// Continue from a persisted total.
    pub fn with_energy(mut self, energy_kwh: f64) -> Self {
        self.energy_kwh = energy_kwh.max(0.0);
        self
    }

    /// Add one window of `window_secs` at `duty_fraction`.
    pub fn record(&mut self, duty_fraction: f64, window_secs: f64) {
        let f = duty_fraction.clamp(0.0, 1.0);
        self.energy_kwh += f * window_secs / 3600.0 * self.element_kw;
    }

    pub fn energy_kwh(&self) -> f64 {
        self.energy_kwh
    }

    pub fn cost(&self) -> f64 {
        self.energy_kwh * self.cost_per_kwh
    }

    pub fn reset(&mut self) {
        self.energy_kwh = 0.0;
    }
}
