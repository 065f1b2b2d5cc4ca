//! Simulated kiln: a lumped thermal model behind both hardware ports.
//!
//! Each [`read`](TemperatureSource::read) closes one duty window: the
//! elements deliver `kW × on-fraction` for the window while the shell loses
//! heat to ambient in proportion to the temperature difference.  The window
//! is integrated in one-second steps.
//!
//! Faults can be injected for exercising the runner: failed reads, a stuck
//! relay driver.

use core::time::Duration;

use log::{debug, info};

use crate::app::ports::{RelaySink, TemperatureSource};
use crate::error::{ActuatorError, SensorError};

/// Physical parameters of the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalModel {
    pub element_kw: f64,
    /// Joules per degree for kiln, furniture and ware.
    pub heat_capacity: f64,
    /// Watts lost per degree above ambient.
    pub loss_w_per_deg: f64,
    pub ambient: f64,
}

impl Default for ThermalModel {
    fn default() -> Self {
        Self {
            element_kw: 9.46,
            heat_capacity: 60_000.0,
            loss_w_per_deg: 6.0,
            ambient: 20.0,
        }
    }
}

pub struct SimulatedKiln {
    model: ThermalModel,
    temperature: f64,
    /// Relay fraction for the window in progress.
    fraction: f64,
    window: Duration,
    primed: bool,
    failing_reads: u32,
    relay_fails: bool,
    relay_commands: u64,
}

impl SimulatedKiln {
    pub fn new(model: ThermalModel, window: Duration) -> Self {
        info!(
            "Simulator: {:.2}kW, {:.0}J/deg, {:.1}W/deg loss, ambient {:.1}",
            model.element_kw, model.heat_capacity, model.loss_w_per_deg, model.ambient
        );
        Self {
            temperature: model.ambient,
            model,
            fraction: 0.0,
            window,
            primed: false,
            failing_reads: 0,
            relay_fails: false,
            relay_commands: 0,
        }
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn set_temperature(&mut self, temperature: f64) {
        self.temperature = temperature;
    }

    /// Relay fraction currently applied.
    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    pub fn relay_commands(&self) -> u64 {
        self.relay_commands
    }

    /// The next `n` reads fail with `ReadFailed`.
    pub fn fail_next_reads(&mut self, n: u32) {
        self.failing_reads = n;
    }

    pub fn set_relay_failure(&mut self, fail: bool) {
        self.relay_fails = fail;
    }

    /// Integrate `secs` of model time at the current relay fraction.
    pub fn advance(&mut self, secs: f64) {
        let m = &self.model;
        let mut remaining = secs.max(0.0);
        while remaining > 0.0 {
            let step = remaining.min(1.0);
            let heat_in = m.element_kw * 1000.0 * self.fraction;
            let heat_out = m.loss_w_per_deg * (self.temperature - m.ambient);
            self.temperature += (heat_in - heat_out) * step / m.heat_capacity;
            remaining -= step;
        }
    }
}

impl TemperatureSource for SimulatedKiln {
    fn read(&mut self) -> Result<f64, SensorError> {
        if self.primed {
            self.advance(self.window.as_secs_f64());
        }
        self.primed = true;

        if self.failing_reads > 0 {
            self.failing_reads -= 1;
            return Err(SensorError::ReadFailed);
        }
        Ok(self.temperature)
    }
}

impl RelaySink for SimulatedKiln {
    fn set(&mut self, on: Duration, window: Duration) -> Result<(), ActuatorError> {
        if self.relay_fails {
            return Err(ActuatorError::GpioWriteFailed);
        }
        self.relay_commands += 1;
        self.window = window;
        self.fraction = if window.is_zero() {
            0.0
        } else {
            (on.as_secs_f64() / window.as_secs_f64()).clamp(0.0, 1.0)
        };
        debug!(
            "Simulator: relay {:.2} of {:.1}s",
            self.fraction,
            window.as_secs_f64()
        );
        Ok(())
    }
}
