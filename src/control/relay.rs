//! Time-proportioning relay driver.
//!
//! Turns a continuous duty fraction into a binary relay signal: within each
//! window of length W the relay is on for `f * W` at the start of the window
//! and off for the remainder.  Durations are rounded to whole milliseconds
//! so repeated windows with the same fraction are identical.
//!
//! ```text
//!  f = 0.3, W = 10 s
//!  ┌───┐       ┌───┐       ┌───┐
//!  │ON │  OFF  │ON │  OFF  │ON │  OFF
//! ─┘   └───────┘   └───────┘   └──────
//!  0   3      10  13      20  23     30
//! ```

use core::time::Duration;

/// One window's worth of relay timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutyCycle {
    pub on: Duration,
    pub off: Duration,
}

impl DutyCycle {
    /// All-off window (safe default).
    pub fn off(window: Duration) -> Self {
        Self {
            on: Duration::ZERO,
            off: window,
        }
    }

    pub fn window(&self) -> Duration {
        self.on + self.off
    }

    /// Relay level `offset` into the window (ON portion first).
    pub fn is_on_at(&self, offset: Duration) -> bool {
        offset < self.on
    }

    /// Fraction of the window the relay is on.
    pub fn fraction(&self) -> f64 {
        let window = self.window();
        if window.is_zero() {
            0.0
        } else {
            self.on.as_secs_f64() / window.as_secs_f64()
        }
    }
}

/// Fixed-window time-proportioning planner.
#[derive(Debug, Clone, Copy)]
pub struct TimeProportioner {
    window_ms: u64,
}

impl TimeProportioner {
    pub fn new(window: Duration) -> Self {
        Self {
            window_ms: window.as_millis() as u64,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Plan one window for duty fraction `fraction` (clamped to `[0, 1]`,
    /// NaN treated as 0).
    pub fn plan(&self, fraction: f64) -> DutyCycle {
        let f = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        let on_ms = ((f * self.window_ms as f64).round() as u64).min(self.window_ms);
        DutyCycle {
            on: Duration::from_millis(on_ms),
            off: Duration::from_millis(self.window_ms - on_ms),
        }
    }
}
