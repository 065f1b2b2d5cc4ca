//! Clock adapters.
//!
//! - [`WallClock`]: system time, real sleeps.
//! - [`SimClock`]: virtual time for the simulator.  `sleep` advances the
//!   virtual clock immediately and sleeps `duration / speedup` of real time
//!   (not at all when `speedup` is 0).

use core::time::Duration;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::app::ports::{Clock, Timestamp};

#[derive(Debug, Default, Clone, Copy)]
pub struct WallClock;

impl Clock for WallClock {
    fn now(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0.0, |d| d.as_secs_f64())
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

pub struct SimClock {
    now: Mutex<Timestamp>,
    speedup: f64,
}

impl SimClock {
    pub fn new(start: Timestamp, speedup: f64) -> Self {
        Self {
            now: Mutex::new(start),
            speedup: if speedup.is_finite() { speedup.max(0.0) } else { 0.0 },
        }
    }

    /// Starts at the current wall time.
    pub fn from_wall(speedup: f64) -> Self {
        Self::new(WallClock.now(), speedup)
    }

    pub fn advance(&self, secs: f64) {
        if let Ok(mut now) = self.now.lock() {
            *now += secs.max(0.0);
        }
    }

    pub fn speedup(&self) -> f64 {
        self.speedup
    }
}

impl Clock for SimClock {
    fn now(&self) -> Timestamp {
        self.now.lock().map_or(0.0, |now| *now)
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration.as_secs_f64());
        if self.speedup > 0.0 {
            std::thread::sleep(duration.div_f64(self.speedup));
        }
    }
}
