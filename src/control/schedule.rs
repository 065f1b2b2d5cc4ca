//! Schedule clock: maps run progress to a profile lookup time.
//!
//! Two policies compensate for kilns that cannot follow the profile:
//!
//! - **Skip-ahead** (run start): a kiln that is already warmer than the
//!   first target by more than a margin starts the schedule at the first
//!   control point whose target is at or above the measured temperature.
//! - **Shift** (during the run): once the kiln has been more than a margin
//!   below target for longer than a grace period, every further second of
//!   deficit is added to `shift_secs`.  The schedule clock stands still
//!   while the elements keep heating at full effort.  Shift only grows.
//!
//! ```text
//!  lookup = start_offset + max(0, run_elapsed - shift_secs)
//! ```

use log::{info, warn};

use crate::config::KilnConfig;
use crate::profile::Profile;

/// Tracks skip-ahead offset and accumulated shift for one run.
#[derive(Debug, Clone)]
pub struct ScheduleTracker {
    catch_up_enabled: bool,
    catch_up_margin: f64,
    catch_up_grace_secs: f64,
    seek_start: bool,
    seek_start_margin: f64,
    /// Schedule time the run started at (skip-ahead t0).
    start_offset: f64,
    /// Seconds the schedule clock has been held back.
    shift_secs: f64,
    /// Length of the current continuous deficit.
    deficit_secs: f64,
}

impl ScheduleTracker {
    pub fn new(config: &KilnConfig) -> Self {
        Self {
            catch_up_enabled: config.catch_up_enabled,
            catch_up_margin: config.catch_up_margin,
            catch_up_grace_secs: config.catch_up_grace_secs,
            seek_start: config.seek_start,
            seek_start_margin: config.seek_start_margin,
            start_offset: 0.0,
            shift_secs: 0.0,
            deficit_secs: 0.0,
        }
    }

    /// Rebuild a tracker from a persisted run.
    pub fn restore(config: &KilnConfig, start_offset: f64, shift_secs: f64) -> Self {
        let mut tracker = Self::new(config);
        tracker.start_offset = start_offset.max(0.0);
        tracker.shift_secs = shift_secs.max(0.0);
        tracker
    }

    /// Forget offset, shift and deficit (new run).
    pub fn reset(&mut self) {
        self.start_offset = 0.0;
        self.shift_secs = 0.0;
        self.deficit_secs = 0.0;
    }

    /// Decide where a new run starts given the measured temperature.
    /// Returns the chosen start offset (0 when no skip applies).
    pub fn skip_ahead(&mut self, profile: &Profile, measured: Option<f64>) -> f64 {
        self.start_offset = 0.0;
        if !self.seek_start {
            return 0.0;
        }
        let Some(temp) = measured else {
            warn!("Schedule: no temperature at start, skip-ahead disabled for this run");
            return 0.0;
        };

        let first_target = profile.target_at(0.0);
        if temp > first_target + self.seek_start_margin {
            let t0 = profile.seek_start_time(temp);
            if t0 > 0.0 {
                info!(
                    "Schedule: kiln at {:.1}, starting '{}' at {:.0}s",
                    temp,
                    profile.name(),
                    t0
                );
            } else {
                warn!(
                    "Schedule: kiln at {:.1} but no control point reaches it, starting at 0",
                    temp
                );
            }
            self.start_offset = t0;
        }
        self.start_offset
    }

    /// Profile lookup time for `run_elapsed` seconds spent running.
    pub fn effective_schedule_time(&self, run_elapsed: f64) -> f64 {
        self.start_offset + (run_elapsed - self.shift_secs).max(0.0)
    }

    /// Evaluate the shift condition after a window of `dt` seconds.
    /// Returns the seconds added to the shift this call.
    pub fn observe(&mut self, measured: f64, target: f64, dt: f64) -> f64 {
        if !self.catch_up_enabled || dt <= 0.0 {
            return 0.0;
        }

        if target - measured > self.catch_up_margin {
            let before = (self.deficit_secs - self.catch_up_grace_secs).max(0.0);
            self.deficit_secs += dt;
            let after = (self.deficit_secs - self.catch_up_grace_secs).max(0.0);
            let added = after - before;
            if added > 0.0 {
                if before <= 0.0 {
                    warn!(
                        "Schedule: kiln {:.1} below target for {:.0}s, holding schedule",
                        target - measured,
                        self.deficit_secs
                    );
                }
                self.shift_secs += added;
            }
            added
        } else {
            if self.deficit_secs > self.catch_up_grace_secs {
                info!(
                    "Schedule: kiln caught up, total shift {:.0}s",
                    self.shift_secs
                );
            }
            self.deficit_secs = 0.0;
            0.0
        }
    }

    /// Break the current deficit streak (pause, sensor fault).
    pub fn interrupt(&mut self) {
        self.deficit_secs = 0.0;
    }

    pub fn start_offset(&self) -> f64 {
        self.start_offset
    }

    pub fn shift_secs(&self) -> f64 {
        self.shift_secs
    }
}
