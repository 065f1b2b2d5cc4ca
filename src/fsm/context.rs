//! Shared mutable context threaded through every FSM handler.
//!
//! `KilnContext` is the blackboard state handlers read from and write to:
//! the latest reading, the schedule position computed by the runner, the
//! duty the relay should carry, configuration and active faults.

use crate::config::KilnConfig;
use crate::error::Fault;

pub struct KilnContext {
    // -- Timing --
    /// Ticks since the current state was entered.
    pub ticks_in_state: u64,
    /// Total FSM ticks.
    pub total_ticks: u64,

    // -- Process --
    /// Latest valid temperature, `None` until the first good read.
    pub temperature: Option<f64>,
    /// Setpoint for the current duty cycle.
    pub target: f64,
    /// Profile lookup time for the current duty cycle.
    pub schedule_time: f64,
    /// Time of the profile's final point.
    pub profile_end: f64,
    /// Target of the profile's final point.
    pub final_target: f64,
    /// Wall seconds spent Running, shift included.
    pub run_elapsed: f64,
    /// Schedule time the run started at (skip-ahead).
    pub start_offset: f64,

    // -- Actuation --
    /// Duty fraction the relay should carry this window.
    pub duty: f64,
    /// Relay may be switched on.  Only the Running state sets this.
    pub relay_enabled: bool,

    // -- Configuration --
    pub config: KilnConfig,

    // -- Faults --
    /// Active fault bitmask (see [`Fault::mask`]).
    pub fault_flags: u8,
}

impl KilnContext {
    pub fn new(config: KilnConfig) -> Self {
        Self {
            ticks_in_state: 0,
            total_ticks: 0,
            temperature: None,
            target: 0.0,
            schedule_time: 0.0,
            profile_end: 0.0,
            final_target: 0.0,
            run_elapsed: 0.0,
            start_offset: 0.0,
            duty: 0.0,
            relay_enabled: false,
            config,
            fault_flags: 0,
        }
    }

    /// Load the shape of a new run's profile.
    pub fn begin_schedule(&mut self, profile_end: f64, final_target: f64) {
        self.profile_end = profile_end;
        self.final_target = final_target;
        self.schedule_time = 0.0;
        self.target = 0.0;
        self.run_elapsed = 0.0;
        self.start_offset = 0.0;
    }

    /// Seconds the schedule clock has run past the final point.
    pub fn secs_past_end(&self) -> f64 {
        self.schedule_time - self.profile_end
    }

    /// Run time beyond the unshifted plan (`profile_end - start_offset`).
    /// Shift holds the schedule clock but never this one.
    pub fn secs_over_plan(&self) -> f64 {
        self.run_elapsed - (self.profile_end - self.start_offset)
    }

    pub fn has_fault(&self, fault: Fault) -> bool {
        self.fault_flags & fault.mask() != 0
    }

    /// Set `fault`.  Returns true if it was not already active.
    pub fn raise(&mut self, fault: Fault) -> bool {
        let fresh = !self.has_fault(fault);
        self.fault_flags |= fault.mask();
        fresh
    }

    /// Clear `fault`.  Returns true if it was active.
    pub fn clear(&mut self, fault: Fault) -> bool {
        let was = self.has_fault(fault);
        self.fault_flags &= !fault.mask();
        was
    }

    /// Safe actuation state: no duty, relay not allowed on.
    pub fn relay_off(&mut self) {
        self.duty = 0.0;
        self.relay_enabled = false;
    }
}
