//! Kiln runner: the control loop state machine.
//!
//! [`KilnRunner`] owns the FSM, PID controller, schedule tracker, derived
//! metrics and the run journal.  Hardware is injected at each call, as in
//! every port-driven service here, so the whole runner is testable with
//! mock adapters.
//!
//! ```text
//!  TemperatureSource ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                        │          KilnRunner          │
//!        RelaySink  ◀─── │ FSM · PID · Schedule · Meter │ ◀──▶ RunStateStore
//!                        └──────────────────────────────┘
//! ```
//!
//! One [`tick`](KilnRunner::tick) per duty window: read the thermocouple,
//! advance the schedule clock, let the FSM decide completion or fault
//! escalation, compute the duty, drive the relay, persist the record,
//! publish telemetry.

use core::time::Duration;

use log::{debug, error, info, warn};

use crate::config::KilnConfig;
use crate::control::pid::PidController;
use crate::control::relay::{DutyCycle, TimeProportioner};
use crate::control::schedule::ScheduleTracker;
use crate::error::{CommandError, Fault, SensorError};
use crate::fsm::context::KilnContext;
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, RunStatus};
use crate::journal::RunState;
use crate::metrics::{CostMeter, HeatRateTracker};
use crate::profile::Profile;

use super::commands::KilnCommand;
use super::events::{KilnEvent, TelemetryData};
use super::ports::{
    EventSink, ProfileCatalog, RelaySink, RunStateStore, TemperatureSource, Timestamp,
};

// ───────────────────────────────────────────────────────────────
// KilnRunner
// ───────────────────────────────────────────────────────────────

pub struct KilnRunner<J: RunStateStore, C: ProfileCatalog> {
    fsm: Fsm,
    ctx: KilnContext,
    pid: PidController,
    schedule: ScheduleTracker,
    proportioner: TimeProportioner,
    heat_rate: HeatRateTracker,
    cost: CostMeter,
    journal: J,
    catalog: C,

    /// Profile of the active or retained run.
    profile: Option<Profile>,
    /// Last record written (or retained after abort / restart).
    record: RunState,
    /// Stale RUNNING record found at startup, resumable on request.
    pending_recovery: Option<RunState>,
    /// Last telemetry built.
    telemetry: TelemetryData,

    started_at: Timestamp,
    /// Wall seconds spent RUNNING.
    run_elapsed: f64,
    last_tick_at: Option<Timestamp>,
    consecutive_sensor_faults: u32,
    /// A journal write failed and must be retried.
    journal_dirty: bool,
    relay_on: bool,
}

impl<J: RunStateStore, C: ProfileCatalog> KilnRunner<J, C> {
    /// Construct the runner.  Call [`recover`](Self::recover) next.
    pub fn new(config: KilnConfig, journal: J, catalog: C) -> Self {
        let pid = PidController::new(config.pid, config.pid_integral_band);
        let schedule = ScheduleTracker::new(&config);
        let proportioner = TimeProportioner::new(config.duty_window());
        let heat_rate = HeatRateTracker::new(config.heat_rate_window_secs);
        let cost = CostMeter::new(config.element_kw, config.cost_per_kwh);
        let ctx = KilnContext::new(config);
        let fsm = Fsm::new(build_state_table(), RunStatus::Idle);

        Self {
            fsm,
            ctx,
            pid,
            schedule,
            proportioner,
            heat_rate,
            cost,
            journal,
            catalog,
            profile: None,
            record: RunState::idle(),
            pending_recovery: None,
            telemetry: TelemetryData::idle(0.0),
            started_at: 0.0,
            run_elapsed: 0.0,
            last_tick_at: None,
            consecutive_sensor_faults: 0,
            journal_dirty: false,
            relay_on: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Start the FSM, command the relay off and act on the journal.
    ///
    /// - RUNNING record, fresh enough and automatic restarts on: resume
    ///   RUNNING at the recorded schedule position.
    /// - RUNNING record too old (or restarts off): stay IDLE, raise
    ///   `StaleRecovery`, keep it for [`resume_recovered`](Self::resume_recovered).
    /// - PAUSED record: restored PAUSED regardless of age.
    /// - anything else: IDLE.
    pub fn recover(
        &mut self,
        now: Timestamp,
        hw: &mut impl RelaySink,
        sink: &mut impl EventSink,
    ) -> RunStatus {
        self.fsm.start(&mut self.ctx);
        self.drive_relay(hw, sink);

        let record = match self.journal.load() {
            Ok(Some(record)) => record,
            Ok(None) => {
                info!("Recovery: no journal record, starting IDLE");
                return RunStatus::Idle;
            }
            Err(e) => {
                error!("Recovery: journal unreadable ({e}), starting IDLE");
                return RunStatus::Idle;
            }
        };

        let status = match record.status {
            RunStatus::Idle => {
                info!("Recovery: last run was stopped, retaining its record");
                self.record = record;
                RunStatus::Idle
            }
            RunStatus::Complete => {
                info!("Recovery: last run completed, nothing to resume");
                if let Err(e) = self.journal.clear() {
                    warn!("Recovery: could not clear completed record ({e})");
                }
                RunStatus::Idle
            }
            RunStatus::Paused => self.recover_run(record, RunStatus::Paused, now, sink),
            RunStatus::Running => {
                let age = record.age(now);
                let fresh = self.ctx.config.automatic_restarts
                    && age <= self.ctx.config.restart_window_secs;
                if fresh {
                    info!("Recovery: run updated {:.0}s ago, resuming", age.max(0.0));
                    self.recover_run(record, RunStatus::Running, now, sink)
                } else {
                    warn!(
                        "Recovery: run updated {:.0}s ago exceeds {:.0}s window, not resuming",
                        age, self.ctx.config.restart_window_secs
                    );
                    self.record = RunState {
                        status: RunStatus::Idle,
                        ..record.clone()
                    };
                    self.pending_recovery = Some(record);
                    self.raise(Fault::StaleRecovery, sink);
                    sink.emit(&KilnEvent::Recovered {
                        status: RunStatus::Idle,
                        stale: true,
                    });
                    RunStatus::Idle
                }
            }
        };

        self.telemetry = self.build_telemetry(now);
        status
    }

    fn recover_run(
        &mut self,
        record: RunState,
        status: RunStatus,
        now: Timestamp,
        sink: &mut impl EventSink,
    ) -> RunStatus {
        let id = record.profile_id.clone().unwrap_or_default();
        let profile = match self.catalog.profile(&id) {
            Ok(profile) => profile,
            Err(e) => {
                error!("Recovery: profile '{}' unavailable ({e}), starting IDLE", id);
                self.record = RunState {
                    status: RunStatus::Idle,
                    ..record
                };
                return RunStatus::Idle;
            }
        };

        self.restore_run(&record, profile);
        self.transition(status, sink);
        self.persist(now, sink);
        sink.emit(&KilnEvent::Recovered {
            status,
            stale: false,
        });
        status
    }

    /// Rebuild run bookkeeping from a journal record.
    fn restore_run(&mut self, record: &RunState, profile: Profile) {
        self.schedule =
            ScheduleTracker::restore(&self.ctx.config, record.start_offset, record.shift_secs);
        self.cost = CostMeter::new(self.ctx.config.element_kw, self.ctx.config.cost_per_kwh)
            .with_energy(record.energy_kwh);
        self.pid.reset();
        self.heat_rate.clear();
        self.started_at = record.started_at;
        self.run_elapsed = record.run_elapsed.max(0.0);
        self.last_tick_at = None;
        self.consecutive_sensor_faults = 0;

        self.ctx
            .begin_schedule(profile.duration(), profile.final_target());
        self.ctx.temperature = record.last_temperature;
        self.update_schedule_position(&profile);
        self.profile = Some(profile);

        info!(
            "Run restored: schedule at {:.0}s (offset {:.0}s, shift {:.0}s)",
            self.ctx.schedule_time,
            self.schedule.start_offset(),
            self.schedule.shift_secs()
        );
    }

    // ── Commands ──────────────────────────────────────────────

    /// Apply one operator command.  Rejections are logged and emitted, and
    /// never change state.
    pub fn handle_command(
        &mut self,
        cmd: &KilnCommand,
        now: Timestamp,
        hw: &mut (impl TemperatureSource + RelaySink),
        sink: &mut impl EventSink,
    ) -> Result<RunStatus, CommandError> {
        let result = match cmd {
            KilnCommand::Start { profile_id } => self.start(profile_id, now, hw, sink),
            KilnCommand::Pause => self.pause(now, hw, sink),
            KilnCommand::Resume => self.resume(now, sink),
            KilnCommand::Abort => self.abort(now, hw, sink),
            KilnCommand::Clear => self.clear(now, sink),
            KilnCommand::ResumeRecovered => self.resume_recovered(now, sink),
        };

        if let Err(error) = result {
            warn!(
                "Command '{}' rejected in {}: {}",
                cmd.name(),
                self.fsm.current_state(),
                error
            );
            sink.emit(&KilnEvent::CommandRejected {
                command: cmd.name(),
                error,
            });
        }
        result
    }

    /// Start `profile_id` from the catalog.
    pub fn start(
        &mut self,
        profile_id: &str,
        now: Timestamp,
        hw: &mut impl TemperatureSource,
        sink: &mut impl EventSink,
    ) -> Result<RunStatus, CommandError> {
        if self.fsm.current_state() != RunStatus::Idle {
            return Err(CommandError::AlreadyRunning);
        }
        let profile = self.catalog.profile(profile_id)?;
        self.start_profile(profile, now, hw, sink)
    }

    /// Start an already-loaded profile.
    pub fn start_profile(
        &mut self,
        profile: Profile,
        now: Timestamp,
        hw: &mut impl TemperatureSource,
        sink: &mut impl EventSink,
    ) -> Result<RunStatus, CommandError> {
        if self.fsm.current_state() != RunStatus::Idle {
            return Err(CommandError::AlreadyRunning);
        }

        let measured = self.sample(hw, sink);

        self.pid.reset();
        self.schedule.reset();
        self.heat_rate.clear();
        self.cost.reset();
        self.started_at = now;
        self.run_elapsed = 0.0;
        self.last_tick_at = None;
        self.consecutive_sensor_faults = 0;
        self.pending_recovery = None;
        for fault in [
            Fault::StaleRecovery,
            Fault::SensorFaultPersistent,
            Fault::ActuationFault,
        ] {
            self.clear_fault(fault, sink);
        }

        self.schedule.skip_ahead(&profile, measured);
        self.ctx
            .begin_schedule(profile.duration(), profile.final_target());
        self.update_schedule_position(&profile);

        info!(
            "Run start: '{}' ({} points, {:.0}s), schedule at {:.0}s",
            profile.name(),
            profile.points().len(),
            profile.duration(),
            self.ctx.schedule_time
        );
        self.profile = Some(profile);

        self.transition(RunStatus::Running, sink);
        self.persist(now, sink);
        Ok(RunStatus::Running)
    }

    /// RUNNING → PAUSED.  The relay goes off and the schedule clock stops.
    pub fn pause(
        &mut self,
        now: Timestamp,
        hw: &mut impl RelaySink,
        sink: &mut impl EventSink,
    ) -> Result<RunStatus, CommandError> {
        match self.fsm.current_state() {
            RunStatus::Running => {}
            RunStatus::Complete => {
                return Err(CommandError::InvalidTransition {
                    from: RunStatus::Complete,
                });
            }
            RunStatus::Idle | RunStatus::Paused => return Err(CommandError::NotRunning),
        }

        // Count the window that ran up to now.
        let dt = self.advance_clock(now);
        self.run_elapsed += dt;
        self.refresh_schedule_position();
        self.schedule.interrupt();

        self.transition(RunStatus::Paused, sink);
        self.drive_relay(hw, sink);
        self.persist(now, sink);
        Ok(RunStatus::Paused)
    }

    /// PAUSED → RUNNING.  Clears sensor and actuation faults; the next tick
    /// measures its window from `now`, so paused time is never counted.
    pub fn resume(
        &mut self,
        now: Timestamp,
        sink: &mut impl EventSink,
    ) -> Result<RunStatus, CommandError> {
        match self.fsm.current_state() {
            RunStatus::Paused => {}
            RunStatus::Idle => return Err(CommandError::NotRunning),
            from => return Err(CommandError::InvalidTransition { from }),
        }

        self.consecutive_sensor_faults = 0;
        for fault in [
            Fault::SensorFault,
            Fault::SensorFaultPersistent,
            Fault::ActuationFault,
        ] {
            self.clear_fault(fault, sink);
        }
        self.pid.reset();
        self.last_tick_at = Some(now);

        self.transition(RunStatus::Running, sink);
        self.persist(now, sink);
        Ok(RunStatus::Running)
    }

    /// RUNNING / PAUSED → IDLE.  The relay is commanded off before the
    /// status changes; the record is retained for inspection.
    pub fn abort(
        &mut self,
        now: Timestamp,
        hw: &mut impl RelaySink,
        sink: &mut impl EventSink,
    ) -> Result<RunStatus, CommandError> {
        if !self.fsm.current_state().is_active() {
            return Err(CommandError::NotRunning);
        }

        self.ctx.relay_off();
        if let Err(e) = hw.set(Duration::ZERO, self.proportioner.window()) {
            error!("Relay: off command failed during abort ({e})");
            self.raise(Fault::ActuationFault, sink);
        }
        self.relay_on = false;
        self.transition(RunStatus::Idle, sink);
        info!("Run aborted at schedule {:.0}s", self.ctx.schedule_time);
        self.persist(now, sink);
        Ok(RunStatus::Idle)
    }

    /// COMPLETE or IDLE → fresh IDLE, dropping the retained record and any
    /// pending stale recovery.
    pub fn clear(
        &mut self,
        now: Timestamp,
        sink: &mut impl EventSink,
    ) -> Result<RunStatus, CommandError> {
        let from = self.fsm.current_state();
        if from.is_active() {
            return Err(CommandError::InvalidTransition { from });
        }

        self.transition(RunStatus::Idle, sink);
        self.profile = None;
        self.pending_recovery = None;
        self.run_elapsed = 0.0;
        self.schedule.reset();
        self.cost.reset();
        self.heat_rate.clear();
        self.clear_fault(Fault::StaleRecovery, sink);
        self.ctx.begin_schedule(0.0, 0.0);
        self.record = RunState::idle();

        match self.journal.clear() {
            Ok(()) => {
                self.journal_dirty = false;
                self.clear_fault(Fault::PersistenceFault, sink);
            }
            Err(e) => {
                warn!("Journal: clear failed ({e}), retrying next tick");
                self.journal_dirty = true;
                self.raise(Fault::PersistenceFault, sink);
            }
        }
        self.telemetry = self.build_telemetry(now);
        Ok(RunStatus::Idle)
    }

    /// Resume the stale run found at startup (IDLE → RUNNING).
    pub fn resume_recovered(
        &mut self,
        now: Timestamp,
        sink: &mut impl EventSink,
    ) -> Result<RunStatus, CommandError> {
        if self.fsm.current_state() != RunStatus::Idle {
            return Err(CommandError::AlreadyRunning);
        }
        let Some(record) = self.pending_recovery.clone() else {
            return Err(CommandError::NoRecoverableRun);
        };
        let id = record.profile_id.clone().unwrap_or_default();
        let profile = self.catalog.profile(&id)?;

        info!("Recovery: operator resumed stale run '{}'", id);
        self.pending_recovery = None;
        self.clear_fault(Fault::StaleRecovery, sink);
        self.restore_run(&record, profile);
        self.transition(RunStatus::Running, sink);
        self.persist(now, sink);
        Ok(RunStatus::Running)
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// One duty cycle: read → schedule → FSM → PID → relay → persist →
    /// telemetry.
    pub fn tick(
        &mut self,
        now: Timestamp,
        hw: &mut (impl TemperatureSource + RelaySink),
        sink: &mut impl EventSink,
    ) {
        let prev = self.fsm.current_state();
        let dt = self.advance_clock(now);

        // 1. Read the thermocouple (monitor-only once complete).
        let monitoring = prev != RunStatus::Complete || self.ctx.config.monitor_after_complete;
        let reading = if monitoring {
            self.sample(hw, sink)
        } else {
            None
        };
        if let Some(t) = reading {
            self.heat_rate.record(now, t);
        }

        // 2. Advance the schedule clock.
        if prev == RunStatus::Running {
            self.run_elapsed += dt;
            self.refresh_schedule_position();
        }

        // 3. FSM: completion and fault escalation.
        if let Some(next) = self.fsm.tick(&mut self.ctx) {
            sink.emit(&KilnEvent::StateChanged {
                from: prev,
                to: next,
            });
        }

        // 4. Control and actuation.
        let status = self.fsm.current_state();
        if status == RunStatus::Running {
            self.control(reading, dt);
            self.drive_relay(hw, sink);
        } else if prev == RunStatus::Running {
            self.drive_relay(hw, sink);
        }

        // 5. Journal.
        if self.fsm.current_state() != RunStatus::Idle || prev != RunStatus::Idle {
            self.persist(now, sink);
        } else if self.journal_dirty {
            self.retry_journal(now, sink);
        }

        // 6. Telemetry.
        self.telemetry = self.build_telemetry(now);
        sink.emit(&KilnEvent::Telemetry(self.telemetry.clone()));
    }

    /// PID or hold-last-duty, then the shift policy.
    fn control(&mut self, reading: Option<f64>, dt: f64) {
        match reading {
            Some(measured) => {
                self.ctx.duty = self.pid.update(self.ctx.target, measured, dt);
                let terms = self.pid.last_terms();
                debug!(
                    "PID | sp={:.1} pv={:.1} p={:.3} i={:.3} d={:.3} out={:.3}",
                    self.ctx.target, measured, terms.p, terms.i, terms.d, terms.output
                );
                if self.schedule.observe(measured, self.ctx.target, dt) > 0.0 {
                    // Held clock: report the position net of the new shift.
                    self.refresh_schedule_position();
                }
            }
            None => {
                warn!(
                    "Control: no reading ({}/{}), holding duty {:.2}",
                    self.consecutive_sensor_faults,
                    self.ctx.config.sensor_fault_limit,
                    self.ctx.duty
                );
                self.schedule.interrupt();
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Snapshot of the run record.
    pub fn status(&self) -> RunState {
        self.record.clone()
    }

    pub fn run_status(&self) -> RunStatus {
        self.fsm.current_state()
    }

    /// Telemetry from the last tick or command.
    pub fn telemetry(&self) -> &TelemetryData {
        &self.telemetry
    }

    pub fn fault_flags(&self) -> u8 {
        self.ctx.fault_flags
    }

    pub fn has_fault(&self, fault: Fault) -> bool {
        self.ctx.has_fault(fault)
    }

    pub fn pending_recovery(&self) -> Option<&RunState> {
        self.pending_recovery.as_ref()
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn duty(&self) -> f64 {
        self.ctx.duty
    }

    pub fn schedule_time(&self) -> f64 {
        self.ctx.schedule_time
    }

    pub fn shift_secs(&self) -> f64 {
        self.schedule.shift_secs()
    }

    pub fn run_elapsed(&self) -> f64 {
        self.run_elapsed
    }

    pub fn config(&self) -> &KilnConfig {
        &self.ctx.config
    }

    pub fn window(&self) -> Duration {
        self.proportioner.window()
    }

    pub fn journal(&self) -> &J {
        &self.journal
    }

    pub fn journal_mut(&mut self) -> &mut J {
        &mut self.journal
    }

    /// Build a telemetry record from the current context.
    pub fn build_telemetry(&self, now: Timestamp) -> TelemetryData {
        let status = self.fsm.current_state();
        let total_time = self.profile.as_ref().map_or(0.0, Profile::duration);
        let in_run = status != RunStatus::Idle;
        TelemetryData {
            timestamp: now,
            status,
            temperature: self.ctx.temperature,
            target: if in_run { self.ctx.target } else { 0.0 },
            duty_fraction: self.ctx.duty,
            relay_on: self.relay_on,
            profile_name: self.profile.as_ref().and_then(|p| bounded(p.name())),
            elapsed: self.ctx.schedule_time,
            run_elapsed: self.run_elapsed,
            total_time,
            time_remaining: if in_run {
                (total_time - self.ctx.schedule_time).max(0.0)
            } else {
                0.0
            },
            shift_secs: self.schedule.shift_secs(),
            heat_rate: self.heat_rate.rate_per_hour(),
            energy_kwh: self.cost.energy_kwh(),
            estimated_cost: self.cost.cost(),
            fault_flags: self.ctx.fault_flags,
        }
    }

    // ── Internal ──────────────────────────────────────────────

    /// Seconds since the previous tick (0 for the first after start,
    /// recovery or a clock step backwards).
    fn advance_clock(&mut self, now: Timestamp) -> f64 {
        match self.last_tick_at.replace(now) {
            Some(last) if now > last => now - last,
            _ => 0.0,
        }
    }

    fn refresh_schedule_position(&mut self) {
        if let Some(profile) = self.profile.take() {
            self.update_schedule_position(&profile);
            self.profile = Some(profile);
        }
    }

    fn update_schedule_position(&mut self, profile: &Profile) {
        self.ctx.run_elapsed = self.run_elapsed;
        self.ctx.start_offset = self.schedule.start_offset();
        self.ctx.schedule_time = self.schedule.effective_schedule_time(self.run_elapsed);
        self.ctx.target = profile.target_at(self.ctx.schedule_time);
    }

    /// Read and validate one temperature.  Maintains the sensor fault
    /// counters and the over-temperature flag.
    fn sample(&mut self, hw: &mut impl TemperatureSource, sink: &mut impl EventSink) -> Option<f64> {
        let (min, max) = (self.ctx.config.min_valid_temp, self.ctx.config.max_valid_temp);
        let reading = hw.read().and_then(|t| {
            if t.is_finite() && (min..=max).contains(&t) {
                Ok(t)
            } else {
                Err(SensorError::OutOfRange)
            }
        });

        match reading {
            Ok(t) => {
                self.consecutive_sensor_faults = 0;
                self.clear_fault(Fault::SensorFault, sink);
                self.ctx.temperature = Some(t);
                if t > self.ctx.config.emergency_shutoff_temp {
                    if !self.ctx.has_fault(Fault::OverTemperature) {
                        error!(
                            "Emergency shutoff: {:.1} above {:.1}",
                            t, self.ctx.config.emergency_shutoff_temp
                        );
                    }
                    self.raise(Fault::OverTemperature, sink);
                } else {
                    self.clear_fault(Fault::OverTemperature, sink);
                }
                Some(t)
            }
            Err(e) => {
                self.consecutive_sensor_faults = self.consecutive_sensor_faults.saturating_add(1);
                warn!(
                    "Sensor: read failed ({e}), {} consecutive",
                    self.consecutive_sensor_faults
                );
                self.raise(Fault::SensorFault, sink);
                if self.fsm.current_state() == RunStatus::Running
                    && self.consecutive_sensor_faults > self.ctx.config.sensor_fault_limit
                {
                    self.raise(Fault::SensorFaultPersistent, sink);
                }
                None
            }
        }
    }

    /// Command the relay from the context.  A failed write is treated as
    /// relay off and pauses a running run.
    fn drive_relay(&mut self, hw: &mut impl RelaySink, sink: &mut impl EventSink) {
        let window = self.proportioner.window();
        let plan = if self.ctx.relay_enabled {
            self.proportioner.plan(self.ctx.duty)
        } else {
            DutyCycle::off(window)
        };

        match hw.set(plan.on, plan.window()) {
            Ok(()) => {
                self.relay_on = !plan.on.is_zero();
                if self.ctx.relay_enabled {
                    self.cost.record(plan.fraction(), window.as_secs_f64());
                }
                self.clear_fault(Fault::ActuationFault, sink);
            }
            Err(e) => {
                error!("Relay: command failed ({e}), assuming off");
                self.relay_on = false;
                self.raise(Fault::ActuationFault, sink);
                if self.fsm.current_state() == RunStatus::Running {
                    self.transition(RunStatus::Paused, sink);
                    if let Err(e) = hw.set(Duration::ZERO, window) {
                        error!("Relay: off command also failed ({e})");
                    }
                }
            }
        }
    }

    /// Forced transition plus its event.
    fn transition(&mut self, to: RunStatus, sink: &mut impl EventSink) {
        let from = self.fsm.current_state();
        if self.fsm.force_transition(to, &mut self.ctx) {
            sink.emit(&KilnEvent::StateChanged { from, to });
        }
    }

    fn snapshot(&self, now: Timestamp) -> RunState {
        let profile = self.profile.as_ref();
        RunState {
            status: self.fsm.current_state(),
            profile_id: profile.and_then(|p| bounded(p.id())),
            profile_name: profile.and_then(|p| bounded(p.name())),
            started_at: self.started_at,
            elapsed_offset: self.ctx.schedule_time,
            start_offset: self.schedule.start_offset(),
            run_elapsed: self.run_elapsed,
            shift_secs: self.schedule.shift_secs(),
            last_temperature: self.ctx.temperature,
            last_duty_fraction: self.ctx.duty,
            last_update_at: now,
            energy_kwh: self.cost.energy_kwh(),
            fault_flags: self.ctx.fault_flags,
        }
    }

    /// Write the current record.  A failure raises `PersistenceFault` and is
    /// retried on the next tick; it never blocks actuation.
    fn persist(&mut self, now: Timestamp, sink: &mut impl EventSink) {
        self.record = self.snapshot(now);
        match self.journal.save(&self.record) {
            Ok(()) => {
                self.journal_dirty = false;
                self.clear_fault(Fault::PersistenceFault, sink);
            }
            Err(e) => {
                warn!("Journal: save failed ({e}), retrying next tick");
                self.journal_dirty = true;
                self.raise(Fault::PersistenceFault, sink);
            }
        }
    }

    /// Idle retry: either re-clear (nothing retained) or re-write the
    /// retained record.
    fn retry_journal(&mut self, now: Timestamp, sink: &mut impl EventSink) {
        if self.profile.is_some() {
            self.persist(now, sink);
            return;
        }
        match self.journal.clear() {
            Ok(()) => {
                self.journal_dirty = false;
                self.clear_fault(Fault::PersistenceFault, sink);
            }
            Err(e) => debug!("Journal: clear retry failed ({e})"),
        }
    }

    fn raise(&mut self, fault: Fault, sink: &mut impl EventSink) {
        if self.ctx.raise(fault) {
            warn!("Fault raised: {fault}");
            sink.emit(&KilnEvent::FaultRaised(fault));
        }
    }

    fn clear_fault(&mut self, fault: Fault, sink: &mut impl EventSink) {
        if self.ctx.clear(fault) {
            info!("Fault cleared: {fault}");
            sink.emit(&KilnEvent::FaultCleared(fault));
        }
    }
}

fn bounded<const N: usize>(s: &str) -> Option<heapless::String<N>> {
    let mut out = heapless::String::new();
    out.push_str(s).ok()?;
    Some(out)
}
