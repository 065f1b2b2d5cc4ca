//! Concrete state handlers and table builder.
//!
//! ```text
//!  IDLE ──[start]──▶ RUNNING ──[past end, at final temp | timeout]──▶ COMPLETE
//!   ▲                 │    ▲                                            │
//!   │            [pause]  [resume]                                  [clear]
//!   │                 ▼    │                                            │
//!   ├───[abort]───── PAUSED ◀──[persistent sensor / actuation fault]    │
//!   │                                                                   │
//!   └───────────────────────────────────────────────────────────────────┘
//!
//!  RUNNING / PAUSED ──[abort | over-temperature]──▶ IDLE
//! ```
//!
//! Every state except Running drops the duty to zero on entry, so relay-off
//! is what any transition away from Running produces.

use super::context::KilnContext;
use super::{RunStatus, StateDescriptor};
use crate::error::Fault;
use log::{error, info, warn};

/// Build the static state table.
pub fn build_state_table() -> [StateDescriptor; RunStatus::COUNT] {
    [
        StateDescriptor {
            id: RunStatus::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
        },
        StateDescriptor {
            id: RunStatus::Running,
            name: "Running",
            on_enter: Some(running_enter),
            on_exit: Some(running_exit),
            on_update: running_update,
        },
        StateDescriptor {
            id: RunStatus::Paused,
            name: "Paused",
            on_enter: Some(paused_enter),
            on_exit: None,
            on_update: paused_update,
        },
        StateDescriptor {
            id: RunStatus::Complete,
            name: "Complete",
            on_enter: Some(complete_enter),
            on_exit: None,
            on_update: complete_update,
        },
    ]
}

// ── IDLE ─────────────────────────────────────────────────────

fn idle_enter(ctx: &mut KilnContext) {
    ctx.relay_off();
    info!("IDLE: relay off, waiting for a run");
}

fn idle_update(_ctx: &mut KilnContext) -> Option<RunStatus> {
    None
}

// ── RUNNING ──────────────────────────────────────────────────

fn running_enter(ctx: &mut KilnContext) {
    ctx.relay_enabled = true;
    info!(
        "RUNNING: schedule at {:.0}s of {:.0}s",
        ctx.schedule_time, ctx.profile_end
    );
}

fn running_exit(ctx: &mut KilnContext) {
    ctx.relay_off();
}

fn running_update(ctx: &mut KilnContext) -> Option<RunStatus> {
    if ctx.has_fault(Fault::OverTemperature) {
        error!(
            "RUNNING: emergency shutoff at {:.1}, aborting run",
            ctx.temperature.unwrap_or(f64::NAN)
        );
        return Some(RunStatus::Idle);
    }
    if ctx.has_fault(Fault::SensorFaultPersistent) {
        warn!("RUNNING: sensor fault persisted, pausing with relay off");
        return Some(RunStatus::Paused);
    }
    if ctx.has_fault(Fault::ActuationFault) {
        warn!("RUNNING: relay command failed, pausing with relay off");
        return Some(RunStatus::Paused);
    }

    // Only a fresh reading can settle the run.
    let fresh_reading = !ctx.has_fault(Fault::SensorFault);
    if ctx.secs_past_end() > 0.0 && fresh_reading {
        let settled = ctx
            .temperature
            .is_some_and(|t| (t - ctx.final_target).abs() <= ctx.config.completion_tolerance);
        if settled {
            info!("RUNNING: final target {:.1} reached, run complete", ctx.final_target);
            return Some(RunStatus::Complete);
        }
    }

    let overdue = ctx.secs_over_plan();
    if overdue >= ctx.config.completion_timeout_secs {
        warn!(
            "RUNNING: {:.0}s of run time past the planned end without reaching {:.1}, completing",
            overdue, ctx.final_target
        );
        return Some(RunStatus::Complete);
    }

    None
}

// ── PAUSED ───────────────────────────────────────────────────

fn paused_enter(ctx: &mut KilnContext) {
    ctx.relay_off();
    info!(
        "PAUSED: relay off, schedule frozen at {:.0}s",
        ctx.schedule_time
    );
}

fn paused_update(ctx: &mut KilnContext) -> Option<RunStatus> {
    if ctx.has_fault(Fault::OverTemperature) {
        error!("PAUSED: emergency shutoff, aborting run");
        return Some(RunStatus::Idle);
    }
    None
}

// ── COMPLETE ─────────────────────────────────────────────────

fn complete_enter(ctx: &mut KilnContext) {
    ctx.relay_off();
    info!("COMPLETE: relay off, monitoring only");
}

fn complete_update(_ctx: &mut KilnContext) -> Option<RunStatus> {
    None
}
