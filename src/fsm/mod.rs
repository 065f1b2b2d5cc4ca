//! Function-pointer finite state machine for the firing run.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  StateTable                                                │
//! │  ┌──────────┬───────────┬──────────┬───────────────────┐   │
//! │  │ RunStatus│ on_enter  │ on_exit  │ on_update         │   │
//! │  ├──────────┼───────────┼──────────┼───────────────────┤   │
//! │  │ Idle     │ fn(ctx)   │ -        │ fn(ctx)->Option<> │   │
//! │  │ Running  │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │   │
//! │  │ Paused   │ fn(ctx)   │ -        │ fn(ctx)->Option<> │   │
//! │  │ Complete │ fn(ctx)   │ -        │ fn(ctx)->Option<> │   │
//! │  └──────────┴───────────┴──────────┴───────────────────┘   │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the current state.  If it
//! returns `Some(next)`, the engine runs `on_exit` for the current state,
//! then `on_enter` for the next.  Operator commands (start, pause, abort)
//! go through [`Fsm::force_transition`]; `on_update` only handles the
//! transitions the run makes on its own (completion, fault escalation).

pub mod context;
pub mod states;

use context::KilnContext;
use log::info;
use serde::{Deserialize, Serialize};

/// Run status.  Must stay in sync with [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RunStatus {
    Idle = 0,
    Running = 1,
    Paused = 2,
    Complete = 3,
}

impl RunStatus {
    pub const COUNT: usize = 4;

    /// Convert a table index back to a status.  Out-of-range indices map to
    /// `Idle` (relay off) in release builds.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Paused,
            3 => Self::Complete,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Idle
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Running => "RUNNING",
            Self::Paused => "PAUSED",
            Self::Complete => "COMPLETE",
        }
    }

    /// A run exists (started and not yet aborted or cleared).
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }
}

impl core::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs exactly once per transition.
pub type StateActionFn = fn(&mut KilnContext);

/// Per-tick handler.  Returns `Some(next)` to transition.
pub type StateUpdateFn = fn(&mut KilnContext) -> Option<RunStatus>;

/// One row of the state table.
pub struct StateDescriptor {
    pub id: RunStatus,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

/// The state machine engine.
pub struct Fsm {
    table: [StateDescriptor; RunStatus::COUNT],
    current: usize,
    tick_count: u64,
    state_entry_tick: u64,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; RunStatus::COUNT], initial: RunStatus) -> Self {
        Self {
            table,
            current: initial as usize,
            tick_count: 0,
            state_entry_tick: 0,
        }
    }

    /// Run the initial `on_enter`.  Call once before the first `tick()`.
    pub fn start(&mut self, ctx: &mut KilnContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance by one duty cycle.  Returns the new status if a transition
    /// happened.
    pub fn tick(&mut self, ctx: &mut KilnContext) -> Option<RunStatus> {
        self.tick_count += 1;
        ctx.ticks_in_state = self.tick_count - self.state_entry_tick;
        ctx.total_ticks = self.tick_count;

        let next = (self.table[self.current].on_update)(ctx)?;
        if next as usize == self.current {
            return None;
        }
        self.transition(next, ctx);
        Some(next)
    }

    /// Immediate transition for operator commands and safety overrides.
    /// Returns false when already in `next`.
    pub fn force_transition(&mut self, next: RunStatus, ctx: &mut KilnContext) -> bool {
        if next as usize == self.current {
            return false;
        }
        self.transition(next, ctx);
        true
    }

    pub fn current_state(&self) -> RunStatus {
        RunStatus::from_index(self.current)
    }

    pub fn ticks_in_current_state(&self) -> u64 {
        self.tick_count - self.state_entry_tick
    }

    fn transition(&mut self, next: RunStatus, ctx: &mut KilnContext) {
        let next_idx = next as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.state_entry_tick = self.tick_count;
        ctx.ticks_in_state = 0;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
