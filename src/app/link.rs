//! Control-loop ↔ observer plumbing.
//!
//! Bounded `embassy-sync` channels bridge the synchronous control thread and
//! everything that talks to it (CLI, web layer, telemetry publishers).  The
//! control thread never blocks on them: sends are `try_send`, and a full
//! telemetry feed drops the new record with a warning rather than stalling
//! a duty cycle.
//!
//! ```text
//! ┌──────────────┐  KilnCommand     ┌──────────────┐
//! │  Observers   │────────────────▶│ Control Loop │
//! │  (async)     │◀────────────────│ (sync)       │
//! └──────────────┘ CommandOutcome   └──────────────┘
//!        ▲           TelemetryData        │
//!        └────────────────────────────────┘
//!        latest snapshot (copied out under lock)
//! ```

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use super::commands::{CommandOutcome, KilnCommand};
use super::events::TelemetryData;
use crate::journal::RunState;

/// Queued operator commands.
pub const COMMAND_DEPTH: usize = 8;

/// Outcomes awaiting collection by the command sender.
pub const OUTCOME_DEPTH: usize = 8;

/// Telemetry records buffered for a slow observer.
pub const TELEMETRY_DEPTH: usize = 16;

/// Latest published state, for status polls.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub run: RunState,
    pub telemetry: TelemetryData,
}

/// Shared between the control thread and observers (wrap in an `Arc` or
/// place in a `static`).
pub struct KilnLink {
    commands: Channel<CriticalSectionRawMutex, KilnCommand, COMMAND_DEPTH>,
    outcomes: Channel<CriticalSectionRawMutex, CommandOutcome, OUTCOME_DEPTH>,
    telemetry: Channel<CriticalSectionRawMutex, TelemetryData, TELEMETRY_DEPTH>,
    latest: Mutex<CriticalSectionRawMutex, RefCell<Option<Snapshot>>>,
}

impl KilnLink {
    pub const fn new() -> Self {
        Self {
            commands: Channel::new(),
            outcomes: Channel::new(),
            telemetry: Channel::new(),
            latest: Mutex::new(RefCell::new(None)),
        }
    }

    // ── Observer side ─────────────────────────────────────────

    /// Queue a command for the next tick boundary.  Hands the command back
    /// if the queue is full.
    pub fn submit(&self, command: KilnCommand) -> Result<(), KilnCommand> {
        self.commands.try_send(command).map_err(|e| match e {
            embassy_sync::channel::TrySendError::Full(command) => command,
        })
    }

    pub fn try_outcome(&self) -> Option<CommandOutcome> {
        self.outcomes.try_receive().ok()
    }

    pub fn try_telemetry(&self) -> Option<TelemetryData> {
        self.telemetry.try_receive().ok()
    }

    /// Copy of the latest snapshot, `None` before the first publish.
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.latest.lock(|cell| cell.borrow().clone())
    }

    /// `status()` for observers.
    pub fn run_state(&self) -> Option<RunState> {
        self.latest
            .lock(|cell| cell.borrow().as_ref().map(|s| s.run.clone()))
    }

    // ── Control side ──────────────────────────────────────────

    /// Next queued command, if any.
    pub fn next_command(&self) -> Option<KilnCommand> {
        self.commands.try_receive().ok()
    }

    pub fn report(&self, outcome: CommandOutcome) {
        if self.outcomes.try_send(outcome).is_err() {
            warn!("Link: outcome queue full, dropping outcome");
        }
    }

    /// Publish one tick's state: replace the snapshot, offer the record to
    /// the feed.
    pub fn publish(&self, run: RunState, telemetry: TelemetryData) {
        let feed = telemetry.clone();
        self.latest.lock(|cell| {
            *cell.borrow_mut() = Some(Snapshot { run, telemetry });
        });
        if self.telemetry.try_send(feed).is_err() {
            warn!("Link: telemetry feed full, observer is lagging");
        }
    }

    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }
}

impl Default for KilnLink {
    fn default() -> Self {
        Self::new()
    }
}
