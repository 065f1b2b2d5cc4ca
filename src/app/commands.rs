//! Inbound commands to the runner.
//!
//! These are what the outside world (CLI, web layer, tests) may ask of the
//! [`KilnRunner`](super::service::KilnRunner).  They are queued and applied
//! at a tick boundary, never in the middle of a duty cycle.

use crate::error::CommandError;
use crate::fsm::RunStatus;
use crate::profile::ProfileId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KilnCommand {
    /// Start the named profile from IDLE.
    Start { profile_id: ProfileId },

    /// RUNNING → PAUSED.  Relay off, schedule clock frozen.
    Pause,

    /// PAUSED → RUNNING.
    Resume,

    /// RUNNING / PAUSED → IDLE.  Relay off first.
    Abort,

    /// COMPLETE (or IDLE holding a retained record) → fresh IDLE.
    Clear,

    /// Resume a run that was found stale at startup.
    ResumeRecovered,
}

impl KilnCommand {
    /// Build a start command, rejecting ids that do not fit a [`ProfileId`].
    pub fn start(profile_id: &str) -> Result<Self, CommandError> {
        let mut id = ProfileId::new();
        id.push_str(profile_id)
            .map_err(|()| CommandError::UnknownProfile)?;
        Ok(Self::Start { profile_id: id })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Abort => "abort",
            Self::Clear => "clear",
            Self::ResumeRecovered => "resume-recovered",
        }
    }
}

/// Result of applying one queued command, reported back to the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub command: KilnCommand,
    /// Status after the command, or why it was rejected.
    pub result: Result<RunStatus, CommandError>,
}
