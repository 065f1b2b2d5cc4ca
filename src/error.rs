//! Unified error types for the kiln controller.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! control loop's error handling uniform.  Most variants are `Copy` so they
//! can be threaded through the runner and its events without allocation.

use core::fmt;

use crate::app::ports::{ConfigError, StorageError};
use crate::fsm::RunStatus;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A firing profile is malformed.
    Profile(ProfileError),
    /// A run command was rejected.
    Command(CommandError),
    /// The temperature source could not be read.
    Sensor(SensorError),
    /// The relay could not be commanded.
    Actuator(ActuatorError),
    /// Durable storage failed.
    Storage(StorageError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// A profile or config file could not be read or parsed.
    Load(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Profile(e) => write!(f, "profile: {e}"),
            Self::Command(e) => write!(f, "command: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Load(msg) => write!(f, "load: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Profile errors
// ---------------------------------------------------------------------------

/// Reasons a profile is rejected (`InvalidProfile`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileError {
    /// The profile has no control points.
    Empty,
    /// Point `index` does not come strictly after its predecessor.
    NonIncreasing { index: usize },
    /// Point `index` has a negative time or a non-finite value.
    InvalidPoint { index: usize },
    /// More points than the fixed profile capacity.
    TooManyPoints,
    /// Identifier or name does not fit its fixed-size buffer.
    NameTooLong,
    /// The profile document could not be parsed.
    Malformed,
}

impl fmt::Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "profile has no points"),
            Self::NonIncreasing { index } => {
                write!(f, "point {index} is not after the previous point")
            }
            Self::InvalidPoint { index } => write!(f, "point {index} is out of range"),
            Self::TooManyPoints => write!(f, "too many points"),
            Self::NameTooLong => write!(f, "profile id or name too long"),
            Self::Malformed => write!(f, "profile document is malformed"),
        }
    }
}

impl From<ProfileError> for Error {
    fn from(e: ProfileError) -> Self {
        Self::Profile(e)
    }
}

// ---------------------------------------------------------------------------
// Command errors
// ---------------------------------------------------------------------------

/// Why a run command was refused.  A refused command never changes state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// `start` while a run is active or retained as complete.
    AlreadyRunning,
    /// `pause`/`abort` with no active run.
    NotRunning,
    /// The command is not valid from the current status.
    InvalidTransition { from: RunStatus },
    /// `start` named a profile that is malformed.
    InvalidProfile(ProfileError),
    /// `start` named a profile the catalog does not know.
    UnknownProfile,
    /// `resume_recovered` with no pending stale run.
    NoRecoverableRun,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRunning => write!(f, "a run is already active"),
            Self::NotRunning => write!(f, "no run is active"),
            Self::InvalidTransition { from } => write!(f, "not allowed from {from}"),
            Self::InvalidProfile(e) => write!(f, "invalid profile: {e}"),
            Self::UnknownProfile => write!(f, "unknown profile"),
            Self::NoRecoverableRun => write!(f, "no recoverable run pending"),
        }
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The read did not complete within its deadline.
    Timeout,
    /// The driver reported a failed conversion.
    ReadFailed,
    /// Reading is outside the physically plausible range.
    OutOfRange,
    /// The source is gone (worker thread exited, device unplugged).
    Disconnected,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "read timed out"),
            Self::ReadFailed => write!(f, "read failed"),
            Self::OutOfRange => write!(f, "reading out of range"),
            Self::Disconnected => write!(f, "sensor disconnected"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// GPIO set failed.
    GpioWriteFailed,
    /// The relay worker did not accept the command in time.
    Timeout,
    /// The relay worker is gone.
    Disconnected,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
            Self::Timeout => write!(f, "relay command timed out"),
            Self::Disconnected => write!(f, "relay disconnected"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Run faults
// ---------------------------------------------------------------------------

/// Operator-visible fault conditions.  They are accumulated in a bit-field
/// on the runner so several can be active at once and cleared one by one;
/// the field is published in every telemetry record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Fault {
    /// The last read failed; the previous duty fraction is being held.
    SensorFault = 0b0000_0001,
    /// Too many consecutive failed reads; run paused with relay off.
    SensorFaultPersistent = 0b0000_0010,
    /// The relay rejected a command; run paused.
    ActuationFault = 0b0000_0100,
    /// The run journal could not be written; retried every tick.
    PersistenceFault = 0b0000_1000,
    /// A persisted run was too old to resume automatically.
    StaleRecovery = 0b0001_0000,
    /// Kiln exceeded the emergency shutoff temperature; run aborted.
    OverTemperature = 0b0010_0000,
}

impl Fault {
    pub const ALL: [Fault; 6] = [
        Fault::SensorFault,
        Fault::SensorFaultPersistent,
        Fault::ActuationFault,
        Fault::PersistenceFault,
        Fault::StaleRecovery,
        Fault::OverTemperature,
    ];

    /// Return the bitmask for this fault.
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SensorFault => write!(f, "sensor fault"),
            Self::SensorFaultPersistent => write!(f, "persistent sensor fault"),
            Self::ActuationFault => write!(f, "actuation fault"),
            Self::PersistenceFault => write!(f, "persistence fault"),
            Self::StaleRecovery => write!(f, "stale recovery"),
            Self::OverTemperature => write!(f, "over temperature"),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
