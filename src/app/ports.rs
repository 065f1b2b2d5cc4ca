//! Port traits: the hexagonal boundary between the control core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ KilnRunner (domain)
//! ```
//!
//! Driven adapters (thermocouple, relay, run journal, storage, clock)
//! implement these traits.  [`KilnRunner`](super::service::KilnRunner)
//! consumes them via generics, so the control core never touches hardware
//! or the filesystem directly.
//!
//! Sensor reads and relay writes must return within a bounded time; an
//! adapter that wraps a blocking driver is expected to time out and report
//! [`SensorError::Timeout`] / [`ActuatorError::Timeout`] instead of stalling.

use core::time::Duration;

use crate::config::KilnConfig;
use crate::error::{ActuatorError, CommandError, SensorError};
use crate::journal::RunState;
use crate::profile::Profile;

/// Wall-clock seconds since the Unix epoch.
pub type Timestamp = f64;

// ───────────────────────────────────────────────────────────────
// Temperature source (hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Process-variable input, read once per duty cycle.
pub trait TemperatureSource {
    /// Current kiln temperature, or the reason there is none this cycle.
    fn read(&mut self) -> Result<f64, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Relay sink (domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Time-proportioned heating output.
pub trait RelaySink {
    /// Switch the elements on for `on` at the start of a window of length
    /// `window`, off for the remainder.  `on == 0` is all-off.
    fn set(&mut self, on: Duration, window: Duration) -> Result<(), ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// Run journal (domain ↔ durable record)
// ───────────────────────────────────────────────────────────────

/// Durable record of the active run, written after every tick and read
/// once at startup.
pub trait RunStateStore {
    fn save(&mut self, state: &RunState) -> Result<(), StorageError>;

    /// `Ok(None)` when no run has been recorded.
    fn load(&self) -> Result<Option<RunState>, StorageError>;

    fn clear(&mut self) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Profile catalog
// ───────────────────────────────────────────────────────────────

/// Lookup of firing profiles by id.
pub trait ProfileCatalog {
    /// `UnknownProfile` when absent, `InvalidProfile` when present but
    /// unusable.
    fn profile(&self, id: &str) -> Result<Profile, CommandError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink (domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The runner emits structured [`KilnEvent`](super::events::KilnEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::KilnEvent);
}

// ───────────────────────────────────────────────────────────────
// Clock
// ───────────────────────────────────────────────────────────────

/// Time source for the control loop.
pub trait Clock {
    fn now(&self) -> Timestamp;

    fn sleep(&self, duration: Duration);
}

// ───────────────────────────────────────────────────────────────
// Configuration port
// ───────────────────────────────────────────────────────────────

/// Loads and persists controller configuration.
///
/// Implementations MUST validate before persisting.  Invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], not silently clamped.
pub trait ConfigPort {
    /// Returns [`KilnConfig::default()`] if nothing is stored.
    fn load(&self) -> Result<KilnConfig, ConfigError>;

    fn save(&self, config: &KilnConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port
// ───────────────────────────────────────────────────────────────

/// Namespaced key-value blob storage.
///
/// Write operations MUST be atomic: after a power loss a key holds either
/// the old or the new value, never a partial one.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    NotFound,
    /// Stored config failed to deserialize.
    Corrupted,
    /// A field failed range validation; the message names it.
    ValidationFailed(&'static str),
    IoError,
}

/// Errors from [`StoragePort`] and [`RunStateStore`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    NotFound,
    Full,
    IoError,
    /// Record present but undecodable.
    Corrupted,
    /// Caller buffer smaller than the stored value.
    BufferTooSmall,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
            Self::Corrupted => write!(f, "record corrupted"),
            Self::BufferTooSmall => write!(f, "buffer too small"),
        }
    }
}
