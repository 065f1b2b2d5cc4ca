//! Run journal: the durable record that lets a run survive a restart.
//!
//! The record is written after every tick under the `kiln` namespace as a
//! postcard blob, read once at startup.  [`StorageJournal`] works over any
//! [`StoragePort`], so the same code backs the file store on a host and an
//! in-memory store in tests.

use serde::{Deserialize, Serialize};

use crate::app::ports::{RunStateStore, StorageError, StoragePort};
use crate::fsm::RunStatus;
use crate::profile::{ProfileId, ProfileName};

const JOURNAL_NAMESPACE: &str = "kiln";
const JOURNAL_KEY: &str = "run";

/// Largest encoded record.  Ids and names are bounded, floats fixed-width.
const RECORD_MAX: usize = 256;

/// Snapshot of the active (or last) run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub status: RunStatus,
    pub profile_id: Option<ProfileId>,
    pub profile_name: Option<ProfileName>,
    /// Wall-clock time the run was started.
    pub started_at: f64,
    /// Schedule position: skip-ahead offset plus unshifted run time.
    pub elapsed_offset: f64,
    /// Skip-ahead start time.
    pub start_offset: f64,
    /// Wall seconds spent RUNNING (pauses excluded).
    pub run_elapsed: f64,
    pub shift_secs: f64,
    pub last_temperature: Option<f64>,
    pub last_duty_fraction: f64,
    pub last_update_at: f64,
    pub energy_kwh: f64,
    pub fault_flags: u8,
}

impl RunState {
    /// The empty record: no run.
    pub fn idle() -> Self {
        Self {
            status: RunStatus::Idle,
            profile_id: None,
            profile_name: None,
            started_at: 0.0,
            elapsed_offset: 0.0,
            start_offset: 0.0,
            run_elapsed: 0.0,
            shift_secs: 0.0,
            last_temperature: None,
            last_duty_fraction: 0.0,
            last_update_at: 0.0,
            energy_kwh: 0.0,
            fault_flags: 0,
        }
    }

    /// Seconds between the last update and `now`.
    pub fn age(&self, now: f64) -> f64 {
        now - self.last_update_at
    }

    pub fn encode(&self) -> Result<Vec<u8>, StorageError> {
        postcard::to_allocvec(self).map_err(|_| StorageError::Corrupted)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StorageError> {
        postcard::from_bytes(bytes).map_err(|_| StorageError::Corrupted)
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::idle()
    }
}

/// [`RunStateStore`] over a namespaced blob store.
pub struct StorageJournal<S: StoragePort> {
    storage: S,
}

impl<S: StoragePort> StorageJournal<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }
}

impl<S: StoragePort> RunStateStore for StorageJournal<S> {
    fn save(&mut self, state: &RunState) -> Result<(), StorageError> {
        let bytes = state.encode()?;
        if bytes.len() > RECORD_MAX {
            return Err(StorageError::Full);
        }
        self.storage.write(JOURNAL_NAMESPACE, JOURNAL_KEY, &bytes)
    }

    fn load(&self) -> Result<Option<RunState>, StorageError> {
        if !self.storage.exists(JOURNAL_NAMESPACE, JOURNAL_KEY) {
            return Ok(None);
        }
        let mut buf = [0u8; RECORD_MAX];
        let len = match self.storage.read(JOURNAL_NAMESPACE, JOURNAL_KEY, &mut buf) {
            Ok(len) => len,
            Err(StorageError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };
        RunState::decode(&buf[..len]).map(Some)
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        self.storage.delete(JOURNAL_NAMESPACE, JOURNAL_KEY)
    }
}
