//! Fuzz target: run journal recovery
//!
//! Plants arbitrary bytes as the journal record and recovers a runner
//! from it, verifying:
//! - No panics when decoding or acting on a corrupt record
//! - The relay is commanded off before anything else happens
//! - A recovered run never starts with the relay energised
//!
//! cargo fuzz run fuzz_journal

#![no_main]

use core::time::Duration;

use kilnctl::adapters::profiles::ProfileLibrary;
use kilnctl::adapters::storage::MemoryStore;
use kilnctl::app::events::KilnEvent;
use kilnctl::app::ports::{EventSink, RelaySink, StoragePort};
use kilnctl::app::service::KilnRunner;
use kilnctl::config::KilnConfig;
use kilnctl::error::ActuatorError;
use kilnctl::journal::{RunState, StorageJournal};
use kilnctl::profile::Profile;
use libfuzzer_sys::fuzz_target;

struct Relay(Vec<Duration>);

impl RelaySink for Relay {
    fn set(&mut self, on: Duration, _window: Duration) -> Result<(), ActuatorError> {
        self.0.push(on);
        Ok(())
    }
}

struct Discard;

impl EventSink for Discard {
    fn emit(&mut self, _event: &KilnEvent) {}
}

fuzz_target!(|data: &[u8]| {
    let _ = RunState::decode(data);

    let mut store = MemoryStore::new();
    if store.write("kiln", "run", data).is_err() {
        return;
    }
    let Ok(profile) = Profile::new("p", "P", &[(0.0, 20.0), (600.0, 900.0)]) else {
        return;
    };
    let mut runner = KilnRunner::new(
        KilnConfig::default(),
        StorageJournal::new(store),
        ProfileLibrary::from_profiles([profile]),
    );

    let mut relay = Relay(Vec::new());
    runner.recover(0.0, &mut relay, &mut Discard);
    assert_eq!(relay.0.first(), Some(&Duration::ZERO));
    assert!(relay.0.iter().all(Duration::is_zero));
});
