//! Crash-recovery integration tests.
//!
//! A journal is pre-loaded with the record a previous process would have
//! left behind, then a fresh runner recovers from it.

use kilnctl::adapters::storage::MemoryStore;
use kilnctl::app::commands::KilnCommand;
use kilnctl::app::events::KilnEvent;
use kilnctl::app::ports::{RunStateStore, StoragePort};
use kilnctl::config::KilnConfig;
use kilnctl::error::{CommandError, Fault};
use kilnctl::fsm::RunStatus;
use kilnctl::journal::{RunState, StorageJournal};

use crate::mock_hw::{MockKiln, RecordingSink, TestRunner, runner_with, tick_n};

const LAST_UPDATE: f64 = 10_000.0;

fn record(status: RunStatus, profile: &str) -> RunState {
    RunState {
        status,
        profile_id: Some(profile.try_into().unwrap()),
        profile_name: Some("Test Cone".try_into().unwrap()),
        started_at: LAST_UPDATE - 1900.0,
        elapsed_offset: 1800.0,
        start_offset: 0.0,
        run_elapsed: 1800.0,
        shift_secs: 0.0,
        last_temperature: Some(510.0),
        last_duty_fraction: 0.6,
        last_update_at: LAST_UPDATE,
        energy_kwh: 3.0,
        fault_flags: 0,
    }
}

fn journal_with(state: &RunState) -> StorageJournal<MemoryStore> {
    let mut journal = StorageJournal::new(MemoryStore::new());
    journal.save(state).unwrap();
    journal
}

fn recovered(
    config: KilnConfig,
    state: &RunState,
    now: f64,
) -> (TestRunner, MockKiln, RecordingSink, RunStatus) {
    let mut hw = MockKiln::at(505.0);
    let mut sink = RecordingSink::new();
    let mut r = runner_with(config, journal_with(state));
    let status = r.recover(now, &mut hw, &mut sink);
    (r, hw, sink, status)
}

#[test]
fn fresh_running_record_resumes_at_its_schedule_position() {
    let state = record(RunStatus::Running, "cone");
    let (mut r, mut hw, mut sink, status) =
        recovered(KilnConfig::default(), &state, LAST_UPDATE + 60.0);

    assert_eq!(status, RunStatus::Running);
    assert_eq!(r.run_status(), RunStatus::Running);
    assert!((r.schedule_time() - 1800.0).abs() < 1e-9);
    assert!((r.telemetry().energy_kwh - 3.0).abs() < 1e-9);
    assert!(hw.relay_is_off(), "relay stays off until the first tick");
    assert!(sink.contains(&KilnEvent::Recovered {
        status: RunStatus::Running,
        stale: false
    }));

    // The downtime is not counted as run time.
    tick_n(&mut r, &mut hw, &mut sink, LAST_UPDATE + 60.0, 3);
    assert!((r.run_elapsed() - 1804.0).abs() < 1e-9);
}

#[test]
fn stale_running_record_waits_for_the_operator() {
    let state = record(RunStatus::Running, "cone");
    let now = LAST_UPDATE + 901.0;
    let (mut r, mut hw, mut sink, status) = recovered(KilnConfig::default(), &state, now);

    assert_eq!(status, RunStatus::Idle);
    assert!(r.has_fault(Fault::StaleRecovery));
    assert!(r.pending_recovery().is_some());
    assert!(sink.contains(&KilnEvent::Recovered {
        status: RunStatus::Idle,
        stale: true
    }));

    // Idle ticks never heat.
    tick_n(&mut r, &mut hw, &mut sink, now, 3);
    assert!(hw.relay_is_off());

    assert_eq!(
        r.handle_command(&KilnCommand::ResumeRecovered, now + 6.0, &mut hw, &mut sink),
        Ok(RunStatus::Running)
    );
    assert!((r.schedule_time() - 1800.0).abs() < 1e-9);
    assert!(!r.has_fault(Fault::StaleRecovery));
    assert!(r.pending_recovery().is_none());
}

#[test]
fn restarts_disabled_treats_every_record_as_stale() {
    let config = KilnConfig {
        automatic_restarts: false,
        ..KilnConfig::default()
    };
    let state = record(RunStatus::Running, "cone");
    let (r, _, _, status) = recovered(config, &state, LAST_UPDATE + 1.0);
    assert_eq!(status, RunStatus::Idle);
    assert!(r.pending_recovery().is_some());
}

#[test]
fn new_start_discards_the_pending_recovery() {
    let state = record(RunStatus::Running, "cone");
    let now = LAST_UPDATE + 5000.0;
    let (mut r, mut hw, mut sink, _) = recovered(KilnConfig::default(), &state, now);

    r.handle_command(&KilnCommand::start("short").unwrap(), now, &mut hw, &mut sink)
        .unwrap();
    r.handle_command(&KilnCommand::Abort, now + 2.0, &mut hw, &mut sink)
        .unwrap();
    assert_eq!(
        r.handle_command(&KilnCommand::ResumeRecovered, now + 4.0, &mut hw, &mut sink),
        Err(CommandError::NoRecoverableRun)
    );
}

#[test]
fn clear_discards_the_pending_recovery() {
    let state = record(RunStatus::Running, "cone");
    let now = LAST_UPDATE + 5000.0;
    let (mut r, mut hw, mut sink, _) = recovered(KilnConfig::default(), &state, now);

    r.handle_command(&KilnCommand::Clear, now, &mut hw, &mut sink)
        .unwrap();
    assert!(r.pending_recovery().is_none());
    assert_eq!(r.journal().load(), Ok(None));
}

#[test]
fn paused_record_is_restored_paused_regardless_of_age() {
    let state = record(RunStatus::Paused, "cone");
    let (r, hw, _, status) = recovered(KilnConfig::default(), &state, LAST_UPDATE + 86_400.0);
    assert_eq!(status, RunStatus::Paused);
    assert!((r.schedule_time() - 1800.0).abs() < 1e-9);
    assert!(hw.relay_is_off());
}

#[test]
fn record_for_a_missing_profile_starts_idle() {
    let state = record(RunStatus::Running, "deleted");
    let (r, _, _, status) = recovered(KilnConfig::default(), &state, LAST_UPDATE + 10.0);
    assert_eq!(status, RunStatus::Idle);
    assert!(r.pending_recovery().is_none());
}

#[test]
fn completed_record_is_cleared_at_startup() {
    let state = record(RunStatus::Complete, "cone");
    let (r, _, _, status) = recovered(KilnConfig::default(), &state, LAST_UPDATE + 10.0);
    assert_eq!(status, RunStatus::Idle);
    assert_eq!(r.journal().load(), Ok(None));
}

#[test]
fn corrupted_journal_starts_idle() {
    let mut journal = StorageJournal::new(MemoryStore::new());
    journal
        .storage_mut()
        .write("kiln", "run", &[0xff; 12])
        .unwrap();
    let mut hw = MockKiln::at(20.0);
    let mut sink = RecordingSink::new();
    let mut r = runner_with(KilnConfig::default(), journal);
    assert_eq!(r.recover(0.0, &mut hw, &mut sink), RunStatus::Idle);
}

#[test]
fn journal_follows_the_run_and_survives_a_restart() {
    let mut hw = MockKiln::at(20.0);
    let mut sink = RecordingSink::new();
    let mut first = runner_with(KilnConfig::default(), StorageJournal::new(MemoryStore::new()));
    first.recover(0.0, &mut hw, &mut sink);
    first
        .handle_command(&KilnCommand::start("cone").unwrap(), 0.0, &mut hw, &mut sink)
        .unwrap();
    let now = tick_n(&mut first, &mut hw, &mut sink, 0.0, 20);

    let saved = first.journal().load().unwrap().unwrap();
    assert_eq!(saved.status, RunStatus::Running);
    assert!((saved.run_elapsed - 38.0).abs() < 1e-9);
    assert!((saved.last_update_at - (now - 2.0)).abs() < 1e-9);

    // "Crash", then a new process 30 s later.
    let mut second = runner_with(KilnConfig::default(), journal_with(&saved));
    let status = second.recover(now + 30.0, &mut hw, &mut sink);
    assert_eq!(status, RunStatus::Running);
    assert!((second.run_elapsed() - 38.0).abs() < 1e-9);
    assert!((second.schedule_time() - first.schedule_time()).abs() < 1e-9);
}

#[test]
fn accumulated_shift_survives_a_restart() {
    // A kiln stuck at 20 lags the cone ramp, so the schedule shifts.
    let mut hw = MockKiln::at(20.0);
    let mut sink = RecordingSink::new();
    let mut first = runner_with(KilnConfig::default(), StorageJournal::new(MemoryStore::new()));
    first.recover(0.0, &mut hw, &mut sink);
    first
        .handle_command(&KilnCommand::start("cone").unwrap(), 0.0, &mut hw, &mut sink)
        .unwrap();
    let now = tick_n(&mut first, &mut hw, &mut sink, 0.0, 300);
    assert!(first.shift_secs() > 400.0, "shift {}", first.shift_secs());

    let saved = first.journal().load().unwrap().unwrap();
    assert!((saved.shift_secs - first.shift_secs()).abs() < 1e-9);

    let mut second = runner_with(KilnConfig::default(), journal_with(&saved));
    assert_eq!(second.recover(now + 30.0, &mut hw, &mut sink), RunStatus::Running);
    assert!((second.shift_secs() - first.shift_secs()).abs() < 1e-9);
    assert!((second.schedule_time() - first.schedule_time()).abs() < 1e-9);
    assert!((second.status().elapsed_offset - saved.elapsed_offset).abs() < 1e-9);

    // The first tick after the restart adds no run time and no shift.
    second.tick(now + 30.0, &mut hw, &mut sink);
    assert!((second.shift_secs() - saved.shift_secs).abs() < 1e-9);
    assert!((second.schedule_time() - first.schedule_time()).abs() < 1e-9);
}

#[test]
fn persistence_failure_never_blocks_actuation() {
    let mut hw = MockKiln::at(20.0);
    let mut sink = RecordingSink::new();
    let mut r = runner_with(KilnConfig::default(), StorageJournal::new(MemoryStore::new()));
    r.recover(0.0, &mut hw, &mut sink);
    r.journal_mut().storage_mut().set_fail_writes(true);

    r.handle_command(&KilnCommand::start("short").unwrap(), 0.0, &mut hw, &mut sink)
        .unwrap();
    assert!(r.has_fault(Fault::PersistenceFault));

    let commanded = hw.relay_calls.len();
    let now = tick_n(&mut r, &mut hw, &mut sink, 0.0, 3);
    assert_eq!(r.run_status(), RunStatus::Running);
    assert_eq!(hw.relay_calls.len(), commanded + 3);

    r.journal_mut().storage_mut().set_fail_writes(false);
    r.tick(now, &mut hw, &mut sink);
    assert!(!r.has_fault(Fault::PersistenceFault));
    assert!(sink.contains(&KilnEvent::FaultCleared(Fault::PersistenceFault)));
    assert_eq!(
        r.journal().load().unwrap().map(|s| s.status),
        Some(RunStatus::Running)
    );
}
