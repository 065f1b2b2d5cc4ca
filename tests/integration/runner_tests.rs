//! Integration tests for the KilnRunner → FSM → relay pipeline.
//!
//! Each test drives the runner tick by tick against [`MockKiln`] and
//! checks status, schedule position and the relay command history.

use core::time::Duration;

use kilnctl::app::commands::KilnCommand;
use kilnctl::app::events::KilnEvent;
use kilnctl::config::KilnConfig;
use kilnctl::error::{CommandError, Fault, SensorError};
use kilnctl::fsm::RunStatus;

use crate::mock_hw::{MockKiln, RecordingSink, idle_runner, tick_n};

const W: Duration = Duration::from_secs(2);

fn start(id: &str) -> KilnCommand {
    KilnCommand::start(id).unwrap()
}

// ── Start & skip-ahead ───────────────────────────────────────

#[test]
fn start_from_cold_begins_at_zero_and_heats() {
    let mut hw = MockKiln::at(20.0);
    let mut sink = RecordingSink::new();
    let mut r = idle_runner(KilnConfig::default(), &mut hw, &mut sink);

    let status = r.handle_command(&start("short"), 0.0, &mut hw, &mut sink);
    assert_eq!(status, Ok(RunStatus::Running));
    assert!(r.schedule_time().abs() < 1e-9);

    r.tick(0.0, &mut hw, &mut sink);
    // 80 degrees short of target: full power.
    let last = *hw.last_relay().unwrap();
    assert_eq!(last.on, W);
    assert_eq!(last.window, W);

    let t = r.telemetry();
    assert_eq!(t.status, RunStatus::Running);
    assert_eq!(t.profile_name.as_deref(), Some("Short Hold"));
    assert!((t.total_time - 600.0).abs() < 1e-9);
    assert!(t.relay_on);
}

#[test]
fn warm_kiln_skips_ahead() {
    let mut hw = MockKiln::at(500.0);
    let mut sink = RecordingSink::new();
    let mut r = idle_runner(KilnConfig::default(), &mut hw, &mut sink);

    r.handle_command(&start("cone"), 0.0, &mut hw, &mut sink)
        .unwrap();
    assert!((r.schedule_time() - 3600.0).abs() < 1e-9);
    assert!((r.status().start_offset - 3600.0).abs() < 1e-9);
}

#[test]
fn skip_ahead_disabled_starts_at_zero() {
    let config = KilnConfig {
        seek_start: false,
        ..KilnConfig::default()
    };
    let mut hw = MockKiln::at(500.0);
    let mut sink = RecordingSink::new();
    let mut r = idle_runner(config, &mut hw, &mut sink);

    r.handle_command(&start("cone"), 0.0, &mut hw, &mut sink)
        .unwrap();
    assert!(r.schedule_time().abs() < 1e-9);
}

#[test]
fn unknown_profile_leaves_runner_idle() {
    let mut hw = MockKiln::at(20.0);
    let mut sink = RecordingSink::new();
    let mut r = idle_runner(KilnConfig::default(), &mut hw, &mut sink);

    assert_eq!(
        r.handle_command(&start("missing"), 0.0, &mut hw, &mut sink),
        Err(CommandError::UnknownProfile)
    );
    assert_eq!(r.run_status(), RunStatus::Idle);
    assert_eq!(sink.rejections(), 1);
}

// ── Command validity ─────────────────────────────────────────

#[test]
fn invalid_commands_are_rejected_without_state_change() {
    let mut hw = MockKiln::at(20.0);
    let mut sink = RecordingSink::new();
    let mut r = idle_runner(KilnConfig::default(), &mut hw, &mut sink);

    assert_eq!(
        r.handle_command(&KilnCommand::Pause, 0.0, &mut hw, &mut sink),
        Err(CommandError::NotRunning)
    );
    assert_eq!(
        r.handle_command(&KilnCommand::Abort, 0.0, &mut hw, &mut sink),
        Err(CommandError::NotRunning)
    );
    assert_eq!(
        r.handle_command(&KilnCommand::Resume, 0.0, &mut hw, &mut sink),
        Err(CommandError::NotRunning)
    );

    r.handle_command(&start("short"), 0.0, &mut hw, &mut sink)
        .unwrap();
    assert_eq!(
        r.handle_command(&start("cone"), 0.0, &mut hw, &mut sink),
        Err(CommandError::AlreadyRunning)
    );
    assert_eq!(
        r.handle_command(&KilnCommand::Resume, 0.0, &mut hw, &mut sink),
        Err(CommandError::InvalidTransition {
            from: RunStatus::Running
        })
    );
    assert_eq!(
        r.handle_command(&KilnCommand::Clear, 0.0, &mut hw, &mut sink),
        Err(CommandError::InvalidTransition {
            from: RunStatus::Running
        })
    );
    assert_eq!(r.run_status(), RunStatus::Running);
    assert_eq!(r.profile().map(|p| p.id()), Some("short"));
    assert_eq!(sink.rejections(), 6);
}

// ── Pause / resume / abort ───────────────────────────────────

#[test]
fn pause_excludes_paused_time_from_the_schedule() {
    let mut hw = MockKiln::at(20.0);
    let mut sink = RecordingSink::new();
    let mut r = idle_runner(KilnConfig::default(), &mut hw, &mut sink);

    r.handle_command(&start("short"), 0.0, &mut hw, &mut sink)
        .unwrap();
    let now = tick_n(&mut r, &mut hw, &mut sink, 0.0, 5); // 0..8
    assert!((now - 10.0).abs() < 1e-9);

    r.handle_command(&KilnCommand::Pause, 10.0, &mut hw, &mut sink)
        .unwrap();
    assert_eq!(r.run_status(), RunStatus::Paused);
    assert!(hw.relay_is_off());
    assert!((r.run_elapsed() - 10.0).abs() < 1e-9);

    // Paused ticks read the sensor but never actuate.
    let commanded = hw.relay_calls.len();
    tick_n(&mut r, &mut hw, &mut sink, 12.0, 10);
    assert_eq!(hw.relay_calls.len(), commanded);
    assert!((r.schedule_time() - 10.0).abs() < 1e-9);

    r.handle_command(&KilnCommand::Resume, 100.0, &mut hw, &mut sink)
        .unwrap();
    r.tick(102.0, &mut hw, &mut sink);
    assert_eq!(r.run_status(), RunStatus::Running);
    assert!((r.run_elapsed() - 12.0).abs() < 1e-9);
    assert!((r.schedule_time() - 12.0).abs() < 1e-9);
}

#[test]
fn abort_commands_relay_off_and_retains_record() {
    let mut hw = MockKiln::at(20.0);
    let mut sink = RecordingSink::new();
    let mut r = idle_runner(KilnConfig::default(), &mut hw, &mut sink);

    r.handle_command(&start("short"), 0.0, &mut hw, &mut sink)
        .unwrap();
    tick_n(&mut r, &mut hw, &mut sink, 0.0, 3);
    assert!(!hw.relay_is_off());

    assert_eq!(
        r.handle_command(&KilnCommand::Abort, 6.0, &mut hw, &mut sink),
        Ok(RunStatus::Idle)
    );
    assert!(hw.relay_is_off());
    assert!(sink.transitions().contains(&(RunStatus::Running, RunStatus::Idle)));

    let record = r.status();
    assert_eq!(record.status, RunStatus::Idle);
    assert_eq!(record.profile_id.as_deref(), Some("short"));

    // A fresh start is allowed straight away.
    r.handle_command(&start("short"), 8.0, &mut hw, &mut sink)
        .unwrap();
    assert!(r.run_elapsed().abs() < 1e-9);
}

#[test]
fn abort_from_pause() {
    let mut hw = MockKiln::at(20.0);
    let mut sink = RecordingSink::new();
    let mut r = idle_runner(KilnConfig::default(), &mut hw, &mut sink);

    r.handle_command(&start("short"), 0.0, &mut hw, &mut sink)
        .unwrap();
    r.handle_command(&KilnCommand::Pause, 0.0, &mut hw, &mut sink)
        .unwrap();
    assert_eq!(
        r.handle_command(&KilnCommand::Abort, 1.0, &mut hw, &mut sink),
        Ok(RunStatus::Idle)
    );
    assert!(hw.relay_is_off());
}

// ── Sensor faults ────────────────────────────────────────────

#[test]
fn three_bad_reads_hold_duty_and_keep_running() {
    let mut hw = MockKiln::at(20.0);
    let mut sink = RecordingSink::new();
    let mut r = idle_runner(KilnConfig::default(), &mut hw, &mut sink);

    r.handle_command(&start("short"), 0.0, &mut hw, &mut sink)
        .unwrap();
    let now = tick_n(&mut r, &mut hw, &mut sink, 0.0, 2);
    let duty = r.duty();
    assert!(duty > 0.0);

    hw.fail_reads(3);
    let now = tick_n(&mut r, &mut hw, &mut sink, now, 3);
    assert_eq!(r.run_status(), RunStatus::Running);
    assert!(r.has_fault(Fault::SensorFault));
    assert!(!r.has_fault(Fault::SensorFaultPersistent));
    assert!((r.duty() - duty).abs() < 1e-12);
    assert!(!hw.relay_is_off());

    r.tick(now, &mut hw, &mut sink);
    assert!(!r.has_fault(Fault::SensorFault));
    assert!(sink.contains(&KilnEvent::FaultCleared(Fault::SensorFault)));
}

#[test]
fn fourth_bad_read_pauses_with_relay_off() {
    let mut hw = MockKiln::at(20.0);
    let mut sink = RecordingSink::new();
    let mut r = idle_runner(KilnConfig::default(), &mut hw, &mut sink);

    r.handle_command(&start("short"), 0.0, &mut hw, &mut sink)
        .unwrap();
    hw.fail_reads(4);
    let now = tick_n(&mut r, &mut hw, &mut sink, 0.0, 4);

    assert_eq!(r.run_status(), RunStatus::Paused);
    assert!(r.has_fault(Fault::SensorFaultPersistent));
    assert!(hw.relay_is_off());

    // Operator resume clears the fault once readings are back.
    r.handle_command(&KilnCommand::Resume, now, &mut hw, &mut sink)
        .unwrap();
    r.tick(now + 2.0, &mut hw, &mut sink);
    assert_eq!(r.run_status(), RunStatus::Running);
    assert!(!r.has_fault(Fault::SensorFaultPersistent));
}

#[test]
fn out_of_range_reading_counts_as_a_fault() {
    let mut hw = MockKiln::at(20.0);
    let mut sink = RecordingSink::new();
    let mut r = idle_runner(KilnConfig::default(), &mut hw, &mut sink);

    r.handle_command(&start("short"), 0.0, &mut hw, &mut sink)
        .unwrap();
    hw.push_reading(Ok(f64::NAN));
    hw.push_reading(Ok(-400.0));
    hw.push_reading(Err(SensorError::Timeout));
    hw.push_reading(Ok(9999.0));
    tick_n(&mut r, &mut hw, &mut sink, 0.0, 4);
    assert_eq!(r.run_status(), RunStatus::Paused);
}

#[test]
fn over_temperature_aborts_the_run() {
    let mut hw = MockKiln::at(100.0);
    let mut sink = RecordingSink::new();
    let mut r = idle_runner(KilnConfig::default(), &mut hw, &mut sink);

    r.handle_command(&start("short"), 0.0, &mut hw, &mut sink)
        .unwrap();
    tick_n(&mut r, &mut hw, &mut sink, 0.0, 2);

    hw.push_reading(Ok(1400.0));
    r.tick(4.0, &mut hw, &mut sink);
    assert_eq!(r.run_status(), RunStatus::Idle);
    assert!(r.has_fault(Fault::OverTemperature));
    assert!(hw.relay_is_off());
    assert!(sink.contains(&KilnEvent::FaultRaised(Fault::OverTemperature)));
}

// ── Completion ───────────────────────────────────────────────

#[test]
fn run_completes_at_final_target_after_schedule_end() {
    let mut hw = MockKiln::at(100.0);
    let mut sink = RecordingSink::new();
    let mut r = idle_runner(KilnConfig::default(), &mut hw, &mut sink);

    r.handle_command(&start("short"), 0.0, &mut hw, &mut sink)
        .unwrap();
    // Schedule reaches 600s on the 301st tick, first past it on the 302nd.
    let now = tick_n(&mut r, &mut hw, &mut sink, 0.0, 301);
    assert_eq!(r.run_status(), RunStatus::Running);
    r.tick(now, &mut hw, &mut sink);
    assert_eq!(r.run_status(), RunStatus::Complete);
    assert!(hw.relay_is_off());

    // Complete holds until cleared.
    assert_eq!(
        r.handle_command(&start("short"), now, &mut hw, &mut sink),
        Err(CommandError::AlreadyRunning)
    );
    assert_eq!(
        r.handle_command(&KilnCommand::Clear, now, &mut hw, &mut sink),
        Ok(RunStatus::Idle)
    );
    assert!(r.status().profile_id.is_none());
    assert!(r.handle_command(&start("short"), now, &mut hw, &mut sink).is_ok());
}

#[test]
fn completion_timeout_finishes_a_kiln_that_cannot_settle() {
    let config = KilnConfig {
        catch_up_enabled: false,
        ..KilnConfig::default()
    };
    let mut hw = MockKiln::at(20.0);
    let mut sink = RecordingSink::new();
    let mut r = idle_runner(config, &mut hw, &mut sink);

    r.handle_command(&start("short"), 0.0, &mut hw, &mut sink)
        .unwrap();
    // 600s schedule + 1800s timeout = 2400s of run time.
    let now = tick_n(&mut r, &mut hw, &mut sink, 0.0, 1200);
    assert_eq!(r.run_status(), RunStatus::Running);
    r.tick(now, &mut hw, &mut sink);
    assert_eq!(r.run_status(), RunStatus::Complete);
}

#[test]
fn completion_timeout_fires_while_shift_holds_the_schedule() {
    // Default config: shift enabled. A kiln stuck at 20 never reaches 100.
    let mut hw = MockKiln::at(20.0);
    let mut sink = RecordingSink::new();
    let mut r = idle_runner(KilnConfig::default(), &mut hw, &mut sink);

    r.handle_command(&start("short"), 0.0, &mut hw, &mut sink)
        .unwrap();
    let now = tick_n(&mut r, &mut hw, &mut sink, 0.0, 1200);
    assert_eq!(r.run_status(), RunStatus::Running);
    assert!(r.shift_secs() > 0.0);
    assert!(r.schedule_time() < 600.0, "schedule {}", r.schedule_time());
    assert!((r.duty() - 1.0).abs() < 1e-9);

    // 600s plan + 1800s timeout, counted in run time.
    r.tick(now, &mut hw, &mut sink);
    assert_eq!(r.run_status(), RunStatus::Complete);
    assert!(hw.relay_is_off());
    assert!(sink.transitions().contains(&(RunStatus::Running, RunStatus::Complete)));
}

#[test]
fn complete_without_monitoring_stops_reading() {
    let config = KilnConfig {
        monitor_after_complete: false,
        ..KilnConfig::default()
    };
    let mut hw = MockKiln::at(100.0);
    let mut sink = RecordingSink::new();
    let mut r = idle_runner(config, &mut hw, &mut sink);

    r.handle_command(&start("short"), 0.0, &mut hw, &mut sink)
        .unwrap();
    let now = tick_n(&mut r, &mut hw, &mut sink, 0.0, 302);
    assert_eq!(r.run_status(), RunStatus::Complete);
    let reads = hw.reads;
    tick_n(&mut r, &mut hw, &mut sink, now, 5);
    assert_eq!(hw.reads, reads);
}

// ── Shift ────────────────────────────────────────────────────

#[test]
fn lagging_kiln_shifts_the_schedule() {
    let mut hw = MockKiln::at(20.0);
    let mut sink = RecordingSink::new();
    let mut r = idle_runner(KilnConfig::default(), &mut hw, &mut sink);

    r.handle_command(&start("cone"), 0.0, &mut hw, &mut sink)
        .unwrap();
    tick_n(&mut r, &mut hw, &mut sink, 0.0, 300);

    assert!(r.shift_secs() > 400.0, "shift {}", r.shift_secs());
    assert!((r.run_elapsed() - r.shift_secs() - r.schedule_time()).abs() < 1e-6);
    // Held close to where the deficit began.
    assert!(r.schedule_time() < 120.0);
    assert!(r.telemetry().shift_secs > 400.0);
}

#[test]
fn shift_disabled_keeps_wall_time() {
    let config = KilnConfig {
        catch_up_enabled: false,
        ..KilnConfig::default()
    };
    let mut hw = MockKiln::at(20.0);
    let mut sink = RecordingSink::new();
    let mut r = idle_runner(config, &mut hw, &mut sink);

    r.handle_command(&start("cone"), 0.0, &mut hw, &mut sink)
        .unwrap();
    tick_n(&mut r, &mut hw, &mut sink, 0.0, 300);
    assert!(r.shift_secs().abs() < 1e-9);
    assert!((r.schedule_time() - 598.0).abs() < 1e-6);
}

// ── Actuation faults ─────────────────────────────────────────

#[test]
fn relay_failure_pauses_until_resumed() {
    let mut hw = MockKiln::at(20.0);
    let mut sink = RecordingSink::new();
    let mut r = idle_runner(KilnConfig::default(), &mut hw, &mut sink);

    r.handle_command(&start("short"), 0.0, &mut hw, &mut sink)
        .unwrap();
    hw.relay_fails = true;
    r.tick(0.0, &mut hw, &mut sink);
    assert_eq!(r.run_status(), RunStatus::Paused);
    assert!(r.has_fault(Fault::ActuationFault));

    hw.relay_fails = false;
    r.handle_command(&KilnCommand::Resume, 2.0, &mut hw, &mut sink)
        .unwrap();
    r.tick(4.0, &mut hw, &mut sink);
    assert_eq!(r.run_status(), RunStatus::Running);
    assert!(!r.has_fault(Fault::ActuationFault));
}
