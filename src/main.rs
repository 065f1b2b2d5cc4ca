//! kilnctl: simulator entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Adapters (outer ring)                    │
//! │                                                              │
//! │  SimulatedKiln      LogEventSink   FileStore   ProfileLibrary│
//! │  (Temp + Relay)     (EventSink)    (Config +   (Catalog)     │
//! │                                     Journal)                 │
//! │  ──────────────── Port Trait Boundary ───────────────────    │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │           KilnRunner (pure logic)                      │  │
//! │  │  FSM · PID · Schedule · Metrics                        │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │                                                              │
//! │  ControlLoop thread ◀── KilnLink ──▶ stdin + observer threads│
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `kilnctl [--profiles DIR] [--store DIR] [--speedup N]`.
//! With `--speedup` the control loop runs on virtual time, `N` times
//! faster than real time (0 = as fast as possible).

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use log::{info, warn};

use kilnctl::adapters::clock::{SimClock, WallClock};
use kilnctl::adapters::console_logger::ConsoleLogger;
use kilnctl::adapters::log_sink::LogEventSink;
use kilnctl::adapters::profiles::ProfileLibrary;
use kilnctl::adapters::simulator::{SimulatedKiln, ThermalModel};
use kilnctl::adapters::storage::FileStore;
use kilnctl::app::commands::KilnCommand;
use kilnctl::app::control_loop::ControlLoop;
use kilnctl::app::link::KilnLink;
use kilnctl::app::ports::{Clock, ConfigPort};
use kilnctl::app::service::KilnRunner;
use kilnctl::config::KilnConfig;
use kilnctl::journal::StorageJournal;

/// Log a TELEM line every this many ticks.
const TELEMETRY_LOG_EVERY: u32 = 15;

const OBSERVER_POLL: Duration = Duration::from_millis(250);

struct Args {
    profiles: PathBuf,
    store: PathBuf,
    speedup: Option<f64>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        profiles: PathBuf::from("profiles"),
        store: PathBuf::from("kiln-data"),
        speedup: None,
    };
    let mut it = std::env::args().skip(1);
    while let Some(flag) = it.next() {
        let mut value = || it.next().ok_or_else(|| anyhow!("{flag} needs a value"));
        match flag.as_str() {
            "--profiles" => args.profiles = value()?.into(),
            "--store" => args.store = value()?.into(),
            "--speedup" => {
                let n: f64 = value()?.parse().context("--speedup")?;
                args.speedup = Some(n);
            }
            other => bail!("unknown argument '{other}'"),
        }
    }
    Ok(args)
}

// ── Operator input ────────────────────────────────────────────

enum Input {
    Command(KilnCommand),
    Status,
    List,
    Quit,
}

fn parse_input(line: &str) -> Result<Input, String> {
    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default();
    let input = match verb {
        "start" => {
            let id = words.next().ok_or("usage: start <profile>")?;
            Input::Command(KilnCommand::start(id).map_err(|e| e.to_string())?)
        }
        "pause" => Input::Command(KilnCommand::Pause),
        "resume" => Input::Command(KilnCommand::Resume),
        "abort" => Input::Command(KilnCommand::Abort),
        "clear" => Input::Command(KilnCommand::Clear),
        "recover" => Input::Command(KilnCommand::ResumeRecovered),
        "status" => Input::Status,
        "list" => Input::List,
        "quit" | "exit" => Input::Quit,
        other => {
            return Err(format!(
                "unknown command '{other}' (start|pause|resume|abort|clear|recover|status|list|quit)"
            ));
        }
    };
    Ok(input)
}

fn stdin_loop(link: &KilnLink, profiles: &ProfileLibrary, shutdown: &AtomicBool) {
    for line in std::io::stdin().lock().lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        match parse_input(&line) {
            Ok(Input::Command(cmd)) => {
                if let Err(cmd) = link.submit(cmd) {
                    warn!("Command queue full, '{}' dropped", cmd.name());
                }
            }
            Ok(Input::Status) => match link.run_state() {
                Some(run) => info!("{:?}", run),
                None => info!("no status published yet"),
            },
            Ok(Input::List) => info!("profiles: {}", profiles.ids().join(", ")),
            Ok(Input::Quit) => break,
            Err(msg) => warn!("{msg}"),
        }
    }
    shutdown.store(true, Ordering::Relaxed);
}

// ── Observer ──────────────────────────────────────────────────

async fn telemetry_feed(link: Arc<KilnLink>) {
    loop {
        while let Some(t) = link.try_telemetry() {
            if let Some(json) = t.to_json() {
                println!("{json}");
            }
        }
        async_io_mini::Timer::after(OBSERVER_POLL).await;
    }
}

async fn outcome_feed(link: Arc<KilnLink>) {
    loop {
        while let Some(outcome) = link.try_outcome() {
            match outcome.result {
                Ok(status) => info!("{} accepted, now {}", outcome.command.name(), status),
                Err(e) => warn!("{} rejected: {}", outcome.command.name(), e),
            }
        }
        async_io_mini::Timer::after(OBSERVER_POLL).await;
    }
}

async fn until_shutdown(shutdown: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::Relaxed) {
        async_io_mini::Timer::after(OBSERVER_POLL).await;
    }
}

fn run_observer(link: Arc<KilnLink>, shutdown: Arc<AtomicBool>) {
    let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();
    executor.spawn(telemetry_feed(link.clone())).detach();
    executor.spawn(outcome_feed(link)).detach();
    info!("Observer started");
    futures_lite::future::block_on(executor.run(until_shutdown(shutdown)));
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    ConsoleLogger::init();
    let args = parse_args()?;
    info!("kilnctl v{}", env!("CARGO_PKG_VERSION"));

    let store = FileStore::open(&args.store)
        .map_err(|e| anyhow!("store {}: {e}", args.store.display()))?;
    let config = match ConfigPort::load(&store) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("Config load failed ({e}), using defaults");
            KilnConfig::default()
        }
    };

    let kiln = SimulatedKiln::new(
        ThermalModel {
            element_kw: config.element_kw,
            ..ThermalModel::default()
        },
        config.duty_window(),
    );
    let catalog = ProfileLibrary::open(&args.profiles);
    info!("Profiles in {}: {}", args.profiles.display(), catalog.ids().join(", "));

    let runner = KilnRunner::new(config, StorageJournal::new(store), catalog);
    let link = Arc::new(KilnLink::new());
    let shutdown = Arc::new(AtomicBool::new(false));

    let observer = {
        let (link, shutdown) = (link.clone(), shutdown.clone());
        std::thread::Builder::new()
            .name("kiln-observer".into())
            .spawn(move || run_observer(link, shutdown))
            .context("spawn observer")?
    };
    {
        let (link, shutdown) = (link.clone(), shutdown.clone());
        let listing = ProfileLibrary::open(&args.profiles);
        // Detached: a blocked stdin read must not hold up shutdown.
        std::thread::Builder::new()
            .name("kiln-stdin".into())
            .spawn(move || stdin_loop(&link, &listing, &shutdown))
            .context("spawn stdin reader")?;
    }

    let mut control = ControlLoop::new(
        runner,
        kiln,
        LogEventSink::with_telemetry_every(TELEMETRY_LOG_EVERY),
        link,
    );
    match args.speedup {
        Some(speedup) => {
            let clock = SimClock::from_wall(speedup);
            info!("Virtual time, speedup {speedup}");
            control.recover(clock.now());
            control.run(&clock, &shutdown);
        }
        None => {
            control.recover(WallClock.now());
            control.run(&WallClock, &shutdown);
        }
    }

    if observer.join().is_err() {
        warn!("Observer thread panicked");
    }
    info!("kilnctl stopped ({} overruns)", control.overruns());
    Ok(())
}
