//! Periodic driver for the runner.
//!
//! The control thread runs strictly serially: one [`step`](ControlLoop::step)
//! per duty window, each finishing (command, read, compute, actuate,
//! persist, publish) before the next is scheduled.  A step that overruns the
//! window is logged and the next one starts immediately; missed deadlines
//! are not replayed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};

use super::commands::CommandOutcome;
use super::link::KilnLink;
use super::ports::{
    Clock, EventSink, ProfileCatalog, RelaySink, RunStateStore, TemperatureSource, Timestamp,
};
use super::service::KilnRunner;

/// Owns the runner and its hardware for the lifetime of the control thread.
pub struct ControlLoop<J, C, H, E>
where
    J: RunStateStore,
    C: ProfileCatalog,
    H: TemperatureSource + RelaySink,
    E: EventSink,
{
    runner: KilnRunner<J, C>,
    hw: H,
    sink: E,
    link: Arc<KilnLink>,
    overruns: u64,
}

impl<J, C, H, E> ControlLoop<J, C, H, E>
where
    J: RunStateStore,
    C: ProfileCatalog,
    H: TemperatureSource + RelaySink,
    E: EventSink,
{
    pub fn new(runner: KilnRunner<J, C>, hw: H, sink: E, link: Arc<KilnLink>) -> Self {
        Self {
            runner,
            hw,
            sink,
            link,
            overruns: 0,
        }
    }

    /// Recover from the journal and publish the initial snapshot.
    pub fn recover(&mut self, now: Timestamp) {
        self.runner.recover(now, &mut self.hw, &mut self.sink);
        self.link
            .publish(self.runner.status(), self.runner.build_telemetry(now));
    }

    /// One tick boundary: apply at most one queued command, tick, publish.
    pub fn step(&mut self, now: Timestamp) {
        if let Some(command) = self.link.next_command() {
            let result = self
                .runner
                .handle_command(&command, now, &mut self.hw, &mut self.sink);
            self.link.report(CommandOutcome { command, result });
        }

        self.runner.tick(now, &mut self.hw, &mut self.sink);
        self.link
            .publish(self.runner.status(), self.runner.telemetry().clone());
    }

    /// Tick every window until `shutdown` is set.
    pub fn run(&mut self, clock: &impl Clock, shutdown: &AtomicBool) {
        let window = self.runner.window().as_secs_f64();
        let mut deadline = clock.now();
        info!("Control loop: {:.1}s duty window", window);

        while !shutdown.load(Ordering::Relaxed) {
            let started = clock.now();
            self.step(started);
            deadline += window;

            let finished = clock.now();
            if finished > deadline {
                self.overruns += 1;
                warn!(
                    "Control loop: tick overran window by {:.3}s ({} total)",
                    finished - deadline,
                    self.overruns
                );
                deadline = finished;
                continue;
            }
            clock.sleep(core::time::Duration::from_secs_f64(deadline - finished));
        }
        info!("Control loop: shutdown requested");
    }

    pub fn runner(&self) -> &KilnRunner<J, C> {
        &self.runner
    }

    pub fn runner_mut(&mut self) -> &mut KilnRunner<J, C> {
        &mut self.runner
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    pub fn sink(&self) -> &E {
        &self.sink
    }

    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    pub fn link(&self) -> &Arc<KilnLink> {
        &self.link
    }
}
