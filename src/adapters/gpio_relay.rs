//! GPIO relay adapter.
//!
//! Drives a contactor from any `embedded-hal` output pin.  A dedicated
//! worker thread owns the pin and plays each window's on/off pattern, so
//! [`RelaySink::set`] only queues the command and returns immediately.
//!
//! - A new command preempts the window in progress.
//! - With no new command the output is switched off one window after a
//!   full-on command, so a stalled control loop cannot leave the elements
//!   energised.
//! - Pin write errors latch a fault that the next `set` reports.
//! - Dropping the adapter switches the output off and joins the worker.

use core::time::Duration;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::thread::JoinHandle;

use embedded_hal::digital::OutputPin;
use log::{error, info, warn};

use crate::app::ports::RelaySink;
use crate::error::ActuatorError;

const QUEUE_DEPTH: usize = 2;

enum RelayCommand {
    Set { on: Duration, window: Duration },
    Shutdown,
}

pub struct GpioRelay {
    tx: SyncSender<RelayCommand>,
    fault: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl GpioRelay {
    /// Spawn the worker thread that owns `pin`.
    pub fn spawn<P>(pin: P) -> std::io::Result<Self>
    where
        P: OutputPin + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(QUEUE_DEPTH);
        let fault = Arc::new(AtomicBool::new(false));
        let worker_fault = Arc::clone(&fault);
        let worker = std::thread::Builder::new()
            .name("kiln-relay".into())
            .stack_size(16 * 1024)
            .spawn(move || relay_worker(pin, &rx, &worker_fault))?;
        info!("Relay: worker started");
        Ok(Self {
            tx,
            fault,
            worker: Some(worker),
        })
    }
}

impl RelaySink for GpioRelay {
    fn set(&mut self, on: Duration, window: Duration) -> Result<(), ActuatorError> {
        if self.fault.swap(false, Ordering::AcqRel) {
            return Err(ActuatorError::GpioWriteFailed);
        }
        self.tx
            .try_send(RelayCommand::Set {
                on: on.min(window),
                window,
            })
            .map_err(|e| match e {
                TrySendError::Full(_) => ActuatorError::Timeout,
                TrySendError::Disconnected(_) => ActuatorError::Disconnected,
            })
    }
}

impl Drop for GpioRelay {
    fn drop(&mut self) {
        // A full queue still gets the hangup when `tx` drops.
        let _ = self.tx.try_send(RelayCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Relay: worker panicked");
            }
        }
    }
}

fn write_pin<P: OutputPin>(pin: &mut P, high: bool, fault: &AtomicBool) {
    let result = if high { pin.set_high() } else { pin.set_low() };
    if result.is_err() {
        warn!("Relay: pin write ({}) failed", if high { "on" } else { "off" });
        fault.store(true, Ordering::Release);
    }
}

fn relay_worker<P: OutputPin>(mut pin: P, rx: &Receiver<RelayCommand>, fault: &AtomicBool) {
    write_pin(&mut pin, false, fault);
    let mut next = None;

    loop {
        let command = match next.take() {
            Some(command) => command,
            None => match rx.recv() {
                Ok(command) => command,
                Err(_) => break,
            },
        };
        let RelayCommand::Set { on, window } = command else {
            break;
        };

        // On phase (a full-on window gets one extra window of grace).
        if !on.is_zero() {
            write_pin(&mut pin, true, fault);
            let hold = if on >= window { on + window } else { on };
            match rx.recv_timeout(hold) {
                Ok(command) => {
                    if !matches!(command, RelayCommand::Set { on, .. } if !on.is_zero()) {
                        write_pin(&mut pin, false, fault);
                    }
                    next = Some(command);
                    continue;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        write_pin(&mut pin, false, fault);
    }

    write_pin(&mut pin, false, fault);
    info!("Relay: worker stopped, output off");
}
