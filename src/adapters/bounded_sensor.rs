//! Deadline wrapper for blocking temperature sources.
//!
//! Thermocouple amplifiers on a shared bus can hang.  [`BoundedSensor`]
//! moves the wrapped source onto its own thread and waits at most
//! `timeout` for each reading; a late reading is discarded rather than
//! being returned to the next caller.

use core::time::Duration;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::thread::JoinHandle;

use log::{info, warn};

use crate::app::ports::TemperatureSource;
use crate::error::SensorError;

pub struct BoundedSensor {
    requests: Option<SyncSender<u64>>,
    replies: Receiver<(u64, Result<f64, SensorError>)>,
    timeout: Duration,
    seq: u64,
    worker: Option<JoinHandle<()>>,
}

impl BoundedSensor {
    pub fn spawn<S>(mut source: S, timeout: Duration) -> std::io::Result<Self>
    where
        S: TemperatureSource + Send + 'static,
    {
        let (req_tx, req_rx) = mpsc::sync_channel::<u64>(1);
        let (rep_tx, rep_rx) = mpsc::channel();
        let worker = std::thread::Builder::new()
            .name("kiln-sensor".into())
            .stack_size(16 * 1024)
            .spawn(move || {
                while let Ok(seq) = req_rx.recv() {
                    if rep_tx.send((seq, source.read())).is_err() {
                        break;
                    }
                }
            })?;
        info!("Sensor: reads bounded to {}ms", timeout.as_millis());
        Ok(Self {
            requests: Some(req_tx),
            replies: rep_rx,
            timeout,
            seq: 0,
            worker: Some(worker),
        })
    }
}

impl TemperatureSource for BoundedSensor {
    fn read(&mut self) -> Result<f64, SensorError> {
        let Some(requests) = &self.requests else {
            return Err(SensorError::Disconnected);
        };
        self.seq = self.seq.wrapping_add(1);
        match requests.try_send(self.seq) {
            Ok(()) => {}
            // Previous read still stuck in the driver.
            Err(TrySendError::Full(_)) => return Err(SensorError::Timeout),
            Err(TrySendError::Disconnected(_)) => return Err(SensorError::Disconnected),
        }

        let deadline = std::time::Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            match self.replies.recv_timeout(remaining) {
                Ok((seq, reading)) if seq == self.seq => return reading,
                Ok((stale, _)) => warn!("Sensor: dropping late reading #{stale}"),
                Err(RecvTimeoutError::Timeout) => return Err(SensorError::Timeout),
                Err(RecvTimeoutError::Disconnected) => return Err(SensorError::Disconnected),
            }
        }
    }
}

impl Drop for BoundedSensor {
    fn drop(&mut self) {
        // Hang up; a worker stuck inside the driver is detached.
        self.requests = None;
        if let Some(worker) = self.worker.take() {
            if worker.is_finished() {
                let _ = worker.join();
            }
        }
    }
}
