//! Application core: the control loop and its boundary.
//!
//! Business rules for a firing run live here: the runner state machine,
//! its command and event vocabulary, and the plumbing that connects it to
//! observers.  All interaction with hardware and storage goes through the
//! port traits in [`ports`], keeping this layer testable without real
//! peripherals.

pub mod commands;
pub mod control_loop;
pub mod events;
pub mod link;
pub mod ports;
pub mod service;
