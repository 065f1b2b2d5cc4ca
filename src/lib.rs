//! Kiln controller library.
//!
//! Drives an electric kiln through a firing profile: a PID loop feeds a
//! time-proportioned relay, a schedule tracker handles skip-ahead and
//! catch-up, and a journal lets an interrupted run resume after a crash.
//! Hardware and storage sit behind the port traits in [`app::ports`]; the
//! [`adapters`] module provides host and simulated implementations.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod error;
pub mod fsm;
pub mod journal;
pub mod metrics;
pub mod profile;
