//! Control algorithms: pure computation, no I/O.
//!
//! - [`pid`]: duty-fraction PID with anti-windup band
//! - [`schedule`]: skip-ahead and shift policies over the profile clock
//! - [`relay`]: time-proportioning of a duty fraction into relay on/off time

pub mod pid;
pub mod relay;
pub mod schedule;
