//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises the kiln runner against
//! mock adapters.  Everything runs on the host with no real hardware.

mod mock_hw;
mod recovery_tests;
mod runner_tests;
