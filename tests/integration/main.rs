//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters.  All tests run on the host (x86_64) with no
//! real hardware required.

mod api_flow_tests;
mod gate_service_tests;
mod mock_hw;
mod servo_wiring_tests;
