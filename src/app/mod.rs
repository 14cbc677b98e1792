//! Application core: pure domain orchestration, zero I/O.
//!
//! This module contains the control loop for the gate controller: command
//! handling, scheduler and motion ticking, and persistence coalescing.
//! All interaction with hardware happens through **port traits** defined
//! in [`ports`], keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
