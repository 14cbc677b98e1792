//! CoopGate firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod gate;
pub mod motion;
pub mod persistence;
pub mod registry;
pub mod scheduler;

pub mod pins;

// Platform adapters compile on the host too; the real implementations are
// guarded by cfg attributes inside.
pub mod adapters;
pub mod drivers;
