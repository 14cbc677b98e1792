//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ GateService (domain)
//! ```
//!
//! Driven adapters (servos, clocks, storage, status LED, event sinks)
//! implement these traits.  The [`GateService`](super::service::GateService)
//! consumes them via generics, so the domain core never touches hardware
//! directly.
//!
//! All port errors are typed; callers must handle every variant explicitly.

use core::net::Ipv4Addr;

use crate::config::ControllerConfig;
use crate::error::{ActuatorError, ConfigError, PersistenceError, StorageError};
use crate::gate::GateSnapshot;

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → servo + power rail)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the domain calls this to drive one gate's actuator.
pub trait ActuatorPort {
    /// Switch the actuator's power rail on.
    fn enable(&mut self) -> Result<(), ActuatorError>;

    /// Switch the actuator's power rail off.
    fn disable(&mut self) -> Result<(), ActuatorError>;

    /// Command the actuator to an absolute angle (degrees).
    fn drive_to(&mut self, position: u8) -> Result<(), ActuatorError>;

    /// Last angle commanded to the actuator.  Open-loop: this is not a
    /// measured position.
    fn current_position(&self) -> u8;

    /// Record that the mechanism rests at `position` without moving it.
    /// The next `enable` holds this angle.
    fn assume_position(&mut self, position: u8);
}

// ───────────────────────────────────────────────────────────────
// Time port
// ───────────────────────────────────────────────────────────────

/// Clock queries.  Motion pacing uses the monotonic clock; schedules use
/// wall-clock epoch seconds.
pub trait TimePort {
    /// Milliseconds since boot (monotonic).
    fn uptime_ms(&self) -> u64;

    /// Seconds since the Unix epoch, or `None` while the wall clock has not
    /// been synchronised.
    fn epoch_secs(&self) -> Option<u64>;
}

// ───────────────────────────────────────────────────────────────
// Connectivity port
// ───────────────────────────────────────────────────────────────

/// Read-only view of the network link.
pub trait ConnectivityPort {
    fn is_connected(&self) -> bool;

    /// Signal strength in dBm while associated.
    fn rssi(&self) -> Option<i8>;

    /// Station IPv4 address while associated.
    fn ip(&self) -> Option<Ipv4Addr>;
}

// ───────────────────────────────────────────────────────────────
// Status indicator port (informational only)
// ───────────────────────────────────────────────────────────────

/// Coarse controller status shown on the status LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorState {
    /// Idle, nothing powered.
    Ready,
    /// At least one gate has its power rail enabled.
    Moving,
    /// The last command or tick hit a fault.
    Fault,
}

pub trait StatusIndicator {
    fn set_status(&mut self, state: IndicatorState);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Gate persistence port
// ───────────────────────────────────────────────────────────────

/// Durable storage for the gate table.
///
/// Only [`GateSnapshot`]s cross this boundary; actuator bindings are
/// re-attached by the registry after a load.
pub trait GateStore {
    fn save_all(&mut self, gates: &[GateSnapshot]) -> Result<(), PersistenceError>;

    fn load_all(&self) -> Result<Vec<GateSnapshot>, PersistenceError>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists controller configuration.
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`ControllerConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<ControllerConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &ControllerConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value blob storage.
///
/// - Keys are namespaced to prevent collisions between subsystems.
/// - Write operations MUST be atomic; no partial writes on power loss.
///   The ESP-IDF NVS API guarantees this natively; in-memory simulation
///   achieves it trivially.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}
