//! Outbound application events.
//!
//! The [`GateService`](super::service::GateService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them (log to serial, count them in tests).

use crate::error::{ActuatorError, PersistenceError};
use crate::gate::GatePosition;
use crate::motion::MoveRequest;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The service has started; `restored` is false when defaults were used.
    Started { restored: bool },

    /// A gate was commanded toward an end stop.
    MoveRequested {
        gate: u8,
        target: GatePosition,
        request: MoveRequest,
    },

    /// A gate reached its target (or was snapped there on link loss).
    Arrived { gate: u8, aborted: bool },

    /// A gate's power rail was switched off after settling.
    PoweredDown { gate: u8 },

    ScheduleSet { gate: u8, at: u64 },

    ScheduleCleared { gate: u8 },

    /// A one-shot schedule fired and requested an open.
    ScheduleFired { gate: u8, at: u64 },

    /// A gate's actuator reported a failure; the gate was stopped.
    GateFault { gate: u8, error: ActuatorError },

    /// The gate table was written to durable storage.
    StateSaved,

    /// Writing the gate table failed; it will be retried.
    SaveFailed(PersistenceError),
}

/// A point-in-time view of one gate, as reported by `/api/info`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateStatus {
    pub id: u8,
    /// 1 when the gate is commanded anywhere but closed, else 0.
    pub state: u8,
    /// Pending or last-fired schedule (epoch seconds), 0 when unset.
    pub schedule: u64,
    pub schedule_active: bool,
    pub position: u8,
    pub powered: bool,
}
