//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (the HTTP
//! handlers, via the request channel) that the
//! [`GateService`](super::service::GateService) validates and applies.
//! Gate ids arrive unvalidated; the service rejects anything but 1 and 2
//! before touching a gate.

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateCommand {
    /// Drive the gate to its open end stop.
    Open { gate: u8 },

    /// Drive the gate to its closed end stop.
    Close { gate: u8 },

    /// Arm a one-shot auto-open at `at` (epoch seconds).
    SetSchedule { gate: u8, at: u64 },

    /// Remove any pending auto-open.
    ClearSchedule { gate: u8 },
}

impl GateCommand {
    /// The (unvalidated) gate id this command targets.
    pub fn gate(&self) -> u8 {
        match *self {
            Self::Open { gate }
            | Self::Close { gate }
            | Self::SetSchedule { gate, .. }
            | Self::ClearSchedule { gate } => gate,
        }
    }
}
