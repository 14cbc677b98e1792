//! Mock hardware adapters for integration tests.
//!
//! Records every actuator call so tests can assert on the full command
//! history without touching real GPIO/PWM registers.

use coopgate::app::events::AppEvent;
use coopgate::app::ports::{ActuatorPort, EventSink, GateStore};
use coopgate::error::{ActuatorError, PersistenceError, StorageError};
use coopgate::gate::GateSnapshot;

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCall {
    Enable,
    Disable,
    DriveTo(u8),
}

// ── MockServo ─────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MockServo {
    pub calls: Vec<ActuatorCall>,
    pub position: u8,
    /// Fail every `drive_to` while set.
    pub fail_drive: bool,
    /// Fail every `enable` while set.
    pub fail_enable: bool,
}

#[allow(dead_code)]
impl MockServo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, call: ActuatorCall) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }

    pub fn drives(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, ActuatorCall::DriveTo(_)))
            .count()
    }

    pub fn last_drive(&self) -> Option<u8> {
        self.calls.iter().rev().find_map(|c| match c {
            ActuatorCall::DriveTo(p) => Some(*p),
            _ => None,
        })
    }
}

impl ActuatorPort for MockServo {
    fn enable(&mut self) -> Result<(), ActuatorError> {
        self.calls.push(ActuatorCall::Enable);
        if self.fail_enable {
            return Err(ActuatorError::PowerRailFailed);
        }
        Ok(())
    }

    fn disable(&mut self) -> Result<(), ActuatorError> {
        self.calls.push(ActuatorCall::Disable);
        Ok(())
    }

    fn drive_to(&mut self, position: u8) -> Result<(), ActuatorError> {
        self.calls.push(ActuatorCall::DriveTo(position));
        if self.fail_drive {
            return Err(ActuatorError::PwmWriteFailed);
        }
        self.position = position;
        Ok(())
    }

    fn current_position(&self) -> u8 {
        self.position
    }

    fn assume_position(&mut self, position: u8) {
        self.position = position;
    }
}

// ── MemoryStore ───────────────────────────────────────────────

/// Gate store that keeps the last saved table and can be told to fail.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub saved: Option<Vec<GateSnapshot>>,
    pub saves: usize,
    pub fail_saves: bool,
}

impl GateStore for MemoryStore {
    fn save_all(&mut self, gates: &[GateSnapshot]) -> Result<(), PersistenceError> {
        if self.fail_saves {
            return Err(PersistenceError::Storage(StorageError::IoError));
        }
        self.saves += 1;
        self.saved = Some(gates.to_vec());
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<GateSnapshot>, PersistenceError> {
        self.saved.clone().ok_or(PersistenceError::NotFound)
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
