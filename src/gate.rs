//! Gate entity: the data record for one physical door.
//!
//! ```text
//!            request_move                 next step reaches target
//!   IDLE ─────────────────▶ MOVING ──────────────────────────────▶ SETTLING
//!    ▲                        ▲ │ step every interval                 │
//!    │                        │ ▼                                     │
//!    │                        └─┘                                     │
//!    └───────────────────[settle window elapsed: power off]───────────┘
//! ```
//!
//! `position` is private: only the [`MotionController`](crate::motion::MotionController)
//! advances it.  `target` is a [`GatePosition`], so a gate can only ever be
//! commanded to one of its two end stops.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of physical gates on the board.
pub const GATE_COUNT: usize = 2;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Validated gate identity.  Only ids 1 and 2 can be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GateId(u8);

impl GateId {
    pub const ALL: [GateId; GATE_COUNT] = [GateId(1), GateId(2)];

    pub fn new(id: u8) -> Result<Self> {
        match id {
            1..=2 => Ok(Self(id)),
            _ => Err(Error::InvalidGateId(id)),
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Zero-based slot index in the registry table.
    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }
}

impl core::fmt::Display for GateId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Logical end positions
// ---------------------------------------------------------------------------

/// The two logical end positions a gate can be commanded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatePosition {
    Open,
    Closed,
}

/// Mapping from logical end positions to servo angles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndStops {
    pub open: u8,
    pub closed: u8,
}

impl EndStops {
    pub fn angle(self, pos: GatePosition) -> u8 {
        match pos {
            GatePosition::Open => self.open,
            GatePosition::Closed => self.closed,
        }
    }

    /// Inverse of [`angle`](Self::angle).  `None` for anything that is not
    /// exactly one of the two end stops.
    pub fn classify(self, angle: u8) -> Option<GatePosition> {
        if angle == self.open {
            Some(GatePosition::Open)
        } else if angle == self.closed {
            Some(GatePosition::Closed)
        } else {
            None
        }
    }
}

impl From<&crate::config::ControllerConfig> for EndStops {
    fn from(cfg: &crate::config::ControllerConfig) -> Self {
        Self {
            open: cfg.open_pos,
            closed: cfg.close_pos,
        }
    }
}

// ---------------------------------------------------------------------------
// Motion phase
// ---------------------------------------------------------------------------

/// Power/motion state of a gate.  The actuator's power rail is enabled in
/// every phase except `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionPhase {
    Idle,
    Moving,
    /// Target reached; power stays on until the settle window elapses.
    Settling { since_ms: u64 },
}

// ---------------------------------------------------------------------------
// Gate record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gate {
    id: GateId,
    position: u8,
    target: GatePosition,
    phase: MotionPhase,
    last_step_ms: u64,
    schedule_time: u64,
    schedule_active: bool,
}

impl Gate {
    /// A closed, unpowered gate with no schedule.
    pub fn new_closed(id: GateId, stops: EndStops) -> Self {
        Self {
            id,
            position: stops.closed,
            target: GatePosition::Closed,
            phase: MotionPhase::Idle,
            last_step_ms: 0,
            schedule_time: 0,
            schedule_active: false,
        }
    }

    pub fn id(&self) -> GateId {
        self.id
    }

    /// Current commanded actuator angle.
    pub fn position(&self) -> u8 {
        self.position
    }

    pub fn target(&self) -> GatePosition {
        self.target
    }

    pub fn phase(&self) -> MotionPhase {
        self.phase
    }

    pub fn is_powered(&self) -> bool {
        self.phase != MotionPhase::Idle
    }

    pub fn is_moving(&self) -> bool {
        self.phase == MotionPhase::Moving
    }

    pub fn last_step_ms(&self) -> u64 {
        self.last_step_ms
    }

    /// Epoch seconds of the pending (or last fired) auto-open; 0 = unset.
    pub fn schedule_time(&self) -> u64 {
        self.schedule_time
    }

    pub fn schedule_active(&self) -> bool {
        self.schedule_active
    }

    /// Durable subset of this gate.
    pub fn snapshot(&self) -> GateSnapshot {
        GateSnapshot {
            id: self.id.get(),
            target: self.target,
            schedule_time: self.schedule_time,
            schedule_active: self.schedule_active,
        }
    }

    // ── Mutators (crate-internal) ─────────────────────────────

    pub(crate) fn set_target(&mut self, target: GatePosition) {
        self.target = target;
    }

    pub(crate) fn set_phase(&mut self, phase: MotionPhase) {
        self.phase = phase;
    }

    pub(crate) fn record_step(&mut self, position: u8, now_ms: u64) {
        self.position = position;
        self.last_step_ms = now_ms;
    }

    pub(crate) fn arm_schedule(&mut self, at: u64) {
        debug_assert!(at != 0, "schedule time 0 means unset");
        self.schedule_time = at;
        self.schedule_active = true;
    }

    pub(crate) fn disarm_schedule(&mut self) {
        self.schedule_active = false;
    }

    pub(crate) fn clear_schedule(&mut self) {
        self.schedule_time = 0;
        self.schedule_active = false;
    }

    /// Overwrite the durable fields from a validated snapshot.  The gate is
    /// assumed to rest at its restored target, unpowered.
    pub(crate) fn apply_snapshot(&mut self, snap: &GateSnapshot, stops: EndStops) {
        self.target = snap.target;
        self.position = stops.angle(snap.target);
        self.phase = MotionPhase::Idle;
        self.schedule_time = snap.schedule_time;
        self.schedule_active = snap.schedule_active;
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// The durable fields of a [`Gate`].  Capability handles and timing state
/// are deliberately absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateSnapshot {
    pub id: u8,
    pub target: GatePosition,
    pub schedule_time: u64,
    pub schedule_active: bool,
}

impl GateSnapshot {
    /// Check the snapshot's own invariants.
    pub fn validate(&self) -> Result<GateId> {
        let id = GateId::new(self.id)?;
        if self.schedule_active && self.schedule_time == 0 {
            return Err(Error::MissingOrInvalidParameter("schedule_time"));
        }
        Ok(id)
    }
}
