//! One-shot auto-open scheduler.
//!
//! Each gate carries at most one pending auto-open time (epoch seconds).
//! The control loop polls [`Scheduler::check_schedule`] every tick; the
//! schedule fires at most once per setting.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  set_schedule(t)        time=t, active=true                  │
//! │        │                                                     │
//! │        ▼                                                     │
//! │  check_schedule(now)    time≠0 ∧ active ∧ now≥time ∧ ¬open   │
//! │        │ yes                                                 │
//! │        ▼                                                     │
//! │  request_move(Open)     active=false, time kept for display  │
//! │                                                              │
//! │  clear_schedule()       time=0, active=false  (idempotent)   │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use log::info;

use crate::app::ports::ActuatorPort;
use crate::error::{Error, Result};
use crate::gate::{Gate, GatePosition};
use crate::motion::MotionController;

pub struct Scheduler {
    /// Total schedule firings since boot.
    fire_count: u32,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self { fire_count: 0 }
    }

    /// Arm a one-shot auto-open at `at` (epoch seconds).  `0` is the
    /// "unset" marker and is rejected.
    pub fn set_schedule(&self, gate: &mut Gate, at: u64) -> Result<()> {
        if at == 0 {
            return Err(Error::MissingOrInvalidParameter("t"));
        }
        gate.arm_schedule(at);
        info!("Scheduler: gate {} auto-open at {}", gate.id(), at);
        Ok(())
    }

    /// Remove any schedule.  Always succeeds.
    pub fn clear_schedule(&self, gate: &mut Gate) {
        gate.clear_schedule();
        info!("Scheduler: gate {} schedule cleared", gate.id());
    }

    /// Whether the gate's schedule should fire at `now`.  Without a synced
    /// wall clock nothing is ever due.
    pub fn is_due(&self, gate: &Gate, now: Option<u64>, open_angle: u8) -> bool {
        let Some(now) = now else {
            return false;
        };
        gate.schedule_time() != 0
            && gate.schedule_active()
            && now >= gate.schedule_time()
            && gate.position() != open_angle
    }

    /// Fire the schedule if due.  Returns the schedule time when it fired.
    ///
    /// The schedule is disarmed before the move is requested, so even an
    /// actuator fault cannot cause a second firing.
    pub fn check_schedule(
        &mut self,
        motion: &MotionController,
        gate: &mut Gate,
        actuator: &mut impl ActuatorPort,
        now: Option<u64>,
    ) -> Result<Option<u64>> {
        if !self.is_due(gate, now, motion.stops().open) {
            return Ok(None);
        }

        let at = gate.schedule_time();
        gate.disarm_schedule();
        self.fire_count = self.fire_count.saturating_add(1);
        info!("Scheduler: gate {} schedule {} fired", gate.id(), at);

        motion.request_move(gate, actuator, GatePosition::Open)?;
        Ok(Some(at))
    }

    pub fn fire_count(&self) -> u32 {
        self.fire_count
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
