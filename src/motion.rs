//! Open-loop motion controller.
//!
//! Advances a gate's commanded angle toward its target in fixed increments,
//! one increment per step interval, and sequences the actuator's power rail
//! around the move:
//!
//! ```text
//!  request_move ──▶ enable() ──▶ MOVING
//!                                  │  every step_interval_ms:
//!                                  │    next increment reaches target?
//!                                  │      no  → drive_to(pos ± inc)
//!                                  │      yes → drive_to(target)
//!                                  ▼
//!                              SETTLING ──[settle_ms elapsed]──▶ disable() ──▶ IDLE
//! ```
//!
//! Worst-case traversal is `ceil(travel / increment)` steps.  Nothing here
//! sleeps: every wait is an elapsed-time comparison against `now_ms`.

use log::{debug, info, warn};

use crate::app::ports::ActuatorPort;
use crate::config::ControllerConfig;
use crate::error::{ActuatorError, Error, Result};
use crate::gate::{EndStops, Gate, GatePosition, MotionPhase};

/// What [`MotionController::request_move`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveRequest {
    /// Gate was idle: power enabled and motion started.
    Started,
    /// Gate was already powered: target overwritten, motion continues.
    Redirected,
    /// Gate was already heading to the same target: nothing changed.
    Refreshed,
}

/// What one [`MotionController::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionOutcome {
    /// Gate unpowered, nothing to do.
    Idle,
    /// Step interval has not elapsed yet.
    Waiting,
    /// Advanced one increment.
    Stepped { position: u8 },
    /// Snapped onto the target.  `aborted` when forced by link loss;
    /// `powered_down` when the settle window was zero and power is already off.
    Arrived { aborted: bool, powered_down: bool },
    /// At target, power still on.
    Settling,
    /// Settle window elapsed, power rail disabled.
    PoweredDown,
}

pub struct MotionController {
    stops: EndStops,
    increment: u8,
    step_interval_ms: u64,
    settle_ms: u64,
    abort_on_disconnect: bool,
}

impl MotionController {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            stops: EndStops::from(config),
            increment: config.step_increment.max(1),
            step_interval_ms: u64::from(config.step_interval_ms),
            settle_ms: u64::from(config.settle_ms),
            abort_on_disconnect: config.abort_on_disconnect,
        }
    }

    pub fn stops(&self) -> EndStops {
        self.stops
    }

    pub fn abort_on_disconnect(&self) -> bool {
        self.abort_on_disconnect
    }

    /// Command `gate` toward `desired`.
    ///
    /// Power is enabled only when the gate is idle, so repeating a request
    /// never double-enables.  A powered gate is simply redirected.
    pub fn request_move(
        &self,
        gate: &mut Gate,
        actuator: &mut impl ActuatorPort,
        desired: GatePosition,
    ) -> Result<MoveRequest> {
        let outcome = match gate.phase() {
            MotionPhase::Moving | MotionPhase::Settling { .. } if gate.target() == desired => {
                MoveRequest::Refreshed
            }
            MotionPhase::Moving | MotionPhase::Settling { .. } => {
                gate.set_target(desired);
                gate.set_phase(MotionPhase::Moving);
                MoveRequest::Redirected
            }
            MotionPhase::Idle => {
                actuator
                    .enable()
                    .map_err(|error| Error::ActuatorFault { gate: gate.id().get(), error })?;
                gate.set_target(desired);
                gate.set_phase(MotionPhase::Moving);
                MoveRequest::Started
            }
        };

        info!(
            "Motion: gate {} → {:?} ({:?}, at {}°)",
            gate.id(),
            desired,
            outcome,
            gate.position()
        );
        Ok(outcome)
    }

    /// Advance `gate` by at most one step.  `link_up` feeds the
    /// abort-on-disconnect option.
    pub fn tick(
        &self,
        gate: &mut Gate,
        actuator: &mut impl ActuatorPort,
        now_ms: u64,
        link_up: bool,
    ) -> Result<MotionOutcome> {
        match gate.phase() {
            MotionPhase::Idle => Ok(MotionOutcome::Idle),
            MotionPhase::Settling { since_ms } => self.settle(gate, actuator, since_ms, now_ms),
            MotionPhase::Moving => self.step(gate, actuator, now_ms, link_up),
        }
    }

    /// Whether one more increment from `pos` reaches or passes `target`.
    fn reaches(&self, pos: u8, target: u8) -> bool {
        if pos < target {
            pos.saturating_add(self.increment) >= target
        } else {
            pos.saturating_sub(self.increment) <= target
        }
    }

    fn step(
        &self,
        gate: &mut Gate,
        actuator: &mut impl ActuatorPort,
        now_ms: u64,
        link_up: bool,
    ) -> Result<MotionOutcome> {
        if now_ms.saturating_sub(gate.last_step_ms()) < self.step_interval_ms {
            return Ok(MotionOutcome::Waiting);
        }

        let pos = gate.position();
        let target = self.stops.angle(gate.target());
        let aborted = self.abort_on_disconnect && !link_up;

        if aborted || self.reaches(pos, target) {
            if let Err(error) = actuator.drive_to(target) {
                return Err(self.fault(gate, actuator, error));
            }
            gate.record_step(target, now_ms);
            gate.set_phase(MotionPhase::Settling { since_ms: now_ms });
            if aborted {
                warn!("Motion: gate {} snapped to {}° (link down)", gate.id(), target);
            } else {
                info!("Motion: gate {} reached {}°", gate.id(), target);
            }

            let powered_down = self.settle(gate, actuator, now_ms, now_ms)? == MotionOutcome::PoweredDown;
            return Ok(MotionOutcome::Arrived { aborted, powered_down });
        }

        let next = if pos < target {
            pos.saturating_add(self.increment)
        } else {
            pos.saturating_sub(self.increment)
        };
        if let Err(error) = actuator.drive_to(next) {
            return Err(self.fault(gate, actuator, error));
        }
        gate.record_step(next, now_ms);
        debug!("Motion: gate {} at {}°", gate.id(), next);
        Ok(MotionOutcome::Stepped { position: next })
    }

    fn settle(
        &self,
        gate: &mut Gate,
        actuator: &mut impl ActuatorPort,
        since_ms: u64,
        now_ms: u64,
    ) -> Result<MotionOutcome> {
        if now_ms.saturating_sub(since_ms) < self.settle_ms {
            return Ok(MotionOutcome::Settling);
        }

        gate.set_phase(MotionPhase::Idle);
        actuator
            .disable()
            .map_err(|error| Error::ActuatorFault { gate: gate.id().get(), error })?;
        info!("Motion: gate {} power off", gate.id());
        Ok(MotionOutcome::PoweredDown)
    }

    /// Stop driving a faulted gate: mark it idle and cut power.
    fn fault(&self, gate: &mut Gate, actuator: &mut impl ActuatorPort, error: ActuatorError) -> Error {
        gate.set_phase(MotionPhase::Idle);
        if let Err(e) = actuator.disable() {
            warn!("Motion: gate {} power-off after fault also failed: {}", gate.id(), e);
        }
        warn!("Motion: gate {} stopped at {}°: {}", gate.id(), gate.position(), error);
        Error::ActuatorFault {
            gate: gate.id().get(),
            error,
        }
    }
}
