//! Application service: the hexagonal core.
//!
//! [`GateService`] owns the gate registry, motion controller and scheduler.
//! It is the only orchestration point: commands and ticks both run through
//! it on the control-loop thread, so every gate mutation is serialized.
//!
//! ```text
//!  GateCommand ──▶ ┌───────────────────────────────┐ ──▶ EventSink
//!                  │          GateService           │
//!  TimePort    ──▶ │ Registry · Scheduler · Motion  │ ──▶ ActuatorPort (×2)
//!                  └───────────────────────────────┘ ──▶ GateStore
//! ```

use log::{info, warn};

use crate::config::ControllerConfig;
use crate::error::{Error, Result};
use crate::gate::{EndStops, Gate, GatePosition, GATE_COUNT};
use crate::motion::{MotionController, MotionOutcome};
use crate::registry::GateRegistry;
use crate::scheduler::Scheduler;

use super::commands::GateCommand;
use super::events::{AppEvent, GateStatus};
use super::ports::{ActuatorPort, EventSink, GateStore, IndicatorState};

// ───────────────────────────────────────────────────────────────
// GateService
// ───────────────────────────────────────────────────────────────

pub struct GateService<A> {
    registry: GateRegistry<A>,
    motion: MotionController,
    scheduler: Scheduler,
    config: ControllerConfig,
    tick_count: u64,
    /// Gate table changed since the last successful save.
    dirty: bool,
    /// Uptime of the last failed save, for retry pacing.
    save_failed_at_ms: Option<u64>,
    /// The most recent command or tick hit an actuator fault.
    fault: bool,
}

impl<A: ActuatorPort> GateService<A> {
    /// Construct the service with both gates closed and unscheduled.
    /// `actuators[0]` drives gate 1, `actuators[1]` drives gate 2.
    pub fn new(config: ControllerConfig, actuators: [A; GATE_COUNT]) -> Self {
        let motion = MotionController::new(&config);
        let registry = GateRegistry::new(actuators, motion.stops());
        Self {
            registry,
            motion,
            scheduler: Scheduler::new(),
            config,
            tick_count: 0,
            dirty: false,
            save_failed_at_ms: None,
            fault: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Load the persisted gate table.  On any load or validation error the
    /// gates stay at their defaults.  Returns whether state was restored.
    pub fn restore_from(&mut self, store: &impl GateStore, sink: &mut impl EventSink) -> bool {
        let restored = match store.load_all() {
            Ok(snapshots) => match self.registry.restore(&snapshots) {
                Ok(()) => true,
                Err(e) => {
                    warn!("GateService: stored gate table rejected ({}), using defaults", e);
                    false
                }
            },
            Err(e) => {
                warn!("GateService: no usable gate table ({}), using defaults", e);
                false
            }
        };

        sink.emit(&AppEvent::Started { restored });
        info!("GateService started (restored={})", restored);
        restored
    }

    // ── Command handling ──────────────────────────────────────

    /// Apply an external command.
    ///
    /// The gate id is validated before anything else: an unknown id returns
    /// [`Error::InvalidGateId`] with no state change and no hardware call.
    pub fn handle_command(&mut self, cmd: GateCommand, sink: &mut impl EventSink) -> Result<()> {
        let slot = self.registry.lookup_mut(cmd.gate())?;
        let (gate, actuator) = slot.parts_mut();
        let id = gate.id().get();

        let event = match cmd {
            GateCommand::Open { .. } | GateCommand::Close { .. } => {
                let target = match cmd {
                    GateCommand::Open { .. } => GatePosition::Open,
                    _ => GatePosition::Closed,
                };
                match self.motion.request_move(gate, actuator, target) {
                    Ok(request) => AppEvent::MoveRequested {
                        gate: id,
                        target,
                        request,
                    },
                    Err(e) => {
                        self.fault = true;
                        if let Some(event) = fault_event(&e) {
                            sink.emit(&event);
                        }
                        return Err(e);
                    }
                }
            }
            GateCommand::SetSchedule { at, .. } => {
                self.scheduler.set_schedule(gate, at)?;
                AppEvent::ScheduleSet { gate: id, at }
            }
            GateCommand::ClearSchedule { .. } => {
                self.scheduler.clear_schedule(gate);
                AppEvent::ScheduleCleared { gate: id }
            }
        };

        self.fault = false;
        self.dirty = true;
        sink.emit(&event);
        Ok(())
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control cycle: scheduler then motion, for each gate in id
    /// order.  A fault on one gate is reported and does not stop the other.
    ///
    /// `epoch_secs` is `None` while the wall clock is unsynced; `link_up`
    /// feeds the abort-on-disconnect option.
    pub fn tick(
        &mut self,
        now_ms: u64,
        epoch_secs: Option<u64>,
        link_up: bool,
        sink: &mut impl EventSink,
    ) {
        self.tick_count += 1;

        for slot in self.registry.iter_mut() {
            let (gate, actuator) = slot.parts_mut();
            let id = gate.id().get();

            match self
                .scheduler
                .check_schedule(&self.motion, gate, actuator, epoch_secs)
            {
                Ok(Some(at)) => {
                    self.dirty = true;
                    sink.emit(&AppEvent::ScheduleFired { gate: id, at });
                }
                Ok(None) => {}
                Err(e) => {
                    // The schedule was disarmed before the move failed.
                    self.dirty = true;
                    self.fault = true;
                    if let Some(event) = fault_event(&e) {
                        sink.emit(&event);
                    }
                }
            }

            match self.motion.tick(gate, actuator, now_ms, link_up) {
                Ok(MotionOutcome::Arrived { aborted, powered_down }) => {
                    self.dirty = true;
                    sink.emit(&AppEvent::Arrived { gate: id, aborted });
                    if powered_down {
                        sink.emit(&AppEvent::PoweredDown { gate: id });
                    }
                }
                Ok(MotionOutcome::PoweredDown) => {
                    sink.emit(&AppEvent::PoweredDown { gate: id });
                }
                Ok(_) => {}
                Err(e) => {
                    self.fault = true;
                    if let Some(event) = fault_event(&e) {
                        sink.emit(&event);
                    }
                }
            }
        }
    }

    // ── Persistence ───────────────────────────────────────────

    /// Flush the gate table if anything changed.  Called once per tick so
    /// bursts of changes coalesce into one write.  After a failed write the
    /// next attempt waits `persist_retry_ms`.  Returns `true` if saved.
    pub fn persist_if_dirty(
        &mut self,
        store: &mut impl GateStore,
        now_ms: u64,
        sink: &mut impl EventSink,
    ) -> bool {
        if !self.dirty {
            return false;
        }
        if let Some(failed_at) = self.save_failed_at_ms {
            if now_ms.saturating_sub(failed_at) < u64::from(self.config.persist_retry_ms) {
                return false;
            }
        }

        match store.save_all(&self.registry.snapshots()) {
            Ok(()) => {
                self.dirty = false;
                self.save_failed_at_ms = None;
                sink.emit(&AppEvent::StateSaved);
                true
            }
            Err(e) => {
                warn!("GateService: save failed ({}), continuing in memory", e);
                self.save_failed_at_ms = Some(now_ms);
                sink.emit(&AppEvent::SaveFailed(e));
                false
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Status of one gate for `/api/info`.
    pub fn gate_status(&self, id: u8) -> Result<GateStatus> {
        Ok(status_of(self.registry.lookup(id)?.gate()))
    }

    /// Status of every gate, in id order.
    pub fn gate_statuses(&self) -> [GateStatus; GATE_COUNT] {
        let mut out = [GateStatus::default(); GATE_COUNT];
        for (status, slot) in out.iter_mut().zip(self.registry.iter()) {
            *status = status_of(slot.gate());
        }
        out
    }

    /// What the status LED should show.
    pub fn indicator_state(&self) -> IndicatorState {
        if self.fault {
            IndicatorState::Fault
        } else if self.registry.any_powered() {
            IndicatorState::Moving
        } else {
            IndicatorState::Ready
        }
    }

    pub fn registry(&self) -> &GateRegistry<A> {
        &self.registry
    }

    pub fn stops(&self) -> EndStops {
        self.motion.stops()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Schedule firings since startup.
    pub fn schedules_fired(&self) -> u32 {
        self.scheduler.fire_count()
    }

    /// Whether the gate table has unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

fn status_of(gate: &Gate) -> GateStatus {
    GateStatus {
        id: gate.id().get(),
        state: u8::from(gate.target() != GatePosition::Closed),
        schedule: gate.schedule_time(),
        schedule_active: gate.schedule_active(),
        position: gate.position(),
        powered: gate.is_powered(),
    }
}

/// Map a gate-level error to the event reported for it.
fn fault_event(err: &Error) -> Option<AppEvent> {
    match *err {
        Error::ActuatorFault { gate, error } => Some(AppEvent::GateFault { gate, error }),
        _ => None,
    }
}
