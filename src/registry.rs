//! Gate registry: owns both gates and their actuator bindings.
//!
//! Every gate-targeted operation starts with a [`lookup`](GateRegistry::lookup),
//! which yields either a usable slot or `Error::InvalidGateId`.  There is no
//! way to reach a gate without handling the error arm first.

use log::info;

use crate::app::ports::ActuatorPort;
use crate::error::{Error, Result};
use crate::gate::{EndStops, Gate, GateId, GateSnapshot, GATE_COUNT};

/// One gate together with the live actuator that drives it.
pub struct GateSlot<A> {
    gate: Gate,
    actuator: A,
}

impl<A> GateSlot<A> {
    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    /// Split borrow for operations that mutate the gate and drive hardware.
    pub fn parts_mut(&mut self) -> (&mut Gate, &mut A) {
        (&mut self.gate, &mut self.actuator)
    }
}

pub struct GateRegistry<A> {
    slots: [GateSlot<A>; GATE_COUNT],
    stops: EndStops,
}

impl<A: ActuatorPort> GateRegistry<A> {
    /// Register both gates in their default closed state.  `actuators[0]`
    /// drives gate 1, `actuators[1]` drives gate 2.  Each actuator is told
    /// its gate rests closed.
    pub fn new(actuators: [A; GATE_COUNT], stops: EndStops) -> Self {
        let [a1, a2] = actuators;
        let mut registry = Self {
            slots: [
                GateSlot {
                    gate: Gate::new_closed(GateId::ALL[0], stops),
                    actuator: a1,
                },
                GateSlot {
                    gate: Gate::new_closed(GateId::ALL[1], stops),
                    actuator: a2,
                },
            ],
            stops,
        };
        registry.rebind();
        registry
    }

    /// Align every actuator's open-loop position with its gate.
    fn rebind(&mut self) {
        for slot in &mut self.slots {
            slot.actuator.assume_position(slot.gate.position());
        }
    }

    pub fn lookup(&self, id: u8) -> Result<&GateSlot<A>> {
        let id = GateId::new(id)?;
        Ok(&self.slots[id.index()])
    }

    pub fn lookup_mut(&mut self, id: u8) -> Result<&mut GateSlot<A>> {
        let id = GateId::new(id)?;
        Ok(&mut self.slots[id.index()])
    }

    /// Slots in fixed id order.
    pub fn iter(&self) -> impl Iterator<Item = &GateSlot<A>> {
        self.slots.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut GateSlot<A>> {
        self.slots.iter_mut()
    }

    pub fn stops(&self) -> EndStops {
        self.stops
    }

    pub fn any_powered(&self) -> bool {
        self.slots.iter().any(|s| s.gate.is_powered())
    }

    /// Durable snapshots of every gate, in id order.
    pub fn snapshots(&self) -> [GateSnapshot; GATE_COUNT] {
        [self.slots[0].gate.snapshot(), self.slots[1].gate.snapshot()]
    }

    /// Overwrite gate state from persisted snapshots, keeping each slot's
    /// live actuator.  All snapshots are validated first; on any error
    /// nothing is modified.
    pub fn restore(&mut self, snapshots: &[GateSnapshot]) -> Result<()> {
        let mut seen = [false; GATE_COUNT];
        for snap in snapshots {
            let id = snap.validate()?;
            if seen[id.index()] {
                return Err(Error::MissingOrInvalidParameter("duplicate gate id"));
            }
            seen[id.index()] = true;
        }
        if seen.iter().any(|s| !s) {
            return Err(Error::MissingOrInvalidParameter("missing gate id"));
        }

        let stops = self.stops;
        for snap in snapshots {
            let slot = self.lookup_mut(snap.id)?;
            slot.gate.apply_snapshot(snap, stops);
            info!(
                "Registry: gate {} restored (target={:?}, schedule={} active={})",
                snap.id, snap.target, snap.schedule_time, snap.schedule_active
            );
        }
        self.rebind();
        Ok(())
    }
}
