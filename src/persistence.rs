//! Gate table persistence.
//!
//! The table is one fixed-size record per gate, stored contiguously in id
//! order as a single NVS blob:
//!
//! ```text
//!  offset  size  field
//!  ──────  ────  ─────────────────────────────
//!   0       1    id               (1 or 2)
//!   1       1    target angle     (open or close end stop)
//!   2       8    schedule_time    (u64 LE, 0 = unset)
//!  10       1    schedule_active  (0 / 1)
//! ```
//!
//! Total size is `RECORD_SIZE * GATE_COUNT`.  Records are encoded with
//! postcard using fixed-width integers so every record has the same length.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{GateStore, StoragePort};
use crate::error::PersistenceError;
use crate::gate::{EndStops, GateSnapshot, GATE_COUNT};

/// NVS namespace and key holding the table.
pub const NAMESPACE: &str = "coopgate";
pub const TABLE_KEY: &str = "gates";

/// Encoded size of one gate record.
pub const RECORD_SIZE: usize = 11;
/// Encoded size of the whole table.
pub const TABLE_SIZE: usize = RECORD_SIZE * GATE_COUNT;

/// On-flash layout of one gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct GateRecord {
    id: u8,
    target: u8,
    #[serde(with = "postcard::fixint::le")]
    schedule_time: u64,
    schedule_active: bool,
}

/// Encode snapshots (one per gate, any order) into the fixed table layout.
pub fn encode_table(
    gates: &[GateSnapshot],
    stops: EndStops,
) -> Result<[u8; TABLE_SIZE], PersistenceError> {
    if gates.len() != GATE_COUNT {
        return Err(PersistenceError::Corrupted("gate count"));
    }

    let mut table = [0u8; TABLE_SIZE];
    for snap in gates {
        let id = snap
            .validate()
            .map_err(|_| PersistenceError::Corrupted("snapshot invariant"))?;
        let record = GateRecord {
            id: snap.id,
            target: stops.angle(snap.target),
            schedule_time: snap.schedule_time,
            schedule_active: snap.schedule_active,
        };
        let offset = id.index() * RECORD_SIZE;
        let written = postcard::to_slice(&record, &mut table[offset..offset + RECORD_SIZE])
            .map_err(|_| PersistenceError::Corrupted("record encode"))?;
        if written.len() != RECORD_SIZE {
            return Err(PersistenceError::Corrupted("record size"));
        }
    }
    Ok(table)
}

/// Decode and validate a stored table.  Anything that is not exactly a
/// well-formed table is rejected.
pub fn decode_table(bytes: &[u8], stops: EndStops) -> Result<Vec<GateSnapshot>, PersistenceError> {
    if bytes.len() != TABLE_SIZE {
        return Err(PersistenceError::Corrupted("table length"));
    }

    let mut gates = Vec::with_capacity(GATE_COUNT);
    for (index, chunk) in bytes.chunks_exact(RECORD_SIZE).enumerate() {
        let (record, rest): (GateRecord, _) = postcard::take_from_bytes(chunk)
            .map_err(|_| PersistenceError::Corrupted("record decode"))?;
        if !rest.is_empty() {
            return Err(PersistenceError::Corrupted("record size"));
        }
        if usize::from(record.id) != index + 1 {
            return Err(PersistenceError::Corrupted("record id"));
        }
        let target = stops
            .classify(record.target)
            .ok_or(PersistenceError::Corrupted("target angle"))?;
        if record.schedule_active && record.schedule_time == 0 {
            return Err(PersistenceError::Corrupted("active schedule without time"));
        }
        gates.push(GateSnapshot {
            id: record.id,
            target,
            schedule_time: record.schedule_time,
            schedule_active: record.schedule_active,
        });
    }
    Ok(gates)
}

/// [`GateStore`] backed by any [`StoragePort`] (NVS on device, in-memory in
/// tests).
pub struct NvsGateStore<S> {
    storage: S,
    stops: EndStops,
}

impl<S: StoragePort> NvsGateStore<S> {
    pub fn new(storage: S, stops: EndStops) -> Self {
        Self { storage, stops }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Forget the stored table (next boot starts from defaults).
    pub fn erase(&mut self) -> Result<(), PersistenceError> {
        self.storage.delete(NAMESPACE, TABLE_KEY)?;
        info!("GateStore: table erased");
        Ok(())
    }
}

impl<S: StoragePort> GateStore for NvsGateStore<S> {
    fn save_all(&mut self, gates: &[GateSnapshot]) -> Result<(), PersistenceError> {
        let table = encode_table(gates, self.stops)?;
        self.storage.write(NAMESPACE, TABLE_KEY, &table)?;
        info!("GateStore: saved {} gates ({} bytes)", gates.len(), TABLE_SIZE);
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<GateSnapshot>, PersistenceError> {
        // One spare byte so an oversized blob shows up as a length mismatch.
        let mut buf = [0u8; TABLE_SIZE + 1];
        let len = self.storage.read(NAMESPACE, TABLE_KEY, &mut buf)?;
        decode_table(&buf[..len], self.stops).inspect_err(|e| {
            warn!("GateStore: {}", e);
        })
    }
}
