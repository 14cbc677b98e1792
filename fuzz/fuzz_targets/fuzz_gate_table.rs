//! Fuzz target: persisted gate table decoder
//!
//! Feeds arbitrary blobs to `decode_table` (what a corrupted or foreign
//! NVS entry would look like) and verifies:
//! - No panics under arbitrary byte inputs
//! - Every accepted table passes snapshot validation
//! - Every accepted table re-encodes to the exact input bytes
//!
//! cargo fuzz run fuzz_gate_table

#![no_main]

use coopgate::gate::EndStops;
use coopgate::persistence::{decode_table, encode_table};
use libfuzzer_sys::fuzz_target;

const STOPS: EndStops = EndStops {
    open: 0,
    closed: 170,
};

fuzz_target!(|data: &[u8]| {
    let Ok(snapshots) = decode_table(data, STOPS) else {
        return;
    };

    for snap in &snapshots {
        assert!(snap.validate().is_ok(), "decoder accepted invalid {:?}", snap);
    }

    let table = encode_table(&snapshots, STOPS).expect("accepted table must re-encode");
    assert_eq!(&table[..], data);
});
