//! Fuzz target for metadata record parsing.
//!
//! Parsing must never panic on arbitrary record bodies, and whatever it
//! accepts must round-trip through the wire format.

#![no_main]

use libfuzzer_sys::fuzz_target;
use subscription_engine::Metadata;

fuzz_target!(|data: &[u8]| {
    // Should never panic, whatever the bytes
    if let Ok(metadata) = Metadata::from_bytes("fuzz", data) {
        // Accepted records round-trip through the wire format
        let raw = serde_json::to_vec(&metadata).unwrap();
        let reparsed = Metadata::from_bytes("fuzz", &raw).unwrap();
        assert_eq!(reparsed, metadata);
    }
});
