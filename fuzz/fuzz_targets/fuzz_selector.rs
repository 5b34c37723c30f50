//! Fuzz target for field-selector projection.
//!
//! Projection must never panic and must never invent fields that were
//! not in the source document.

#![no_main]

use libfuzzer_sys::fuzz_target;
use subscription_engine::{apply_selector, FieldSelector};

fuzz_target!(|data: (&[u8], Vec<(String, bool)>)| {
    let (raw, entries) = data;

    let Ok(document) = serde_json::from_slice::<serde_json::Value>(raw) else {
        return;
    };
    let selector: FieldSelector = entries.into_iter().collect();

    let projected = apply_selector(&document, &selector);

    if let (Some(source), Some(result)) = (document.as_object(), projected.as_object()) {
        for (key, value) in result {
            assert_eq!(source.get(key), Some(value));
        }
    }
});
