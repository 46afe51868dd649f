//! Fuzz target for sample manifest decoding.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tw_core::sample::store::Manifest;

fuzz_target!(|data: &[u8]| {
    if let Ok(manifest) = serde_json::from_slice::<Manifest>(data) {
        let _ = manifest.validate();
    }
});
