#![no_main]

use cipherhunt::engine::Action;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(action) = serde_json::from_slice::<Action>(data) {
        let _ = action.name();
        let _ = serde_json::to_vec(&action);
    }
});
