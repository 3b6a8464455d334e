#![no_main]

use std::path::Path;

use cipherhunt::config::ConfigLoader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(yaml_str) = std::str::from_utf8(data) {
        // Errors are fine; panics are not
        let _ = ConfigLoader::default().load_str(yaml_str, Path::new("fuzz.yaml"));
    }
});
