#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(source) = std::str::from_utf8(data) {
        // Neither parser should panic on any input.
        let _ = kernbind_parser::parse(source);
        let _ = kernbind_parser::parse_sampler_map(source);
    }
});
