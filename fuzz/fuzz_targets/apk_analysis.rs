#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = da_analysis::analyze(data, &da_analysis::Options::new());
});
