#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(table) = da_resources::ResourceTable::parse(data) {
        let _ = table.summary();
    }
});
