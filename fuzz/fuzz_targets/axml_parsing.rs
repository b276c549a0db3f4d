#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let partial = da_resources::xml::decode(data);
    let _ = da_resources::manifest::from_partial(&partial, None, &da_resources::Config::default());
});
