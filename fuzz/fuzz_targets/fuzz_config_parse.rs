#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Invalid config must come back as an error, never a panic.
        let _ = toolkernel::KernelConfig::from_toml(s);
    }
});
