#![no_main]
use libfuzzer_sys::fuzz_target;
use toolkernel::validation::parse::{parse_build, parse_typecheck, strip_ansi};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let stripped = strip_ansi(&text);
    assert!(stripped.len() <= text.len());
    let _ = parse_typecheck(&text);
    let _ = parse_build(&text);
});
