#![no_main]
use libfuzzer_sys::fuzz_target;
use toolkernel::tools::guard::normalize_path;
use toolkernel::tools::pattern::GlobMatcher;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // First line is the glob, the rest are candidate paths.
        let mut lines = s.lines();
        let Some(pattern) = lines.next() else {
            return;
        };
        if let Ok(matcher) = GlobMatcher::new(pattern) {
            for candidate in lines {
                let _ = matcher.is_match(candidate);
                let _ = matcher.matches_file(candidate);
            }
        }

        let normalized = normalize_path(s);
        assert!(normalized.starts_with('/'));
        assert!(!normalized.split('/').any(|seg| seg == ".."));
    }
});
