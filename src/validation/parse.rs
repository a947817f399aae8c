//! Diagnostic parsers for the type-check and build stages.
//!
//! Recognized forms:
//!
//! ```text
//! src/App.tsx(12,5): error TS2304: Cannot find name 'foo'.
//! src/App.tsx:12:5 - error TS2304: Cannot find name 'foo'.
//! error TS5083: Cannot read file 'tsconfig.json'.
//! error SyntaxError: Unexpected token at src/App.tsx:12:5
//! src/App.tsx:12:5: ERROR: Expected ";" but found "x"
//! ✘ [ERROR] Expected ";" but found "x"      (location on a following line)
//! ```

use super::{DiagnosticKind, Severity, Stage, ValidationError};
use regex::{Captures, Regex};
use std::collections::HashSet;
use std::sync::LazyLock;

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("ANSI regex is valid"));

static TSC_PAREN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?P<file>[^\s(][^(]*?)\((?P<line>\d+),(?P<col>\d+)\):\s+(?P<sev>error|warning)\s+(?P<code>TS\d+):\s*(?P<msg>.*)$",
    )
    .expect("tsc paren regex is valid")
});

static TSC_PRETTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?P<file>[^\s:]+):(?P<line>\d+):(?P<col>\d+)\s+-\s+(?P<sev>error|warning)\s+(?P<code>TS\d+):\s*(?P<msg>.*)$",
    )
    .expect("tsc pretty regex is valid")
});

static TSC_GLOBAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<sev>error|warning)\s+(?P<code>TS\d+):\s*(?P<msg>.*)$")
        .expect("tsc global regex is valid")
});

static BUILD_AT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?i:error)\s+(?P<code>[A-Za-z][\w.]*):\s*(?P<msg>.*?)\s+at\s+(?P<file>[^\s:]+):(?P<line>\d+):(?P<col>\d+)\s*$",
    )
    .expect("build-at regex is valid")
});

static BUILD_LOCATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?P<file>[^\s:]+):(?P<line>\d+):(?P<col>\d+):\s+(?P<sev>(?i:error|warning)):\s*(?P<msg>.*)$",
    )
    .expect("build located regex is valid")
});

static BRACKETED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[^\[\s]+\s+)?\[(?P<sev>ERROR|WARNING)\]\s*(?P<msg>.*)$")
        .expect("bracketed regex is valid")
});

static LOCATION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<file>[^\s:]+):(?P<line>\d+):(?P<col>\d+):?\s*$")
        .expect("location regex is valid")
});

/// Non-empty lines searched after a `[ERROR]` header for its location.
const LOCATION_LOOKAHEAD: usize = 3;

pub fn strip_ansi(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").into_owned()
}

fn severity(raw: &str) -> Severity {
    if raw.eq_ignore_ascii_case("warning") {
        Severity::Warning
    } else {
        Severity::Error
    }
}

fn number(caps: &Captures<'_>, name: &str) -> Option<u32> {
    caps.name(name).and_then(|m| m.as_str().parse().ok())
}

fn text(caps: &Captures<'_>, name: &str) -> Option<String> {
    caps.name(name)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn from_captures(caps: &Captures<'_>, default_severity: Severity, stage: Stage) -> ValidationError {
    ValidationError {
        file: text(caps, "file"),
        line: number(caps, "line"),
        column: number(caps, "col"),
        message: text(caps, "msg").unwrap_or_default(),
        kind: DiagnosticKind::Syntax,
        severity: caps
            .name("sev")
            .map_or(default_severity, |m| severity(m.as_str())),
        code: text(caps, "code"),
        stage,
    }
}

fn parse_tsc_line(line: &str, stage: Stage) -> Option<ValidationError> {
    [&*TSC_PAREN, &*TSC_PRETTY, &*TSC_GLOBAL]
        .into_iter()
        .find_map(|re| re.captures(line))
        .map(|caps| from_captures(&caps, Severity::Error, stage))
}

fn dedupe(errors: Vec<ValidationError>) -> Vec<ValidationError> {
    let mut seen = HashSet::new();
    errors
        .into_iter()
        .filter(|e| {
            seen.insert((
                e.file.clone(),
                e.line,
                e.column,
                e.message.clone(),
                e.severity,
            ))
        })
        .collect()
}

/// Diagnostics from type-checker output.
pub fn parse_typecheck(output: &str) -> Vec<ValidationError> {
    let clean = strip_ansi(output);
    let parsed = clean
        .lines()
        .filter_map(|line| parse_tsc_line(line, Stage::TypeCheck))
        .collect();
    dedupe(parsed)
}

/// Diagnostics from build-tool output. Type-checker lines printed by the
/// build (e.g. `tsc && vite build`) are recognized too.
pub fn parse_build(output: &str) -> Vec<ValidationError> {
    let clean = strip_ansi(output);
    let lines: Vec<&str> = clean.lines().collect();
    let mut parsed = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        if let Some(caps) = BUILD_AT.captures(line) {
            parsed.push(from_captures(&caps, Severity::Error, Stage::Build));
        } else if let Some(caps) = BUILD_LOCATED.captures(line) {
            parsed.push(from_captures(&caps, Severity::Error, Stage::Build));
        } else if let Some(error) = parse_tsc_line(line, Stage::Build) {
            parsed.push(error);
        } else if let Some(caps) = BRACKETED.captures(line) {
            let mut error = from_captures(&caps, Severity::Error, Stage::Build);
            if let Some(loc) = location_after(&lines[idx + 1..]) {
                error.file = text(&loc, "file");
                error.line = number(&loc, "line");
                error.column = number(&loc, "col");
            }
            parsed.push(error);
        }
    }

    dedupe(parsed)
}

/// Location printed under an esbuild-style `[ERROR]` header, if any comes
/// before the next header.
fn location_after<'a>(rest: &[&'a str]) -> Option<Captures<'a>> {
    rest.iter()
        .copied()
        .filter(|line| !line.trim().is_empty())
        .take(LOCATION_LOOKAHEAD)
        .take_while(|line| !BRACKETED.is_match(line))
        .find_map(|line| LOCATION_LINE.captures(line))
}
