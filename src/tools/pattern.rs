//! Glob compilation and match ordering.
//!
//! A glob is compiled once into an anchored regex and reused for every path
//! of a scan:
//!
//! - `**/` matches zero or more whole directories, a bare `**` matches
//!   anything including `/`
//! - `*` matches within one path segment
//! - `?` matches one character other than `/`
//!
//! Everything else is matched literally. Matching is case-insensitive unless
//! the caller asks otherwise.

use super::error::ToolError;
use super::traits::FileEntry;
use chrono::{DateTime, Duration, Utc};
use regex::{Regex, RegexBuilder};

/// Directories never descended into by recursive scans: VCS metadata,
/// dependency caches, build output and framework caches.
pub const SKIPPED_DIRS: &[&str] = &[".git", "node_modules", "dist", "build", ".next", ".cache"];

/// Translate a glob into an anchored regular expression.
pub fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() * 2 + 2);
    out.push('^');

    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("(?:.*/)?");
                } else {
                    out.push_str(".*");
                }
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            other => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(other.encode_utf8(&mut buf)));
            }
        }
    }

    out.push('$');
    out
}

/// A compiled glob.
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    pattern: String,
    regex: Regex,
}

impl GlobMatcher {
    /// Case-insensitive matcher.
    pub fn new(pattern: &str) -> Result<Self, ToolError> {
        Self::with_case_sensitivity(pattern, false)
    }

    pub fn with_case_sensitivity(pattern: &str, case_sensitive: bool) -> Result<Self, ToolError> {
        let trimmed = pattern.trim().trim_start_matches("./");
        if trimmed.is_empty() {
            return Err(ToolError::Pattern {
                pattern: pattern.to_string(),
                message: "pattern is empty".to_string(),
            });
        }
        let regex = RegexBuilder::new(&glob_to_regex(trimmed))
            .case_insensitive(!case_sensitive)
            .build()
            .map_err(|e| ToolError::Pattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            pattern: trimmed.to_string(),
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Match a complete candidate string (a name or a relative path).
    pub fn is_match(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }

    /// Filter-style match for a root-relative path: globs without a `/` are
    /// tested against the file name, others against the whole path.
    pub fn matches_file(&self, relative_path: &str) -> bool {
        if self.pattern.contains('/') {
            self.is_match(relative_path)
        } else {
            let name = relative_path.rsplit('/').next().unwrap_or(relative_path);
            self.is_match(name)
        }
    }
}

/// Single-segment "ignore this name" predicates for directory listings.
#[derive(Debug, Clone, Default)]
pub struct IgnoreList {
    matchers: Vec<GlobMatcher>,
}

impl IgnoreList {
    pub fn new(patterns: &[String]) -> Result<Self, ToolError> {
        let matchers = patterns
            .iter()
            .filter(|p| !p.trim().is_empty())
            .map(|p| GlobMatcher::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { matchers })
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.matchers.iter().any(|m| m.is_match(name))
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

/// Recently modified files first (newest first), then everything else by
/// path. `window` decides what counts as recent.
pub fn order_by_recency(
    entries: Vec<FileEntry>,
    now: DateTime<Utc>,
    window: Duration,
) -> Vec<FileEntry> {
    let cutoff = now - window;
    let (mut recent, mut older): (Vec<_>, Vec<_>) =
        entries.into_iter().partition(|e| e.modified_time > cutoff);

    recent.sort_by(|a, b| {
        b.modified_time
            .cmp(&a.modified_time)
            .then_with(|| a.path.cmp(&b.path))
    });
    older.sort_by(|a, b| a.path.cmp(&b.path));

    recent.extend(older);
    recent
}
