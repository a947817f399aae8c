//! Position-aligned line diff.
//!
//! This is deliberately not a minimal-edit diff. Lines are compared index by
//! index; each differing position yields a removal of the old line followed
//! by an addition of the new one. Consumers depend on this exact output, so
//! an insertion near the top of a file shows every following line as changed.

use super::content::split_lines;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffOp {
    Added,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffLine {
    pub op: DiffOp,
    /// 1-based position in the aligned walk.
    pub line: usize,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileDiff {
    pub lines: Vec<DiffLine>,
    pub additions: usize,
    pub deletions: usize,
}

impl FileDiff {
    /// `old` is `None` for a file that did not exist before.
    pub fn compute(old: Option<&str>, new: &str) -> Self {
        let mut diff = Self::default();

        match old {
            None => {
                if !new.is_empty() {
                    for (i, line) in split_lines(new).into_iter().enumerate() {
                        diff.push(DiffOp::Added, i + 1, line);
                    }
                }
            }
            Some(old) if old == new => {}
            Some(old) if new.is_empty() => {
                for (i, line) in split_lines(old).into_iter().enumerate() {
                    diff.push(DiffOp::Removed, i + 1, line);
                }
            }
            Some(old) => {
                let old_lines = split_lines(old);
                let new_lines = split_lines(new);
                for i in 0..old_lines.len().max(new_lines.len()) {
                    let before = old_lines.get(i);
                    let after = new_lines.get(i);
                    if before == after {
                        continue;
                    }
                    if let Some(line) = before {
                        diff.push(DiffOp::Removed, i + 1, line);
                    }
                    if let Some(line) = after {
                        diff.push(DiffOp::Added, i + 1, line);
                    }
                }
            }
        }

        diff
    }

    fn push(&mut self, op: DiffOp, line: usize, text: &str) {
        match op {
            DiffOp::Added => self.additions += 1,
            DiffOp::Removed => self.deletions += 1,
        }
        self.lines.push(DiffLine {
            op,
            line,
            text: text.to_string(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// `- old` / `+ new` lines, one per diff entry.
    pub fn render(&self) -> String {
        self.lines
            .iter()
            .map(|l| match l.op {
                DiffOp::Added => format!("+ {}", l.text),
                DiffOp::Removed => format!("- {}", l.text),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_file_is_all_additions() {
        let diff = FileDiff::compute(None, "a\nb");
        assert_eq!(diff.additions, 2);
        assert_eq!(diff.deletions, 0);
        assert_eq!(diff.render(), "+ a\n+ b");
    }

    #[test]
    fn cleared_file_is_all_deletions() {
        let diff = FileDiff::compute(Some("a\nb"), "");
        assert_eq!(diff.deletions, 2);
        assert_eq!(diff.render(), "- a\n- b");
    }

    #[test]
    fn identical_content_has_no_diff() {
        assert!(FileDiff::compute(Some("same\n"), "same\n").is_empty());
        assert!(FileDiff::compute(Some(""), "").is_empty());
    }

    #[test]
    fn changed_line_is_removed_then_added() {
        let diff = FileDiff::compute(Some("hello\nworld"), "hello\nthere");
        assert_eq!(diff.render(), "- world\n+ there");
        assert_eq!(diff.lines[0].line, 2);
    }

    #[test]
    fn insertion_shifts_every_following_position() {
        let diff = FileDiff::compute(Some("a\nb"), "x\na\nb");
        assert_eq!(diff.render(), "- a\n+ x\n- b\n+ a\n+ b");
        assert_eq!(diff.additions, 3);
        assert_eq!(diff.deletions, 2);
    }

    #[test]
    fn shorter_new_content_removes_tail() {
        let diff = FileDiff::compute(Some("a\nb\nc"), "a");
        assert_eq!(diff.render(), "- b\n- c");
    }
}
