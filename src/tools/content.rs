//! File content classification and line-windowed reading.

use super::error::ToolError;

/// Extensions treated as binary. Anything else is read as text.
const BINARY_EXTENSIONS: &[&str] = &[
    // images
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "tiff", "tif", "avif", "heic",
    // documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx",
    // archives
    "zip", "tar", "gz", "tgz", "bz2", "xz", "7z", "rar", "jar",
    // media
    "mp3", "mp4", "wav", "ogg", "flac", "avi", "mov", "mkv", "webm",
    // fonts
    "woff", "woff2", "ttf", "otf", "eot",
    // executables and compiled artifacts
    "exe", "dll", "so", "dylib", "bin", "wasm", "class", "o", "a",
];

fn extension(path: &str) -> Option<String> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

pub fn is_binary_path(path: &str) -> bool {
    extension(path).is_some_and(|ext| BINARY_EXTENSIONS.contains(&ext.as_str()))
}

/// Best-effort MIME type from the extension.
pub fn mime_type(path: &str) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Decode file bytes as text, replacing invalid UTF-8.
pub fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

/// Lines as seen by the read and diff operations: split on `\n`, so a
/// trailing newline produces a final empty line.
pub fn split_lines(content: &str) -> Vec<&str> {
    content.split('\n').collect()
}

/// The slice of a text file returned by one read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineWindow {
    pub text: String,
    pub total_lines: usize,
    /// 0-based first line.
    pub start: usize,
    /// 0-based exclusive end.
    pub end: usize,
    pub is_truncated: bool,
}

impl LineWindow {
    /// 1-based inclusive range actually shown.
    pub fn lines_shown(&self) -> [usize; 2] {
        [self.start + 1, self.end]
    }

    pub fn next_offset(&self) -> Option<usize> {
        self.is_truncated.then_some(self.end)
    }
}

/// Select the lines a read returns.
///
/// Without offset and limit the whole file comes back unchanged unless it
/// exceeds `max_lines`, in which case the first `max_lines` lines are
/// returned and the window is truncated. With either one given, `offset`
/// (default 0) is the 0-based first line and `limit` (default `max_lines`)
/// the line count; an offset at or past the end is rejected.
pub fn window(
    content: &str,
    offset: Option<usize>,
    limit: Option<usize>,
    max_lines: usize,
) -> Result<LineWindow, ToolError> {
    let lines = split_lines(content);
    let total_lines = lines.len();

    if offset.is_none() && limit.is_none() {
        if total_lines <= max_lines {
            return Ok(LineWindow {
                text: content.to_string(),
                total_lines,
                start: 0,
                end: total_lines,
                is_truncated: false,
            });
        }
        return Ok(LineWindow {
            text: lines[..max_lines].join("\n"),
            total_lines,
            start: 0,
            end: max_lines,
            is_truncated: true,
        });
    }

    let start = offset.unwrap_or(0);
    let limit = limit.unwrap_or(max_lines);
    if start >= total_lines {
        return Err(ToolError::invalid_argument(format!(
            "offset {start} is beyond the end of the file ({total_lines} lines)"
        )));
    }
    let requested_end = start.saturating_add(limit);
    let end = requested_end.min(total_lines);

    Ok(LineWindow {
        text: lines[start..end].join("\n"),
        total_lines,
        start,
        end,
        is_truncated: requested_end < total_lines,
    })
}
