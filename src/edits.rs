//! Span edits over file text and change-only persistence.

use std::ops::Range;
use std::path::Path;

use crate::error::Error;

/// Replace the bytes in `span` with `replacement`. An empty span is an insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    /// Text to put in place of the span.
    pub replacement: String,
    /// Byte range in the original text.
    pub span: Range<usize>,
}

impl Edit {
    /// Insert `text` at `at`.
    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        return Self {
            replacement: text.into(),
            span: at..at,
        };
    }

    /// Delete the bytes in `span`.
    pub const fn remove(span: Range<usize>) -> Self {
        return Self {
            replacement: String::new(),
            span,
        };
    }

    /// Replace the bytes in `span` with `text`.
    pub fn replace(span: Range<usize>, text: impl Into<String>) -> Self {
        return Self {
            replacement: text.into(),
            span,
        };
    }

    /// Whether two edits touch a common byte. Insertions only collide with
    /// edits that strictly contain their position.
    const fn overlaps(&self, other: &Self) -> bool {
        return self.span.start < other.span.end && other.span.start < self.span.end;
    }
}

/// Apply edits to `content`. When edits overlap, the one starting first (and,
/// for equal starts, the longer one) wins; the others are dropped, so removing
/// a block swallows any edits inside it.
pub fn apply(content: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by(|a, b| return a.span.start.cmp(&b.span.start).then(b.span.end.cmp(&a.span.end)));

    let mut accepted: Vec<Edit> = Vec::with_capacity(edits.len());
    for edit in edits {
        let in_bounds = content.is_char_boundary(edit.span.start) && content.is_char_boundary(edit.span.end);
        if !in_bounds || edit.span.start > edit.span.end || accepted.iter().any(|a| return a.overlaps(&edit)) {
            tracing::debug!(span = ?edit.span, "dropping overlapping or out-of-bounds edit");
            continue;
        }
        accepted.push(edit);
    }

    // Back to front; at a shared start the longer edit goes first so an
    // insertion there lands in front of the replaced text.
    accepted.sort_by(|a, b| return b.span.start.cmp(&a.span.start).then(b.span.end.cmp(&a.span.end)));
    let mut output = content.to_string();
    for edit in &accepted {
        output.replace_range(edit.span.clone(), &edit.replacement);
    }
    return output;
}

/// Extend `span` to whole lines when nothing but whitespace shares those
/// lines with it, so removing an element does not leave an empty line behind.
pub fn expand_to_lines(content: &str, span: Range<usize>) -> Range<usize> {
    let start = line_start(content, span.start);
    let before = content.get(start..span.start).unwrap_or("");
    let end_of_line = content.get(span.end..).and_then(|rest| return rest.find('\n'));
    let (after, end) = match end_of_line {
        None => (content.get(span.end..).unwrap_or(""), content.len()),
        Some(offset) => {
            let newline = span.end.saturating_add(offset);
            (content.get(span.end..newline).unwrap_or(""), newline.saturating_add(1))
        },
    };

    if before.trim().is_empty() && after.trim().is_empty() {
        return start..end;
    }
    return span;
}

/// Whitespace at the start of the line containing `pos`.
pub fn indentation_at(content: &str, pos: usize) -> &str {
    let start = line_start(content, pos);
    let line = content.get(start..).unwrap_or("");
    let width = line.len().saturating_sub(line.trim_start_matches([' ', '\t']).len());
    return line.get(..width).unwrap_or("");
}

/// The file's line terminator, judged by its first line.
pub fn line_ending(content: &str) -> &'static str {
    return match content.find('\n') {
        Some(pos) if pos > 0 && content.get(pos.saturating_sub(1)..pos) == Some("\r") => "\r\n",
        _ => "\n",
    };
}

/// Offset of the first byte of the line containing `pos`.
pub fn line_start(content: &str, pos: usize) -> usize {
    return content
        .get(..pos)
        .and_then(|head| return head.rfind('\n'))
        .map_or(0, |i| return i.saturating_add(1));
}

/// Offset just past the line terminator of the line containing `pos`.
pub fn next_line_start(content: &str, pos: usize) -> usize {
    return content
        .get(pos..)
        .and_then(|rest| return rest.find('\n'))
        .map_or(content.len(), |i| return pos.saturating_add(i).saturating_add(1));
}

/// Blank-line convention for project files: the `<Project>` line and every
/// two-space-indented closing tag are followed by exactly one blank line,
/// except at the end of the file. Idempotent.
pub fn normalize_blank_lines(content: &str) -> String {
    let eol = line_ending(content);
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let mut output = String::with_capacity(content.len().saturating_add(64));

    let mut i = 0;
    while let Some(line) = lines.get(i) {
        output.push_str(line);
        i = i.saturating_add(1);
        let body = line.trim_end_matches(['\r', '\n']);
        if !(body.starts_with("<Project") || body.starts_with("  </")) {
            continue;
        }
        let mut next = i;
        while lines.get(next).is_some_and(|l| return l.trim().is_empty()) {
            next = next.saturating_add(1);
        }
        // Trailing blank lines at the end of the file are left as they are.
        if next >= lines.len() {
            continue;
        }
        output.push_str(eol);
        i = next;
    }

    return output;
}

/// Write `content` to `path` only if it differs from what is on disk now.
/// Returns whether a write happened.
///
/// # Errors
///
/// Returns `Error::Io` if the file cannot be read (other than not-found) or written.
pub fn persist(path: &Path, content: &str) -> Result<bool, Error> {
    let current = match std::fs::read_to_string(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(Error::Io(e)),
        Ok(c) => Some(c),
    };
    if current.as_deref() == Some(content) {
        return Ok(false);
    }
    std::fs::write(path, content)?;
    return Ok(true);
}
