//! Interactive patch selection: the engine behind `hunkr`'s patch modes.
//!
//! Takes a unified diff captured from the external differ, segments it into
//! files and hunks, walks the user through accept/reject/split/edit
//! decisions per hunk, and reassembles a synthetic patch from the accepted
//! pieces for the external applier.
//!
//! The diff text lives in two append-only byte buffers (plain and, when
//! color is active, a colored rendering with one line per plain line); all
//! structural data is half-open byte ranges into those buffers. Edited hunk
//! bodies are appended to the plain buffer so earlier ranges stay valid.

pub mod apply;
pub mod edit;
pub mod interactive;
pub mod merge;
pub mod mode;
pub mod parse;
pub mod reassemble;
pub mod render;
pub mod split;

use bstr::BString;

use hunk_utils::color::Palette;
use mode::PatchMode;

/// A line as a byte range into one of the diff buffers, newline included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSpan {
    pub start: usize,
    pub len: usize,
}

impl LineSpan {
    /// The bytes of this line within `base`.
    pub fn slice<'a>(&self, base: &'a [u8]) -> &'a [u8] {
        &base[self.start..self.start + self.len]
    }
}

/// Parsed `@@` header of a hunk.
///
/// `extra_start..extra_end` covers the text after the second `@@` (e.g. the
/// function signature) through the end of the line, newline included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HunkHeader {
    pub old_offset: usize,
    pub old_count: usize,
    pub new_offset: usize,
    pub new_count: usize,
    pub extra_start: usize,
    pub extra_end: usize,
    pub colored_extra_start: usize,
    pub colored_extra_end: usize,
    /// The colored header line could not be parsed; emit it verbatim
    /// instead of synthesizing a line range.
    pub suppress_colored_line_range: bool,
}

/// Per-hunk selection state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Decision {
    #[default]
    Undecided,
    Skip,
    Use,
}

/// Snapshot of a hunk's pre-edit shape, captured on first edit so a failed
/// edit can be retried from the original.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrigHunk {
    pub start: usize,
    pub end: usize,
    pub old_offset: usize,
    pub new_offset: usize,
}

/// One hunk of a file diff.
///
/// `start..end` covers the body lines in the plain buffer; the `@@` header
/// line itself is excluded (it is re-synthesized on render). Pseudo-hunks
/// (file header, mode change, deleted-file remainder) have a zeroed header
/// and their range covers the raw lines verbatim.
#[derive(Debug, Clone, Default)]
pub struct Hunk {
    pub start: usize,
    pub end: usize,
    pub colored_start: usize,
    pub colored_end: usize,
    /// Number of sub-hunks a split would produce (runs of signed lines).
    pub splittable_into: usize,
    pub decision: Decision,
    /// Net line-count change introduced by edits of this hunk.
    pub delta: isize,
    pub header: HunkHeader,
    pub orig: Option<OrigHunk>,
    /// Pre-image lines (context plus the side consumed by the mode's
    /// direction), captured on first edit.
    pub orig_image: Vec<LineSpan>,
}

impl Hunk {
    /// True for the file-header, mode-change, and deleted-file pseudo-hunks,
    /// which are copied verbatim rather than given a synthesized header.
    pub fn is_pseudo(&self) -> bool {
        self.header.old_offset == 0 && self.header.new_offset == 0
    }
}

/// Diff of a single file: the header pseudo-hunk plus the body hunks.
#[derive(Debug, Clone, Default)]
pub struct FileDiff {
    /// Pseudo-hunk covering the `diff …` header block.
    pub head: Hunk,
    /// Body hunks. When only the mode changed, the first (and only) entry is
    /// the mode-change pseudo-hunk, nested inside `head`'s range.
    pub hunks: Vec<Hunk>,
    pub deleted: bool,
    pub added: bool,
    pub mode_change: bool,
    pub binary: bool,
}

/// The parsed diff: both byte buffers plus the per-file structure.
#[derive(Debug, Clone, Default)]
pub struct ParsedDiff {
    pub plain: BString,
    pub colored: BString,
    pub files: Vec<FileDiff>,
}

impl ParsedDiff {
    /// True when a colored rendering accompanies the plain diff.
    pub fn has_color(&self) -> bool {
        !self.colored.is_empty()
    }
}

/// Everything the selection session operates on.
pub struct SelectState {
    pub diff: ParsedDiff,
    pub mode: &'static PatchMode,
    pub colors: Palette,
}

/// Offset of the first byte after the line containing `offset` (or the
/// buffer length when the line is unterminated).
pub(crate) fn find_next_line(buf: &[u8], offset: usize) -> usize {
    debug_assert!(offset < buf.len());
    match buf[offset..].iter().position(|&b| b == b'\n') {
        Some(i) => offset + i + 1,
        None => buf.len(),
    }
}

/// Error types for the selection engine.
///
/// Variants up to `Internal` abort the session; the rest are surfaced to
/// the user by the interactive loop, which then continues.
#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    #[error("could not parse hunk header '{0}'")]
    BadHunkHeader(BString),

    #[error("mismatched output from the interactive diff filter;\nthe filter must keep a one-to-one correspondence\nbetween its input and output lines")]
    MismatchedColoredOutput,

    #[error("invalid diff: {0}")]
    InvalidDiff(&'static str),

    #[error("internal error: {0}")]
    Internal(&'static str),

    #[error("expected context line #{line} in:\n{text}")]
    ExpectedContextLine { line: usize, text: BString },

    #[error("hunks do not overlap:\n{first}\n\tdoes not end with:\n{second}")]
    HunksDoNotOverlap { first: BString, second: BString },

    #[error("edited pre-image does not match the original")]
    PreimageMismatch,

    #[error("unable to determine new hunk offset")]
    AmbiguousOffset,

    #[error("preimage extends beyond beginning of file")]
    PreimageBeforeStart,

    #[error(transparent)]
    Util(#[from] hunk_utils::UtilError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SelectError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_defaults_to_undecided() {
        assert_eq!(Decision::default(), Decision::Undecided);
        assert_eq!(Hunk::default().decision, Decision::Undecided);
    }

    #[test]
    fn zeroed_header_marks_pseudo_hunk() {
        let mut hunk = Hunk::default();
        assert!(hunk.is_pseudo());
        hunk.header.new_offset = 1;
        assert!(!hunk.is_pseudo());
    }

    #[test]
    fn next_line_handles_unterminated_tail() {
        assert_eq!(find_next_line(b"ab\ncd", 0), 3);
        assert_eq!(find_next_line(b"ab\ncd", 3), 5);
    }
}
