//! Validating a user-edited hunk.
//!
//! The edited text is lexed by first byte; retained lines are appended to
//! the plain buffer and become the hunk's new body. When the user deleted
//! leading context, the new offset is inferred by a
//! longest-common-substring-of-lines computation between the original
//! pre-image and the edited one. Ambiguous matches are refused rather than
//! guessed at.

use bstr::BString;

use crate::parse::parse_hunk_header_line;
use crate::render::render_hunk;
use crate::{
    find_next_line, Hunk, LineSpan, OrigHunk, ParsedDiff, Result, SelectError, SelectState,
};

/// Outcome of parsing an edited hunk.
#[derive(Debug)]
pub enum EditParse {
    /// The edit was valid and installed; the hunk's body now lives at the
    /// end of the plain buffer.
    Ok,
    /// The user deleted everything (or left only context); the edit is
    /// cancelled and the hunk must be restored by the caller.
    Abandoned,
    /// The edit was invalid. The hunk now points at an annotated copy of
    /// the edited text so a re-edit shows the errors in place; an offset
    /// inference error, if any, is carried for display.
    Failed(Option<SelectError>),
}

/// Per-line validation errors of an edited hunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditErrorKind {
    BadLine,
    DuplicateHeader,
    HeaderNotFirstLine,
    BadIncompleteLine,
    DuplicateIncomplete,
    FirstLineIsIncomplete,
    IncompleteContextBeforeAddition,
    IncompleteContextBeforeDeletion,
    IncompleteNotLast,
}

impl EditErrorKind {
    pub fn message(self) -> &'static str {
        match self {
            EditErrorKind::BadLine => "invalid line",
            EditErrorKind::DuplicateHeader => "can only handle a single hunk",
            EditErrorKind::HeaderNotFirstLine => "hunk header must be the first line",
            EditErrorKind::BadIncompleteLine => {
                "'\\' line must start '\\ ' and be at least 12 characters"
            }
            EditErrorKind::DuplicateIncomplete => "duplicate '\\' line",
            EditErrorKind::FirstLineIsIncomplete => "hunk cannot begin with '\\' line",
            EditErrorKind::IncompleteContextBeforeAddition => "addition after '\\' context line",
            EditErrorKind::IncompleteContextBeforeDeletion => "deletion after '\\' context line",
            EditErrorKind::IncompleteNotLast => "'\\' must be last line",
        }
    }
}

/// External editor interface: hand the scratch bytes over, get the edited
/// bytes back.
pub trait HunkEditor {
    fn edit(&mut self, name_hint: &str, contents: &[u8]) -> hunk_utils::Result<Vec<u8>>;
}

/// [`HunkEditor`] backed by the `VISUAL`/`EDITOR` command.
pub struct ExternalEditor {
    config: hunk_utils::editor::EditorConfig,
}

impl ExternalEditor {
    pub fn from_env() -> Self {
        Self {
            config: hunk_utils::editor::EditorConfig::from_env(),
        }
    }
}

impl HunkEditor for ExternalEditor {
    fn edit(&mut self, name_hint: &str, contents: &[u8]) -> hunk_utils::Result<Vec<u8>> {
        self.config.edit_buffer(name_hint, contents)
    }
}

/// Append `text` to `out` with every line comment-prefixed.
fn commented(out: &mut Vec<u8>, text: &str) {
    for line in text.lines() {
        if line.is_empty() {
            out.extend_from_slice(b"#\n");
        } else {
            out.extend_from_slice(format!("# {line}\n").as_bytes());
        }
    }
}

/// Build the scratch buffer handed to the editor: a quick-guide banner, the
/// hunk itself, and the mode's instructions.
pub fn compose_scratch(state: &SelectState, file_index: usize, hunk_index: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    commented(
        &mut buf,
        "Manual hunk edit mode -- see bottom for a quick guide.\n",
    );
    render_hunk(
        state,
        &state.diff.files[file_index].hunks[hunk_index],
        0,
        false,
        &mut buf,
    );
    let (removal, addition) = if state.mode.is_reverse {
        ('+', '-')
    } else {
        ('-', '+')
    };
    commented(
        &mut buf,
        &format!(
            "---\n\
             To remove '{removal}' lines, make them ' ' lines (context).\n\
             To remove '{addition}' lines, delete them.\n\
             Lines starting with # will be removed.\n"
        ),
    );
    commented(&mut buf, &format!("{}\n", state.mode.edit_hunk_hint));
    commented(
        &mut buf,
        "If it does not apply cleanly, you will be given an opportunity to\n\
         edit again.  If all lines of the hunk are removed, then the edit is\n\
         aborted and the hunk is left unchanged.\n",
    );
    buf
}

/// Capture the hunk's pre-edit shape and pre-image, once.
///
/// The pre-image collects context lines plus the side the mode consumes
/// (removals normally, additions in reverse), with any incomplete-line
/// marker attached to the previous collected line.
pub fn snapshot_orig(diff: &mut ParsedDiff, is_reverse: bool, file_index: usize, hunk_index: usize) {
    let ParsedDiff { plain, files, .. } = diff;
    let hunk = &mut files[file_index].hunks[hunk_index];
    if hunk.orig.is_some() {
        return;
    }
    hunk.orig = Some(OrigHunk {
        start: hunk.start,
        end: hunk.end,
        old_offset: hunk.header.old_offset,
        new_offset: hunk.header.new_offset,
    });

    let mut allow_incomplete = false;
    let mut i = hunk.start;
    while i < hunk.end {
        let next = find_next_line(plain, i);
        let c = plain[i];
        if c == b' '
            || (is_reverse && c == b'+')
            || (!is_reverse && c == b'-')
            || (allow_incomplete && c == b'\\')
        {
            hunk.orig_image.push(LineSpan {
                start: i,
                len: next - i,
            });
            allow_incomplete = c != b'\\';
        } else {
            allow_incomplete = false;
        }
        i = next;
    }
}

struct EditedHunk {
    /// Pre-image spans into the edited text.
    image: Vec<LineSpan>,
    errors: Vec<(usize, EditErrorKind)>,
    /// Where the re-render with error annotations begins (past the header).
    start: usize,
    has_hunk_header: bool,
    context_only: bool,
    old_offset: usize,
    old_count: usize,
    new_count: usize,
}

/// Parse the text that came back from the editor and install it as the
/// hunk's new body.
pub fn parse_edited_hunk(
    state: &mut SelectState,
    file_index: usize,
    hunk_index: usize,
    buf: &[u8],
) -> Result<EditParse> {
    let is_reverse = state.mode.is_reverse;
    snapshot_orig(&mut state.diff, is_reverse, file_index, hunk_index);
    let ParsedDiff { plain, files, .. } = &mut state.diff;
    let hunk = &mut files[file_index].hunks[hunk_index];

    let plain_len = plain.len();
    let mut body_start = plain_len;
    let mut edited = EditedHunk {
        image: Vec::new(),
        errors: Vec::new(),
        start: 0,
        has_hunk_header: false,
        context_only: true,
        old_offset: 0,
        old_count: 0,
        new_count: 0,
    };
    // Recorded incomplete-line markers with the sign they followed.
    let mut incomplete: Vec<(usize, u8)> = Vec::new();
    let (mut last_context, mut last_minus, mut last_plus) = (None, None, None);
    let mut in_hunk = false;
    let mut sign = 0u8;

    let mut i = 0;
    while i < buf.len() {
        let next = find_next_line(buf, i);
        let span = LineSpan {
            start: i,
            len: next - i,
        };
        match buf[i] {
            b'+' => {
                if is_reverse {
                    edited.image.push(span);
                }
                edited.new_count += 1;
                in_hunk = true;
                edited.context_only = false;
                sign = b'+';
                last_plus = Some(i);
                plain.extend_from_slice(&buf[i..next]);
            }
            b'-' => {
                if !is_reverse {
                    edited.image.push(span);
                }
                edited.old_count += 1;
                in_hunk = true;
                edited.context_only = false;
                sign = b'-';
                last_minus = Some(i);
                plain.extend_from_slice(&buf[i..next]);
            }
            // Editors tend to strip the lone space of empty context lines.
            b' ' | b'\n' | b'\r' => {
                edited.image.push(span);
                edited.old_count += 1;
                edited.new_count += 1;
                in_hunk = true;
                sign = b' ';
                last_context = Some(i);
                plain.extend_from_slice(&buf[i..next]);
            }
            b'\\' => {
                // The applier requires '\ ' and at least 12 bytes.
                if next - i > 12 && buf.get(i + 1) == Some(&b' ') {
                    if sign == b' '
                        || (sign == b'-' && !is_reverse)
                        || (sign == b'+' && is_reverse)
                    {
                        edited.image.push(span);
                    }
                    plain.extend_from_slice(&buf[i..next]);
                    incomplete.push((i, sign));
                } else {
                    edited.errors.push((i, EditErrorKind::BadIncompleteLine));
                }
            }
            b'@' => {
                if let Some((old_off, _, _, _, _)) = parse_hunk_header_line(&buf[i..next]) {
                    if edited.has_hunk_header {
                        edited.errors.push((i, EditErrorKind::DuplicateHeader));
                    } else if in_hunk {
                        edited.errors.push((i, EditErrorKind::HeaderNotFirstLine));
                    } else {
                        body_start = plain.len();
                        edited.old_offset = old_off;
                        edited.start = next;
                        edited.has_hunk_header = true;
                    }
                } else if in_hunk {
                    edited.errors.push((i, EditErrorKind::BadLine));
                } else {
                    // Ignore a bad hunk header before any body lines.
                    edited.start = next;
                }
                sign = b'@';
            }
            b'#' => {}
            _ => edited.errors.push((i, EditErrorKind::BadLine)),
        }
        i = next;
    }

    process_incomplete(&mut edited, &incomplete, last_context, last_minus, last_plus);

    let inference_error = if edited.errors.is_empty() {
        check_edited_image(plain, hunk, &edited, buf)
    } else {
        None
    };

    if !edited.errors.is_empty() || inference_error.is_some() {
        plain.truncate(plain_len);
        insert_hunk_errors(plain, &edited, buf);
        hunk.start = plain_len;
        hunk.end = plain.len();
        return Ok(EditParse::Failed(inference_error));
    }

    hunk.start = body_start;
    hunk.end = plain.len();

    if (hunk.end == hunk.start && !edited.has_hunk_header)
        || (hunk.end != hunk.start && edited.context_only)
    {
        // The user aborted editing by deleting everything.
        return Ok(EditParse::Abandoned);
    }

    hunk.delta += (hunk.header.old_count as isize - hunk.header.new_count as isize)
        - (edited.old_count as isize - edited.new_count as isize);
    hunk.header.old_count = edited.old_count;
    hunk.header.new_count = edited.new_count;

    Ok(EditParse::Ok)
}

/// Apply the ordering rules for `\` markers once the whole buffer has been
/// scanned (their validity depends on the *last* line of each sign).
fn process_incomplete(
    edited: &mut EditedHunk,
    incomplete: &[(usize, u8)],
    last_context: Option<usize>,
    last_minus: Option<usize>,
    last_plus: Option<usize>,
) {
    let (mut context, mut minus, mut plus) = (false, false, false);
    for &(start, sign) in incomplete {
        match sign {
            0 | b'@' => edited
                .errors
                .push((start, EditErrorKind::FirstLineIsIncomplete)),
            b' ' => {
                if last_context.is_some_and(|pos| start < pos) {
                    edited.errors.push((start, EditErrorKind::IncompleteNotLast));
                } else if last_minus.is_some_and(|pos| start < pos) {
                    edited
                        .errors
                        .push((start, EditErrorKind::IncompleteContextBeforeDeletion));
                } else if last_plus.is_some_and(|pos| start < pos) {
                    edited
                        .errors
                        .push((start, EditErrorKind::IncompleteContextBeforeAddition));
                } else if context {
                    edited
                        .errors
                        .push((start, EditErrorKind::DuplicateIncomplete));
                } else {
                    context = true;
                }
            }
            b'-' => {
                if last_minus.is_some_and(|pos| start < pos) {
                    edited.errors.push((start, EditErrorKind::IncompleteNotLast));
                } else if minus {
                    edited
                        .errors
                        .push((start, EditErrorKind::DuplicateIncomplete));
                } else {
                    minus = true;
                }
            }
            b'+' => {
                if last_plus.is_some_and(|pos| start < pos) {
                    edited.errors.push((start, EditErrorKind::IncompleteNotLast));
                } else if plus {
                    edited
                        .errors
                        .push((start, EditErrorKind::DuplicateIncomplete));
                } else {
                    plus = true;
                }
            }
            _ => {}
        }
    }
}

/// Re-render the edited text into the plain buffer with an error annotation
/// immediately before each offending line. Comment lines are dropped.
fn insert_hunk_errors(plain: &mut BString, edited: &EditedHunk, buf: &[u8]) {
    let mut errors = edited.errors.clone();
    errors.sort_by_key(|&(pos, _)| pos);
    let mut j = 0;
    let mut i = edited.start;
    while i < buf.len() {
        let next = find_next_line(buf, i);
        if j < errors.len() && errors[j].0 == i {
            plain.extend_from_slice(format!("# error: {}\n", errors[j].1.message()).as_bytes());
            j += 1;
        }
        if buf[i] != b'#' {
            plain.extend_from_slice(&buf[i..next]);
        }
        i = next;
    }
}

/// Line equality for the pre-image comparison: the sign column is ignored,
/// an edited bare newline matches an empty context line, and incomplete
/// markers only match each other.
fn line_eq(base_a: &[u8], a: LineSpan, base_b: &[u8], b: LineSpan) -> bool {
    let p = a.slice(base_a);
    let q = b.slice(base_b);
    if p[0] != b'\\' && q[0] != b'\\' {
        if p.len() == q.len() {
            p[1..] == q[1..]
        } else {
            q.len() == 1 && p.len() == 2 && p[0] == b' '
        }
    } else {
        p[0] == q[0]
    }
}

struct Matches {
    /// Longest common substring (contiguous lines) length.
    len_str: usize,
    /// Longest common subsequence length.
    len_seq: usize,
    /// `(off_a, off_b)` starts of every maximal substring occurrence.
    at: Vec<(usize, usize)>,
}

/// Longest common substring of lines between two images, tracking the
/// subsequence length alongside so a candidate can be required to cover
/// everything the two images share.
fn lcs(base_a: &[u8], a: &[LineSpan], base_b: &[u8], b: &[LineSpan]) -> Matches {
    let n = b.len();
    let mut matches = Matches {
        len_str: 0,
        len_seq: 0,
        at: Vec::new(),
    };
    let mut prev_seq = vec![0usize; n];
    let mut prev_str = vec![0usize; n];
    let mut last_seq = 0;

    for i in 0..a.len() {
        let mut cur_seq = vec![0usize; n];
        let mut cur_str = vec![0usize; n];
        for j in 0..n {
            if line_eq(base_a, a[i], base_b, b[j]) {
                let (seq0, str0) = if i == 0 || j == 0 {
                    (0, 0)
                } else {
                    (prev_seq[j - 1], prev_str[j - 1])
                };
                cur_seq[j] = seq0 + 1;
                cur_str[j] = str0 + 1;
                if cur_str[j] > matches.len_str {
                    matches.len_str = cur_str[j];
                    matches.at.clear();
                }
                if cur_str[j] >= matches.len_str {
                    matches
                        .at
                        .push((i + 1 - cur_str[j], j + 1 - cur_str[j]));
                }
            } else {
                let up = prev_seq[j];
                let left = if j > 0 { cur_seq[j - 1] } else { 0 };
                cur_seq[j] = up.max(left);
                cur_str[j] = 0;
            }
            last_seq = cur_seq[j];
        }
        prev_seq = cur_seq;
        prev_str = cur_str;
    }
    matches.len_seq = last_seq;
    matches
}

/// Compare the edited pre-image against the original and shift the hunk's
/// offsets accordingly. Returns the error to report, if any.
fn check_edited_image(
    plain: &[u8],
    hunk: &mut Hunk,
    edited: &EditedHunk,
    buf: &[u8],
) -> Option<SelectError> {
    if hunk.orig_image.is_empty() || edited.image.is_empty() {
        return None;
    }
    let matches = lcs(plain, &hunk.orig_image, buf, &edited.image);
    check_edited_hunk_header(&matches, hunk, edited)
}

fn check_edited_hunk_header(
    matches: &Matches,
    hunk: &mut Hunk,
    edited: &EditedHunk,
) -> Option<SelectError> {
    let orig_old_offset = hunk.header.old_offset;
    let orig_new_offset = hunk.header.new_offset;
    let len = matches.len_str;
    let orig_lines = hunk.orig_image.len();
    let edited_lines = edited.image.len();

    let mut valid: Vec<(usize, usize)> = Vec::new();
    for &(off_a, off_b) in &matches.at {
        // A valid pre-image match covers everything the images share
        // (substring == subsequence) and is anchored at the start of one
        // image and the end of one.
        if matches.len_seq != len
            || (off_a != 0 && off_b != 0)
            || (off_a + len != orig_lines && off_b + len != edited_lines)
        {
            continue;
        }
        // If the user rewrote the header and its old offset is consistent
        // with this match, honor it directly. An unchanged header proves
        // nothing: editors like emacs renumber counts but not offsets.
        if edited.has_hunk_header
            && orig_old_offset != edited.old_offset
            && ((off_a == 0
                && off_b < orig_old_offset
                && orig_old_offset - off_b == edited.old_offset)
                || (off_b == 0 && orig_old_offset + off_a == edited.old_offset))
        {
            hunk.header.old_offset = edited.old_offset;
            hunk.header.new_offset =
                (edited.old_offset as isize + orig_new_offset as isize - orig_old_offset as isize)
                    as usize;
            return None;
        }
        valid.push((off_a, off_b));
    }

    if valid.len() == 1 {
        let shift = valid[0].0 as isize - valid[0].1 as isize;
        if shift > 0 || ((-shift) as usize) < orig_old_offset {
            hunk.header.old_offset = (orig_old_offset as isize + shift) as usize;
            hunk.header.new_offset = (orig_new_offset as isize + shift) as usize;
            None
        } else {
            Some(SelectError::PreimageBeforeStart)
        }
    } else if valid.is_empty() {
        Some(SelectError::PreimageMismatch)
    } else if !edited.context_only {
        Some(SelectError::AmbiguousOffset)
    } else {
        None
    }
}

/// Rebuild the colored rendering of an edited hunk: context/old/new colors
/// per line with a reset between lines, `\r` kept in front of `\n`.
pub fn recolor_hunk(state: &mut SelectState, file_index: usize, hunk_index: usize) {
    let colors = state.colors;
    let ParsedDiff {
        plain,
        colored,
        files,
    } = &mut state.diff;
    if colored.is_empty() {
        return;
    }
    let hunk = &mut files[file_index].hunks[hunk_index];

    hunk.colored_start = colored.len();
    let mut current = hunk.start;
    while current < hunk.end {
        let mut eol = current;
        while eol < hunk.end && plain[eol] != b'\n' {
            eol += 1;
        }
        let next = eol + usize::from(eol < hunk.end);
        if eol > current && plain[eol - 1] == b'\r' {
            eol -= 1;
        }

        let color = match plain[current] {
            b'-' => colors.old,
            b'+' => colors.new,
            _ => colors.context,
        };
        colored.extend_from_slice(color.as_bytes());
        let line = plain[current..eol].to_vec();
        colored.extend_from_slice(&line);
        colored.extend_from_slice(colors.reset.as_bytes());
        if next > eol {
            let terminator = plain[eol..next].to_vec();
            colored.extend_from_slice(&terminator);
        }
        current = next;
    }
    hunk.colored_end = colored.len();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::{PATCH_MODE_ADD, PATCH_MODE_RESET_HEAD};
    use crate::parse::parse_diff;
    use hunk_utils::color::Palette;

    fn state_for(diff_text: &str) -> SelectState {
        SelectState {
            diff: parse_diff(BString::from(diff_text), BString::default()).unwrap(),
            mode: &PATCH_MODE_ADD,
            colors: Palette::plain(),
        }
    }

    fn hunk_body(state: &SelectState, f: usize, h: usize) -> Vec<u8> {
        let hunk = &state.diff.files[f].hunks[h];
        state.diff.plain[hunk.start..hunk.end].to_vec()
    }

    #[test]
    fn pre_image_collects_context_and_removals() {
        let mut state =
            state_for("diff --git a/f b/f\n--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n");
        snapshot_orig(&mut state.diff, false, 0, 0);
        let hunk = &state.diff.files[0].hunks[0];
        let lines: Vec<&[u8]> = hunk
            .orig_image
            .iter()
            .map(|s| s.slice(&state.diff.plain))
            .collect();
        assert_eq!(lines, vec![b" a\n".as_slice(), b"-b\n", b" c\n"]);
    }

    #[test]
    fn reverse_mode_pre_image_collects_additions() {
        let mut state =
            state_for("diff --git a/f b/f\n--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n");
        state.mode = &PATCH_MODE_RESET_HEAD;
        snapshot_orig(&mut state.diff, true, 0, 0);
        let hunk = &state.diff.files[0].hunks[0];
        let lines: Vec<&[u8]> = hunk
            .orig_image
            .iter()
            .map(|s| s.slice(&state.diff.plain))
            .collect();
        assert_eq!(lines, vec![b" a\n".as_slice(), b"+B\n", b" c\n"]);
    }

    #[test]
    fn unchanged_edit_is_accepted_verbatim() {
        let mut state =
            state_for("diff --git a/f b/f\n--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n");
        let outcome =
            parse_edited_hunk(&mut state, 0, 0, b"@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n").unwrap();
        assert!(matches!(outcome, EditParse::Ok));
        let hunk = &state.diff.files[0].hunks[0];
        assert_eq!(hunk.delta, 0);
        assert_eq!(
            (hunk.header.old_offset, hunk.header.old_count, hunk.header.new_count),
            (1, 3, 3)
        );
        assert_eq!(hunk_body(&state, 0, 0), b" a\n-b\n+B\n c\n");
    }

    #[test]
    fn comment_lines_are_dropped() {
        let mut state =
            state_for("diff --git a/f b/f\n--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n");
        let outcome = parse_edited_hunk(
            &mut state,
            0,
            0,
            b"# a comment\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n# trailing\n",
        )
        .unwrap();
        assert!(matches!(outcome, EditParse::Ok));
        assert_eq!(hunk_body(&state, 0, 0), b" a\n-b\n+B\n c\n");
    }

    #[test]
    fn deleted_leading_context_shifts_the_offsets() {
        let mut state = state_for(
            "diff --git a/f b/f\n--- a/f\n+++ b/f\n@@ -3,4 +3,4 @@\n a\n b\n-c\n+C\n d\n",
        );
        let outcome = parse_edited_hunk(&mut state, 0, 0, b" b\n-c\n+C\n d\n").unwrap();
        assert!(matches!(outcome, EditParse::Ok));
        let hunk = &state.diff.files[0].hunks[0];
        assert_eq!(hunk.header.old_offset, 4);
        assert_eq!(hunk.header.new_offset, 4);
        assert_eq!(hunk.header.old_count, 3);
        assert_eq!(hunk.header.new_count, 3);
        // The edit removed one context line from both sides.
        assert_eq!(hunk.delta, 0);
    }

    #[test]
    fn rewritten_header_consistent_with_a_match_is_honored() {
        let mut state = state_for(
            "diff --git a/f b/f\n--- a/f\n+++ b/f\n@@ -10,2 +10,2 @@\n-foo\n+bar\n context\n",
        );
        let outcome = parse_edited_hunk(
            &mut state,
            0,
            0,
            b"@@ -11,1 +11,1 @@\n context\n+baz\n",
        )
        .unwrap();
        assert!(matches!(outcome, EditParse::Ok));
        let hunk = &state.diff.files[0].hunks[0];
        assert_eq!(hunk.header.old_offset, 11);
        assert_eq!(hunk.header.new_offset, 11);
        assert_eq!((hunk.header.old_count, hunk.header.new_count), (1, 2));
        // Old side shrank by one, new side stayed: net delta +1.
        assert_eq!(hunk.delta, 1);
    }

    #[test]
    fn unrelated_pre_image_is_rejected() {
        let mut state = state_for(
            "diff --git a/f b/f\n--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n",
        );
        let outcome = parse_edited_hunk(&mut state, 0, 0, b" x\n-y\n+z\n").unwrap();
        match outcome {
            EditParse::Failed(Some(SelectError::PreimageMismatch)) => {}
            other => panic!("expected pre-image mismatch, got {other:?}"),
        }
    }

    #[test]
    fn ambiguous_offset_is_refused() {
        // The single surviving context line occurs twice in the original
        // pre-image, so the new offset cannot be determined.
        let mut state = state_for(
            "diff --git a/f b/f\n--- a/f\n+++ b/f\n@@ -1,4 +1,2 @@\n x\n-a\n x\n-b\n",
        );
        let outcome = parse_edited_hunk(&mut state, 0, 0, b" x\n+n\n").unwrap();
        match outcome {
            EditParse::Failed(Some(SelectError::AmbiguousOffset)) => {}
            other => panic!("expected ambiguous offset, got {other:?}"),
        }
    }

    #[test]
    fn empty_buffer_abandons_the_edit() {
        let mut state = state_for(
            "diff --git a/f b/f\n--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n",
        );
        let outcome = parse_edited_hunk(&mut state, 0, 0, b"# only comments survive\n").unwrap();
        assert!(matches!(outcome, EditParse::Abandoned));
    }

    #[test]
    fn context_only_edit_abandons_the_edit() {
        let mut state = state_for(
            "diff --git a/f b/f\n--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n",
        );
        let outcome = parse_edited_hunk(&mut state, 0, 0, b" a\n").unwrap();
        assert!(matches!(outcome, EditParse::Abandoned));
    }

    #[test]
    fn invalid_lines_are_annotated_for_the_next_round() {
        let mut state = state_for(
            "diff --git a/f b/f\n--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n",
        );
        let plain_len = state.diff.plain.len();
        let outcome =
            parse_edited_hunk(&mut state, 0, 0, b"@@ -1,3 +1,3 @@\n a\nbogus\n+B\n c\n").unwrap();
        assert!(matches!(outcome, EditParse::Failed(None)));
        let body = hunk_body(&state, 0, 0);
        assert_eq!(
            body,
            b" a\n# error: invalid line\nbogus\n+B\n c\n".as_slice()
        );
        // The failed edit's appends were rolled back before annotating.
        assert_eq!(state.diff.files[0].hunks[0].start, plain_len);
    }

    #[test]
    fn incomplete_line_rules() {
        let mut state = state_for(
            "diff --git a/f b/f\n--- a/f\n+++ b/f\n@@ -1,2 +1,2 @@\n a\n-b\n+B\n",
        );
        // A '\' line cannot come first.
        let outcome = parse_edited_hunk(
            &mut state,
            0,
            0,
            b"\\ No newline at end of file\n a\n-b\n+B\n",
        )
        .unwrap();
        assert!(matches!(outcome, EditParse::Failed(None)));
        let body = hunk_body(&state, 0, 0);
        assert!(body
            .windows(b"hunk cannot begin with".len())
            .any(|w| w == b"hunk cannot begin with"));
    }

    #[test]
    fn short_incomplete_line_is_invalid() {
        let mut state = state_for(
            "diff --git a/f b/f\n--- a/f\n+++ b/f\n@@ -1,2 +1,2 @@\n a\n-b\n+B\n",
        );
        let outcome = parse_edited_hunk(&mut state, 0, 0, b" a\n-b\n+B\n\\ short\n").unwrap();
        assert!(matches!(outcome, EditParse::Failed(None)));
    }

    #[test]
    fn valid_incomplete_marker_is_kept() {
        let mut state = state_for(
            "diff --git a/f b/f\n--- a/f\n+++ b/f\n@@ -1,2 +1,2 @@\n a\n-b\n+B\n\\ No newline at end of file\n",
        );
        let outcome = parse_edited_hunk(
            &mut state,
            0,
            0,
            b" a\n-b\n+B\n\\ No newline at end of file\n",
        )
        .unwrap();
        assert!(matches!(outcome, EditParse::Ok));
        assert!(hunk_body(&state, 0, 0).ends_with(b"\\ No newline at end of file\n"));
    }

    #[test]
    fn duplicate_header_is_an_error() {
        let mut state = state_for(
            "diff --git a/f b/f\n--- a/f\n+++ b/f\n@@ -1,2 +1,2 @@\n a\n-b\n+B\n",
        );
        let outcome = parse_edited_hunk(
            &mut state,
            0,
            0,
            b"@@ -1,2 +1,2 @@\n@@ -1,2 +1,2 @@\n a\n-b\n+B\n",
        )
        .unwrap();
        assert!(matches!(outcome, EditParse::Failed(None)));
        let body = hunk_body(&state, 0, 0);
        assert!(body
            .windows(b"single hunk".len())
            .any(|w| w == b"single hunk"));
    }

    #[test]
    fn stripped_empty_context_line_still_matches() {
        let mut state = state_for(
            "diff --git a/f b/f\n--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n a\n \n-b\n+B\n",
        );
        // The editor stripped the lone space of the empty context line.
        let outcome = parse_edited_hunk(&mut state, 0, 0, b" a\n\n-b\n+B\n").unwrap();
        assert!(matches!(outcome, EditParse::Ok));
        assert_eq!(state.diff.files[0].hunks[0].header.old_offset, 1);
    }

    #[test]
    fn recolor_paints_by_sign() {
        let plain = "diff --git a/f b/f\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n";
        let colored = "diff --git a/f b/f\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n";
        let mut state = SelectState {
            diff: parse_diff(BString::from(plain), BString::from(colored)).unwrap(),
            mode: &PATCH_MODE_ADD,
            colors: Palette::colored(),
        };
        let outcome = parse_edited_hunk(&mut state, 0, 0, b" a\n-b\n+B\n").unwrap();
        assert!(matches!(outcome, EditParse::Ok));
        recolor_hunk(&mut state, 0, 0);
        let hunk = &state.diff.files[0].hunks[0];
        let recolored = &state.diff.colored[hunk.colored_start..hunk.colored_end];
        let expected = format!(
            "{ctx} a{r}\n{old}-b{r}\n{new}+B{r}\n",
            ctx = Palette::colored().context,
            old = Palette::colored().old,
            new = Palette::colored().new,
            r = Palette::colored().reset,
        );
        assert_eq!(recolored, expected.as_bytes());
    }
}
