//! Emitting hunks and file headers.
//!
//! Hunk headers are synthesized on every render so the offsets can absorb
//! the cumulative line-count shift (`delta`) of earlier decisions in the
//! file. Pseudo-hunks are copied verbatim.

use crate::{find_next_line, Decision, FileDiff, Hunk, SelectState};

const SUMMARY_HEADER_WIDTH: usize = 20;
const SUMMARY_LINE_WIDTH: usize = 80;

/// Render one hunk, plain or colored, with its header offsets shifted by
/// `delta` (`new_offset` normally, `old_offset` in reverse mode).
pub fn render_hunk(state: &SelectState, hunk: &Hunk, delta: isize, colored: bool, out: &mut Vec<u8>) {
    let header = &hunk.header;
    let plain = &state.diff.plain;
    let colored_buf = &state.diff.colored;

    if !hunk.is_pseudo() {
        // Generate the hunk header dynamically, except for special hunks
        // (such as the diff header).
        let extra: &[u8] = if !colored {
            &plain[header.extra_start..header.extra_end]
        } else if header.suppress_colored_line_range {
            out.extend_from_slice(
                &colored_buf[header.colored_extra_start..header.colored_extra_end],
            );
            out.extend_from_slice(&colored_buf[hunk.colored_start..hunk.colored_end]);
            return;
        } else {
            out.extend_from_slice(state.colors.fraginfo.as_bytes());
            &colored_buf[header.colored_extra_start..header.colored_extra_end]
        };

        let mut old_offset = header.old_offset as isize;
        let mut new_offset = header.new_offset as isize;
        if state.mode.is_reverse {
            old_offset -= delta;
        } else {
            new_offset += delta;
        }

        out.extend_from_slice(format!("@@ -{old_offset}").as_bytes());
        if header.old_count != 1 {
            out.extend_from_slice(format!(",{}", header.old_count).as_bytes());
        }
        out.extend_from_slice(format!(" +{new_offset}").as_bytes());
        if header.new_count != 1 {
            out.extend_from_slice(format!(",{}", header.new_count).as_bytes());
        }
        out.extend_from_slice(b" @@");

        if !extra.is_empty() {
            out.extend_from_slice(extra);
        } else if colored {
            out.extend_from_slice(state.colors.reset.as_bytes());
            out.push(b'\n');
        } else {
            out.push(b'\n');
        }
    }

    if colored {
        out.extend_from_slice(&colored_buf[hunk.colored_start..hunk.colored_end]);
    } else {
        out.extend_from_slice(&plain[hunk.start..hunk.end]);
    }
}

/// Render a file's header block.
///
/// If the file's mode change was not accepted, the mode-change pseudo-hunk
/// is cut out of the header.
pub fn render_diff_header(state: &SelectState, file: &FileDiff, colored: bool, out: &mut Vec<u8>) {
    let skip_mode_change =
        file.mode_change && file.hunks[0].decision != Decision::Use;
    let head = &file.head;

    if !skip_mode_change {
        render_hunk(state, head, 0, colored, out);
        return;
    }

    let first = &file.hunks[0];
    if colored {
        let buf = &state.diff.colored;
        out.extend_from_slice(&buf[head.colored_start..first.colored_start]);
        out.extend_from_slice(&buf[first.colored_end..head.colored_end]);
    } else {
        let buf = &state.diff.plain;
        out.extend_from_slice(&buf[head.start..first.start]);
        out.extend_from_slice(&buf[first.end..head.end]);
    }
}

/// One-line summary for the goto table: the line ranges padded to a fixed
/// width, then the hunk's first non-context line, truncated to 80 columns.
pub fn summarize_hunk(state: &SelectState, hunk: &Hunk, out: &mut Vec<u8>) {
    let header = &hunk.header;
    let plain = &state.diff.plain;
    let base = out.len();

    out.extend_from_slice(
        format!(
            " -{},{} +{},{} ",
            header.old_offset, header.old_count, header.new_offset, header.new_count
        )
        .as_bytes(),
    );
    if out.len() - base < SUMMARY_HEADER_WIDTH {
        out.resize(base + SUMMARY_HEADER_WIDTH, b' ');
    }

    let mut i = hunk.start;
    while i < hunk.end {
        if plain[i] != b' ' {
            break;
        }
        i = find_next_line(plain, i);
    }
    if i < hunk.end {
        let next = find_next_line(plain, i);
        out.extend_from_slice(&plain[i..next]);
    }
    if out.len() - base > SUMMARY_LINE_WIDTH {
        out.truncate(base + SUMMARY_LINE_WIDTH);
    }
    if out.last() != Some(&b'\n') {
        out.push(b'\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::{PATCH_MODE_ADD, PATCH_MODE_RESET_HEAD};
    use crate::parse::parse_diff;
    use crate::SelectState;
    use bstr::BString;
    use hunk_utils::color::Palette;

    fn state(plain: &str) -> SelectState {
        SelectState {
            diff: parse_diff(BString::from(plain), BString::default()).unwrap(),
            mode: &PATCH_MODE_ADD,
            colors: Palette::plain(),
        }
    }

    const ONE_HUNK: &str = "\
diff --git a/f b/f
--- a/f
+++ b/f
@@ -1,3 +1,3 @@
 a
-b
+B
 c
";

    #[test]
    fn rerendered_header_matches_original_at_zero_delta() {
        let state = state(ONE_HUNK);
        let mut out = Vec::new();
        render_hunk(&state, &state.diff.files[0].hunks[0], 0, false, &mut out);
        assert_eq!(out, b"@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n");
    }

    #[test]
    fn delta_shifts_new_offset() {
        let state = state(ONE_HUNK);
        let mut out = Vec::new();
        render_hunk(&state, &state.diff.files[0].hunks[0], 2, false, &mut out);
        assert!(out.starts_with(b"@@ -1,3 +3,3 @@"));
    }

    #[test]
    fn reverse_mode_shifts_old_offset() {
        let mut state = state(
            "diff --git a/f b/f\n--- a/f\n+++ b/f\n@@ -5,3 +5,3 @@\n a\n-b\n+B\n c\n",
        );
        state.mode = &PATCH_MODE_RESET_HEAD;
        let mut out = Vec::new();
        render_hunk(&state, &state.diff.files[0].hunks[0], 2, false, &mut out);
        assert!(out.starts_with(b"@@ -3,3 +5,3 @@"));
    }

    #[test]
    fn count_of_one_is_omitted() {
        let state = state(
            "diff --git a/f b/f\n--- a/f\n+++ b/f\n@@ -4 +4 @@\n-x\n+y\n",
        );
        let mut out = Vec::new();
        render_hunk(&state, &state.diff.files[0].hunks[0], 0, false, &mut out);
        assert!(out.starts_with(b"@@ -4 +4 @@\n"));
    }

    #[test]
    fn header_pseudo_hunk_is_copied_verbatim() {
        let state = state(ONE_HUNK);
        let mut out = Vec::new();
        render_hunk(&state, &state.diff.files[0].head, 0, false, &mut out);
        assert_eq!(out, b"diff --git a/f b/f\n--- a/f\n+++ b/f\n");
    }

    #[test]
    fn rejected_mode_change_is_excised_from_header() {
        let state = state(
            "diff --git a/f b/f\nold mode 100644\nnew mode 100755\nindex 0123456..789abcd\n",
        );
        let file = &state.diff.files[0];
        let mut out = Vec::new();
        render_diff_header(&state, file, false, &mut out);
        assert_eq!(out, b"diff --git a/f b/f\nindex 0123456..789abcd\n");
    }

    #[test]
    fn accepted_mode_change_keeps_the_header_intact() {
        let mut state = state(
            "diff --git a/f b/f\nold mode 100644\nnew mode 100755\n",
        );
        state.diff.files[0].hunks[0].decision = Decision::Use;
        let file = &state.diff.files[0];
        let mut out = Vec::new();
        render_diff_header(&state, file, false, &mut out);
        assert_eq!(
            out,
            b"diff --git a/f b/f\nold mode 100644\nnew mode 100755\n"
        );
    }

    #[test]
    fn summary_shows_ranges_and_first_signed_line() {
        let state = state(ONE_HUNK);
        let mut out = Vec::new();
        summarize_hunk(&state, &state.diff.files[0].hunks[0], &mut out);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with(" -1,3 +1,3 "));
        assert!(text.ends_with("-b\n"));
    }
}
