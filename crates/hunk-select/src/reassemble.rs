//! Building the synthetic patch for one file from the per-hunk decisions.

use crate::merge::merge_hunks;
use crate::render::{render_diff_header, render_hunk};
use crate::{Decision, Result, SelectState};

/// Emit the file header and every selected hunk, headers rewritten for the
/// cumulative line-count shift of skipped and edited hunks.
///
/// With `use_all` every hunk is emitted regardless of its decision (used
/// for the whole-file applicability check after an edit). Scratch appends
/// the merger makes to the plain buffer are truncated away before
/// returning.
pub fn reassemble_patch(
    state: &mut SelectState,
    file_index: usize,
    use_all: bool,
    out: &mut Vec<u8>,
) -> Result<()> {
    let save_len = state.diff.plain.len();

    render_diff_header(state, &state.diff.files[file_index], false, out);

    let mut delta = 0isize;
    // A mode-change pseudo-hunk is rendered (or excised) with the header.
    let mut i = usize::from(state.diff.files[file_index].mode_change);

    while i < state.diff.files[file_index].hunks.len() {
        let (decision, old_count, new_count) = {
            let hunk = &state.diff.files[file_index].hunks[i];
            (hunk.decision, hunk.header.old_count, hunk.header.new_count)
        };

        if !use_all && decision != Decision::Use {
            delta += old_count as isize - new_count as isize;
        } else {
            // Merge overlapping hunks into a temporary stand-in.
            match merge_hunks(&mut state.diff, file_index, &mut i, use_all)? {
                Some(merged) => {
                    render_hunk(state, &merged, delta, false, out);
                    delta += merged.delta;
                }
                None => {
                    let hunk = &state.diff.files[file_index].hunks[i];
                    render_hunk(state, hunk, delta, false, out);
                    delta += hunk.delta;
                }
            }
            // The merger may have used the plain buffer as a scratch pad
            // for coalesced edited hunks.
            state.diff.plain.truncate(save_len);
        }
        i += 1;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::PATCH_MODE_ADD;
    use crate::parse::parse_diff;
    use crate::split::split_hunk;
    use bstr::BString;
    use hunk_utils::color::Palette;

    fn state(diff_text: &str) -> SelectState {
        SelectState {
            diff: parse_diff(BString::from(diff_text), BString::default()).unwrap(),
            mode: &PATCH_MODE_ADD,
            colors: Palette::plain(),
        }
    }

    #[test]
    fn accepting_the_only_hunk_round_trips() {
        let input = "diff --git a/f b/f\n--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n";
        let mut state = state(input);
        state.diff.files[0].hunks[0].decision = Decision::Use;
        let mut out = Vec::new();
        reassemble_patch(&mut state, 0, false, &mut out).unwrap();
        assert_eq!(out, input.as_bytes());
    }

    #[test]
    fn accept_all_matches_the_differ_input() {
        let input = "diff --git a/f b/f\n--- a/f\n+++ b/f\
                     \n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\
                     \n@@ -10,3 +10,4 @@\n x\n-y\n+Y\n+Y2\n z\n";
        let mut state = state(input);
        for hunk in &mut state.diff.files[0].hunks {
            hunk.decision = Decision::Use;
        }
        let mut out = Vec::new();
        reassemble_patch(&mut state, 0, false, &mut out).unwrap();
        assert_eq!(out, input.as_bytes());
    }

    #[test]
    fn skipped_hunk_shifts_later_new_offsets() {
        // Skipping a hunk that deletes a line leaves that line in place, so
        // later hunks land one line further down.
        let input = "diff --git a/f b/f\n--- a/f\n+++ b/f\
                     \n@@ -1,3 +1,2 @@\n a\n-b\n c\
                     \n@@ -10,3 +9,3 @@\n x\n-y\n+Y\n z\n";
        let mut state = state(input);
        state.diff.files[0].hunks[0].decision = Decision::Skip;
        state.diff.files[0].hunks[1].decision = Decision::Use;
        let mut out = Vec::new();
        reassemble_patch(&mut state, 0, false, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("@@ -10,3 +10,3 @@"), "{text}");
        assert!(!text.contains("-b"));
    }

    #[test]
    fn split_then_accept_first_only() {
        let mut state =
            state("diff --git a/f b/f\n--- a/f\n+++ b/f\n@@ -1,6 +1,6 @@\n a\n-b\n+B\n c\n d\n-e\n+E\n f\n");
        split_hunk(&mut state.diff, 0, 0).unwrap();
        state.diff.files[0].hunks[0].decision = Decision::Use;
        state.diff.files[0].hunks[1].decision = Decision::Skip;
        let mut out = Vec::new();
        reassemble_patch(&mut state, 0, false, &mut out).unwrap();
        assert_eq!(
            out,
            b"diff --git a/f b/f\n--- a/f\n+++ b/f\n@@ -1,4 +1,4 @@\n a\n-b\n+B\n c\n d\n"
                .as_slice()
        );
    }

    #[test]
    fn split_then_accept_all_merges_back() {
        let input =
            "diff --git a/f b/f\n--- a/f\n+++ b/f\n@@ -1,6 +1,6 @@\n a\n-b\n+B\n c\n d\n-e\n+E\n f\n";
        let mut state = state(input);
        split_hunk(&mut state.diff, 0, 0).unwrap();
        for hunk in &mut state.diff.files[0].hunks {
            hunk.decision = Decision::Use;
        }
        let save_len = state.diff.plain.len();
        let mut out = Vec::new();
        reassemble_patch(&mut state, 0, false, &mut out).unwrap();
        assert_eq!(out, input.as_bytes());
        assert_eq!(state.diff.plain.len(), save_len);
    }

    #[test]
    fn rejected_mode_change_leaves_an_inert_header() {
        let mut state = state("diff --git a/f b/f\nold mode 100644\nnew mode 100755\n");
        state.diff.files[0].hunks[0].decision = Decision::Skip;
        let mut out = Vec::new();
        reassemble_patch(&mut state, 0, false, &mut out).unwrap();
        assert_eq!(out, b"diff --git a/f b/f\n".as_slice());
    }

    #[test]
    fn use_all_ignores_decisions() {
        let input = "diff --git a/f b/f\n--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n";
        let mut state = state(input);
        state.diff.files[0].hunks[0].decision = Decision::Skip;
        let mut out = Vec::new();
        reassemble_patch(&mut state, 0, true, &mut out).unwrap();
        assert_eq!(out, input.as_bytes());
    }
}
