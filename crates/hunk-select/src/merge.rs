//! Coalescing overlapping accepted hunks during reassembly.
//!
//! Sub-hunks produced by the splitter share their straddled context lines,
//! and edited hunks can shrink into their successors; either way the
//! reassembled patch must carry each line once. When the byte ranges
//! overlap the merged range is simply extended; when an edit moved a hunk's
//! body to the end of the plain buffer, the overlap is verified line by
//! line and the union is appended (the plain buffer only ever grows, so
//! existing ranges stay valid — the caller truncates back to its
//! checkpoint).

use bstr::BString;

use crate::{find_next_line, Decision, Hunk, ParsedDiff, Result, SelectError};

/// Starting at `*hunk_index`, merge consecutive selected hunks that overlap
/// the already-merged span.
///
/// Returns the merged stand-in hunk and advances `*hunk_index` past the
/// consumed hunks, or returns `None` when nothing was merged. The merged
/// hunk drops its colored range; reassembly is always plain.
pub fn merge_hunks(
    diff: &mut ParsedDiff,
    file_index: usize,
    hunk_index: &mut usize,
    use_all: bool,
) -> Result<Option<Hunk>> {
    let ParsedDiff { plain, files, .. } = diff;
    let file = &files[file_index];
    let start_index = *hunk_index;

    let first = &file.hunks[start_index];
    if !use_all && first.decision != Decision::Use {
        return Ok(None);
    }
    let mut merged = first.clone();
    // The colored part (if any) is skipped when merging hunks.
    merged.colored_start = 0;
    merged.colored_end = 0;

    let mut i = start_index;
    while i + 1 < file.hunks.len() {
        let next = &file.hunks[i + 1];
        let nh = next.header;

        // Stop merging when the hunk is not selected, or it does not
        // overlap the merged span (in post-delta new-line space).
        let next_new = nh.new_offset as isize + merged.delta;
        if (!use_all && next.decision != Decision::Use)
            || merged.header.new_offset as isize >= next_new
            || ((merged.header.new_offset + merged.header.new_count) as isize) < next_new
        {
            break;
        }

        let delta_for_count: isize;
        if merged.start < next.start && merged.end > next.start {
            // Unedited hunks that overlap: simply extend the range.
            merged.end = next.end;
            merged.colored_end = next.colored_end;
            delta_for_count = 0;
        } else {
            // One of the hunks was edited, so its body lives at the end of
            // the plain buffer. Verify that the tail of the merged hunk
            // matches the overlapping context at the head of the next one,
            // then append the union.
            let overlapping_line_count = (merged.header.new_offset + merged.header.new_count)
                as isize
                - merged.delta
                - nh.new_offset as isize;
            debug_assert!(overlapping_line_count >= 0);

            let mut overlap_start = next.start;
            let mut overlap_end = next.start;
            for j in 0..overlapping_line_count as usize {
                let overlap_next = find_next_line(plain, overlap_end);
                if overlap_next > next.end {
                    return Err(SelectError::Internal(
                        "overlapping context extends past the hunk",
                    ));
                }
                if plain[overlap_end] != b' ' {
                    return Err(SelectError::ExpectedContextLine {
                        line: j + 1,
                        text: BString::from(&plain[next.start..next.end]),
                    });
                }
                overlap_start = overlap_end;
                overlap_end = overlap_next;
            }
            let len = overlap_end - overlap_start;

            if len > merged.end - merged.start
                || plain[merged.end - len..merged.end] != plain[overlap_start..overlap_end]
            {
                return Err(SelectError::HunksDoNotOverlap {
                    first: BString::from(&plain[merged.start..merged.end]),
                    second: BString::from(&plain[overlap_start..overlap_end]),
                });
            }

            // The ranges are not adjacent, so the union cannot be taken in
            // place; append it and retarget the merged hunk.
            if merged.end != plain.len() {
                let moved = plain[merged.start..merged.end].to_vec();
                let start = plain.len();
                plain.extend_from_slice(&moved);
                merged.start = start;
                merged.end = plain.len();
            }
            let tail = plain[overlap_end..next.end].to_vec();
            plain.extend_from_slice(&tail);
            merged.end = plain.len();
            merged.splittable_into += next.splittable_into;
            delta_for_count = merged.delta;
            merged.delta += next.delta;
        }

        merged.header.old_count = nh.old_offset + nh.old_count - merged.header.old_offset;
        merged.header.new_count = (nh.new_offset as isize + delta_for_count
            + nh.new_count as isize
            - merged.header.new_offset as isize) as usize;
        i += 1;
    }

    if i == start_index {
        return Ok(None);
    }
    *hunk_index = i;
    Ok(Some(merged))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_diff;
    use crate::split::split_hunk;

    fn parsed(body: &str) -> ParsedDiff {
        parse_diff(
            BString::from(format!("diff --git a/f b/f\n--- a/f\n+++ b/f\n{body}")),
            BString::default(),
        )
        .unwrap()
    }

    #[test]
    fn split_hunks_coalesce_back_into_the_original() {
        let mut diff = parsed("@@ -1,6 +1,6 @@\n a\n-b\n+B\n c\n d\n-e\n+E\n f\n");
        let original = diff.files[0].hunks[0].clone();
        split_hunk(&mut diff, 0, 0).unwrap();
        for hunk in &mut diff.files[0].hunks {
            hunk.decision = Decision::Use;
        }

        let mut i = 0;
        let merged = merge_hunks(&mut diff, 0, &mut i, false).unwrap().unwrap();
        assert_eq!(i, 1);
        assert_eq!(merged.header.old_count, original.header.old_count);
        assert_eq!(merged.header.new_count, original.header.new_count);
        assert_eq!(
            &diff.plain[merged.start..merged.end],
            &diff.plain[original.start..original.end]
        );
    }

    #[test]
    fn unselected_successor_stops_the_merge() {
        let mut diff = parsed("@@ -1,6 +1,6 @@\n a\n-b\n+B\n c\n d\n-e\n+E\n f\n");
        split_hunk(&mut diff, 0, 0).unwrap();
        diff.files[0].hunks[0].decision = Decision::Use;
        diff.files[0].hunks[1].decision = Decision::Skip;

        let mut i = 0;
        assert!(merge_hunks(&mut diff, 0, &mut i, false).unwrap().is_none());
        assert_eq!(i, 0);
    }

    #[test]
    fn disjoint_hunks_are_not_merged() {
        let mut diff = parsed(
            "@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n@@ -10,3 +10,3 @@\n x\n-y\n+Y\n z\n",
        );
        for hunk in &mut diff.files[0].hunks {
            hunk.decision = Decision::Use;
        }
        let mut i = 0;
        assert!(merge_hunks(&mut diff, 0, &mut i, false).unwrap().is_none());
    }

    #[test]
    fn edited_hunk_union_is_appended_and_verified() {
        let mut diff = parsed("@@ -1,6 +1,6 @@\n a\n-b\n+B\n c\n d\n-e\n+E\n f\n");
        split_hunk(&mut diff, 0, 0).unwrap();
        for hunk in &mut diff.files[0].hunks {
            hunk.decision = Decision::Use;
        }

        // Simulate an edited first sub-hunk: its body has been re-appended
        // to the plain buffer, so the byte ranges no longer abut.
        let (start, end) = {
            let h = &diff.files[0].hunks[0];
            (h.start, h.end)
        };
        let moved = diff.plain[start..end].to_vec();
        let new_start = diff.plain.len();
        diff.plain.extend_from_slice(&moved);
        let new_end = diff.plain.len();
        diff.files[0].hunks[0].start = new_start;
        diff.files[0].hunks[0].end = new_end;

        let mut i = 0;
        let merged = merge_hunks(&mut diff, 0, &mut i, false).unwrap().unwrap();
        assert_eq!(i, 1);
        assert_eq!(merged.header.old_count, 6);
        assert_eq!(merged.header.new_count, 6);
        assert_eq!(
            &diff.plain[merged.start..merged.end],
            b" a\n-b\n+B\n c\n d\n-e\n+E\n f\n"
        );
    }

    #[test]
    fn non_matching_overlap_is_an_error() {
        let mut diff = parsed("@@ -1,6 +1,6 @@\n a\n-b\n+B\n c\n d\n-e\n+E\n f\n");
        split_hunk(&mut diff, 0, 0).unwrap();
        for hunk in &mut diff.files[0].hunks {
            hunk.decision = Decision::Use;
        }

        // Re-point the first sub-hunk at a forged body whose tail does not
        // match the straddled context of its successor.
        let forged = b" a\n-b\n+B\n X\n Y\n".to_vec();
        let new_start = diff.plain.len();
        diff.plain.extend_from_slice(&forged);
        let new_end = diff.plain.len();
        diff.files[0].hunks[0].start = new_start;
        diff.files[0].hunks[0].end = new_end;

        let mut i = 0;
        let err = merge_hunks(&mut diff, 0, &mut i, false).unwrap_err();
        assert!(matches!(err, SelectError::HunksDoNotOverlap { .. }));
    }
}
