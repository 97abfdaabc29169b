//! Splitting a hunk at interior context-line boundaries.
//!
//! Each run of signed lines becomes its own sub-hunk; the context lines
//! between two runs are the trailing context of one sub-hunk and the
//! leading context of the next, so they count into both headers. The
//! sub-hunks replace the original in the file's hunk list; the merger
//! coalesces them again at reassembly time when adjacent ones are accepted.

use crate::{find_next_line, Hunk, HunkHeader, ParsedDiff, Result, SelectError};

/// Split the hunk at `hunk_index` into `splittable_into` sub-hunks.
///
/// No-op when the hunk is not splittable. The original's decision is
/// inherited by every sub-hunk.
pub fn split_hunk(diff: &mut ParsedDiff, file_index: usize, hunk_index: usize) -> Result<()> {
    let has_color = diff.has_color();
    let ParsedDiff {
        plain,
        colored,
        files,
    } = diff;
    let file = files
        .get_mut(file_index)
        .ok_or(SelectError::Internal("invalid file index"))?;
    if hunk_index >= file.hunks.len() {
        return Err(SelectError::Internal("invalid hunk index"));
    }

    let orig = file.hunks[hunk_index].clone();
    if orig.splittable_into < 2 {
        return Ok(());
    }
    let end = orig.end;
    let colored_end = orig.colored_end;
    let decision = orig.decision;

    // Offsets/counts of everything not yet carved off.
    let mut remaining = orig.header;

    let mut subs: Vec<Hunk> = Vec::with_capacity(orig.splittable_into);
    let mut cur = Hunk {
        start: orig.start,
        colored_start: orig.colored_start,
        splittable_into: 1,
        decision,
        header: HunkHeader {
            old_count: 0,
            new_count: 0,
            ..orig.header
        },
        ..Hunk::default()
    };

    let mut splittable_remaining = orig.splittable_into;
    let mut current = orig.start;
    let mut colored_current = orig.colored_start;
    let mut marker = 0u8;
    let mut context_line_count = 0usize;
    let mut first = true;
    // Start of the next sub-hunk, recorded at the latest signed-to-context
    // transition.
    let mut pending: Option<(usize, usize)> = None;

    while splittable_remaining > 1 {
        if current >= end {
            return Err(SelectError::Internal("buffer overrun while splitting hunks"));
        }
        let ch = plain[current];

        // First context line after a chain of +/- lines? Then the next
        // sub-hunk starts here.
        if (marker == b'-' || marker == b'+') && ch == b' ' {
            first = false;
            pending = Some((current, colored_current));
            context_line_count = 0;
        }

        // Still inside the current run (or its surrounding context):
        // count the line and move on.
        if marker != b' ' || (ch != b'-' && ch != b'+') {
            let c = if ch == b'\\' {
                // Incomplete-line markers attach to the previous line.
                if marker != 0 {
                    marker
                } else {
                    b' '
                }
            } else {
                ch
            };
            match c {
                b' ' => context_line_count += 1,
                b'-' => cur.header.old_count += 1,
                b'+' => cur.header.new_count += 1,
                _ => return Err(SelectError::Internal("unhandled diff marker")),
            }
            marker = c;
            current = find_next_line(plain, current);
            if has_color {
                colored_current = find_next_line(colored, colored_current);
            }
            continue;
        }

        // A signed line after context: a sub-hunk boundary.

        if first {
            // The context seen so far is the first sub-hunk's leading
            // context.
            if cur.header.old_count != 0 || cur.header.new_count != 0 {
                return Err(SelectError::Internal("split counts are off"));
            }
            cur.header.old_count = context_line_count;
            cur.header.new_count = context_line_count;
            context_line_count = 0;
            first = false;
            match ch {
                b'-' => cur.header.old_count += 1,
                _ => cur.header.new_count += 1,
            }
            marker = ch;
            current = find_next_line(plain, current);
            if has_color {
                colored_current = find_next_line(colored, colored_current);
            }
            continue;
        }

        remaining.old_offset += cur.header.old_count;
        remaining.old_count -= cur.header.old_count;
        remaining.new_offset += cur.header.new_count;
        remaining.new_count -= cur.header.new_count;

        let (next_start, next_colored_start) = pending
            .take()
            .ok_or(SelectError::Internal("sub-hunk boundary without context"))?;
        let mut next = Hunk {
            start: next_start,
            colored_start: next_colored_start,
            splittable_into: 1,
            decision,
            ..Hunk::default()
        };
        next.header.old_offset = cur.header.old_offset + cur.header.old_count;
        next.header.new_offset = cur.header.new_offset + cur.header.new_count;

        // The context lines between the runs straddle both sub-hunks.
        cur.header.old_count += context_line_count;
        cur.header.new_count += context_line_count;
        cur.end = current;
        if has_color {
            cur.colored_end = colored_current;
        }
        next.header.old_count = context_line_count;
        next.header.new_count = context_line_count;
        context_line_count = 0;

        subs.push(std::mem::replace(&mut cur, next));
        splittable_remaining -= 1;
        marker = ch;
    }

    // The last sub-hunk simply gets the rest.
    if cur.header.old_offset != remaining.old_offset
        || cur.header.new_offset != remaining.new_offset
    {
        return Err(SelectError::Internal("miscounted offsets while splitting"));
    }
    cur.header.old_count = remaining.old_count;
    cur.header.new_count = remaining.new_count;
    cur.end = end;
    if has_color {
        cur.colored_end = colored_end;
    }
    subs.push(cur);

    debug_assert_eq!(subs.len(), orig.splittable_into);
    file.hunks.splice(hunk_index..=hunk_index, subs);
    Ok(())
}
