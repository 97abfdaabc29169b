//! Segmenting the captured diff into files and hunks.
//!
//! The scan walks the plain buffer line by line, keyed on the first column,
//! and advances a cursor in the colored buffer one line per plain line.
//! Structure is recorded as byte ranges; no line text is copied.

use bstr::{BString, ByteSlice};

use crate::{FileDiff, Hunk, ParsedDiff, Result, SelectError};

/// Which hunk the scan is currently extending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    Head,
    Body(usize),
}

/// Parse `@@ -O[,C] +O[,C] @@` at the start of `line`.
///
/// Returns the offsets/counts and the position just past the second `@@`,
/// or `None` when the line is not a well-formed hunk header. A missing
/// count defaults to 1.
pub(crate) fn parse_hunk_header_line(line: &[u8]) -> Option<(usize, usize, usize, usize, usize)> {
    let rest = line.strip_prefix(b"@@ -")?;
    let (old_offset, old_count, rest) = parse_range(rest)?;
    let rest = rest.strip_prefix(b" +")?;
    let (new_offset, new_count, rest) = parse_range(rest)?;
    let rest = rest.strip_prefix(b" @@")?;
    let extra_at = line.len() - rest.len();
    Some((old_offset, old_count, new_offset, new_count, extra_at))
}

/// Parse `O[,C]`, returning the remainder of the input.
fn parse_range(input: &[u8]) -> Option<(usize, usize, &[u8])> {
    let (offset, rest) = parse_decimal(input)?;
    match rest.first() {
        Some(b',') => {
            let (count, rest) = parse_decimal(&rest[1..])?;
            Some((offset, count, rest))
        }
        _ => Some((offset, 1, rest)),
    }
}

fn parse_decimal(input: &[u8]) -> Option<(usize, &[u8])> {
    let digits = input.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let mut value = 0usize;
    for &b in &input[..digits] {
        value = value.checked_mul(10)?.checked_add((b - b'0') as usize)?;
    }
    Some((value, &input[digits..]))
}

fn is_octal(payload: &[u8]) -> bool {
    !payload.is_empty() && payload.iter().all(|b| (b'0'..=b'7').contains(b))
}

/// Parse the `@@` header the hunk currently starts with, advancing
/// `hunk.start` (and `hunk.colored_start`) past the header line and
/// recording the extra-text ranges.
fn parse_hunk_header(plain: &[u8], colored: &[u8], hunk: &mut Hunk) -> Result<()> {
    let eol = match plain[hunk.start..].find_byte(b'\n') {
        Some(i) => hunk.start + i,
        None => plain.len(),
    };
    let line = &plain[hunk.start..eol];

    let (old_offset, old_count, new_offset, new_count, extra_at) = parse_hunk_header_line(line)
        .ok_or_else(|| SelectError::BadHunkHeader(BString::from(line)))?;
    let header = &mut hunk.header;
    header.old_offset = old_offset;
    header.old_count = old_count;
    header.new_offset = new_offset;
    header.new_count = new_count;

    hunk.start = if eol < plain.len() { eol + 1 } else { eol };
    header.extra_start = eol - line.len() + extra_at;
    header.extra_end = hunk.start;

    if colored.is_empty() {
        header.colored_extra_start = 0;
        header.colored_extra_end = 0;
        return Ok(());
    }

    // Now find the extra text in the colored header line.
    let colored_eol = match colored[hunk.colored_start..].find_byte(b'\n') {
        Some(i) => hunk.colored_start + i,
        None => colored.len(),
    };
    let colored_line = &colored[hunk.colored_start..colored_eol];
    let at = colored_line
        .find(b"@@ -")
        .and_then(|p| colored_line[p + 4..].find(b" @@").map(|q| p + 4 + q));
    match at {
        Some(q) => header.colored_extra_start = hunk.colored_start + q + 3,
        None => {
            // Could not parse the colored hunk header; emit it as-is.
            header.colored_extra_start = hunk.colored_start;
            header.suppress_colored_line_range = true;
        }
    }
    hunk.colored_start = if colored_eol < colored.len() {
        colored_eol + 1
    } else {
        colored_eol
    };
    header.colored_extra_end = hunk.colored_start;

    Ok(())
}

/// A hunk that ended in a signed line has an unterminated trailing run.
fn complete_hunk(marker: u8, hunk: &mut Hunk) {
    if marker == b'-' || marker == b'+' {
        hunk.splittable_into += 1;
    }
}

fn ensure_trailing_newline(buf: &mut BString) {
    if buf.last() != Some(&b'\n') {
        buf.push(b'\n');
    }
}

/// Segment a captured diff (and its optional colored rendering) into
/// [`FileDiff`]s.
///
/// The colored buffer, when non-empty, must hold exactly one line per plain
/// line; any drift is a fatal [`SelectError::MismatchedColoredOutput`].
pub fn parse_diff(mut plain: BString, mut colored: BString) -> Result<ParsedDiff> {
    if plain.is_empty() {
        return Ok(ParsedDiff::default());
    }
    ensure_trailing_newline(&mut plain);
    if !colored.is_empty() {
        ensure_trailing_newline(&mut colored);
    }
    let has_color = !colored.is_empty();

    let mut files: Vec<FileDiff> = Vec::new();
    let mut cursor = Cursor::Head;
    let mut marker = 0u8;
    let mut p = 0usize;
    let mut colored_p = 0usize;

    while p < plain.len() {
        let eol = match plain[p..].find_byte(b'\n') {
            Some(i) => p + i,
            None => plain.len(),
        };
        let line: &[u8] = &plain[p..eol];
        let first = line.first().copied().unwrap_or(b'\n');
        let mut mode_change_line = false;

        if line.starts_with(b"diff ") || line.starts_with(b"* Unmerged path ") {
            if let Some(file) = files.last_mut() {
                complete_hunk(marker, cursor_hunk(file, cursor));
            }
            files.push(FileDiff::default());
            cursor = Cursor::Head;
            let head = &mut files.last_mut().unwrap().head;
            head.start = p;
            head.colored_start = colored_p;
            marker = 0;
        } else if files.is_empty() {
            return Err(SelectError::InvalidDiff("diff starts with unexpected line"));
        } else {
            let file_index = files.len() - 1;
            let file = &mut files[file_index];
            let deleted_marker =
                cursor == Cursor::Head && line.starts_with(b"deleted file");

            if file.deleted {
                // Keep the rest of the file in a single pseudo-hunk.
            } else if line.starts_with(b"@@ ") || deleted_marker {
                // Previous hunk did not end in a context line.
                complete_hunk(marker, cursor_hunk(file, cursor));

                file.hunks.push(Hunk {
                    start: p,
                    colored_start: colored_p,
                    ..Hunk::default()
                });
                cursor = Cursor::Body(file.hunks.len() - 1);

                if deleted_marker {
                    file.deleted = true;
                } else {
                    let hunk = file.hunks.last_mut().unwrap();
                    parse_hunk_header(&plain, &colored, hunk)?;
                }
                marker = first;
            } else if cursor == Cursor::Head && line.starts_with(b"new file") {
                file.added = true;
            } else if cursor == Cursor::Head
                && line
                    .strip_prefix(b"old mode ")
                    .is_some_and(is_octal)
            {
                if file.mode_change {
                    return Err(SelectError::InvalidDiff("double mode change"));
                }
                if !file.hunks.is_empty() {
                    return Err(SelectError::InvalidDiff("mode change in the middle of the file"));
                }
                // The mode-change pseudo-hunk is part of the header block;
                // the cursor stays on `head`.
                file.mode_change = true;
                file.hunks.push(Hunk {
                    start: p,
                    colored_start: colored_p,
                    ..Hunk::default()
                });
                mode_change_line = true;
            } else if cursor == Cursor::Head
                && line
                    .strip_prefix(b"new mode ")
                    .is_some_and(is_octal)
            {
                if !file.mode_change {
                    return Err(SelectError::InvalidDiff("'new mode' without 'old mode'"));
                }
                if file.hunks.len() != 1 {
                    return Err(SelectError::InvalidDiff("mode change in the middle of the file"));
                }
                if p != file.hunks[0].end {
                    return Err(SelectError::InvalidDiff(
                        "'new mode' does not immediately follow 'old mode'",
                    ));
                }
                mode_change_line = true;
            } else if cursor == Cursor::Head && line.starts_with(b"Binary files ") {
                file.binary = true;
            }

            if usize::from(file.deleted) + usize::from(file.added) + usize::from(file.mode_change)
                > 1
            {
                return Err(SelectError::InvalidDiff(
                    "delete, add and mode change are mutually exclusive",
                ));
            }
        }

        let file = files.last_mut().unwrap();
        if (marker == b'-' || marker == b'+') && first == b' ' {
            cursor_hunk(file, cursor).splittable_into += 1;
        }
        if marker != 0 && first != b'\\' {
            marker = first;
        }

        p = if eol == plain.len() { eol } else { eol + 1 };
        cursor_hunk(file, cursor).end = p;

        if has_color {
            match colored[colored_p..].find_byte(b'\n') {
                Some(i) => colored_p += i + 1,
                None => {
                    if p != plain.len() || colored_p == colored.len() {
                        return Err(SelectError::MismatchedColoredOutput);
                    }
                    colored_p = colored.len();
                }
            }
            cursor_hunk(file, cursor).colored_end = colored_p;
        }

        if mode_change_line {
            // Extend the mode-change pseudo-hunk to cover this line too.
            let end = file.head.end;
            let colored_end = file.head.colored_end;
            let pseudo = &mut file.hunks[0];
            pseudo.end = end;
            pseudo.colored_end = colored_end;
        }
    }

    if let Some(file) = files.last_mut() {
        complete_hunk(marker, cursor_hunk(file, cursor));
    }

    // Non-colored stream shorter than the colored one?
    if has_color && colored_p != colored.len() {
        return Err(SelectError::MismatchedColoredOutput);
    }

    Ok(ParsedDiff {
        plain,
        colored,
        files,
    })
}

fn cursor_hunk(file: &mut FileDiff, cursor: Cursor) -> &mut Hunk {
    match cursor {
        Cursor::Head => &mut file.head,
        Cursor::Body(i) => &mut file.hunks[i],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Decision;

    fn parse(plain: &str) -> ParsedDiff {
        parse_diff(BString::from(plain), BString::default()).unwrap()
    }

    const SIMPLE: &str = "\
diff --git a/f b/f
index 0123456..789abcd 100644
--- a/f
+++ b/f
@@ -1,3 +1,3 @@ fn main()
 a
-b
+B
 c
";

    #[test]
    fn single_hunk_counts_and_ranges() {
        let diff = parse(SIMPLE);
        assert_eq!(diff.files.len(), 1);
        let file = &diff.files[0];
        assert_eq!(file.hunks.len(), 1);
        let hunk = &file.hunks[0];
        assert_eq!(
            (
                hunk.header.old_offset,
                hunk.header.old_count,
                hunk.header.new_offset,
                hunk.header.new_count
            ),
            (1, 3, 1, 3)
        );
        assert_eq!(hunk.splittable_into, 1);
        assert_eq!(hunk.decision, Decision::Undecided);
        // Body starts right after the header line.
        assert_eq!(&diff.plain[hunk.start..hunk.start + 2], b" a");
        // The extra range carries the function context, newline included.
        let extra = &diff.plain[hunk.header.extra_start..hunk.header.extra_end];
        assert_eq!(extra, b" fn main()\n");
    }

    #[test]
    fn counts_match_a_rewalk_of_the_body() {
        let diff = parse(SIMPLE);
        let hunk = &diff.files[0].hunks[0];
        let body = &diff.plain[hunk.start..hunk.end];
        let old = body.lines_with_terminator().filter(|l| l[0] != b'+').count();
        let new = body.lines_with_terminator().filter(|l| l[0] != b'-').count();
        assert_eq!(old, hunk.header.old_count);
        assert_eq!(new, hunk.header.new_count);
    }

    #[test]
    fn two_signed_runs_are_splittable() {
        let diff = parse(
            "diff --git a/f b/f\n--- a/f\n+++ b/f\n\
             @@ -1,6 +1,6 @@\n a\n-b\n+B\n c\n d\n-e\n+E\n",
        );
        // Trailing signed run counts even without trailing context.
        assert_eq!(diff.files[0].hunks[0].splittable_into, 2);
    }

    #[test]
    fn count_defaults_to_one_when_omitted() {
        let diff = parse("diff --git a/f b/f\n--- a/f\n+++ b/f\n@@ -5 +5 @@\n-x\n+y\n");
        let header = diff.files[0].hunks[0].header;
        assert_eq!((header.old_offset, header.old_count), (5, 1));
        assert_eq!((header.new_offset, header.new_count), (5, 1));
    }

    #[test]
    fn malformed_header_is_fatal() {
        let err = parse_diff(
            BString::from("diff --git a/f b/f\n@@ -x +1 @@\n"),
            BString::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SelectError::BadHunkHeader(_)));
    }

    #[test]
    fn mode_change_becomes_nested_pseudo_hunk() {
        let diff = parse(
            "diff --git a/f b/f\nold mode 100644\nnew mode 100755\n",
        );
        let file = &diff.files[0];
        assert!(file.mode_change);
        assert_eq!(file.hunks.len(), 1);
        let pseudo = &file.hunks[0];
        assert!(pseudo.is_pseudo());
        assert_eq!(
            &diff.plain[pseudo.start..pseudo.end],
            b"old mode 100644\nnew mode 100755\n"
        );
        // Nested inside the head range.
        assert!(pseudo.start >= file.head.start && pseudo.end <= file.head.end);
    }

    #[test]
    fn double_mode_change_is_rejected() {
        let err = parse_diff(
            BString::from(
                "diff --git a/f b/f\nold mode 100644\nnew mode 100755\n\
                 old mode 100755\nnew mode 100644\n",
            ),
            BString::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SelectError::InvalidDiff(_)));
    }

    #[test]
    fn deleted_file_is_one_pseudo_hunk() {
        let diff = parse(
            "diff --git a/f b/f\ndeleted file mode 100644\nindex 0123456..0000000\n\
             --- a/f\n+++ /dev/null\n@@ -1,2 +0,0 @@\n-a\n-b\n",
        );
        let file = &diff.files[0];
        assert!(file.deleted);
        assert_eq!(file.hunks.len(), 1);
        assert!(file.hunks[0].is_pseudo());
        // The remainder, @@ line included, stays in the pseudo-hunk.
        assert!(diff.plain[file.hunks[0].start..file.hunks[0].end]
            .contains_str("@@ -1,2 +0,0 @@"));
    }

    #[test]
    fn added_file_sets_the_flag() {
        let diff = parse(
            "diff --git a/f b/f\nnew file mode 100644\nindex 0000000..0123456\n\
             --- /dev/null\n+++ b/f\n@@ -0,0 +1,2 @@\n+a\n+b\n",
        );
        assert!(diff.files[0].added);
        assert!(!diff.files[0].hunks[0].is_pseudo());
    }

    #[test]
    fn binary_file_sets_the_flag() {
        let diff = parse(
            "diff --git a/f b/f\nindex 0123456..789abcd 100644\n\
             Binary files a/f and b/f differ\n",
        );
        assert!(diff.files[0].binary);
        assert!(diff.files[0].hunks.is_empty());
    }

    #[test]
    fn colored_stream_must_match_line_for_line() {
        let plain = BString::from("diff --git a/f b/f\n--- a/f\n+++ b/f\n@@ -1 +1 @@\n-a\n+b\n");
        let short = BString::from("diff --git a/f b/f\n--- a/f\n+++ b/f\n@@ -1 +1 @@\n-a\n");
        let err = parse_diff(plain, short).unwrap_err();
        assert!(matches!(err, SelectError::MismatchedColoredOutput));
    }

    #[test]
    fn colored_stream_longer_than_plain_is_rejected() {
        let plain = BString::from("diff --git a/f b/f\n@@ -1 +1 @@\n-a\n+b\n");
        let long = BString::from("diff --git a/f b/f\n@@ -1 +1 @@\n-a\n+b\nextra\n");
        let err = parse_diff(plain, long).unwrap_err();
        assert!(matches!(err, SelectError::MismatchedColoredOutput));
    }

    #[test]
    fn colored_extra_range_is_located() {
        let plain = BString::from("diff --git a/f b/f\n@@ -1 +1 @@ main\n-a\n+b\n");
        let colored = BString::from(
            "\x1b[1mdiff --git a/f b/f\x1b[0m\n\x1b[36m@@ -1 +1 @@ main\x1b[0m\n\x1b[31m-a\x1b[0m\n\x1b[32m+b\x1b[0m\n",
        );
        let diff = parse_diff(plain, colored).unwrap();
        let header = diff.files[0].hunks[0].header;
        assert!(!header.suppress_colored_line_range);
        let extra =
            &diff.colored[header.colored_extra_start..header.colored_extra_end];
        assert_eq!(extra, b" main\x1b[0m\n");
    }

    #[test]
    fn unparseable_colored_header_is_kept_verbatim() {
        let plain = BString::from("diff --git a/f b/f\n@@ -1 +1 @@\n-a\n+b\n");
        let colored = BString::from("diff --git a/f b/f\nFRAG HEADER\n-a\n+b\n");
        let diff = parse_diff(plain, colored).unwrap();
        assert!(diff.files[0].hunks[0].header.suppress_colored_line_range);
    }

    #[test]
    fn leading_garbage_is_rejected() {
        let err = parse_diff(BString::from("not a diff\n"), BString::default()).unwrap_err();
        assert!(matches!(err, SelectError::InvalidDiff(_)));
    }

    #[test]
    fn empty_input_yields_no_files() {
        let diff = parse_diff(BString::default(), BString::default()).unwrap();
        assert!(diff.files.is_empty());
    }

    #[test]
    fn flags_stay_mutually_exclusive() {
        for input in [
            "diff --git a/f b/f\nnew file mode 100644\ndeleted file mode 100644\n",
            "diff --git a/f b/f\nold mode 100644\nnew mode 100755\nnew file mode 100644\n",
        ] {
            let err = parse_diff(BString::from(input), BString::default()).unwrap_err();
            assert!(matches!(err, SelectError::InvalidDiff(_)), "{input}");
        }
    }
}
