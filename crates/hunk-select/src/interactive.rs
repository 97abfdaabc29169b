//! The per-file selection loop.
//!
//! Prompts are written to the output stream and commands read line by line
//! from the input stream (the CLI hands in `/dev/tty` so selection works
//! with piped stdin). The first byte of the answer is the command;
//! `y/n/a/d/q` are case-insensitive, the navigation and tool commands are
//! not. A permission set is recomputed before every prompt and decides
//! which extra commands the prompt advertises.

use std::io::{BufRead, Write};

use regex::bytes::RegexBuilder;

use crate::apply::{self, Applier};
use crate::edit::{self, EditParse, HunkEditor};
use crate::mode::PromptKind;
use crate::reassemble::reassemble_patch;
use crate::render::{render_diff_header, render_hunk, summarize_hunk};
use crate::split::split_hunk;
use crate::{Decision, Hunk, Result, SelectError, SelectState};

const ALLOW_GOTO_PREVIOUS_HUNK: u32 = 1 << 0;
const ALLOW_GOTO_PREVIOUS_UNDECIDED_HUNK: u32 = 1 << 1;
const ALLOW_GOTO_NEXT_HUNK: u32 = 1 << 2;
const ALLOW_GOTO_NEXT_UNDECIDED_HUNK: u32 = 1 << 3;
const ALLOW_SEARCH_AND_GOTO: u32 = 1 << 4;
const ALLOW_SPLIT: u32 = 1 << 5;
const ALLOW_EDIT: u32 = 1 << 6;

const DISPLAY_HUNKS_LINES: usize = 20;

const HELP_REMAINDER: &str = "\
j - leave this hunk undecided, see next undecided hunk
J - leave this hunk undecided, see next hunk
k - leave this hunk undecided, see previous undecided hunk
K - leave this hunk undecided, see previous hunk
g - select a hunk to go to
/ - search for a hunk matching the given regex
s - split the current hunk into smaller hunks
e - manually edit the current hunk
p - print the current hunk
? - print help
";

/// Drives the selection session over a parsed diff.
pub struct PatchSelector<R, W, E, A> {
    state: SelectState,
    input: R,
    out: W,
    editor: E,
    applier: A,
}

impl<R: BufRead, W: Write, E: HunkEditor, A: Applier> PatchSelector<R, W, E, A> {
    pub fn new(state: SelectState, input: R, out: W, editor: E, applier: A) -> Self {
        Self {
            state,
            input,
            out,
            editor,
            applier,
        }
    }

    /// Walk every file, prompting per hunk, and deliver each file's
    /// selection to the applier as soon as its loop ends.
    pub fn run(mut self) -> Result<()> {
        let file_count = self.state.diff.files.len();
        let mut binary_count = 0;

        for i in 0..file_count {
            let skip_binary = {
                let file = &self.state.diff.files[i];
                file.binary && file.hunks.is_empty()
            };
            if skip_binary {
                binary_count += 1;
                continue;
            }
            if self.update_file(i)? {
                break;
            }
        }

        if file_count == 0 {
            self.err("No changes.")?;
        } else if binary_count == file_count {
            self.err("Only binary files changed.")?;
        }
        Ok(())
    }

    /// Returns true when the user quit the whole session.
    fn update_file(&mut self, file_index: usize) -> Result<bool> {
        {
            let file = &self.state.diff.files[file_index];
            // Empty added files have no hunks but still get a prompt.
            if file.hunks.is_empty() && !file.added {
                return Ok(false);
            }
        }
        let colored = self.state.diff.has_color();

        let mut buf = Vec::new();
        render_diff_header(&self.state, &self.state.diff.files[file_index], colored, &mut buf);
        self.out.write_all(&buf)?;

        let mut hunk_index = 0usize;
        let mut rendered: Option<usize> = None;
        let mut quit = false;

        loop {
            let (num, deleted, added, mode_change) = {
                let file = &self.state.diff.files[file_index];
                (file.hunks.len(), file.deleted, file.added, file.mode_change)
            };
            if hunk_index >= num {
                hunk_index = 0;
            }

            let mut undecided_previous = None;
            let mut undecided_next = None;
            if num > 0 {
                let hunks = &self.state.diff.files[file_index].hunks;
                for i in (0..hunk_index).rev() {
                    if hunks[i].decision == Decision::Undecided {
                        undecided_previous = Some(i);
                        break;
                    }
                }
                for (i, hunk) in hunks.iter().enumerate().skip(hunk_index + 1) {
                    if hunk.decision == Decision::Undecided {
                        undecided_next = Some(i);
                        break;
                    }
                }
            }

            // Everything decided?
            let current_decision = {
                let file = &self.state.diff.files[file_index];
                if num > 0 {
                    file.hunks[hunk_index].decision
                } else {
                    file.head.decision
                }
            };
            if undecided_previous.is_none()
                && undecided_next.is_none()
                && current_decision != Decision::Undecided
            {
                break;
            }

            let mut permitted = 0u32;
            let mut extras = String::new();
            if num > 0 {
                if rendered != Some(hunk_index) {
                    let mut buf = Vec::new();
                    render_hunk(
                        &self.state,
                        &self.state.diff.files[file_index].hunks[hunk_index],
                        0,
                        colored,
                        &mut buf,
                    );
                    self.out.write_all(&buf)?;
                    rendered = Some(hunk_index);
                }

                if undecided_previous.is_some() {
                    permitted |= ALLOW_GOTO_PREVIOUS_UNDECIDED_HUNK;
                    extras.push_str(",k");
                }
                if hunk_index > 0 {
                    permitted |= ALLOW_GOTO_PREVIOUS_HUNK;
                    extras.push_str(",K");
                }
                if undecided_next.is_some() {
                    permitted |= ALLOW_GOTO_NEXT_UNDECIDED_HUNK;
                    extras.push_str(",j");
                }
                if hunk_index + 1 < num {
                    permitted |= ALLOW_GOTO_NEXT_HUNK;
                    extras.push_str(",J");
                }
                if num > 1 {
                    permitted |= ALLOW_SEARCH_AND_GOTO;
                    extras.push_str(",g,/");
                }
                if self.state.diff.files[file_index].hunks[hunk_index].splittable_into > 1 {
                    permitted |= ALLOW_SPLIT;
                    extras.push_str(",s");
                }
                // The mode-change pseudo-hunk and deleted-file remainders
                // have no meaningful edit.
                if hunk_index + 1 > usize::from(mode_change) && !deleted {
                    permitted |= ALLOW_EDIT;
                    extras.push_str(",e");
                }
                extras.push_str(",p");
            }

            let prompt_kind = if deleted {
                PromptKind::Deletion
            } else if added {
                PromptKind::Addition
            } else if mode_change && hunk_index == 0 {
                PromptKind::ModeChange
            } else {
                PromptKind::Hunk
            };
            let total = if num > 0 { num } else { 1 };
            let prompt = self.state.mode.prompts[prompt_kind as usize].replace("{}", &extras);
            write!(
                self.out,
                "{}({}/{}) {}",
                self.state.colors.prompt,
                hunk_index + 1,
                total,
                prompt
            )?;
            if !self.state.colors.reset.is_empty() {
                self.out.write_all(self.state.colors.reset.as_bytes())?;
            }
            self.out.flush()?;

            let answer = match self.read_line()? {
                Some(answer) => answer,
                None => break,
            };
            if answer.is_empty() {
                continue;
            }
            let first = answer.as_bytes()[0];
            let lowered = first.to_ascii_lowercase();

            // 'g' takes a hunk number and '/' takes a regexp.
            if answer.len() != 1 && lowered != b'g' && lowered != b'/' {
                let msg = format!("Only one letter is expected, got '{answer}'");
                self.err(&msg)?;
                continue;
            }

            if lowered == b'y' || lowered == b'n' {
                let decision = if lowered == b'y' {
                    Decision::Use
                } else {
                    Decision::Skip
                };
                let file = &mut self.state.diff.files[file_index];
                if num > 0 {
                    file.hunks[hunk_index].decision = decision;
                } else {
                    file.head.decision = decision;
                }
                hunk_index = undecided_next.unwrap_or(num);
            } else if lowered == b'a' || lowered == b'd' || lowered == b'q' {
                let decision = if lowered == b'a' {
                    Decision::Use
                } else {
                    Decision::Skip
                };
                let file = &mut self.state.diff.files[file_index];
                if num > 0 {
                    for hunk in &mut file.hunks[hunk_index..] {
                        if hunk.decision == Decision::Undecided {
                            hunk.decision = decision;
                        }
                    }
                    hunk_index = num;
                } else if file.head.decision == Decision::Undecided {
                    file.head.decision = decision;
                }
                if lowered == b'q' {
                    quit = true;
                    break;
                }
            } else if first == b'K' {
                if permitted & ALLOW_GOTO_PREVIOUS_HUNK != 0 {
                    hunk_index -= 1;
                } else {
                    self.err("No previous hunk")?;
                }
            } else if first == b'J' {
                if permitted & ALLOW_GOTO_NEXT_HUNK != 0 {
                    hunk_index += 1;
                } else {
                    self.err("No next hunk")?;
                }
            } else if first == b'k' {
                match undecided_previous {
                    Some(i) if permitted & ALLOW_GOTO_PREVIOUS_UNDECIDED_HUNK != 0 => {
                        hunk_index = i;
                    }
                    _ => self.err("No previous hunk")?,
                }
            } else if first == b'j' {
                match undecided_next {
                    Some(i) if permitted & ALLOW_GOTO_NEXT_UNDECIDED_HUNK != 0 => {
                        hunk_index = i;
                    }
                    _ => self.err("No next hunk")?,
                }
            } else if first == b'g' {
                if permitted & ALLOW_SEARCH_AND_GOTO == 0 {
                    self.err("No other hunks to goto")?;
                    continue;
                }
                let arg = answer[1..].trim().to_string();
                hunk_index =
                    self.goto_hunk(file_index, hunk_index, num, mode_change, &arg)?;
            } else if first == b'/' {
                if permitted & ALLOW_SEARCH_AND_GOTO == 0 {
                    self.err("No other hunks to search")?;
                    continue;
                }
                let arg = answer[1..].to_string();
                match self.search_hunk(file_index, hunk_index, num, &arg)? {
                    Some(i) => hunk_index = i,
                    None => break,
                }
            } else if first == b's' {
                if permitted & ALLOW_SPLIT == 0 {
                    self.err("Sorry, cannot split this hunk")?;
                } else {
                    let count =
                        self.state.diff.files[file_index].hunks[hunk_index].splittable_into;
                    split_hunk(&mut self.state.diff, file_index, hunk_index)?;
                    writeln!(
                        self.out,
                        "{}Split into {} hunks.{}",
                        self.state.colors.header, count, self.state.colors.reset
                    )?;
                    rendered = None;
                }
            } else if first == b'e' {
                if permitted & ALLOW_EDIT == 0 {
                    self.err("Sorry, cannot edit this hunk")?;
                } else if self.edit_hunk_loop(file_index, hunk_index)? {
                    self.state.diff.files[file_index].hunks[hunk_index].decision = Decision::Use;
                    hunk_index = undecided_next.unwrap_or(num);
                }
            } else if first == b'p' {
                rendered = None;
            } else if first == b'?' {
                self.show_help(&extras)?;
            } else {
                let msg = format!("Unknown command '{answer}' (use '?' for help)");
                self.err(&msg)?;
            }
        }

        self.apply_selection(file_index)?;
        writeln!(self.out)?;
        Ok(quit)
    }

    /// The `g` command: page through numbered summaries until the user
    /// names a hunk.
    fn goto_hunk(
        &mut self,
        file_index: usize,
        hunk_index: usize,
        num: usize,
        mode_change: bool,
        initial: &str,
    ) -> Result<usize> {
        let floor = usize::from(mode_change);
        let mut start = (hunk_index as isize - (DISPLAY_HUNKS_LINES / 2) as isize)
            .max(floor as isize) as usize;

        let mut answer = initial.to_string();
        while answer.is_empty() {
            start = self.display_hunks(file_index, start)?;
            let prompt = if start < num {
                "go to which hunk (<ret> to see more)? "
            } else {
                "go to which hunk? "
            };
            write!(self.out, "{prompt}")?;
            self.out.flush()?;
            match self.read_line()? {
                Some(line) => answer = line.trim().to_string(),
                None => break,
            }
        }

        match answer.parse::<usize>() {
            Ok(n) if (1..=num).contains(&n) => Ok(n - 1),
            Ok(_) => {
                let msg = if num == 1 {
                    format!("Sorry, only {num} hunk available.")
                } else {
                    format!("Sorry, only {num} hunks available.")
                };
                self.err(&msg)?;
                Ok(hunk_index)
            }
            Err(_) => {
                let msg = format!("Invalid number: '{answer}'");
                self.err(&msg)?;
                Ok(hunk_index)
            }
        }
    }

    /// Print up to a page of hunk summaries; returns the next start index.
    fn display_hunks(&mut self, file_index: usize, start: usize) -> Result<usize> {
        let num = self.state.diff.files[file_index].hunks.len();
        let end = (start + DISPLAY_HUNKS_LINES).min(num);
        for i in start..end {
            let mut buf;
            {
                let hunk = &self.state.diff.files[file_index].hunks[i];
                let sign = match hunk.decision {
                    Decision::Use => '+',
                    Decision::Skip => '-',
                    Decision::Undecided => ' ',
                };
                buf = format!("{}{:2}: ", sign, i + 1).into_bytes();
                summarize_hunk(&self.state, hunk, &mut buf);
            }
            self.out.write_all(&buf)?;
        }
        Ok(end)
    }

    /// The `/` command. Returns the new hunk index, or `None` on EOF.
    fn search_hunk(
        &mut self,
        file_index: usize,
        hunk_index: usize,
        num: usize,
        initial: &str,
    ) -> Result<Option<usize>> {
        let mut pattern = initial.to_string();
        if pattern.is_empty() {
            write!(self.out, "search for regex? ")?;
            self.out.flush()?;
            match self.read_line()? {
                Some(line) => pattern = line,
                None => return Ok(None),
            }
            if pattern.is_empty() {
                return Ok(Some(hunk_index));
            }
        }

        let regex = match RegexBuilder::new(&pattern).multi_line(true).build() {
            Ok(regex) => regex,
            Err(e) => {
                let msg = format!("Malformed search regexp {pattern}: {e}");
                self.err(&msg)?;
                return Ok(Some(hunk_index));
            }
        };

        let mut i = hunk_index;
        loop {
            let mut buf = Vec::new();
            render_hunk(
                &self.state,
                &self.state.diff.files[file_index].hunks[i],
                0,
                false,
                &mut buf,
            );
            if regex.is_match(&buf) {
                break;
            }
            i = (i + 1) % num;
            if i == hunk_index {
                self.err("No hunk matches the given pattern")?;
                break;
            }
        }
        Ok(Some(i))
    }

    /// The `e` command: editor round-trips until the edit parses and the
    /// whole file still applies, or the user gives up.
    fn edit_hunk_loop(&mut self, file_index: usize, hunk_index: usize) -> Result<bool> {
        let plain_len = self.state.diff.plain.len();
        let colored_len = self.state.diff.colored.len();
        let backup = self.state.diff.files[file_index].hunks[hunk_index].clone();

        loop {
            let scratch = edit::compose_scratch(&self.state, file_index, hunk_index);
            let edited = match self.editor.edit("hunk-edit.diff", &scratch) {
                Ok(bytes) => bytes,
                Err(e) => {
                    let msg = e.to_string();
                    self.err(&msg)?;
                    self.restore_hunk(file_index, hunk_index, &backup, plain_len, colored_len);
                    return Ok(false);
                }
            };

            match edit::parse_edited_hunk(&mut self.state, file_index, hunk_index, &edited)? {
                EditParse::Abandoned => {
                    self.restore_hunk(file_index, hunk_index, &backup, plain_len, colored_len);
                    return Ok(false);
                }
                EditParse::Ok => {
                    edit::recolor_hunk(&mut self.state, file_index, hunk_index);
                    match apply::run_apply_check(&mut self.state, file_index, &mut self.applier) {
                        Ok(true) => return Ok(true),
                        Ok(false) => {}
                        Err(
                            e @ (SelectError::ExpectedContextLine { .. }
                            | SelectError::HunksDoNotOverlap { .. }),
                        ) => {
                            let msg = e.to_string();
                            self.err(&msg)?;
                        }
                        Err(e) => return Err(e),
                    }
                    // Drop the rejected edit (it was appended to the
                    // buffers) and put the hunk back.
                    self.state.diff.plain.truncate(plain_len);
                    self.state.diff.colored.truncate(colored_len);
                    self.restore_hunk_shape(file_index, hunk_index, &backup);
                }
                EditParse::Failed(inference_error) => {
                    if let Some(e) = inference_error {
                        let msg = e.to_string();
                        self.err(&msg)?;
                    }
                }
            }

            let again = self.prompt_yesno(
                "Your edited hunk does not apply. Edit again (saying \"no\" discards!) [y/n]? ",
            )?;
            if again != Some(true) {
                self.restore_hunk(file_index, hunk_index, &backup, plain_len, colored_len);
                return Ok(false);
            }
        }
    }

    fn restore_hunk_shape(&mut self, file_index: usize, hunk_index: usize, backup: &Hunk) {
        let hunk = &mut self.state.diff.files[file_index].hunks[hunk_index];
        // The pre-image snapshot survives restore attempts.
        let orig = hunk.orig;
        let orig_image = std::mem::take(&mut hunk.orig_image);
        *hunk = backup.clone();
        hunk.orig = orig;
        hunk.orig_image = orig_image;
    }

    fn restore_hunk(
        &mut self,
        file_index: usize,
        hunk_index: usize,
        backup: &Hunk,
        plain_len: usize,
        colored_len: usize,
    ) {
        self.state.diff.plain.truncate(plain_len);
        self.state.diff.colored.truncate(colored_len);
        self.restore_hunk_shape(file_index, hunk_index, backup);
    }

    /// Reassemble and deliver the file's selection, if any hunk was taken.
    fn apply_selection(&mut self, file_index: usize) -> Result<()> {
        let any_use = {
            let file = &self.state.diff.files[file_index];
            file.hunks.iter().any(|h| h.decision == Decision::Use)
                || (file.hunks.is_empty() && file.head.decision == Decision::Use)
        };
        if !any_use {
            return Ok(());
        }

        let mut patch = Vec::new();
        match reassemble_patch(&mut self.state, file_index, false, &mut patch) {
            Ok(()) => {}
            Err(
                e @ (SelectError::ExpectedContextLine { .. }
                | SelectError::HunksDoNotOverlap { .. }),
            ) => {
                let msg = e.to_string();
                self.err(&msg)?;
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        if self.state.mode.apply_for_checkout {
            self.apply_for_checkout(&patch)?;
        } else {
            let args = apply::apply_args(&self.state);
            if !self.applier.run(&args, &patch)? {
                self.err("'git apply' failed")?;
            }
        }
        Ok(())
    }

    /// The dual-target flow: check index and worktree independently, apply
    /// to both when possible, fall back to a worktree-only prompt, and as
    /// a last resort print the patch.
    fn apply_for_checkout(&mut self, patch: &[u8]) -> Result<()> {
        let reverse: &[&str] = if self.state.mode.is_reverse {
            &["-R"]
        } else {
            &[]
        };

        let check_index: Vec<&str> = [&["apply", "--cached", "--check"][..], reverse].concat();
        let applies_index = self.applier.run(&check_index, patch)?;
        let check_worktree: Vec<&str> = [&["apply", "--check"][..], reverse].concat();
        let applies_worktree = self.applier.run(&check_worktree, patch)?;

        if applies_index && applies_worktree {
            let apply_index: Vec<&str> = [&["apply", "--cached"][..], reverse].concat();
            self.applier.run(&apply_index, patch)?;
            let apply_worktree: Vec<&str> = [&["apply"][..], reverse].concat();
            self.applier.run(&apply_worktree, patch)?;
        } else if !applies_index && applies_worktree {
            self.err("The selected hunks do not apply to the index!")?;
            if self.prompt_yesno("Apply them to the worktree anyway? ")? == Some(true) {
                let apply_worktree: Vec<&str> = [&["apply"][..], reverse].concat();
                self.applier.run(&apply_worktree, patch)?;
            } else {
                self.err("Nothing was applied.")?;
            }
        } else {
            // As a last resort, show the patch to the user.
            self.out.write_all(patch)?;
        }
        Ok(())
    }

    /// The `?` command: the mode's help plus only those generic lines whose
    /// command is currently permitted.
    fn show_help(&mut self, extras: &str) -> Result<()> {
        write!(
            self.out,
            "{}{}{}",
            self.state.colors.help, self.state.mode.help_text, self.state.colors.reset
        )?;
        for line in HELP_REMAINDER.lines() {
            let command = line.as_bytes()[0];
            if command != b'?' && !extras.as_bytes().contains(&command) {
                continue;
            }
            writeln!(
                self.out,
                "{}{}{}",
                self.state.colors.help, line, self.state.colors.reset
            )?;
        }
        Ok(())
    }

    fn prompt_yesno(&mut self, prompt: &str) -> Result<Option<bool>> {
        loop {
            write!(self.out, "{}{}{}", self.state.colors.prompt, prompt, self.state.colors.reset)?;
            self.out.flush()?;
            let answer = match self.read_line()? {
                Some(answer) => answer,
                None => return Ok(None),
            };
            // Accept 'no', 'yes', etc.; only the first byte decides.
            match answer.as_bytes().first().map(u8::to_ascii_lowercase) {
                Some(b'y') => return Ok(Some(true)),
                Some(b'n') => return Ok(Some(false)),
                _ => continue,
            }
        }
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    fn err(&mut self, msg: &str) -> Result<()> {
        writeln!(
            self.out,
            "{}{}{}",
            self.state.colors.error, msg, self.state.colors.reset
        )?;
        Ok(())
    }
}
