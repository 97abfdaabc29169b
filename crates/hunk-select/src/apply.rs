//! Delivering the reassembled patch to the external applier.

use hunk_utils::subprocess::{PipeCommand, StdioMode};

use crate::reassemble::reassemble_patch;
use crate::{Result, SelectState};

/// External applier interface.
///
/// `args` is the full argument list after the program name (e.g.
/// `["apply", "--cached", "--check"]`); the patch is fed on stdin. Returns
/// whether the applier exited successfully.
pub trait Applier {
    fn run(&mut self, args: &[&str], patch: &[u8]) -> Result<bool>;
}

/// [`Applier`] that invokes `git`, letting its diagnostics through to the
/// user's stderr.
pub struct GitApplier;

impl Applier for GitApplier {
    fn run(&mut self, args: &[&str], patch: &[u8]) -> Result<bool> {
        let result = PipeCommand::new("git")
            .args(args)
            .input(patch.to_vec())
            .stdout(StdioMode::Null)
            .stderr(StdioMode::Inherit)
            .run()?;
        Ok(result.success())
    }
}

/// Check whether the whole file (every hunk, decisions ignored) still
/// applies. Used to vet an edited hunk before accepting it.
pub fn run_apply_check(
    state: &mut SelectState,
    file_index: usize,
    applier: &mut dyn Applier,
) -> Result<bool> {
    let mut patch = Vec::new();
    reassemble_patch(state, file_index, true, &mut patch)?;

    let mut args: Vec<&str> = vec!["apply", "--check"];
    args.extend_from_slice(state.mode.apply_check_args);
    applier.run(&args, &patch)
}

/// Argument list for the mode's final single-target apply.
pub fn apply_args(state: &SelectState) -> Vec<&'static str> {
    let mut args: Vec<&'static str> = vec!["apply"];
    args.extend_from_slice(state.mode.apply_args);
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::PATCH_MODE_ADD;
    use crate::parse::parse_diff;
    use bstr::BString;
    use hunk_utils::color::Palette;

    struct RecordingApplier {
        calls: Vec<(Vec<String>, Vec<u8>)>,
        answer: bool,
    }

    impl Applier for RecordingApplier {
        fn run(&mut self, args: &[&str], patch: &[u8]) -> Result<bool> {
            self.calls
                .push((args.iter().map(|s| s.to_string()).collect(), patch.to_vec()));
            Ok(self.answer)
        }
    }

    #[test]
    fn apply_check_sends_the_whole_file() {
        let input = "diff --git a/f b/f\n--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n";
        let mut state = SelectState {
            diff: parse_diff(BString::from(input), BString::default()).unwrap(),
            mode: &PATCH_MODE_ADD,
            colors: Palette::plain(),
        };
        let mut applier = RecordingApplier {
            calls: Vec::new(),
            answer: true,
        };
        assert!(run_apply_check(&mut state, 0, &mut applier).unwrap());
        let (args, patch) = &applier.calls[0];
        assert_eq!(args, &["apply", "--check", "--cached"]);
        assert_eq!(patch, input.as_bytes());
    }

    #[test]
    fn apply_args_follow_the_mode() {
        let state = SelectState {
            diff: Default::default(),
            mode: &PATCH_MODE_ADD,
            colors: Palette::plain(),
        };
        assert_eq!(apply_args(&state), vec!["apply", "--cached"]);
    }
}
