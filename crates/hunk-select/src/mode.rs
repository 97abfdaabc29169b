//! The patch-mode table.
//!
//! Each mode fixes the arguments handed to the external differ and applier,
//! the direction of the diff, and the wording of every prompt. The engine
//! itself is mode-agnostic apart from `is_reverse` and the dual-target
//! `apply_for_checkout` flow.

/// Which prompt template a file presents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    ModeChange = 0,
    Deletion = 1,
    Addition = 2,
    Hunk = 3,
}

/// One patch mode: external-command argument sets plus prompt wording.
///
/// Prompt templates contain a `{}` marker where the currently-permitted
/// extra commands are spliced in.
pub struct PatchMode {
    /// Arguments for the external differ (after the program name).
    pub diff_args: &'static [&'static str],
    /// Arguments for the external applier (after `apply`).
    pub apply_args: &'static [&'static str],
    /// Arguments for the applier's `--check` run (after `apply --check`).
    pub apply_check_args: &'static [&'static str],
    /// `+` lines are removals and `-` lines additions in this mode.
    pub is_reverse: bool,
    /// The mode touches only the index, never the worktree.
    pub index_only: bool,
    /// Use the dual-target check-index-and-worktree apply flow.
    pub apply_for_checkout: bool,
    /// Prompts indexed by [`PromptKind`].
    pub prompts: [&'static str; 4],
    pub edit_hunk_hint: &'static str,
    pub help_text: &'static str,
}

pub static PATCH_MODE_ADD: PatchMode = PatchMode {
    diff_args: &["diff-files"],
    apply_args: &["--cached"],
    apply_check_args: &["--cached"],
    is_reverse: false,
    index_only: true,
    apply_for_checkout: false,
    prompts: [
        "Stage mode change [y,n,q,a,d{},?]? ",
        "Stage deletion [y,n,q,a,d{},?]? ",
        "Stage addition [y,n,q,a,d{},?]? ",
        "Stage this hunk [y,n,q,a,d{},?]? ",
    ],
    edit_hunk_hint: "If the patch applies cleanly, the edited hunk will immediately be marked for staging.",
    help_text: "y - stage this hunk\n\
                n - do not stage this hunk\n\
                q - quit; do not stage this hunk or any of the remaining ones\n\
                a - stage this hunk and all later hunks in the file\n\
                d - do not stage this hunk or any of the later hunks in the file\n",
};

pub static PATCH_MODE_STASH: PatchMode = PatchMode {
    diff_args: &["diff-index", "HEAD"],
    apply_args: &["--cached"],
    apply_check_args: &["--cached"],
    is_reverse: false,
    index_only: true,
    apply_for_checkout: false,
    prompts: [
        "Stash mode change [y,n,q,a,d{},?]? ",
        "Stash deletion [y,n,q,a,d{},?]? ",
        "Stash addition [y,n,q,a,d{},?]? ",
        "Stash this hunk [y,n,q,a,d{},?]? ",
    ],
    edit_hunk_hint: "If the patch applies cleanly, the edited hunk will immediately be marked for stashing.",
    help_text: "y - stash this hunk\n\
                n - do not stash this hunk\n\
                q - quit; do not stash this hunk or any of the remaining ones\n\
                a - stash this hunk and all later hunks in the file\n\
                d - do not stash this hunk or any of the later hunks in the file\n",
};

pub static PATCH_MODE_RESET_HEAD: PatchMode = PatchMode {
    diff_args: &["diff-index", "--cached"],
    apply_args: &["-R", "--cached"],
    apply_check_args: &["-R", "--cached"],
    is_reverse: true,
    index_only: true,
    apply_for_checkout: false,
    prompts: [
        "Unstage mode change [y,n,q,a,d{},?]? ",
        "Unstage deletion [y,n,q,a,d{},?]? ",
        "Unstage addition [y,n,q,a,d{},?]? ",
        "Unstage this hunk [y,n,q,a,d{},?]? ",
    ],
    edit_hunk_hint: "If the patch applies cleanly, the edited hunk will immediately be marked for unstaging.",
    help_text: "y - unstage this hunk\n\
                n - do not unstage this hunk\n\
                q - quit; do not unstage this hunk or any of the remaining ones\n\
                a - unstage this hunk and all later hunks in the file\n\
                d - do not unstage this hunk or any of the later hunks in the file\n",
};

pub static PATCH_MODE_RESET_NOTHEAD: PatchMode = PatchMode {
    diff_args: &["diff-index", "-R", "--cached"],
    apply_args: &["--cached"],
    apply_check_args: &["--cached"],
    is_reverse: false,
    index_only: true,
    apply_for_checkout: false,
    prompts: [
        "Apply mode change to index [y,n,q,a,d{},?]? ",
        "Apply deletion to index [y,n,q,a,d{},?]? ",
        "Apply addition to index [y,n,q,a,d{},?]? ",
        "Apply this hunk to index [y,n,q,a,d{},?]? ",
    ],
    edit_hunk_hint: "If the patch applies cleanly, the edited hunk will immediately be marked for applying.",
    help_text: "y - apply this hunk to index\n\
                n - do not apply this hunk to index\n\
                q - quit; do not apply this hunk or any of the remaining ones\n\
                a - apply this hunk and all later hunks in the file\n\
                d - do not apply this hunk or any of the later hunks in the file\n",
};

pub static PATCH_MODE_CHECKOUT_INDEX: PatchMode = PatchMode {
    diff_args: &["diff-files"],
    apply_args: &["-R"],
    apply_check_args: &["-R"],
    is_reverse: true,
    index_only: false,
    apply_for_checkout: false,
    prompts: [
        "Discard mode change from worktree [y,n,q,a,d{},?]? ",
        "Discard deletion from worktree [y,n,q,a,d{},?]? ",
        "Discard addition from worktree [y,n,q,a,d{},?]? ",
        "Discard this hunk from worktree [y,n,q,a,d{},?]? ",
    ],
    edit_hunk_hint: "If the patch applies cleanly, the edited hunk will immediately be marked for discarding.",
    help_text: "y - discard this hunk from worktree\n\
                n - do not discard this hunk from worktree\n\
                q - quit; do not discard this hunk or any of the remaining ones\n\
                a - discard this hunk and all later hunks in the file\n\
                d - do not discard this hunk or any of the later hunks in the file\n",
};

pub static PATCH_MODE_CHECKOUT_HEAD: PatchMode = PatchMode {
    diff_args: &["diff-index"],
    apply_args: &[],
    apply_check_args: &["-R"],
    is_reverse: true,
    index_only: false,
    apply_for_checkout: true,
    prompts: [
        "Discard mode change from index and worktree [y,n,q,a,d{},?]? ",
        "Discard deletion from index and worktree [y,n,q,a,d{},?]? ",
        "Discard addition from index and worktree [y,n,q,a,d{},?]? ",
        "Discard this hunk from index and worktree [y,n,q,a,d{},?]? ",
    ],
    edit_hunk_hint: "If the patch applies cleanly, the edited hunk will immediately be marked for discarding.",
    help_text: "y - discard this hunk from index and worktree\n\
                n - do not discard this hunk from index and worktree\n\
                q - quit; do not discard this hunk or any of the remaining ones\n\
                a - discard this hunk and all later hunks in the file\n\
                d - do not discard this hunk or any of the later hunks in the file\n",
};

pub static PATCH_MODE_CHECKOUT_NOTHEAD: PatchMode = PatchMode {
    diff_args: &["diff-index", "-R"],
    apply_args: &[],
    apply_check_args: &[],
    is_reverse: false,
    index_only: false,
    apply_for_checkout: true,
    prompts: [
        "Apply mode change to index and worktree [y,n,q,a,d{},?]? ",
        "Apply deletion to index and worktree [y,n,q,a,d{},?]? ",
        "Apply addition to index and worktree [y,n,q,a,d{},?]? ",
        "Apply this hunk to index and worktree [y,n,q,a,d{},?]? ",
    ],
    edit_hunk_hint: "If the patch applies cleanly, the edited hunk will immediately be marked for applying.",
    help_text: "y - apply this hunk to index and worktree\n\
                n - do not apply this hunk to index and worktree\n\
                q - quit; do not apply this hunk or any of the remaining ones\n\
                a - apply this hunk and all later hunks in the file\n\
                d - do not apply this hunk or any of the later hunks in the file\n",
};

pub static PATCH_MODE_WORKTREE_HEAD: PatchMode = PatchMode {
    diff_args: &["diff-index"],
    apply_args: &["-R"],
    apply_check_args: &["-R"],
    is_reverse: true,
    index_only: false,
    apply_for_checkout: false,
    prompts: [
        "Discard mode change from worktree [y,n,q,a,d{},?]? ",
        "Discard deletion from worktree [y,n,q,a,d{},?]? ",
        "Discard addition from worktree [y,n,q,a,d{},?]? ",
        "Discard this hunk from worktree [y,n,q,a,d{},?]? ",
    ],
    edit_hunk_hint: "If the patch applies cleanly, the edited hunk will immediately be marked for discarding.",
    help_text: "y - discard this hunk from worktree\n\
                n - do not discard this hunk from worktree\n\
                q - quit; do not discard this hunk or any of the remaining ones\n\
                a - discard this hunk and all later hunks in the file\n\
                d - do not discard this hunk or any of the later hunks in the file\n",
};

pub static PATCH_MODE_WORKTREE_NOTHEAD: PatchMode = PatchMode {
    diff_args: &["diff-index", "-R"],
    apply_args: &[],
    apply_check_args: &[],
    is_reverse: false,
    index_only: false,
    apply_for_checkout: false,
    prompts: [
        "Apply mode change to worktree [y,n,q,a,d{},?]? ",
        "Apply deletion to worktree [y,n,q,a,d{},?]? ",
        "Apply addition to worktree [y,n,q,a,d{},?]? ",
        "Apply this hunk to worktree [y,n,q,a,d{},?]? ",
    ],
    edit_hunk_hint: "If the patch applies cleanly, the edited hunk will immediately be marked for applying.",
    help_text: "y - apply this hunk to worktree\n\
                n - do not apply this hunk to worktree\n\
                q - quit; do not apply this hunk or any of the remaining ones\n\
                a - apply this hunk and all later hunks in the file\n\
                d - do not apply this hunk or any of the later hunks in the file\n",
};

/// What the front-end asked for; combined with the optional revision this
/// resolves to a concrete [`PatchMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchGoal {
    Stage,
    Stash,
    Reset,
    Checkout,
    Worktree,
}

/// Resolve a goal plus optional revision to a patch mode.
pub fn resolve_mode(goal: PatchGoal, revision: Option<&str>) -> &'static PatchMode {
    match goal {
        PatchGoal::Stage => &PATCH_MODE_ADD,
        PatchGoal::Stash => &PATCH_MODE_STASH,
        PatchGoal::Reset => match revision {
            None | Some("HEAD") => &PATCH_MODE_RESET_HEAD,
            Some(_) => &PATCH_MODE_RESET_NOTHEAD,
        },
        PatchGoal::Checkout => match revision {
            None => &PATCH_MODE_CHECKOUT_INDEX,
            Some("HEAD") => &PATCH_MODE_CHECKOUT_HEAD,
            Some(_) => &PATCH_MODE_CHECKOUT_NOTHEAD,
        },
        PatchGoal::Worktree => match revision {
            None => &PATCH_MODE_CHECKOUT_INDEX,
            Some("HEAD") => &PATCH_MODE_WORKTREE_HEAD,
            Some(_) => &PATCH_MODE_WORKTREE_NOTHEAD,
        },
    }
}
