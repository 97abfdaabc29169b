mod diff;

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use bstr::BString;
use clap::{Args, Parser, Subcommand};

use hunk_select::apply::GitApplier;
use hunk_select::edit::ExternalEditor;
use hunk_select::interactive::PatchSelector;
use hunk_select::mode::{resolve_mode, PatchGoal};
use hunk_select::parse::parse_diff;
use hunk_select::SelectState;
use hunk_utils::color::{self, ColorMode, Palette};

#[derive(Parser)]
#[command(
    name = "hunkr",
    about = "Interactive per-hunk selection for the index and worktree"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Run as if started in <path>
    #[arg(short = 'C', global = true)]
    directory: Option<PathBuf>,

    /// When to color output: auto, always, never
    #[arg(long, global = true, default_value = "auto")]
    color: String,

    /// Shell command the colored diff is piped through
    /// (defaults to $HUNKR_DIFF_FILTER)
    #[arg(long, global = true)]
    diff_filter: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Pick worktree hunks to stage into the index
    Stage(PathArgs),
    /// Pick hunks to stash
    Stash(PathArgs),
    /// Pick staged hunks to unstage, or apply <revision>'s to the index
    Reset(RevArgs),
    /// Pick hunks to discard from, or apply to, index and worktree
    Checkout(RevArgs),
    /// Pick hunks to discard from, or apply to, the worktree only
    Worktree(RevArgs),
}

#[derive(Args)]
struct PathArgs {
    /// Limit selection to the given paths
    #[arg(value_name = "pathspec")]
    paths: Vec<String>,
}

#[derive(Args)]
struct RevArgs {
    /// Revision to compare against
    #[arg(value_name = "revision")]
    revision: Option<String>,

    /// Limit selection to the given paths (after `--`)
    #[arg(value_name = "pathspec", last = true)]
    paths: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    if let Some(dir) = &cli.directory {
        if let Err(e) = std::env::set_current_dir(dir) {
            eprintln!("fatal: cannot change to '{}': {}", dir.display(), e);
            process::exit(128);
        }
    }

    match run(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("fatal: {e:#}");
            process::exit(128);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let (goal, revision, paths) = match &cli.command {
        Command::Stage(args) => (PatchGoal::Stage, None, args.paths.clone()),
        Command::Stash(args) => (PatchGoal::Stash, None, args.paths.clone()),
        Command::Reset(args) => (PatchGoal::Reset, args.revision.clone(), args.paths.clone()),
        Command::Checkout(args) => (
            PatchGoal::Checkout,
            args.revision.clone(),
            args.paths.clone(),
        ),
        Command::Worktree(args) => (
            PatchGoal::Worktree,
            args.revision.clone(),
            args.paths.clone(),
        ),
    };
    let mode = resolve_mode(goal, revision.as_deref());

    // `diff-index` needs a tree to compare against even when the mode
    // defaults to HEAD.
    let differ_revision = match goal {
        PatchGoal::Reset => Some(revision.clone().unwrap_or_else(|| "HEAD".to_string())),
        _ => revision.clone(),
    };

    let color_mode = match cli.color.as_str() {
        "always" => ColorMode::Always,
        "never" => ColorMode::Never,
        _ => ColorMode::Auto,
    };
    let color_enabled = color::use_color_stdout(color_mode);

    let diff_filter = cli
        .diff_filter
        .clone()
        .or_else(|| std::env::var("HUNKR_DIFF_FILTER").ok());
    let (plain, colored) = diff::capture_diff(
        mode,
        differ_revision.as_deref(),
        &paths,
        color_enabled,
        diff_filter.as_deref(),
    )?;

    let diff = parse_diff(BString::from(plain), BString::from(colored))?;
    let state = SelectState {
        diff,
        mode,
        colors: Palette::resolve(color_enabled),
    };

    let tty = hunk_utils::term::open_tty()
        .context("cannot open /dev/tty for interactive input")?;
    let selector = PatchSelector::new(
        state,
        tty,
        std::io::stdout(),
        ExternalEditor::from_env(),
        GitApplier,
    );
    selector.run()?;
    Ok(0)
}
