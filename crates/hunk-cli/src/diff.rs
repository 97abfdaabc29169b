//! Launching the external differ and capturing its output.

use anyhow::{bail, Context, Result};
use hunk_select::mode::PatchMode;
use hunk_utils::subprocess::{PipeCommand, StdioMode};

/// The differ command line for a mode: `git <diff_cmd…> [rev]
/// --[no-]color --ignore-submodules=dirty -p -- <paths…>`.
fn differ_args(
    mode: &PatchMode,
    revision: Option<&str>,
    paths: &[String],
    color: bool,
) -> Vec<String> {
    let mut args: Vec<String> = mode.diff_args.iter().map(|s| s.to_string()).collect();
    if let Some(rev) = revision {
        args.push(rev.to_string());
    }
    args.push(if color { "--color" } else { "--no-color" }.to_string());
    args.push("--ignore-submodules=dirty".to_string());
    args.push("-p".to_string());
    args.push("--".to_string());
    args.extend(paths.iter().cloned());
    args
}

fn run_differ(
    mode: &PatchMode,
    revision: Option<&str>,
    paths: &[String],
    color: bool,
) -> Result<Vec<u8>> {
    let result = PipeCommand::new("git")
        .args(differ_args(mode, revision, paths, color))
        .stdout(StdioMode::Pipe)
        .run()
        .context("could not run the differ")?;
    if !result.success() {
        bail!("could not parse diff");
    }
    Ok(result.stdout)
}

/// Capture the plain diff and, when color is active, a colored rendering,
/// optionally piped through the interactive diff filter.
pub fn capture_diff(
    mode: &PatchMode,
    revision: Option<&str>,
    paths: &[String],
    color: bool,
    filter: Option<&str>,
) -> Result<(Vec<u8>, Vec<u8>)> {
    let plain = run_differ(mode, revision, paths, false)?;
    if plain.is_empty() || !color {
        return Ok((plain, Vec::new()));
    }

    let mut colored = run_differ(mode, revision, paths, true)?;
    if let Some(filter) = filter {
        let result = PipeCommand::new("sh")
            .arg("-c")
            .arg(filter)
            .input(colored)
            .stdout(StdioMode::Pipe)
            .run()
            .with_context(|| format!("failed to run '{filter}'"))?;
        if !result.success() {
            bail!("failed to run '{filter}'");
        }
        colored = result.stdout;
    }
    Ok((plain, colored))
}
