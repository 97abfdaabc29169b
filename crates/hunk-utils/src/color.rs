use std::io::IsTerminal;

/// Color configuration mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// Auto-detect based on terminal and NO_COLOR env var.
    Auto,
    /// Always emit ANSI color codes.
    Always,
    /// Never emit ANSI color codes.
    Never,
}

/// Check if color should be used for the given mode and stream.
///
/// Respects:
/// - The `NO_COLOR` environment variable (<https://no-color.org/>)
/// - Whether the stream is a terminal (for Auto mode)
pub fn use_color(mode: ColorMode, is_terminal: bool) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => {
            if std::env::var_os("NO_COLOR").is_some() {
                return false;
            }
            is_terminal
        }
    }
}

/// Check if stdout should use color.
pub fn use_color_stdout(mode: ColorMode) -> bool {
    use_color(mode, std::io::stdout().is_terminal())
}

/// The ANSI codes for the semantic slots the selection engine renders.
///
/// Every field is a full escape sequence (or the empty string when color is
/// off), so callers can print the slot, the text, and `reset` without
/// further decisions.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    /// Unchanged context lines.
    pub context: &'static str,
    /// Removed lines.
    pub old: &'static str,
    /// Added lines.
    pub new: &'static str,
    /// Synthesized `@@` line ranges.
    pub fraginfo: &'static str,
    /// The interactive prompt.
    pub prompt: &'static str,
    /// Help output.
    pub help: &'static str,
    /// Informational headers ("Split into N hunks.").
    pub header: &'static str,
    /// Operation-scoped error messages.
    pub error: &'static str,
    /// Reset sequence.
    pub reset: &'static str,
}

impl Palette {
    /// The default diff palette, matching the classic diff color assignment.
    pub fn colored() -> Self {
        Palette {
            context: "",
            old: "\x1b[31m",
            new: "\x1b[32m",
            fraginfo: "\x1b[36m",
            prompt: "\x1b[34m",
            help: "\x1b[31m\x1b[1m",
            header: "\x1b[1m",
            error: "\x1b[31m\x1b[1m",
            reset: "\x1b[0m",
        }
    }

    /// A palette of empty strings for plain output.
    pub fn plain() -> Self {
        Palette {
            context: "",
            old: "",
            new: "",
            fraginfo: "",
            prompt: "",
            help: "",
            header: "",
            error: "",
            reset: "",
        }
    }

    /// Resolve a palette from an already-made color decision.
    pub fn resolve(enabled: bool) -> Self {
        if enabled {
            Self::colored()
        } else {
            Self::plain()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_mode_disables() {
        assert!(!use_color(ColorMode::Never, true));
    }

    #[test]
    fn always_mode_enables() {
        assert!(use_color(ColorMode::Always, false));
    }

    #[test]
    fn plain_palette_is_empty() {
        let p = Palette::plain();
        assert!(p.old.is_empty() && p.new.is_empty() && p.reset.is_empty());
    }
}
