//! Editor resolution and invocation.

use std::io::{Read, Seek, SeekFrom, Write};
use std::process::Command;

use crate::error::UtilError;
use crate::Result;

pub struct EditorConfig {
    pub command: String,
}

impl EditorConfig {
    /// Resolve the editor command from the environment:
    /// $VISUAL > $EDITOR > vi
    pub fn from_env() -> Self {
        let command = if let Ok(val) = std::env::var("VISUAL") {
            val
        } else if let Ok(val) = std::env::var("EDITOR") {
            val
        } else {
            "vi".to_string()
        };

        Self { command }
    }

    /// Write `contents` to a scratch file whose name ends in `name_hint`,
    /// run the editor on it, and read the file back.
    ///
    /// `name_hint` gives editors a recognizable suffix to pick a mode from
    /// (e.g. `hunk-edit.diff`).
    pub fn edit_buffer(&self, name_hint: &str, contents: &[u8]) -> Result<Vec<u8>> {
        let parts: Vec<&str> = self.command.split_whitespace().collect();
        if parts.is_empty() {
            return Err(UtilError::Editor {
                command: self.command.clone(),
            });
        }

        let mut scratch = tempfile::Builder::new()
            .prefix("hunkr-")
            .suffix(&format!("-{name_hint}"))
            .tempfile()?;
        scratch.write_all(contents)?;
        scratch.flush()?;

        let status = Command::new(parts[0])
            .args(&parts[1..])
            .arg(scratch.path())
            .status()?;
        if !status.success() {
            return Err(UtilError::Editor {
                command: self.command.clone(),
            });
        }

        // Re-open through the handle: editors that replace the file leave
        // the original inode behind, so read from the path instead.
        let mut edited = Vec::new();
        match std::fs::File::open(scratch.path()) {
            Ok(mut f) => {
                f.read_to_end(&mut edited)?;
            }
            Err(_) => {
                let f = scratch.as_file_mut();
                f.seek(SeekFrom::Start(0))?;
                f.read_to_end(&mut edited)?;
            }
        }
        Ok(edited)
    }
}
