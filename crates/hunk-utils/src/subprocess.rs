use std::ffi::{OsStr, OsString};
use std::io::Write;
use std::process::{Command, ExitStatus, Stdio};

use crate::error::UtilError;
use crate::Result;

/// Stdio mode for subprocess streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioMode {
    /// Inherit the parent process's stream.
    Inherit,
    /// Pipe the stream (capture it).
    Pipe,
    /// Redirect to /dev/null.
    Null,
}

impl StdioMode {
    fn to_stdio(self) -> Stdio {
        match self {
            StdioMode::Inherit => Stdio::inherit(),
            StdioMode::Pipe => Stdio::piped(),
            StdioMode::Null => Stdio::null(),
        }
    }
}

/// Result of running a subprocess.
#[derive(Debug)]
pub struct PipeResult {
    /// The exit status.
    pub status: ExitStatus,
    /// Captured stdout (empty if not piped).
    pub stdout: Vec<u8>,
    /// Captured stderr (empty if not piped).
    pub stderr: Vec<u8>,
}

impl PipeResult {
    /// Returns true if the process exited successfully.
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Builder for the child processes the selection engine talks to: the
/// external differ, the patch applier, and the interactive diff filter.
///
/// Wraps `std::process::Command` with a fluent API and a mode that feeds a
/// byte buffer to the child's stdin. The buffer is staged in an unlinked
/// temporary file rather than a pipe, so a child that fills its output pipe
/// before draining stdin cannot wedge the single-threaded caller.
pub struct PipeCommand {
    program: OsString,
    args: Vec<OsString>,
    env_vars: Vec<(OsString, OsString)>,
    input: Option<Vec<u8>>,
    stdout_mode: StdioMode,
    stderr_mode: StdioMode,
}

impl PipeCommand {
    /// Create a new command builder for the given program.
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            env_vars: Vec::new(),
            input: None,
            stdout_mode: StdioMode::Inherit,
            stderr_mode: StdioMode::Inherit,
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Add multiple arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl AsRef<OsStr>>) -> Self {
        for arg in args {
            self.args.push(arg.as_ref().to_os_string());
        }
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl AsRef<OsStr>, val: impl AsRef<OsStr>) -> Self {
        self.env_vars
            .push((key.as_ref().to_os_string(), val.as_ref().to_os_string()));
        self
    }

    /// Feed the given bytes to the child's stdin.
    pub fn input(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.input = Some(data.into());
        self
    }

    /// Set stdout mode.
    pub fn stdout(mut self, mode: StdioMode) -> Self {
        self.stdout_mode = mode;
        self
    }

    /// Set stderr mode.
    pub fn stderr(mut self, mode: StdioMode) -> Self {
        self.stderr_mode = mode;
        self
    }

    /// Get the command string for error messages.
    fn command_string(&self) -> String {
        let mut s = self.program.to_string_lossy().to_string();
        for arg in &self.args {
            s.push(' ');
            s.push_str(&arg.to_string_lossy());
        }
        s
    }

    /// Run the command and wait for it to complete.
    pub fn run(&self) -> Result<PipeResult> {
        let cmd_str = self.command_string();
        let subprocess_err = |source| UtilError::Subprocess {
            command: cmd_str.clone(),
            source,
        };

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, val) in &self.env_vars {
            cmd.env(key, val);
        }
        cmd.stdout(self.stdout_mode.to_stdio());
        cmd.stderr(self.stderr_mode.to_stdio());

        match &self.input {
            Some(data) => {
                let mut stage = tempfile::tempfile().map_err(subprocess_err)?;
                stage.write_all(data).map_err(subprocess_err)?;
                use std::io::{Seek, SeekFrom};
                stage.seek(SeekFrom::Start(0)).map_err(subprocess_err)?;
                cmd.stdin(Stdio::from(stage));
            }
            None => {
                cmd.stdin(Stdio::null());
            }
        }

        let child = cmd.spawn().map_err(subprocess_err)?;
        let output = child.wait_with_output().map_err(subprocess_err)?;
        Ok(PipeResult {
            status: output.status,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
