/// Base error type for hunk-utils operations.
#[derive(Debug, thiserror::Error)]
pub enum UtilError {
    #[error("subprocess failed: {command}: {source}")]
    Subprocess {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("editor '{command}' exited with an error")]
    Editor { command: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
