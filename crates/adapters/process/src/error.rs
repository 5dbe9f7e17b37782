//! Process-specific error type wrapping spawn and wait failures.

use std::path::PathBuf;

use ossie_domain::error::OssieError;

/// Errors originating from the host process table.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The executable could not be started.
    #[error("failed to spawn `{}`", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The process could not be killed or reaped.
    #[error("failed to stop process {pid}")]
    Stop {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
}

impl From<ProcessError> for OssieError {
    fn from(err: ProcessError) -> Self {
        Self::backend(err)
    }
}
