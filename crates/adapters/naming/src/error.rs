//! Naming-adapter error type wrapping IO failures.

use ossie_domain::error::OssieError;

/// Errors originating from a naming backend.
#[derive(Debug, thiserror::Error)]
pub enum NamingAdapterError {
    /// The directory tree could not be read or written.
    #[error("naming directory IO error")]
    Io(#[from] std::io::Error),
}

impl From<NamingAdapterError> for OssieError {
    fn from(err: NamingAdapterError) -> Self {
        Self::backend(err)
    }
}
