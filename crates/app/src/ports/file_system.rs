//! File system port.

use std::path::PathBuf;

use ossie_domain::error::OssieError;

/// Read access to descriptors and binaries. Paths are absolute within the
/// file system (`/components/...`).
pub trait FileSystem: Send + Sync {
    /// # Errors
    ///
    /// Returns a backend error when existence cannot be determined.
    fn exists(&self, path: &str) -> Result<bool, OssieError>;

    /// # Errors
    ///
    /// Returns `InvalidFileName` when the file does not exist, or a backend
    /// error on read failure.
    fn read(&self, path: &str) -> Result<Vec<u8>, OssieError>;

    /// Host path of a file, for file systems backed by the local disk.
    fn local_path(&self, path: &str) -> Option<PathBuf>;
}
