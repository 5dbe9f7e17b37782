//! # ossie-adapter-filesystem
//!
//! Implements `ossie_app::ports::FileSystem` over a host directory. Paths
//! such as `/components/Amp/Amp.spd.json` are resolved under the root
//! directory; components that would escape it are rejected.
//!
//! ## Dependency rule
//!
//! Depends on `ossie-app` (port traits) and `ossie-domain` only.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use ossie_app::ports::FileSystem;
use ossie_domain::error::{FileNameError, OssieError};

/// Errors originating from the host file system.
#[derive(Debug, thiserror::Error)]
pub enum FileSystemError {
    #[error("file system IO error on `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<FileSystemError> for OssieError {
    fn from(err: FileSystemError) -> Self {
        Self::backend(err)
    }
}

/// A file system rooted at a host directory.
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: PathBuf,
}

impl LocalFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn host_path(&self, path: &str) -> Result<PathBuf, OssieError> {
        let relative = Path::new(path.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(FileNameError::Invalid(path.to_string()).into());
        }
        Ok(self.root.join(relative))
    }
}

impl FileSystem for LocalFileSystem {
    fn exists(&self, path: &str) -> Result<bool, OssieError> {
        let host = self.host_path(path)?;
        match host.try_exists() {
            Ok(found) => Ok(found && host.is_file()),
            Err(source) => Err(FileSystemError::Io { path: host, source }.into()),
        }
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, OssieError> {
        let host = self.host_path(path)?;
        match std::fs::read(&host) {
            Ok(bytes) => {
                tracing::trace!(path, bytes = bytes.len(), "file read");
                Ok(bytes)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(FileNameError::NotFound(path.to_string()).into())
            }
            Err(source) => Err(FileSystemError::Io { path: host, source }.into()),
        }
    }

    fn local_path(&self, path: &str) -> Option<PathBuf> {
        self.host_path(path).ok().filter(|host| host.is_file())
    }
}
