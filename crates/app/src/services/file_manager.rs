//! Domain file manager — a root file system plus mounted node file systems.

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use ossie_domain::error::{FileNameError, OssieError};

use crate::ports::FileSystem;

struct Mount {
    point: String,
    fs: Arc<dyn FileSystem>,
}

/// Routes each path to the file system mounted at its longest matching
/// prefix, or to the root file system.
pub struct FileManager {
    root: Arc<dyn FileSystem>,
    mounts: RwLock<Vec<Mount>>,
}

impl FileManager {
    pub fn new(root: Arc<dyn FileSystem>) -> Self {
        Self {
            root,
            mounts: RwLock::new(Vec::new()),
        }
    }

    /// # Errors
    ///
    /// Returns [`FileNameError::MountPointInUse`] when `point` is taken.
    pub fn mount(&self, point: &str, fs: Arc<dyn FileSystem>) -> Result<(), OssieError> {
        let mut mounts = self.mounts.write().unwrap_or_else(PoisonError::into_inner);
        if mounts.iter().any(|m| m.point == point) {
            return Err(FileNameError::MountPointInUse(point.to_string()).into());
        }
        tracing::debug!(mount_point = point, "file system mounted");
        mounts.push(Mount {
            point: point.to_string(),
            fs,
        });
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`FileNameError::NotFound`] when nothing is mounted at `point`.
    pub fn unmount(&self, point: &str) -> Result<(), OssieError> {
        let mut mounts = self.mounts.write().unwrap_or_else(PoisonError::into_inner);
        let before = mounts.len();
        mounts.retain(|m| m.point != point);
        if mounts.len() == before {
            return Err(FileNameError::NotFound(point.to_string()).into());
        }
        tracing::debug!(mount_point = point, "file system unmounted");
        Ok(())
    }

    #[must_use]
    pub fn mount_points(&self) -> Vec<String> {
        self.mounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|m| m.point.clone())
            .collect()
    }

    fn route(&self, path: &str) -> (Arc<dyn FileSystem>, String) {
        let mounts = self.mounts.read().unwrap_or_else(PoisonError::into_inner);
        mounts
            .iter()
            .filter_map(|m| {
                let rest = path.strip_prefix(&m.point)?;
                (rest.is_empty() || rest.starts_with('/')).then(|| (m, rest))
            })
            .max_by_key(|(m, _)| m.point.len())
            .map_or_else(
                || (Arc::clone(&self.root), path.to_string()),
                |(m, rest)| {
                    let inner = if rest.is_empty() { "/" } else { rest };
                    (Arc::clone(&m.fs), inner.to_string())
                },
            )
    }

    /// Find the file system holding `file`: the root first, then every mount.
    /// Returns the full path of the file within this file manager.
    ///
    /// # Errors
    ///
    /// Returns a backend error when a file system cannot be queried.
    pub fn locate(&self, file: &str) -> Result<Option<String>, OssieError> {
        if self.root.exists(file)? {
            return Ok(Some(file.to_string()));
        }
        let mounts: Vec<(String, Arc<dyn FileSystem>)> = self
            .mounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|m| (m.point.clone(), Arc::clone(&m.fs)))
            .collect();
        for (point, fs) in mounts {
            if fs.exists(file)? {
                return Ok(Some(format!("{point}{file}")));
            }
        }
        Ok(None)
    }
}

impl FileSystem for FileManager {
    fn exists(&self, path: &str) -> Result<bool, OssieError> {
        let (fs, inner) = self.route(path);
        fs.exists(&inner)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, OssieError> {
        let (fs, inner) = self.route(path);
        fs.read(&inner)
    }

    fn local_path(&self, path: &str) -> Option<PathBuf> {
        let (fs, inner) = self.route(path);
        fs.local_path(&inner)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::BTreeMap;

    /// Map-backed file system for service tests.
    #[derive(Default)]
    pub(crate) struct MapFileSystem {
        files: RwLock<BTreeMap<String, Vec<u8>>>,
    }

    impl MapFileSystem {
        pub(crate) fn with(files: &[(&str, &str)]) -> Self {
            let fs = Self::default();
            for (path, content) in files {
                fs.insert(path, content.as_bytes().to_vec());
            }
            fs
        }

        pub(crate) fn insert(&self, path: &str, content: Vec<u8>) {
            self.files.write().unwrap().insert(path.to_string(), content);
        }
    }

    impl FileSystem for MapFileSystem {
        fn exists(&self, path: &str) -> Result<bool, OssieError> {
            Ok(self.files.read().unwrap().contains_key(path))
        }

        fn read(&self, path: &str) -> Result<Vec<u8>, OssieError> {
            self.files
                .read()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| FileNameError::NotFound(path.to_string()).into())
        }

        fn local_path(&self, _path: &str) -> Option<PathBuf> {
            None
        }
    }

    #[test]
    fn should_route_to_longest_mount_prefix() {
        let fm = FileManager::new(Arc::new(MapFileSystem::with(&[("/a.txt", "root")])));
        fm.mount("/node", Arc::new(MapFileSystem::with(&[("/a.txt", "node")])))
            .unwrap();
        fm.mount("/node/sub", Arc::new(MapFileSystem::with(&[("/a.txt", "sub")])))
            .unwrap();

        assert_eq!(fm.read("/a.txt").unwrap(), b"root");
        assert_eq!(fm.read("/node/a.txt").unwrap(), b"node");
        assert_eq!(fm.read("/node/sub/a.txt").unwrap(), b"sub");
        assert!(!fm.exists("/nodex/a.txt").unwrap());
    }

    #[test]
    fn should_locate_binary_in_mounted_file_system() {
        let fm = FileManager::new(Arc::new(MapFileSystem::default()));
        fm.mount("/Node1", Arc::new(MapFileSystem::with(&[("/bin/amp", "")])))
            .unwrap();
        assert_eq!(fm.locate("/bin/amp").unwrap(), Some("/Node1/bin/amp".to_string()));
        assert_eq!(fm.locate("/bin/none").unwrap(), None);
    }

    #[test]
    fn should_reject_second_mount_on_same_point() {
        let fm = FileManager::new(Arc::new(MapFileSystem::default()));
        fm.mount("/Node1", Arc::new(MapFileSystem::default())).unwrap();
        assert!(matches!(
            fm.mount("/Node1", Arc::new(MapFileSystem::default())),
            Err(OssieError::InvalidFileName(FileNameError::MountPointInUse(_)))
        ));
        fm.unmount("/Node1").unwrap();
        assert!(fm.unmount("/Node1").is_err());
        assert!(fm.mount_points().is_empty());
    }
}
