//! Directory-backed naming tree.
//!
//! Contexts are directories and object bindings are files holding the
//! object's stringified reference, so separate processes pointed at the same
//! directory share one name space. Live in-process handles are additionally
//! kept in memory and handed back to the process that bound them.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use ossie_app::ports::{NamingService, ObjectRef};
use ossie_domain::error::{NamingError, OssieError};
use ossie_domain::naming;

use crate::error::NamingAdapterError;
use crate::path_components;

const REFERENCE_SCHEME: &str = "file:";

/// Naming tree rooted at a host directory.
pub struct DirectoryNamingService {
    root: PathBuf,
    live: RwLock<BTreeMap<String, ObjectRef>>,
}

impl DirectoryNamingService {
    /// Open (creating when needed) the tree rooted at `root`, including the
    /// domain root context.
    ///
    /// # Errors
    ///
    /// Returns a backend error when the directories cannot be created.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, OssieError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(naming::DOMAIN_ROOT)).map_err(NamingAdapterError::from)?;
        Ok(Self {
            root,
            live: RwLock::new(BTreeMap::new()),
        })
    }

    /// Open the tree designated by a stringified `file:<dir>` reference.
    ///
    /// # Errors
    ///
    /// Returns [`NamingError::InvalidReference`] for any other reference
    /// and a backend error when the directory cannot be opened.
    pub fn from_reference(reference: &str) -> Result<Self, OssieError> {
        let dir = reference
            .strip_prefix(REFERENCE_SCHEME)
            .filter(|dir| !dir.is_empty())
            .ok_or_else(|| NamingError::InvalidReference(reference.to_string()))?;
        Self::open(dir)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn host_path(&self, parts: &[&str]) -> PathBuf {
        parts.iter().fold(self.root.clone(), |path, part| path.join(part))
    }

    /// Every ancestor of the leaf must be an existing directory.
    fn check_parent(&self, parts: &[&str]) -> Result<(), OssieError> {
        let parent = &parts[..parts.len().saturating_sub(1)];
        for depth in 0..parent.len() {
            match fs::metadata(self.host_path(&parent[..=depth])) {
                Ok(meta) if meta.is_dir() => {}
                Ok(_) => return Err(NamingError::NotContext(parent[..=depth].join("/")).into()),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    return Err(NamingError::NotFound(parent[..=depth].join("/")).into());
                }
                Err(err) => return Err(NamingAdapterError::from(err).into()),
            }
        }
        Ok(())
    }

    fn reference_text(key: &str, object: &ObjectRef) -> String {
        match object {
            ObjectRef::Stringified(reference) => reference.clone(),
            _ => format!("local:{}:{key}", std::process::id()),
        }
    }

    /// Write `contents` next to `target` and move it into place, so readers
    /// never observe a partially written binding.
    fn write_binding(target: &Path, contents: &str, replace: bool) -> Result<bool, NamingAdapterError> {
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let staging = target.with_file_name(format!(".{name}.{}.tmp", std::process::id()));
        let mut file = fs::File::create(&staging)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        drop(file);
        let placed = if replace {
            fs::rename(&staging, target).map(|()| true)
        } else {
            match fs::hard_link(&staging, target) {
                Ok(()) => Ok(true),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(false),
                Err(err) => Err(err),
            }
        };
        let _ = fs::remove_file(&staging);
        placed.map_err(NamingAdapterError::from)
    }

    fn store(&self, path: &str, object: ObjectRef, replace: bool) -> Result<(), OssieError> {
        let parts = path_components(path)?;
        self.check_parent(&parts)?;
        let key = parts.join("/");
        let target = self.host_path(&parts);
        if target.is_dir() {
            return Err(NamingError::AlreadyBound(key).into());
        }
        let contents = Self::reference_text(&key, &object);
        if !Self::write_binding(&target, &contents, replace)? {
            return Err(NamingError::AlreadyBound(key).into());
        }
        let mut live = self.live.write().unwrap_or_else(PoisonError::into_inner);
        if matches!(object, ObjectRef::Stringified(_)) {
            live.remove(&key);
        } else {
            live.insert(key, object);
        }
        Ok(())
    }

    fn forget_under(&self, key: &str) {
        let prefix = format!("{key}/");
        self.live
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|k, _| k != key && !k.starts_with(&prefix));
    }
}

impl NamingService for DirectoryNamingService {
    fn bind(&self, path: &str, object: ObjectRef) -> Result<(), OssieError> {
        self.store(path, object, false)
    }

    fn rebind(&self, path: &str, object: ObjectRef) -> Result<(), OssieError> {
        self.store(path, object, true)
    }

    fn resolve(&self, path: &str) -> Result<ObjectRef, OssieError> {
        let parts = path_components(path)?;
        let key = parts.join("/");
        let target = self.host_path(&parts);
        if target.is_dir() {
            return Err(NamingError::NotContext(key).into());
        }
        let contents = match fs::read_to_string(&target) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(NamingError::NotFound(key).into());
            }
            Err(err) => return Err(NamingAdapterError::from(err).into()),
        };
        let contents = contents.trim();
        if let Some(object) = self
            .live
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .filter(|object| Self::reference_text(&key, object) == contents)
        {
            return Ok(object.clone());
        }
        Ok(ObjectRef::Stringified(contents.to_string()))
    }

    fn unbind(&self, path: &str) -> Result<(), OssieError> {
        let parts = path_components(path)?;
        let key = parts.join("/");
        let target = self.host_path(&parts);
        let removed = if target.is_dir() {
            fs::remove_dir_all(&target)
        } else {
            fs::remove_file(&target)
        };
        match removed {
            Ok(()) => {
                self.forget_under(&key);
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Err(NamingError::NotFound(key).into()),
            Err(err) => Err(NamingAdapterError::from(err).into()),
        }
    }

    fn bind_new_context(&self, path: &str) -> Result<(), OssieError> {
        let parts = path_components(path)?;
        self.check_parent(&parts)?;
        match fs::create_dir(self.host_path(&parts)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                Err(NamingError::AlreadyBound(parts.join("/")).into())
            }
            Err(err) => Err(NamingAdapterError::from(err).into()),
        }
    }

    fn destroy_context(&self, path: &str) -> Result<(), OssieError> {
        let parts = path_components(path)?;
        let key = parts.join("/");
        let target = self.host_path(&parts);
        match fs::metadata(&target) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(NamingError::NotContext(key).into()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(NamingError::NotFound(key).into());
            }
            Err(err) => return Err(NamingAdapterError::from(err).into()),
        }
        fs::remove_dir_all(&target).map_err(NamingAdapterError::from)?;
        self.forget_under(&key);
        Ok(())
    }

    fn list(&self, path: &str) -> Result<Vec<String>, OssieError> {
        let parts = naming::components(path);
        let dir = self.host_path(&parts);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(NamingError::NotFound(parts.join("/")).into());
            }
            Err(err) if dir.is_file() => {
                tracing::trace!(error = %err, "listing an object binding");
                return Err(NamingError::NotContext(parts.join("/")).into());
            }
            Err(err) => return Err(NamingAdapterError::from(err).into()),
        };
        let mut names = Vec::new();
        for entry in entries {
            let name = entry.map_err(NamingAdapterError::from)?.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with('.') {
                names.push(name.into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn stringify(&self) -> String {
        format!("{REFERENCE_SCHEME}{}", self.root.display())
    }
}
