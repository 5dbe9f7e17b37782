//! In-memory naming tree.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use ossie_app::ports::{NamingService, ObjectRef};
use ossie_domain::error::{NamingError, OssieError};
use ossie_domain::naming;

use crate::path_components;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

enum Binding {
    Context(Context),
    Object(ObjectRef),
}

#[derive(Default)]
struct Context {
    bindings: BTreeMap<String, Binding>,
}

impl Context {
    fn descend(&self, parts: &[&str]) -> Result<&Self, NamingError> {
        let mut ctx = self;
        for (depth, part) in parts.iter().enumerate() {
            ctx = match ctx.bindings.get(*part) {
                Some(Binding::Context(next)) => next,
                Some(Binding::Object(_)) => {
                    return Err(NamingError::NotContext(parts[..=depth].join("/")));
                }
                None => return Err(NamingError::NotFound(parts[..=depth].join("/"))),
            };
        }
        Ok(ctx)
    }

    fn descend_mut(&mut self, parts: &[&str]) -> Result<&mut Self, NamingError> {
        let mut ctx = self;
        for (depth, part) in parts.iter().enumerate() {
            ctx = match ctx.bindings.get_mut(*part) {
                Some(Binding::Context(next)) => next,
                Some(Binding::Object(_)) => {
                    return Err(NamingError::NotContext(parts[..=depth].join("/")));
                }
                None => return Err(NamingError::NotFound(parts[..=depth].join("/"))),
            };
        }
        Ok(ctx)
    }
}

/// Context tree held in process memory.
pub struct InMemoryNamingService {
    root: RwLock<Context>,
    reference: String,
}

impl Default for InMemoryNamingService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryNamingService {
    /// A tree holding only the empty domain root context.
    #[must_use]
    pub fn new() -> Self {
        let mut root = Context::default();
        root.bindings.insert(
            naming::DOMAIN_ROOT.to_string(),
            Binding::Context(Context::default()),
        );
        Self {
            root: RwLock::new(root),
            reference: format!("memory:{}", NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed)),
        }
    }

    fn insert(&self, path: &str, binding: Binding, replace: bool) -> Result<(), OssieError> {
        let parts = path_components(path)?;
        let (leaf, parent) = parts.split_last().ok_or_else(|| NamingError::InvalidName(path.to_string()))?;
        let mut root = self.root.write().unwrap_or_else(PoisonError::into_inner);
        let ctx = root.descend_mut(parent)?;
        if let Some(existing) = ctx.bindings.get(*leaf) {
            let rebinding_object = replace && matches!(existing, Binding::Object(_));
            if !rebinding_object {
                return Err(NamingError::AlreadyBound(parts.join("/")).into());
            }
        }
        ctx.bindings.insert((*leaf).to_string(), binding);
        Ok(())
    }
}

impl NamingService for InMemoryNamingService {
    fn bind(&self, path: &str, object: ObjectRef) -> Result<(), OssieError> {
        self.insert(path, Binding::Object(object), false)?;
        tracing::trace!(name = path, "bound");
        Ok(())
    }

    fn rebind(&self, path: &str, object: ObjectRef) -> Result<(), OssieError> {
        self.insert(path, Binding::Object(object), true)
    }

    fn resolve(&self, path: &str) -> Result<ObjectRef, OssieError> {
        let parts = path_components(path)?;
        let (leaf, parent) = parts.split_last().ok_or_else(|| NamingError::InvalidName(path.to_string()))?;
        let root = self.root.read().unwrap_or_else(PoisonError::into_inner);
        match root.descend(parent)?.bindings.get(*leaf) {
            Some(Binding::Object(object)) => Ok(object.clone()),
            Some(Binding::Context(_)) => Err(NamingError::NotContext(parts.join("/")).into()),
            None => Err(NamingError::NotFound(parts.join("/")).into()),
        }
    }

    fn unbind(&self, path: &str) -> Result<(), OssieError> {
        let parts = path_components(path)?;
        let (leaf, parent) = parts.split_last().ok_or_else(|| NamingError::InvalidName(path.to_string()))?;
        let mut root = self.root.write().unwrap_or_else(PoisonError::into_inner);
        root.descend_mut(parent)?
            .bindings
            .remove(*leaf)
            .map(|_| ())
            .ok_or_else(|| NamingError::NotFound(parts.join("/")).into())
    }

    fn bind_new_context(&self, path: &str) -> Result<(), OssieError> {
        self.insert(path, Binding::Context(Context::default()), false)
    }

    fn destroy_context(&self, path: &str) -> Result<(), OssieError> {
        let parts = path_components(path)?;
        let (leaf, parent) = parts.split_last().ok_or_else(|| NamingError::InvalidName(path.to_string()))?;
        let mut root = self.root.write().unwrap_or_else(PoisonError::into_inner);
        let ctx = root.descend_mut(parent)?;
        match ctx.bindings.get(*leaf) {
            Some(Binding::Context(_)) => {
                ctx.bindings.remove(*leaf);
                Ok(())
            }
            Some(Binding::Object(_)) => Err(NamingError::NotContext(parts.join("/")).into()),
            None => Err(NamingError::NotFound(parts.join("/")).into()),
        }
    }

    fn list(&self, path: &str) -> Result<Vec<String>, OssieError> {
        let parts = naming::components(path);
        let root = self.root.read().unwrap_or_else(PoisonError::into_inner);
        Ok(root.descend(&parts)?.bindings.keys().cloned().collect())
    }

    fn stringify(&self) -> String {
        self.reference.clone()
    }
}
