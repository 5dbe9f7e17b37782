//! Naming service port — hierarchical name to reference bindings.

use ossie_domain::error::OssieError;

use super::ObjectRef;

/// Paths are `/`-separated, rooted at the naming service root
/// (`DomainName1/Wave_1/Amp_1`).
pub trait NamingService: Send + Sync {
    /// # Errors
    ///
    /// Returns `AlreadyBound` when the name exists and `NotFound` when the
    /// parent context does not.
    fn bind(&self, path: &str, object: ObjectRef) -> Result<(), OssieError>;

    /// Bind, replacing an existing binding.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the parent context does not exist.
    fn rebind(&self, path: &str, object: ObjectRef) -> Result<(), OssieError>;

    /// # Errors
    ///
    /// Returns `NotFound` when nothing is bound under `path`.
    fn resolve(&self, path: &str) -> Result<ObjectRef, OssieError>;

    /// # Errors
    ///
    /// Returns `NotFound` when nothing is bound under `path`.
    fn unbind(&self, path: &str) -> Result<(), OssieError>;

    /// Create and bind a new, empty context.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyBound` when the name exists.
    fn bind_new_context(&self, path: &str) -> Result<(), OssieError>;

    /// Unbind a context together with everything bound inside it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for a missing context and `NotContext` when the
    /// name designates an object.
    fn destroy_context(&self, path: &str) -> Result<(), OssieError>;

    /// Names bound directly inside a context.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for a missing context.
    fn list(&self, path: &str) -> Result<Vec<String>, OssieError>;

    /// Stringified reference handed to spawned processes.
    fn stringify(&self) -> String;
}
