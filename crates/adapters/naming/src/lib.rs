//! # ossie-adapter-naming
//!
//! Naming service adapters implementing `ossie_app::ports::NamingService`.
//!
//! ## Provided services
//!
//! | Service | Stringified reference | Reach |
//! |---------|-----------------------|-------|
//! | [`InMemoryNamingService`] | `memory:<n>` | one process |
//! | [`DirectoryNamingService`] | `file:<dir>` | every process sharing the directory |
//!
//! Both create the `DomainName1` root context on construction.
//!
//! ## Dependency rule
//!
//! Depends on `ossie-app` (port traits) and `ossie-domain` only.

mod directory;
mod error;
mod memory;

pub use directory::DirectoryNamingService;
pub use error::NamingAdapterError;
pub use memory::InMemoryNamingService;

use ossie_domain::error::NamingError;

/// Split a naming path into validated components.
fn path_components(path: &str) -> Result<Vec<&str>, NamingError> {
    let parts = ossie_domain::naming::components(path);
    if parts.is_empty()
        || parts
            .iter()
            .any(|p| p.starts_with('.') || p.contains('\0') || p.contains('\\'))
    {
        return Err(NamingError::InvalidName(path.to_string()));
    }
    Ok(parts)
}
