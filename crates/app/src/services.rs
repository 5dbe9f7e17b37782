//! Orchestration services — domain manager, device manager, application
//! factory and application.
//!
//! Services receive infrastructure ports as trait objects or generic
//! parameters (constructor injection), keeping this layer decoupled from
//! concrete adapters.

pub mod application;
pub mod application_factory;
pub mod device_manager;
pub mod domain_manager;
pub mod file_manager;
pub mod journal;
pub mod loader;
pub mod planner;
pub mod profiles;
pub mod registry;
pub mod wiring;

#[cfg(test)]
pub(crate) mod fakes;
