//! # ossie-nodebooter — composition root
//!
//! Boots a domain manager, its device managers and their applications.
//!
//! ## Responsibilities
//! - Parse configuration (env vars, config file)
//! - Open the naming service: private in-memory tree, or a shared
//!   directory when components run as separate processes
//! - Root the domain and node file systems in the SDR directory
//! - Boot every configured node with a virtual or process device launcher
//! - Install, create and start the configured applications
//! - Tear everything down in reverse on shutdown
//!
//! ## Dependency rule
//! This is the **only** crate that depends on every adapter.
//! It is the wiring layer — no orchestration logic belongs here.

pub mod booter;
pub mod config;

pub use booter::{BootError, NodeBooter};
pub use config::{ApplicationConfig, Config, ConfigError, NodeConfig, NodeMode};
