//! # ossie-domain
//!
//! Pure domain model for the ossie deployment orchestrator.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Typed **property values** and the per-device **capacity ledger**
//! - **Device** administrative/operational/usage state machine and load table
//! - **Descriptors** (package, property, component, device configuration, assembly)
//! - **Implementation matching** of component packages against devices
//! - **Required components**, **applications** records and domain **events**
//! - Naming conventions and process launch arguments
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod application;
pub mod capacity;
pub mod component;
pub mod descriptor;
pub mod device;
pub mod event;
pub mod launch;
pub mod load;
pub mod matcher;
pub mod naming;
pub mod property;
