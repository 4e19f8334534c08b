//! Common types shared across crewroute crates.
//!
//! This crate provides the foundational vocabulary every other crate speaks:
//! the closed set of team labels, the error type, and the path confinement
//! helper used by the file tools.

pub mod error;
pub mod security;
pub mod team;

pub use error::{CrewError, Result};
pub use security::{resolve_within, WorkDir};
pub use team::{CostTier, CrewDescriptor, TeamLabel};
