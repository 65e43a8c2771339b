//! CRF project domain model.
//!
//! # Responsibility
//! - Define the library, tree, version and project-file structures.
//! - Expose every edit as a pure function from one value to the next.
//!
//! # Invariants
//! - Tree nodes reference library forms by id, never by embedded copy.
//! - Failed edits leave the input value unchanged.

pub mod error;
pub mod library;
pub mod project;
pub mod tree;
pub mod version;
