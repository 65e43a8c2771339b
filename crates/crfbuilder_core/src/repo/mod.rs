//! Registry storage abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the durable project collection the core is handed.
//! - Isolate SQLite details from service orchestration.
//!
//! # Invariants
//! - Registry writes store full serialized documents.
//! - Registry APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod project_registry;
