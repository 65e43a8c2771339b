//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate model edits and registry persistence into use-case APIs.
//! - Keep editing surfaces decoupled from storage details.

pub mod project_service;
