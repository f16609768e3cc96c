//! Shared domain types for the registry workflow orchestrator.
//!
//! This crate contains the types passed between the orchestrator core, the
//! infrastructure adapters and the API layer: registry DTOs, workflow
//! requests and results, execution-store entries, dead-letter events,
//! configuration, and the error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod config;
pub mod dead_letter;
pub mod error;
pub mod execution;
pub mod registry;
pub mod workflow;
