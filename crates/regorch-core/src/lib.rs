//! Workflow orchestration logic and port traits.
//!
//! This crate defines the "ports" (registry capabilities, execution store,
//! dead-letter sink) that the infrastructure layer implements, plus the
//! orchestrator that composes them. It depends only on `regorch-types` --
//! never on `regorch-infra` or any database/IO crate.

pub mod dead_letter;
pub mod idempotency;
pub mod orchestrator;
pub mod registry;
pub mod retry;

#[cfg(test)]
pub(crate) mod testing;
