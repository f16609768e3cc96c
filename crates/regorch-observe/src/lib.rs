//! Observability setup for the registry orchestrator.

pub mod tracing_setup;
