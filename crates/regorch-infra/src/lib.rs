//! Infrastructure layer for the registry orchestrator.
//!
//! Contains implementations of the ports defined in `regorch-core`: the
//! reqwest-based registry client, the CloudEvents dead-letter sink, the
//! SQLite execution store, plus the configuration loader and the background
//! eviction sweeper.

pub mod config;
pub mod dead_letter;
pub mod registry;
pub mod sqlite;
pub mod store;
pub mod sweeper;
