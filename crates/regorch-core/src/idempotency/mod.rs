//! Idempotent execution support: key derivation and the execution store.

pub mod key;
pub mod memory;
pub mod store;

pub use memory::InMemoryExecutionStore;
pub use store::{ExecutionStore, StorePolicy};
