//! Model registry REST client.

pub mod client;

pub use client::{HttpRegistryClient, RegistryAuth};
