//! HTTP request handlers for the REST API.

pub mod events;
pub mod execution;
pub mod workflow;
