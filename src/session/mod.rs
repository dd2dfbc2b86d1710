//! Credential storage and the refresh coordinator.

pub mod coordinator;
pub mod store;
