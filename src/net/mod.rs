//! HTTP plumbing: request descriptors, the transport seam, envelope
//! normalization and the client core that ties them together.

pub mod client;
pub mod envelope;
pub mod request;
pub mod transport;
