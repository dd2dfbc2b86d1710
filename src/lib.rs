//! # lms
//!
//! Async client for the LMS backend: REST services behind a uniform response
//! envelope, silent access-token refresh, a small request cache, and the
//! realtime presence/messaging socket.
//!
//! ARCHITECTURE
//! ============
//! Callers go through [`Queries`] (cached reads) or the per-resource services
//! on [`ApiClient`]. Every request passes through the client core, which hands
//! a first 401 to the [`SessionManager`]; the manager runs at most one refresh
//! call at a time and replays the blocked requests with the new token.
//! [`RealtimeChannel`] keeps one socket open with the stored access token and
//! [`realtime::sync`] folds its events into the same cache.
//!
//! LOGGING
//! =======
//! The library only emits `tracing` events. Installing a subscriber is left
//! to the binary.

pub mod config;
pub mod error;
pub mod net;
pub mod query;
pub mod realtime;
pub mod services;
pub mod session;

#[cfg(test)]
mod test_support;

pub use config::{ClientConfig, Timeouts, TokenStoreKind};
pub use error::{ApiError, ConfigError, RefreshError};
pub use net::client::ApiClient;
pub use net::request::{MultipartForm, RequestSpec};
pub use net::transport::{ReqwestTransport, Transport};
pub use query::{Queries, QueryCache};
pub use realtime::channel::{ConnectionStatus, RealtimeChannel};
pub use realtime::event::{ClientEvent, RealtimeEvent};
pub use session::coordinator::{SessionEvent, SessionManager};
pub use session::store::{FileTokenStore, MemoryTokenStore, StoredTokens, TokenPair, TokenStore};
