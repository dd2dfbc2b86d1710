//! Realtime presence and messaging over one persistent websocket.

pub mod channel;
pub mod event;
pub mod presence;
pub mod sync;

pub use channel::{ConnectionStatus, RealtimeChannel};
pub use event::{ClientEvent, CodecError, RealtimeEvent};
pub use presence::PresenceState;
pub use sync::{apply_event, spawn_cache_sync};
