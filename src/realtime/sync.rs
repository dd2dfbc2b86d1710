//! Socket events layered over the query cache.
//!
//! DESIGN
//! ======
//! Events patch cached data in place when the affected entry is present and
//! otherwise leave the cache alone; nothing here triggers a fetch. Where a
//! patch cannot be exact (conversation ordering, unread counts) the entry is
//! also invalidated so the next read revalidates against the server.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::query::cache::QueryCache;
use crate::query::keys;
use crate::query::queries::upsert_message;
use crate::services::types::{Conversation, Message};

use super::event::RealtimeEvent;

/// Apply one event to the cache.
pub fn apply_event(cache: &QueryCache, event: &RealtimeEvent) {
    match event {
        RealtimeEvent::MessageNew(message) => {
            cache.update::<Vec<Message>, _>(&keys::messages(&message.conversation_id), |list| {
                upsert_message(list, message);
            });
            let known = cache.update::<Vec<Conversation>, _>(keys::CONVERSATIONS, |list| {
                if let Some(idx) = list.iter().position(|c| c.id == message.conversation_id) {
                    let mut conversation = list.remove(idx);
                    conversation.last_message = Some(message.clone());
                    conversation.updated_at = Some(message.created_at.clone());
                    list.insert(0, conversation);
                }
            });
            if !known {
                debug!(conversation_id = %message.conversation_id, "message for uncached conversation list");
            }
            cache.invalidate(keys::CONVERSATIONS);
            cache.invalidate(keys::STUDENT_DASHBOARD);
        }
        RealtimeEvent::MessageRead { conversation_id, reader_id, message_ids } => {
            cache.update::<Vec<Message>, _>(&keys::messages(conversation_id), |list| {
                for message in list.iter_mut() {
                    let targeted = if message_ids.is_empty() {
                        message.sender_id != *reader_id
                    } else {
                        message_ids.contains(&message.id)
                    };
                    if targeted {
                        message.read = true;
                    }
                }
            });
        }
        RealtimeEvent::PresenceList { .. }
        | RealtimeEvent::UserOnline { .. }
        | RealtimeEvent::UserOffline { .. }
        | RealtimeEvent::TypingStart { .. }
        | RealtimeEvent::TypingStop { .. } => {}
    }
}

/// Keep `cache` in step with a realtime subscription until the channel closes.
///
/// Lagging behind the broadcast buffer means events were lost, so every
/// message-derived entry is invalidated.
#[must_use]
pub fn spawn_cache_sync(cache: Arc<QueryCache>, mut events: broadcast::Receiver<RealtimeEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => apply_event(&cache, &event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "realtime cache sync lagged; invalidating messages");
                    cache.invalidate_prefix(keys::MESSAGES);
                    cache.invalidate(keys::CONVERSATIONS);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
#[path = "sync_test.rs"]
mod tests;
