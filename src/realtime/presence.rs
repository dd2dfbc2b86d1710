//! Online users and typing indicators folded from realtime events.

use std::collections::{BTreeSet, HashMap};

use super::event::RealtimeEvent;

#[derive(Debug, Default, Clone)]
pub struct PresenceState {
    online: BTreeSet<String>,
    typing: HashMap<String, BTreeSet<String>>,
}

impl PresenceState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event in. Returns whether anything visible changed.
    pub fn apply(&mut self, event: &RealtimeEvent) -> bool {
        match event {
            RealtimeEvent::PresenceList { user_ids } => {
                let next: BTreeSet<String> = user_ids.iter().cloned().collect();
                let changed = next != self.online;
                self.online = next;
                changed
            }
            RealtimeEvent::UserOnline { user_id } => self.online.insert(user_id.clone()),
            RealtimeEvent::UserOffline { user_id } => {
                let mut changed = self.online.remove(user_id);
                for users in self.typing.values_mut() {
                    changed |= users.remove(user_id);
                }
                self.typing.retain(|_, users| !users.is_empty());
                changed
            }
            RealtimeEvent::TypingStart { conversation_id, user_id } => {
                self.typing.entry(conversation_id.clone()).or_default().insert(user_id.clone())
            }
            RealtimeEvent::TypingStop { conversation_id, user_id } => self.stop_typing(conversation_id, user_id),
            // A delivered message ends its sender's typing indicator.
            RealtimeEvent::MessageNew(message) => self.stop_typing(&message.conversation_id, &message.sender_id),
            RealtimeEvent::MessageRead { .. } => false,
        }
    }

    #[must_use]
    pub fn is_online(&self, user_id: &str) -> bool {
        self.online.contains(user_id)
    }

    /// Online user ids in sorted order.
    pub fn online(&self) -> impl Iterator<Item = &str> {
        self.online.iter().map(String::as_str)
    }

    #[must_use]
    pub fn typing_in(&self, conversation_id: &str) -> Vec<&str> {
        self.typing
            .get(conversation_id)
            .map(|users| users.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    fn stop_typing(&mut self, conversation_id: &str, user_id: &str) -> bool {
        let Some(users) = self.typing.get_mut(conversation_id) else {
            return false;
        };
        let changed = users.remove(user_id);
        if users.is_empty() {
            self.typing.remove(conversation_id);
        }
        changed
    }
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;
