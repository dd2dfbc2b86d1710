//! Direct messaging.

use crate::error::ApiError;
use crate::net::client::ApiClient;
use crate::net::request::RequestSpec;

use super::types::{Conversation, Message, NewMessage};

pub struct MessageService<'a> {
    client: &'a ApiClient,
}

impl<'a> MessageService<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// # Errors
    ///
    /// Any [`ApiError`] from the client core.
    pub async fn conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        self.client.execute(RequestSpec::get("/api/messages/conversations")).await
    }

    /// Messages in a conversation, oldest first. `before` pages backwards
    /// from a message id.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`] from the client core.
    pub async fn history(&self, conversation_id: &str, before: Option<&str>) -> Result<Vec<Message>, ApiError> {
        let spec = RequestSpec::get(format!("/api/messages/conversations/{conversation_id}")).query("before", before);
        self.client.execute(spec).await
    }

    /// # Errors
    ///
    /// Any [`ApiError`] from the client core.
    pub async fn send(&self, receiver_id: &str, content: &str) -> Result<Message, ApiError> {
        let body = NewMessage { receiver_id: receiver_id.to_owned(), content: content.to_owned() };
        self.client.execute(RequestSpec::post("/api/messages").json(&body)?).await
    }

    /// # Errors
    ///
    /// Any [`ApiError`] from the client core.
    pub async fn mark_read(&self, conversation_id: &str) -> Result<(), ApiError> {
        self.client
            .execute_discard(RequestSpec::patch(format!("/api/messages/conversations/{conversation_id}/read")))
            .await
    }
}

#[cfg(test)]
#[path = "messages_test.rs"]
mod tests;
