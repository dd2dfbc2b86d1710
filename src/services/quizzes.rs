//! Quiz taking.

use serde_json::json;

use crate::error::ApiError;
use crate::net::client::ApiClient;
use crate::net::request::RequestSpec;

use super::types::{Answer, Quiz, QuizAttempt};

pub struct QuizService<'a> {
    client: &'a ApiClient,
}

impl<'a> QuizService<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// # Errors
    ///
    /// Any [`ApiError`] from the client core.
    pub async fn get(&self, quiz_id: &str) -> Result<Quiz, ApiError> {
        self.client.execute(RequestSpec::get(format!("/api/quizzes/{quiz_id}"))).await
    }

    /// # Errors
    ///
    /// [`ApiError::Api`] when the attempt limit is reached.
    pub async fn start(&self, quiz_id: &str) -> Result<QuizAttempt, ApiError> {
        self.client.execute(RequestSpec::post(format!("/api/quizzes/{quiz_id}/attempts"))).await
    }

    /// Submit answers and receive the graded attempt.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`] from the client core.
    pub async fn submit(&self, attempt_id: &str, answers: &[Answer]) -> Result<QuizAttempt, ApiError> {
        let spec = RequestSpec::post(format!("/api/quizzes/attempts/{attempt_id}/submit"))
            .json(&json!({ "answers": answers }))?;
        self.client.execute(spec).await
    }

    /// # Errors
    ///
    /// Any [`ApiError`] from the client core.
    pub async fn attempts(&self, quiz_id: &str) -> Result<Vec<QuizAttempt>, ApiError> {
        self.client.execute(RequestSpec::get(format!("/api/quizzes/{quiz_id}/attempts"))).await
    }
}
