//! Cached reads and invalidating mutations.
//!
//! Reads go through [`QueryCache::fetch`] under the keys in [`super::keys`].
//! Mutations call the service, then patch or invalidate exactly the entries
//! whose server-side state they changed.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::ApiError;
use crate::net::client::ApiClient;
use crate::services::types::{
    Answer, Category, Conversation, Course, CourseFilter, CourseInput, Enrollment, Message, Paginated, Quiz,
    QuizAttempt, StudentDashboard, TeacherDashboard,
};
use crate::session::coordinator::SessionEvent;

use super::cache::QueryCache;
use super::keys;

#[derive(Clone)]
pub struct Queries {
    client: Arc<ApiClient>,
    cache: Arc<QueryCache>,
}

impl Queries {
    #[must_use]
    pub fn new(client: Arc<ApiClient>, cache: Arc<QueryCache>) -> Self {
        Self { client, cache }
    }

    #[must_use]
    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// Drop all cached data whenever the session ends, so the next user never
    /// sees the previous user's data.
    #[must_use]
    pub fn clear_on_logout(&self) -> JoinHandle<()> {
        let mut events = self.client.session().subscribe();
        let cache = self.cache.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::LoggedOut) | Err(RecvError::Lagged(_)) => {
                        debug!("session ended; clearing query cache");
                        cache.clear();
                    }
                    Ok(_) => {}
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// # Errors
    ///
    /// Any [`ApiError`] from the fetch.
    pub async fn courses(&self, filter: &CourseFilter) -> Result<Paginated<Course>, ApiError> {
        self.cache
            .fetch(&keys::courses(filter), || async { self.client.courses().list(filter).await })
            .await
    }

    /// # Errors
    ///
    /// Any [`ApiError`] from the fetch.
    pub async fn course(&self, id: &str) -> Result<Course, ApiError> {
        self.cache.fetch(&keys::course(id), || async { self.client.courses().get(id).await }).await
    }

    /// # Errors
    ///
    /// Any [`ApiError`] from the fetch.
    pub async fn teaching(&self) -> Result<Vec<Course>, ApiError> {
        self.cache.fetch(keys::TEACHING, || async { self.client.courses().teaching().await }).await
    }

    /// # Errors
    ///
    /// Any [`ApiError`] from the fetch.
    pub async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        self.cache.fetch(keys::CATEGORIES, || async { self.client.categories().list().await }).await
    }

    /// # Errors
    ///
    /// Any [`ApiError`] from the fetch.
    pub async fn enrollments(&self) -> Result<Vec<Enrollment>, ApiError> {
        self.cache.fetch(keys::ENROLLMENTS, || async { self.client.enrollments().mine().await }).await
    }

    /// # Errors
    ///
    /// Any [`ApiError`] from the fetch.
    pub async fn conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        self.cache.fetch(keys::CONVERSATIONS, || async { self.client.messages().conversations().await }).await
    }

    /// Latest page of a conversation.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`] from the fetch.
    pub async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, ApiError> {
        self.cache
            .fetch(&keys::messages(conversation_id), || async {
                self.client.messages().history(conversation_id, None).await
            })
            .await
    }

    /// # Errors
    ///
    /// Any [`ApiError`] from the fetch.
    pub async fn quiz(&self, id: &str) -> Result<Quiz, ApiError> {
        self.cache.fetch(&keys::quiz(id), || async { self.client.quizzes().get(id).await }).await
    }

    /// # Errors
    ///
    /// Any [`ApiError`] from the fetch.
    pub async fn attempts(&self, quiz_id: &str) -> Result<Vec<QuizAttempt>, ApiError> {
        self.cache
            .fetch(&keys::attempts(quiz_id), || async { self.client.quizzes().attempts(quiz_id).await })
            .await
    }

    /// # Errors
    ///
    /// Any [`ApiError`] from the fetch.
    pub async fn student_dashboard(&self) -> Result<StudentDashboard, ApiError> {
        self.cache.fetch(keys::STUDENT_DASHBOARD, || async { self.client.dashboard().student().await }).await
    }

    /// # Errors
    ///
    /// Any [`ApiError`] from the fetch.
    pub async fn teacher_dashboard(&self) -> Result<TeacherDashboard, ApiError> {
        self.cache.fetch(keys::TEACHER_DASHBOARD, || async { self.client.dashboard().teacher().await }).await
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    /// # Errors
    ///
    /// Any [`ApiError`] from the service call; the cache is untouched then.
    pub async fn enroll(&self, course_id: &str) -> Result<Enrollment, ApiError> {
        let enrollment = self.client.enrollments().enroll(course_id).await?;
        self.cache.invalidate(keys::ENROLLMENTS);
        self.cache.invalidate(&keys::course(course_id));
        self.cache.invalidate(keys::STUDENT_DASHBOARD);
        Ok(enrollment)
    }

    /// # Errors
    ///
    /// Any [`ApiError`] from the service call.
    pub async fn unenroll(&self, enrollment_id: &str) -> Result<(), ApiError> {
        self.client.enrollments().unenroll(enrollment_id).await?;
        self.cache.update::<Vec<Enrollment>, _>(keys::ENROLLMENTS, |list| list.retain(|e| e.id != enrollment_id));
        self.cache.invalidate(keys::ENROLLMENTS);
        self.cache.invalidate(keys::STUDENT_DASHBOARD);
        Ok(())
    }

    /// # Errors
    ///
    /// Any [`ApiError`] from the service call.
    pub async fn update_progress(
        &self,
        enrollment_id: &str,
        lesson_id: &str,
        completed: bool,
    ) -> Result<Enrollment, ApiError> {
        let updated = self.client.enrollments().update_progress(enrollment_id, lesson_id, completed).await?;
        self.cache.update::<Vec<Enrollment>, _>(keys::ENROLLMENTS, |list| {
            if let Some(slot) = list.iter_mut().find(|e| e.id == updated.id) {
                *slot = updated.clone();
            }
        });
        self.cache.invalidate(keys::STUDENT_DASHBOARD);
        Ok(updated)
    }

    /// Send a message and append it to the cached history.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`] from the service call.
    pub async fn send_message(&self, receiver_id: &str, content: &str) -> Result<Message, ApiError> {
        let message = self.client.messages().send(receiver_id, content).await?;
        self.cache.update::<Vec<Message>, _>(&keys::messages(&message.conversation_id), |list| {
            upsert_message(list, &message);
        });
        self.cache.invalidate(keys::CONVERSATIONS);
        Ok(message)
    }

    /// # Errors
    ///
    /// Any [`ApiError`] from the service call.
    pub async fn mark_read(&self, conversation_id: &str) -> Result<(), ApiError> {
        self.client.messages().mark_read(conversation_id).await?;
        self.cache.update::<Vec<Conversation>, _>(keys::CONVERSATIONS, |list| {
            if let Some(conversation) = list.iter_mut().find(|c| c.id == conversation_id) {
                conversation.unread_count = 0;
            }
        });
        self.cache.invalidate(keys::STUDENT_DASHBOARD);
        Ok(())
    }

    /// # Errors
    ///
    /// Any [`ApiError`] from the service call.
    pub async fn create_course(&self, input: &CourseInput) -> Result<Course, ApiError> {
        let course = self.client.courses().create(input).await?;
        self.after_course_change(&course.id);
        Ok(course)
    }

    /// # Errors
    ///
    /// Any [`ApiError`] from the service call.
    pub async fn update_course(&self, id: &str, input: &CourseInput) -> Result<Course, ApiError> {
        let course = self.client.courses().update(id, input).await?;
        self.after_course_change(id);
        self.cache.set(&keys::course(id), &course);
        Ok(course)
    }

    /// # Errors
    ///
    /// Any [`ApiError`] from the service call.
    pub async fn publish_course(&self, id: &str, published: bool) -> Result<Course, ApiError> {
        let course = self.client.courses().publish(id, published).await?;
        self.after_course_change(id);
        self.cache.set(&keys::course(id), &course);
        Ok(course)
    }

    /// # Errors
    ///
    /// Any [`ApiError`] from the service call.
    pub async fn delete_course(&self, id: &str) -> Result<(), ApiError> {
        self.client.courses().delete(id).await?;
        self.after_course_change(id);
        self.cache.remove(&keys::course(id));
        Ok(())
    }

    /// # Errors
    ///
    /// Any [`ApiError`] from the service call.
    pub async fn submit_attempt(
        &self,
        quiz_id: &str,
        attempt_id: &str,
        answers: &[Answer],
    ) -> Result<QuizAttempt, ApiError> {
        let attempt = self.client.quizzes().submit(attempt_id, answers).await?;
        self.cache.invalidate(&keys::attempts(quiz_id));
        self.cache.invalidate(keys::STUDENT_DASHBOARD);
        Ok(attempt)
    }

    fn after_course_change(&self, id: &str) {
        self.cache.invalidate_prefix(keys::COURSE_LISTS);
        self.cache.invalidate(&keys::course(id));
        self.cache.invalidate(keys::TEACHER_DASHBOARD);
    }
}

/// Insert `message` into a history list, replacing any copy with the same id.
pub(crate) fn upsert_message(list: &mut Vec<Message>, message: &Message) {
    match list.iter_mut().find(|m| m.id == message.id) {
        Some(existing) => *existing = message.clone(),
        None => list.push(message.clone()),
    }
}

#[cfg(test)]
#[path = "queries_test.rs"]
mod tests;
