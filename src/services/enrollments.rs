//! Enrollment and lesson progress.

use serde_json::json;

use crate::error::ApiError;
use crate::net::client::ApiClient;
use crate::net::request::RequestSpec;

use super::types::Enrollment;

pub struct EnrollmentService<'a> {
    client: &'a ApiClient,
}

impl<'a> EnrollmentService<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// # Errors
    ///
    /// [`ApiError::Api`] when already enrolled or the course is unpublished.
    pub async fn enroll(&self, course_id: &str) -> Result<Enrollment, ApiError> {
        let spec = RequestSpec::post("/api/enrollments").json(&json!({ "courseId": course_id }))?;
        self.client.execute(spec).await
    }

    /// # Errors
    ///
    /// Any [`ApiError`] from the client core.
    pub async fn mine(&self) -> Result<Vec<Enrollment>, ApiError> {
        self.client.execute(RequestSpec::get("/api/enrollments/me")).await
    }

    /// # Errors
    ///
    /// Any [`ApiError`] from the client core.
    pub async fn unenroll(&self, enrollment_id: &str) -> Result<(), ApiError> {
        self.client.execute_discard(RequestSpec::delete(format!("/api/enrollments/{enrollment_id}"))).await
    }

    /// Mark a lesson complete (or not) and get the recomputed progress back.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`] from the client core.
    pub async fn update_progress(
        &self,
        enrollment_id: &str,
        lesson_id: &str,
        completed: bool,
    ) -> Result<Enrollment, ApiError> {
        let spec = RequestSpec::patch(format!("/api/enrollments/{enrollment_id}/progress"))
            .json(&json!({ "lessonId": lesson_id, "completed": completed }))?;
        self.client.execute(spec).await
    }
}
