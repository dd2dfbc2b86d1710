//! Course catalogue and authoring.

use crate::error::ApiError;
use crate::net::client::ApiClient;
use crate::net::request::RequestSpec;

use super::types::{Course, CourseFilter, CourseInput, Paginated};

pub struct CourseService<'a> {
    client: &'a ApiClient,
}

impl<'a> CourseService<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Published courses matching `filter`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`] from the client core.
    pub async fn list(&self, filter: &CourseFilter) -> Result<Paginated<Course>, ApiError> {
        let spec = RequestSpec::get("/api/courses")
            .query("search", filter.search.as_deref())
            .query("categoryId", filter.category_id.as_deref())
            .query("page", filter.page);
        self.client.execute(spec).await
    }

    /// Courses owned by the signed-in teacher.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`] from the client core.
    pub async fn teaching(&self) -> Result<Vec<Course>, ApiError> {
        self.client.execute(RequestSpec::get("/api/courses/teaching")).await
    }

    /// # Errors
    ///
    /// [`ApiError::Api`] with status 404 for an unknown id.
    pub async fn get(&self, id: &str) -> Result<Course, ApiError> {
        self.client.execute(RequestSpec::get(format!("/api/courses/{id}"))).await
    }

    /// # Errors
    ///
    /// Any [`ApiError`] from the client core.
    pub async fn create(&self, input: &CourseInput) -> Result<Course, ApiError> {
        self.client.execute(RequestSpec::post("/api/courses").json(input)?).await
    }

    /// # Errors
    ///
    /// Any [`ApiError`] from the client core.
    pub async fn update(&self, id: &str, input: &CourseInput) -> Result<Course, ApiError> {
        self.client.execute(RequestSpec::put(format!("/api/courses/{id}")).json(input)?).await
    }

    /// # Errors
    ///
    /// Any [`ApiError`] from the client core.
    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client.execute_discard(RequestSpec::delete(format!("/api/courses/{id}"))).await
    }

    /// Toggle catalogue visibility.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`] from the client core.
    pub async fn publish(&self, id: &str, published: bool) -> Result<Course, ApiError> {
        let spec = RequestSpec::patch(format!("/api/courses/{id}/publish"))
            .json(&serde_json::json!({ "published": published }))?;
        self.client.execute(spec).await
    }
}

#[cfg(test)]
#[path = "courses_test.rs"]
mod tests;
