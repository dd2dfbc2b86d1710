use crate::error::ApiError;
use crate::net::client::ApiClient;
use crate::net::request::RequestSpec;

use super::types::{StudentDashboard, TeacherDashboard};

pub struct DashboardService<'a> {
    client: &'a ApiClient,
}

impl<'a> DashboardService<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// # Errors
    ///
    /// Any [`ApiError`] from the client core.
    pub async fn student(&self) -> Result<StudentDashboard, ApiError> {
        self.client.execute(RequestSpec::get("/api/dashboard/student")).await
    }

    /// # Errors
    ///
    /// [`ApiError::Api`] with status 403 for non-teachers.
    pub async fn teacher(&self) -> Result<TeacherDashboard, ApiError> {
        self.client.execute(RequestSpec::get("/api/dashboard/teacher")).await
    }
}
