//! Domain service layer.
//!
//! ARCHITECTURE
//! ============
//! One borrowed view per backend resource, handed out by accessor methods on
//! [`ApiClient`]. Services only describe requests; sending, token attachment
//! and refresh are the client core's job.

pub mod auth;
pub mod categories;
pub mod courses;
pub mod dashboard;
pub mod enrollments;
pub mod files;
pub mod messages;
pub mod quizzes;
pub mod types;

use crate::net::client::ApiClient;

impl ApiClient {
    #[must_use]
    pub fn auth(&self) -> auth::AuthService<'_> {
        auth::AuthService::new(self)
    }

    #[must_use]
    pub fn courses(&self) -> courses::CourseService<'_> {
        courses::CourseService::new(self)
    }

    #[must_use]
    pub fn categories(&self) -> categories::CategoryService<'_> {
        categories::CategoryService::new(self)
    }

    #[must_use]
    pub fn enrollments(&self) -> enrollments::EnrollmentService<'_> {
        enrollments::EnrollmentService::new(self)
    }

    #[must_use]
    pub fn messages(&self) -> messages::MessageService<'_> {
        messages::MessageService::new(self)
    }

    #[must_use]
    pub fn quizzes(&self) -> quizzes::QuizService<'_> {
        quizzes::QuizService::new(self)
    }

    #[must_use]
    pub fn files(&self) -> files::FileService<'_> {
        files::FileService::new(self)
    }

    #[must_use]
    pub fn dashboard(&self) -> dashboard::DashboardService<'_> {
        dashboard::DashboardService::new(self)
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
