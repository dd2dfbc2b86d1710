//! Wire models shared by the services, the query cache and the realtime
//! channel. All payloads are camelCase JSON; missing fields fall back to
//! defaults so additive backend changes do not break decoding.

use serde::{Deserialize, Serialize};

use crate::session::store::TokenPair;

// =============================================================================
// USERS & AUTH
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    Student,
    Teacher,
    Admin,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub avatar_url: Option<String>,
}

impl User {
    #[must_use]
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() { self.email.clone() } else { name.to_owned() }
    }
}

/// Successful sign-in or sign-up payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSession {
    pub user: User,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl AuthSession {
    #[must_use]
    pub fn token_pair(&self) -> TokenPair {
        TokenPair { access_token: self.access_token.clone(), refresh_token: self.refresh_token.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

// =============================================================================
// COURSES
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Lesson {
    pub id: String,
    pub title: String,
    pub content: Option<String>,
    pub video_url: Option<String>,
    pub position: u32,
    pub duration_minutes: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub position: u32,
    pub lessons: Vec<Lesson>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Course {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category_id: Option<String>,
    pub category: Option<Category>,
    pub teacher_id: Option<String>,
    pub teacher: Option<User>,
    pub thumbnail_url: Option<String>,
    pub price: Option<f64>,
    pub published: bool,
    pub sections: Vec<Section>,
    pub enrollment_count: u32,
    pub created_at: Option<String>,
}

impl Course {
    #[must_use]
    pub fn lesson_count(&self) -> usize {
        self.sections.iter().map(|s| s.lessons.len()).sum()
    }
}

/// One page of a listing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub total_pages: u32,
}

impl<T> Default for Paginated<T> {
    fn default() -> Self {
        Self { items: Vec::new(), total: 0, page: 1, total_pages: 0 }
    }
}

/// Filters for the public course catalogue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseFilter {
    pub search: Option<String>,
    pub category_id: Option<String>,
    pub page: Option<u32>,
}

impl CourseFilter {
    /// Stable cache-key suffix for this filter.
    #[must_use]
    pub fn key(&self) -> String {
        format!(
            "search={}&category={}&page={}",
            self.search.as_deref().unwrap_or_default(),
            self.category_id.as_deref().unwrap_or_default(),
            self.page.unwrap_or(1)
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseInput {
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

// =============================================================================
// ENROLLMENTS
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Enrollment {
    pub id: String,
    pub course_id: String,
    pub course: Option<Course>,
    pub progress: f64,
    pub completed_lessons: Vec<String>,
    pub enrolled_at: Option<String>,
}

// =============================================================================
// MESSAGING
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub receiver_id: Option<String>,
    pub content: String,
    pub read: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Conversation {
    pub id: String,
    pub participants: Vec<User>,
    pub last_message: Option<Message>,
    pub unread_count: u32,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub receiver_id: String,
    pub content: String,
}

// =============================================================================
// QUIZZES
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionKind {
    #[default]
    SingleChoice,
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuestionOption {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Question {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub options: Vec<QuestionOption>,
    pub points: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Quiz {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub time_limit_minutes: Option<u32>,
    pub passing_score: Option<f64>,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuizAttempt {
    pub id: String,
    pub quiz_id: String,
    pub score: Option<f64>,
    pub passed: Option<bool>,
    pub started_at: Option<String>,
    pub submitted_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question_id: String,
    #[serde(default)]
    pub option_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

// =============================================================================
// FILES & DASHBOARDS
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadedFile {
    pub id: String,
    pub url: String,
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentDashboard {
    pub enrolled_courses: u32,
    pub completed_courses: u32,
    pub unread_messages: u32,
    pub in_progress: Vec<Enrollment>,
    pub recent_attempts: Vec<QuizAttempt>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TeacherDashboard {
    pub total_courses: u32,
    pub published_courses: u32,
    pub total_students: u32,
    pub courses: Vec<Course>,
    pub recent_enrollments: Vec<Enrollment>,
}
