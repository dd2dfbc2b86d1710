//! Cache key layout. Keys are `:`-separated so related entries can be
//! invalidated by prefix.

use crate::services::types::CourseFilter;

pub const COURSE_LISTS: &str = "courses:";
pub const TEACHING: &str = "courses:teaching";
pub const CATEGORIES: &str = "categories";
pub const ENROLLMENTS: &str = "enrollments:me";
pub const CONVERSATIONS: &str = "conversations";
pub const MESSAGES: &str = "messages:";
pub const STUDENT_DASHBOARD: &str = "dashboard:student";
pub const TEACHER_DASHBOARD: &str = "dashboard:teacher";

#[must_use]
pub fn courses(filter: &CourseFilter) -> String {
    format!("courses:list:{}", filter.key())
}

#[must_use]
pub fn course(id: &str) -> String {
    format!("course:{id}")
}

#[must_use]
pub fn messages(conversation_id: &str) -> String {
    format!("{MESSAGES}{conversation_id}")
}

#[must_use]
pub fn quiz(id: &str) -> String {
    format!("quiz:{id}")
}

#[must_use]
pub fn attempts(quiz_id: &str) -> String {
    format!("quiz:{quiz_id}:attempts")
}
