use reqwest::Method;
use serde_json::json;

use crate::services::types::Answer;
use crate::test_support::{envelope_ok, json_body, signed_in_client};

// =============================================================================
// CATEGORIES & ENROLLMENTS
// =============================================================================

#[tokio::test]
async fn categories_are_fetched_anonymously() {
    let (client, transport) = signed_in_client(|_| Ok(envelope_ok(json!([{ "id": "k1", "name": "Systems" }]))));
    let categories = client.categories().list().await.unwrap();
    assert_eq!(categories[0].name, "Systems");
    assert_eq!(transport.last_request().bearer(), None);
}

#[tokio::test]
async fn enroll_and_progress_bodies() {
    let (client, transport) = signed_in_client(|_| {
        Ok(envelope_ok(json!({ "id": "e1", "courseId": "c1", "progress": 50.0, "completedLessons": ["l1"] })))
    });

    client.enrollments().enroll("c1").await.unwrap();
    assert_eq!(json_body(&transport.last_request()), json!({ "courseId": "c1" }));

    let enrollment = client.enrollments().update_progress("e1", "l1", true).await.unwrap();
    assert!((enrollment.progress - 50.0).abs() < f64::EPSILON);
    let req = transport.last_request();
    assert_eq!(req.path(), "/api/enrollments/e1/progress");
    assert_eq!(json_body(&req), json!({ "lessonId": "l1", "completed": true }));
}

// =============================================================================
// QUIZZES & DASHBOARDS
// =============================================================================

#[tokio::test]
async fn quiz_submit_sends_answers() {
    let (client, transport) = signed_in_client(|_| {
        Ok(envelope_ok(json!({ "id": "a1", "quizId": "q1", "score": 80.0, "passed": true })))
    });
    let answers = vec![Answer { question_id: "x1".into(), option_ids: vec!["o2".into()], text: None }];

    let attempt = client.quizzes().submit("a1", &answers).await.unwrap();

    assert_eq!(attempt.passed, Some(true));
    let req = transport.last_request();
    assert_eq!((req.method.clone(), req.path()), (Method::POST, "/api/quizzes/attempts/a1/submit"));
    assert_eq!(json_body(&req), json!({ "answers": [{ "questionId": "x1", "optionIds": ["o2"] }] }));
}

#[tokio::test]
async fn quiz_questions_decode_type_field() {
    let (client, _) = signed_in_client(|_| {
        Ok(envelope_ok(json!({
            "id": "q1",
            "title": "Ownership",
            "questions": [{ "id": "x1", "text": "Move or copy?", "type": "MULTIPLE_CHOICE", "options": [{ "id": "o1", "text": "Move" }] }]
        })))
    });
    let quiz = client.quizzes().get("q1").await.unwrap();
    assert_eq!(quiz.questions[0].kind, crate::services::types::QuestionKind::MultipleChoice);
}

#[tokio::test]
async fn dashboards_tolerate_missing_fields() {
    let (client, transport) = signed_in_client(|_| Ok(envelope_ok(json!({ "enrolledCourses": 3 }))));
    let student = client.dashboard().student().await.unwrap();
    assert_eq!(student.enrolled_courses, 3);
    assert!(student.in_progress.is_empty());
    assert_eq!(transport.last_request().path(), "/api/dashboard/student");
}
