use reqwest::Method;
use serde_json::json;

use super::*;
use crate::test_support::{envelope_err, envelope_ok, json_body, signed_in_client};

#[tokio::test]
async fn list_encodes_filters_as_query() {
    let (client, transport) = signed_in_client(|_| {
        Ok(envelope_ok(json!({ "items": [{ "id": "c1", "title": "Rust" }], "total": 1, "page": 2, "totalPages": 1 })))
    });
    let filter = CourseFilter { search: Some("rust async".into()), category_id: None, page: Some(2) };

    let page = client.courses().list(&filter).await.unwrap();

    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].title, "Rust");
    assert_eq!(transport.last_request().url, "http://lms.test/api/courses?search=rust+async&page=2");
}

#[tokio::test]
async fn get_decodes_nested_sections() {
    let (client, _) = signed_in_client(|_| {
        Ok(envelope_ok(json!({
            "id": "c1",
            "title": "Rust",
            "published": true,
            "sections": [
                { "id": "s1", "title": "Basics", "lessons": [{ "id": "l1", "title": "Ownership" }, { "id": "l2", "title": "Borrowing" }] },
                { "id": "s2", "title": "Async", "lessons": [{ "id": "l3", "title": "Futures" }] }
            ]
        })))
    });

    let course = client.courses().get("c1").await.unwrap();
    assert!(course.published);
    assert_eq!(course.lesson_count(), 3);
}

#[tokio::test]
async fn get_unknown_course_is_not_found() {
    let (client, _) = signed_in_client(|_| Ok(envelope_err(404, "Course not found", "COURSE_NOT_FOUND")));
    let err = client.courses().get("missing").await.unwrap_err();
    assert!(matches!(err, ApiError::Api { status: 404, .. }));
}

#[tokio::test]
async fn create_skips_unset_optional_fields() {
    let (client, transport) = signed_in_client(|_| Ok(envelope_ok(json!({ "id": "c9", "title": "New" }))));
    let input = CourseInput { title: "New".into(), description: "Desc".into(), ..CourseInput::default() };

    client.courses().create(&input).await.unwrap();

    let req = transport.last_request();
    assert_eq!(req.method, Method::POST);
    assert_eq!(json_body(&req), json!({ "title": "New", "description": "Desc" }));
}

#[tokio::test]
async fn publish_and_delete_hit_resource_paths() {
    let (client, transport) = signed_in_client(|_| Ok(envelope_ok(json!({ "id": "c1", "published": true }))));

    assert!(client.courses().publish("c1", true).await.unwrap().published);
    let publish = transport.last_request();
    assert_eq!((publish.method.clone(), publish.path()), (Method::PATCH, "/api/courses/c1/publish"));

    client.courses().delete("c1").await.unwrap();
    let delete = transport.last_request();
    assert_eq!((delete.method.clone(), delete.path()), (Method::DELETE, "/api/courses/c1"));
}
