use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use lms::services::types::CourseFilter;
use lms::{ApiClient, ApiError, ClientConfig, MemoryTokenStore, RefreshError, SessionEvent};

mod common;

async fn signed_in(refresh_delay: Duration) -> (Arc<ApiClient>, Arc<common::Backend>) {
    let backend = common::Backend::new(refresh_delay);
    let base_url = common::spawn_backend(backend.clone()).await;
    let client = ApiClient::new(&ClientConfig::new(&base_url), Arc::new(MemoryTokenStore::new())).unwrap();
    client.auth().sign_in("ada@example.com", "secret").await.unwrap();
    (Arc::new(client), backend)
}

async fn list_concurrently(client: &Arc<ApiClient>, n: usize) -> Vec<Result<usize, ApiError>> {
    let tasks = (0..n)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move {
                client.courses().list(&CourseFilter::default()).await.map(|page| page.items.len())
            })
        })
        .collect::<Vec<_>>();

    let mut results = Vec::with_capacity(n);
    for task in tasks {
        results.push(task.await.unwrap());
    }
    results
}

#[tokio::test]
async fn test_sign_in_then_authenticated_call() {
    let (client, backend) = signed_in(Duration::ZERO).await;

    let page = client.courses().list(&CourseFilter::default()).await.unwrap();

    assert_eq!(page.items[0].title, "Rust");
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_concurrent_expiry_triggers_single_refresh() {
    let (client, backend) = signed_in(Duration::from_millis(300)).await;
    backend.expire_access();

    let results = list_concurrently(&client, 5).await;

    assert!(results.iter().all(|r| r.as_ref() == Ok(&1)), "{results:?}");
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.store().access_token().as_deref(), Some("T2"));
    assert_eq!(client.store().refresh_token().as_deref(), Some("R1"));
    assert_eq!(backend.course_calls.load(Ordering::SeqCst), 10);
}

#[tokio::test]
async fn test_revoked_refresh_logs_out_once() {
    let (client, backend) = signed_in(Duration::from_millis(300)).await;
    let mut events = client.session().subscribe();
    backend.expire_access();
    backend.revoke_refresh();

    let results = list_concurrently(&client, 3).await;

    for result in &results {
        let err = result.as_ref().unwrap_err();
        assert!(err.is_terminal());
        assert!(matches!(err, ApiError::SessionExpired(RefreshError::Rejected { status: 401, .. })));
    }
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert!(client.store().get().is_empty());
    assert_eq!(events.recv().await.unwrap(), SessionEvent::LoggedOut);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_wrong_password_is_not_a_session_failure() {
    let backend = common::Backend::new(Duration::ZERO);
    let base_url = common::spawn_backend(backend.clone()).await;
    let client = ApiClient::new(&ClientConfig::new(&base_url), Arc::new(MemoryTokenStore::new())).unwrap();

    let err = client.auth().sign_in("ada@example.com", "nope").await.unwrap_err();

    assert_eq!(err.error_code(), Some("INVALID_CREDENTIALS"));
    assert!(!err.is_terminal());
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_verify_after_refresh_and_logout() {
    let (client, backend) = signed_in(Duration::ZERO).await;
    backend.expire_access();

    let user = client.auth().verify().await.unwrap();
    assert_eq!(user.display_name(), "Ada Lovelace");

    client.auth().logout().await;
    assert!(client.store().get().is_empty());
}
