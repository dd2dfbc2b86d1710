use super::*;

#[test]
fn token_is_appended_to_query() {
    let url = url_with_token("ws://lms.test/ws", "T1").unwrap();
    assert_eq!(url.as_str(), "ws://lms.test/ws?token=T1");
}

#[test]
fn existing_query_is_kept_and_token_encoded() {
    let url = url_with_token("wss://lms.test/ws?v=2", "a b+c").unwrap();
    assert_eq!(url.as_str(), "wss://lms.test/ws?v=2&token=a+b%2Bc");
}

#[test]
fn invalid_url_is_reported() {
    assert!(url_with_token("not a url", "T1").is_err());
}

#[tokio::test(start_paused = true)]
async fn channel_without_token_never_connects() {
    let store: Arc<dyn TokenStore> = Arc::new(crate::session::store::MemoryTokenStore::new());
    let channel = RealtimeChannel::connect("ws://127.0.0.1:9/ws", store);

    tokio::time::advance(Duration::from_secs(15)).await;
    tokio::task::yield_now().await;

    assert_ne!(*channel.status().borrow(), ConnectionStatus::Connected);
    assert!(channel.join_conversation("k1"));
    assert!(channel.join_conversation("k2"));
    assert!(channel.leave_conversation("k1"));
    assert_eq!(*lock_joined(&channel.joined), BTreeSet::from(["k2".to_owned()]));
}
