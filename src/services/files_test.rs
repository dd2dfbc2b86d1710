use serde_json::json;

use crate::net::request::RequestBody;
use crate::test_support::{bearer_guard, envelope_ok};

#[tokio::test]
async fn upload_is_replayed_in_full_after_refresh() {
    let (client, transport) = crate::test_support::signed_in_client(bearer_guard(
        "T2",
        envelope_ok(json!({ "accessToken": "T2", "refreshToken": "R2" })),
    ));

    client.files().upload("notes.pdf", "application/pdf", b"%PDF".to_vec()).await.unwrap();

    let uploads = transport
        .requests()
        .into_iter()
        .filter(|r| r.path() == "/api/files/upload")
        .collect::<Vec<_>>();
    assert_eq!(uploads.len(), 2);
    assert_eq!(uploads[0].body, uploads[1].body);
    let Some(RequestBody::Multipart(form)) = &uploads[1].body else {
        panic!("expected multipart body");
    };
    assert_eq!(form.fields[0].file_name.as_deref(), Some("notes.pdf"));
    assert_eq!(form.fields[0].bytes, b"%PDF");
    assert_eq!(client.store().refresh_token().as_deref(), Some("R2"));
}
