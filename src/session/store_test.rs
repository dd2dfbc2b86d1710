use super::*;

fn temp_token_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("lms-store-test-{}", uuid::Uuid::new_v4()))
        .join("session.json")
}

// =============================================================================
// MemoryTokenStore
// =============================================================================

#[test]
fn memory_store_starts_empty() {
    let store = MemoryTokenStore::new();
    assert!(store.get().is_empty());
    assert_eq!(store.access_token(), None);
    assert_eq!(store.refresh_token(), None);
}

#[test]
fn memory_store_set_replaces_both_tokens() {
    let store = MemoryTokenStore::with_tokens(&TokenPair::new("A1", "R1"));
    store.set(&TokenPair::new("A2", "R2"));
    assert_eq!(store.access_token().as_deref(), Some("A2"));
    assert_eq!(store.refresh_token().as_deref(), Some("R2"));
}

#[test]
fn memory_store_keeps_refresh_token_when_not_rotated() {
    let store = MemoryTokenStore::with_tokens(&TokenPair::new("A1", "R1"));
    store.set(&TokenPair { access_token: "A2".into(), refresh_token: None });
    assert_eq!(store.access_token().as_deref(), Some("A2"));
    assert_eq!(store.refresh_token().as_deref(), Some("R1"));
}

#[test]
fn memory_store_clear_drops_both() {
    let store = MemoryTokenStore::with_tokens(&TokenPair::new("A1", "R1"));
    store.clear();
    assert!(store.get().is_empty());
}

// =============================================================================
// FileTokenStore
// =============================================================================

#[test]
fn file_store_missing_file_starts_empty() {
    let store = FileTokenStore::open(temp_token_path());
    assert!(store.get().is_empty());
}

#[test]
fn file_store_persists_under_well_known_keys() {
    let path = temp_token_path();
    let store = FileTokenStore::open(&path);
    store.set(&TokenPair::new("A1", "R1"));

    let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(raw["accessToken"], "A1");
    assert_eq!(raw["refreshToken"], "R1");

    let reopened = FileTokenStore::open(&path);
    assert_eq!(reopened.get(), store.get());
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn file_store_clear_removes_file() {
    let path = temp_token_path();
    let store = FileTokenStore::open(&path);
    store.set(&TokenPair::new("A1", "R1"));
    assert!(path.exists());

    store.clear();
    assert!(!path.exists());
    assert!(FileTokenStore::open(&path).get().is_empty());
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn take_empties_the_store_once() {
    let store = MemoryTokenStore::with_tokens(&TokenPair::new("A1", "R1"));

    let taken = store.take();
    assert_eq!(taken.access_token.as_deref(), Some("A1"));
    assert_eq!(taken.refresh_token.as_deref(), Some("R1"));
    assert!(store.get().is_empty());
    assert!(store.take().is_empty());
}

#[test]
fn file_store_take_removes_file() {
    let path = temp_token_path();
    let store = FileTokenStore::open(&path);
    store.set(&TokenPair::new("A1", "R1"));

    assert!(!store.take().is_empty());
    assert!(!path.exists());
    assert!(store.take().is_empty());
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn file_store_corrupt_file_starts_empty() {
    let path = temp_token_path();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"{not json").unwrap();

    let store = FileTokenStore::open(&path);
    assert!(store.get().is_empty());
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn open_store_honours_kind() {
    let memory = open_store(&TokenStoreKind::Memory);
    memory.set(&TokenPair::new("A", "R"));
    assert_eq!(memory.access_token().as_deref(), Some("A"));

    let path = temp_token_path();
    let file = open_store(&TokenStoreKind::File(path.clone()));
    file.set(&TokenPair::new("B", "S"));
    assert!(path.exists());
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}
