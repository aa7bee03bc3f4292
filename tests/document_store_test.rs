use palaver::documents::{DocumentStore, Visibility};
use palaver::identity::{CurrentUser, UserRole};
use palaver::types::UserId;

fn user(id: &str, role: UserRole) -> CurrentUser {
    CurrentUser {
        id: UserId(id.to_string()),
        role,
    }
}

#[tokio::test]
async fn put_then_get_round_trips_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let store = DocumentStore::new(dir.path());

    let owner = UserId("alice".into());
    let meta = store
        .put(b"doc body", "notes.txt", &owner, Visibility::Private)
        .await
        .unwrap();

    assert_eq!(meta.name, "notes.txt");
    assert_eq!(meta.size, 8);
    assert_eq!(meta.owner_id, owner);
    assert!(!meta.digest.is_empty());

    let bytes = store.get(&meta.id).await.unwrap();
    assert_eq!(bytes, b"doc body");

    let listed = store.meta(&meta.id).await.unwrap().expect("indexed");
    assert_eq!(listed.digest, meta.digest);
}

#[tokio::test]
async fn visibility_filtering_by_role() {
    let dir = tempfile::tempdir().unwrap();
    let store = DocumentStore::new(dir.path());

    let alice = UserId("alice".into());
    let bob = UserId("bob".into());
    store
        .put(b"a-private", "a.txt", &alice, Visibility::Private)
        .await
        .unwrap();
    store
        .put(b"a-public", "b.txt", &alice, Visibility::Public)
        .await
        .unwrap();
    store
        .put(b"b-private", "c.txt", &bob, Visibility::Private)
        .await
        .unwrap();

    let bob_sees = store
        .list_visible(&user("bob", UserRole::User))
        .await
        .unwrap();
    let names: Vec<_> = bob_sees.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"b.txt"));
    assert!(names.contains(&"c.txt"));

    let admin_sees = store
        .list_visible(&user("root", UserRole::Admin))
        .await
        .unwrap();
    assert_eq!(admin_sees.len(), 3);
}

#[tokio::test]
async fn delete_removes_blob_and_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let store = DocumentStore::new(dir.path());

    let owner = UserId("alice".into());
    let meta = store
        .put(b"bye", "tmp.txt", &owner, Visibility::Public)
        .await
        .unwrap();

    assert!(store.delete(&meta.id).await.unwrap());
    assert!(store.meta(&meta.id).await.unwrap().is_none());
    assert!(store.get(&meta.id).await.is_err());
    assert!(!store.delete(&meta.id).await.unwrap());
}

#[tokio::test]
async fn failed_index_write_leaves_no_orphan_blob() {
    let dir = tempfile::tempdir().unwrap();
    let store = DocumentStore::new(dir.path());

    // A directory squatting on the scratch path makes the index write fail
    // after the blob already landed on disk.
    tokio::fs::create_dir_all(dir.path().join("documents.json.tmp"))
        .await
        .unwrap();

    let owner = UserId("alice".into());
    let result = store
        .put(b"doomed", "x.txt", &owner, Visibility::Private)
        .await;
    assert!(result.is_err());

    let mut blobs = tokio::fs::read_dir(dir.path().join("blobs")).await.unwrap();
    assert!(blobs.next_entry().await.unwrap().is_none());
}

#[tokio::test]
async fn ids_are_unique_across_puts() {
    let dir = tempfile::tempdir().unwrap();
    let store = DocumentStore::new(dir.path());
    let owner = UserId("alice".into());

    let a = store
        .put(b"same bytes", "a.txt", &owner, Visibility::Public)
        .await
        .unwrap();
    let b = store
        .put(b"same bytes", "a.txt", &owner, Visibility::Public)
        .await
        .unwrap();

    assert_ne!(a.id, b.id);
    // Identical content still hashes identically.
    assert_eq!(a.digest, b.digest);
}
