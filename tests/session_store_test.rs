use palaver::session::SessionStore;
use palaver::types::{SessionId, Transcript, Turn};

fn sample_transcript(text: &str) -> Transcript {
    let mut transcript = Transcript::new();
    transcript.turns.push(Turn::user(text.to_string()));
    transcript
}

#[tokio::test]
async fn save_then_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("sessions.json"));

    let id = SessionId::generate();
    let transcript = sample_transcript("remember me");
    store.save(&id, &transcript).await.unwrap();

    let loaded = store.load(&id).await.unwrap().expect("session exists");
    assert_eq!(loaded, transcript);
}

#[tokio::test]
async fn load_of_missing_session_is_none_not_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("sessions.json"));
    let loaded = store.load(&SessionId::generate()).await.unwrap();
    assert!(loaded.is_none());
}

#[tokio::test]
async fn list_returns_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("sessions.json"));

    let first = SessionId("a".into());
    let second = SessionId("b".into());
    store.save(&first, &sample_transcript("one")).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    store
        .save(&second, &sample_transcript("two"))
        .await
        .unwrap();

    let listing = store.list().await.unwrap();
    assert_eq!(listing.len(), 2);
    assert_eq!(listing[0].id, second);
    assert_eq!(listing[0].turn_count, 1);
}

#[tokio::test]
async fn delete_removes_only_the_named_session() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("sessions.json"));

    let keep = SessionId::generate();
    let drop = SessionId::generate();
    store.save(&keep, &sample_transcript("keep")).await.unwrap();
    store.save(&drop, &sample_transcript("drop")).await.unwrap();

    assert!(store.delete(&drop).await.unwrap());
    assert!(!store.delete(&drop).await.unwrap());
    assert!(store.load(&keep).await.unwrap().is_some());
    assert!(store.load(&drop).await.unwrap().is_none());
}

#[tokio::test]
async fn overwrite_replaces_the_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("sessions.json"));

    let id = SessionId::generate();
    store.save(&id, &sample_transcript("v1")).await.unwrap();
    store.save(&id, &sample_transcript("v2")).await.unwrap();

    let loaded = store.load(&id).await.unwrap().unwrap();
    assert_eq!(loaded.turns[0].text(), "v2");
    assert_eq!(store.list().await.unwrap().len(), 1);
}
