use super::*;

#[tokio::test]
async fn absent_key_reads_as_none() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let payload = storage.get("inventory").await.expect("get");
    assert_eq!(payload, None);
}

#[tokio::test]
async fn stores_and_reads_back_payload() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .set("inventory", r#"[{"id":"1","name":"Mouse"}]"#)
        .await
        .expect("set");
    let payload = storage.get("inventory").await.expect("get");
    assert_eq!(payload.as_deref(), Some(r#"[{"id":"1","name":"Mouse"}]"#));
}

#[tokio::test]
async fn overwrites_existing_key() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.set("inventory", "[]").await.expect("first set");
    storage
        .set("inventory", r#"[{"id":"2"}]"#)
        .await
        .expect("second set");
    let payload = storage.get("inventory").await.expect("get");
    assert_eq!(payload.as_deref(), Some(r#"[{"id":"2"}]"#));
}

#[tokio::test]
async fn keys_are_independent() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.set("a", "one").await.expect("set a");
    storage.set("b", "two").await.expect("set b");
    assert_eq!(storage.get("a").await.expect("get a").as_deref(), Some("one"));
    assert_eq!(storage.get("b").await.expect("get b").as_deref(), Some("two"));
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = std::env::temp_dir().join(format!("inventory_storage_test_{suffix}"));
    let db_path = temp_root.join("nested").join("storage.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    storage.set("inventory", "[]").await.expect("set");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );

    std::fs::remove_dir_all(temp_root).expect("cleanup");
}

#[tokio::test]
async fn payload_survives_reconnect() {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = std::env::temp_dir().join(format!("inventory_storage_reopen_{suffix}"));
    let db_path = temp_root.join("storage.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    {
        let storage = Storage::new(&database_url).await.expect("db");
        storage.set("inventory", "persisted").await.expect("set");
    }

    let reopened = Storage::new(&database_url).await.expect("reopen");
    assert_eq!(
        reopened.get("inventory").await.expect("get").as_deref(),
        Some("persisted")
    );

    std::fs::remove_dir_all(temp_root).expect("cleanup");
}
