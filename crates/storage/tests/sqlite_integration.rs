use std::time::Duration;

use quiz_core::next_session_name;
use quiz_core::time::fixed_today;
use storage::repository::{KeyValueStore, SESSION_KEY};
use storage::sqlite::SqliteRepository;

async fn open(name: &str) -> SqliteRepository {
    SqliteRepository::open(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("open")
}

#[tokio::test]
async fn sqlite_kv_set_get_remove() {
    let repo = open("memdb_kv_basic").await;

    assert_eq!(repo.get(SESSION_KEY).await.unwrap(), None);
    repo.set(SESSION_KEY, "2025-06-01_1").await.unwrap();
    repo.set(SESSION_KEY, "2025-06-01_2").await.unwrap();
    assert_eq!(
        repo.get(SESSION_KEY).await.unwrap().as_deref(),
        Some("2025-06-01_2")
    );

    repo.remove(SESSION_KEY).await.unwrap();
    assert_eq!(repo.get(SESSION_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn sqlite_replace_allocates_consecutive_session_names() {
    let repo = open("memdb_kv_replace").await;
    let today = fixed_today();

    let mut allocated = Vec::new();
    for _ in 0..3 {
        let next = repo
            .replace_with(
                SESSION_KEY,
                Box::new(move |prev| next_session_name(prev.as_deref(), today).to_string()),
            )
            .await
            .unwrap();
        allocated.push(next);
    }

    assert_eq!(allocated, ["2025-06-01_1", "2025-06-01_2", "2025-06-01_3"]);
    assert_eq!(
        repo.get(SESSION_KEY).await.unwrap().as_deref(),
        Some("2025-06-01_3")
    );
}

#[tokio::test]
async fn sqlite_interrupted_replace_releases_write_lock() {
    let repo = open("memdb_kv_interrupted").await;
    repo.set(SESSION_KEY, "2025-06-01_1").await.unwrap();

    let interrupted = repo.clone();
    let task = tokio::spawn(async move {
        interrupted
            .replace_with(
                SESSION_KEY,
                Box::new(|_prev: Option<String>| -> String { panic!("allocation interrupted") }),
            )
            .await
    });
    assert!(task.await.is_err());

    let write = tokio::time::timeout(Duration::from_secs(5), async {
        while repo.set("other", "v").await.is_err() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(write.is_ok(), "store stayed locked after interrupted replace");
    assert_eq!(
        repo.get(SESSION_KEY).await.unwrap().as_deref(),
        Some("2025-06-01_1")
    );
}

#[tokio::test]
async fn sqlite_migrations_are_idempotent() {
    let repo = open("memdb_kv_migrate").await;
    repo.set("k", "v").await.unwrap();
    repo.migrate().await.unwrap();
    assert_eq!(repo.get("k").await.unwrap().as_deref(), Some("v"));
}
