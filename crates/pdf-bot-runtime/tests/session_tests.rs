use pdf_bot_runtime::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn stage(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"staged").unwrap();
    path
}

#[tokio::test]
async fn test_record_and_snapshot_in_upload_order() {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(SessionLimits::default());
    let user = UserId(7);

    let b = stage(dir.path(), "7_b.pdf");
    let img = stage(dir.path(), "7_img_abc.jpg");
    let a = stage(dir.path(), "7_a.pdf");

    for path in [&b, &img, &a] {
        store.record(user, path.clone()).await.unwrap();
    }

    assert_eq!(store.snapshot(user, FileKind::Pdf).await, vec![b, a]);
    assert_eq!(store.snapshot(user, FileKind::Image).await, vec![img]);
    assert!(store.snapshot(UserId(8), FileKind::Pdf).await.is_empty());
}

#[tokio::test]
async fn test_clear_deletes_files_and_empties_session() {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(SessionLimits::default());
    let user = UserId(1);

    let a = stage(dir.path(), "1_a.pdf");
    let b = stage(dir.path(), "1_b.pdf");
    store.record(user, a.clone()).await.unwrap();
    store.record(user, b.clone()).await.unwrap();

    assert_eq!(store.clear(user).await, 2);
    assert!(!a.exists());
    assert!(!b.exists());
    assert!(store.lock(user).await.is_empty());
}

#[tokio::test]
async fn test_clear_tolerates_missing_files() {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(SessionLimits::default());
    let user = UserId(1);

    let gone = dir.path().join("1_gone.pdf");
    let present = stage(dir.path(), "1_present.pdf");
    store.record(user, gone).await.unwrap();
    store.record(user, present.clone()).await.unwrap();

    // The missing file does not stop the present one from being removed
    assert_eq!(store.clear(user).await, 1);
    assert!(!present.exists());
    assert!(store.lock(user).await.is_empty());
}

#[tokio::test]
async fn test_clear_does_not_touch_other_users() {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(SessionLimits::default());

    let mine = stage(dir.path(), "1_a.pdf");
    let theirs = stage(dir.path(), "2_a.pdf");
    store.record(UserId(1), mine.clone()).await.unwrap();
    store.record(UserId(2), theirs.clone()).await.unwrap();

    store.clear(UserId(1)).await;
    assert!(!mine.exists());
    assert!(theirs.exists());
    assert_eq!(store.snapshot(UserId(2), FileKind::Pdf).await, vec![theirs]);
}

#[tokio::test]
async fn test_reset_and_clear_all() {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(SessionLimits::default());

    let a = stage(dir.path(), "1_a.pdf");
    let b = stage(dir.path(), "2_b.pdf");
    let c = stage(dir.path(), "3_c.pdf");
    store.record(UserId(1), a.clone()).await.unwrap();
    store.record(UserId(2), b.clone()).await.unwrap();
    store.record(UserId(3), c.clone()).await.unwrap();

    assert_eq!(store.reset(UserId(1)).await, 1);
    assert!(!a.exists());
    assert_eq!(store.user_count(), 2);

    assert_eq!(store.clear_all().await, 2);
    assert!(!b.exists());
    assert!(!c.exists());
    assert_eq!(store.user_count(), 0);
}

#[tokio::test]
async fn test_empty_sessions_are_forgotten() {
    let store = SessionStore::new(SessionLimits::default());

    // Reading an absent session does not leave an entry behind
    assert!(store.snapshot(UserId(1), FileKind::Pdf).await.is_empty());
    assert_eq!(store.user_count(), 0);

    store.record(UserId(1), "1_a.pdf".into()).await.unwrap();
    assert_eq!(store.user_count(), 1);
    assert!(!store.release(UserId(1)));
    assert_eq!(store.user_count(), 1);

    store.clear(UserId(1)).await;
    assert_eq!(store.user_count(), 0);
    assert!(!store.release(UserId(1)));
}

#[tokio::test]
async fn test_held_session_is_not_released() {
    let store = SessionStore::new(SessionLimits::default());

    let guard = store.lock(UserId(3)).await;
    assert!(guard.is_empty());
    assert!(!store.release(UserId(3)));
    assert_eq!(store.user_count(), 1);

    drop(guard);
    assert!(store.release(UserId(3)));
    assert_eq!(store.user_count(), 0);
}

#[tokio::test]
async fn test_refused_record_still_releases_entry() {
    let store = SessionStore::new(SessionLimits {
        max_files: 0,
        max_file_bytes: 1024,
    });

    assert_eq!(
        store.record(UserId(4), "4_a.pdf".into()).await,
        Err(SessionError::TooManyFiles { max: 0 })
    );
    assert_eq!(store.user_count(), 0);
}

#[tokio::test]
async fn test_store_enforces_file_ceiling() {
    let store = SessionStore::new(SessionLimits {
        max_files: 2,
        max_file_bytes: 1024,
    });
    let user = UserId(5);

    store.record(user, "5_a.pdf".into()).await.unwrap();
    store.record(user, "5_b.pdf".into()).await.unwrap();
    assert_eq!(
        store.record(user, "5_c.pdf".into()).await,
        Err(SessionError::TooManyFiles { max: 2 })
    );
    assert_eq!(store.snapshot(user, FileKind::Pdf).await.len(), 2);

    let session = store.lock(user).await;
    assert!(matches!(
        session.ensure_capacity(Some(4096)),
        Err(SessionError::TooManyFiles { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_uploads_from_one_user_all_land() {
    let store = Arc::new(SessionStore::new(SessionLimits {
        max_files: 1000,
        max_file_bytes: 1024,
    }));
    let user = UserId(42);

    let tasks: Vec<_> = (0..64)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .record(user, PathBuf::from(format!("42_{i}.pdf")))
                    .await
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let mut staged = store.snapshot(user, FileKind::Pdf).await;
    assert_eq!(staged.len(), 64);
    staged.sort();
    staged.dedup();
    assert_eq!(staged.len(), 64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_lock_serializes_mutations_for_one_user() {
    let store = Arc::new(SessionStore::new(SessionLimits::default()));
    let user = UserId(9);

    let guard = store.lock(user).await;

    let writer = {
        let store = store.clone();
        tokio::spawn(async move { store.record(user, "9_late.pdf".into()).await })
    };

    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    // The writer is parked on the lock we hold
    assert!(guard.is_empty());
    assert!(!writer.is_finished());

    drop(guard);
    writer.await.unwrap().unwrap();
    assert_eq!(store.lock(user).await.len(), 1);
}

#[tokio::test]
async fn test_other_users_are_not_blocked() {
    let store = SessionStore::new(SessionLimits::default());

    let _held = store.lock(UserId(1)).await;
    store.record(UserId(2), "2_a.pdf".into()).await.unwrap();
    assert_eq!(store.snapshot(UserId(2), FileKind::Pdf).await.len(), 1);
}
