use driftsync_watch::{FileStatus, WatchEvent, Watchdog};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

/// Waits for the next event matching `path`, discarding others.
async fn next_event_for(wd: &Watchdog, path: &Path) -> Option<WatchEvent> {
    let deadline = tokio::time::Instant::now() + EVENT_TIMEOUT;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match tokio::time::timeout(remaining, wd.wait()).await {
            Ok(Ok(event)) if event.path == path => return Some(event),
            Ok(Ok(_)) => continue,
            Ok(Err(_)) | Err(_) => return None,
        }
    }
}

async fn watched_dir(wd: &Watchdog) -> TempDir {
    let dir = TempDir::new().expect("create temp dir");
    wd.add_watch(dir.path(), true).expect("add watch");
    // Give the platform watcher a moment to register.
    tokio::time::sleep(Duration::from_millis(200)).await;
    dir
}

#[tokio::test]
async fn detects_file_creation() {
    let wd = Watchdog::new().unwrap();
    let dir = watched_dir(&wd).await;

    let target = dir.path().join("a.txt");
    fs::write(&target, b"hello").unwrap();

    let event = next_event_for(&wd, &target).await.expect("event for a.txt");
    assert_ne!(FileStatus::Deleted, event.status);
    assert!(event.modified > 0);
}

#[tokio::test]
async fn detects_file_deletion() {
    let wd = Watchdog::new().unwrap();
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("doomed.txt");
    fs::write(&target, b"bytes").unwrap();

    wd.add_watch(dir.path(), true).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    fs::remove_file(&target).unwrap();

    let deadline = tokio::time::Instant::now() + EVENT_TIMEOUT;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        let event = tokio::time::timeout(remaining, wd.wait())
            .await
            .expect("timed out waiting for delete event")
            .expect("watcher closed");
        if event.path == target && event.status == FileStatus::Deleted {
            break;
        }
    }
}

#[tokio::test]
async fn detects_nested_files() {
    let wd = Watchdog::new().unwrap();
    let dir = watched_dir(&wd).await;

    fs::create_dir_all(dir.path().join("sub/deeper")).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    let target = dir.path().join("sub/deeper/n.txt");
    fs::write(&target, b"nested").unwrap();

    assert!(next_event_for(&wd, &target).await.is_some());
}

#[tokio::test]
async fn disregard_suppresses_events() {
    let wd = Watchdog::new().unwrap();
    let dir = watched_dir(&wd).await;

    let silent = dir.path().join("silent.txt");
    let loud = dir.path().join("loud.txt");

    wd.disregard(&silent);
    fs::write(&silent, b"invisible").unwrap();
    fs::write(&loud, b"visible").unwrap();

    // Platform events are ordered within one directory: if the write to
    // the disregarded path had produced an event, it would have arrived
    // before the one we see here.
    let deadline = tokio::time::Instant::now() + EVENT_TIMEOUT;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        let event = tokio::time::timeout(remaining, wd.wait())
            .await
            .expect("timed out waiting for loud.txt")
            .expect("watcher closed");
        assert_ne!(silent, event.path, "suppressed path leaked an event");
        if event.path == loud {
            break;
        }
    }
}

#[tokio::test]
async fn regard_resumes_after_linger() {
    let wd = Watchdog::new().unwrap();
    let dir = watched_dir(&wd).await;
    let target = dir.path().join("later.txt");

    wd.disregard(&target);
    fs::write(&target, b"suppressed").unwrap();
    wd.regard(&target);

    // Lifted suppression lingers briefly to absorb late deliveries.
    tokio::time::sleep(Duration::from_millis(400)).await;
    fs::write(&target, b"observed").unwrap();

    assert!(next_event_for(&wd, &target).await.is_some());
}

#[tokio::test]
async fn close_fails_wait() {
    let wd = Watchdog::new().unwrap();
    let _dir = watched_dir(&wd).await;

    wd.close();
    wd.close(); // idempotent

    let result = tokio::time::timeout(EVENT_TIMEOUT, wd.wait()).await;
    assert!(matches!(result, Ok(Err(_))));
}

#[tokio::test]
async fn add_watch_after_close_fails() {
    let wd = Watchdog::new().unwrap();
    let dir = TempDir::new().unwrap();
    wd.close();
    assert!(wd.add_watch(dir.path(), true).is_err());
}
