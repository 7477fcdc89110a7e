use driftsync_client::connector::mock::{MockCall, MockConnector};
use driftsync_client::Client;
use driftsync_types::{FileData, Metadata};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use tempfile::TempDir;

/// A sync root inside the temp dir, so the metadata snapshot written
/// beside it is cleaned up with everything else.
fn sync_root(dir: &TempDir) -> PathBuf {
    let root = dir.path().join("sync");
    fs::create_dir(&root).unwrap();
    root
}

async fn client_for(mock: &Arc<MockConnector>, root: &Path) -> Client {
    let conn: Arc<dyn driftsync_client::Connector> = Arc::clone(mock) as Arc<dyn driftsync_client::Connector>;
    Client::with_connector(root.to_path_buf(), conn).await.unwrap()
}

async fn started_client(mock: &Arc<MockConnector>) -> (Client, TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let root = sync_root(&dir);
    let mut client = client_for(mock, &root).await;
    client.start().unwrap();
    // Give the platform watcher a moment to register.
    tokio::time::sleep(Duration::from_millis(250)).await;
    (client, dir, root)
}

async fn eventually<F: Fn() -> bool>(cond: F, what: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("timed out waiting for {what}");
}

/// Settle long enough for any in-flight event (and the suppression
/// linger) to have been processed.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(600)).await;
}

fn mtime(path: &Path) -> i64 {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(-1)
}

fn pushed(mock: &MockConnector, path: &str) -> bool {
    mock.calls()
        .iter()
        .any(|c| matches!(c, MockCall::PushFile { path: p, .. } if p == path))
}

fn fetched(mock: &MockConnector, path: &str) -> Vec<i64> {
    mock.calls()
        .iter()
        .filter_map(|c| match c {
            MockCall::GetFile { path: p, modified } if p == path => Some(*modified),
            _ => None,
        })
        .collect()
}

// ── Local-origin flow ────────────────────────────────────────────

#[tokio::test]
async fn local_create_is_pushed_to_the_server() {
    let mock = Arc::new(MockConnector::new());
    let (client, _dir, root) = started_client(&mock).await;

    fs::write(root.join("a.txt"), b"hello").unwrap();

    eventually(|| pushed(&mock, "a.txt"), "push of a.txt").await;
    let (modified, size) = mock
        .calls()
        .into_iter()
        .find_map(|c| match c {
            MockCall::PushFile { path, modified, size } if path == "a.txt" => {
                Some((modified, size))
            }
            _ => None,
        })
        .unwrap();
    assert_eq!(5, size);
    assert_eq!(mtime(&root.join("a.txt")), modified);
    assert_eq!(b"hello".to_vec(), mock.stored_file("a.txt").unwrap());

    client.shutdown().await;
}

#[tokio::test]
async fn local_delete_is_propagated() {
    let mock = Arc::new(MockConnector::new());
    let (client, _dir, root) = started_client(&mock).await;

    let target = root.join("e.txt");
    fs::write(&target, b"short-lived").unwrap();
    eventually(|| pushed(&mock, "e.txt"), "push of e.txt").await;

    fs::remove_file(&target).unwrap();
    eventually(
        || {
            mock.calls()
                .iter()
                .any(|c| matches!(c, MockCall::DeleteFile { path, .. } if path == "e.txt"))
        },
        "delete of e.txt",
    )
    .await;

    client.shutdown().await;
}

// ── Remote-origin flow ───────────────────────────────────────────

#[tokio::test]
async fn remote_create_writes_file_without_feedback() {
    let mock = Arc::new(MockConnector::new());
    mock.put_file("b.txt", b"hello world".to_vec());
    let (client, _dir, root) = started_client(&mock).await;

    mock.queue_push("b.txt", FileData::new(200));

    let target = root.join("b.txt");
    eventually(|| mtime(&target) == 200, "b.txt written with mtime 200").await;
    assert_eq!(b"hello world".to_vec(), fs::read(&target).unwrap());
    assert_eq!(vec![200], fetched(&mock, "b.txt"));

    // Apply writes metadata directly; the record is visible at once.
    assert_eq!(FileData::new(200), client.metadata().get_file("b.txt"));

    // The write must not loop back through the watcher as a local push.
    settle().await;
    assert!(!pushed(&mock, "b.txt"), "remote write fed back into a push");

    client.shutdown().await;
}

#[tokio::test]
async fn remote_delete_removes_file() {
    let mock = Arc::new(MockConnector::new());
    mock.put_file("d.txt", b"doomed".to_vec());
    let (client, _dir, root) = started_client(&mock).await;

    mock.queue_push("d.txt", FileData::new(100));
    let target = root.join("d.txt");
    eventually(|| target.exists(), "d.txt created").await;

    mock.queue_push("d.txt", FileData::tombstone(150));
    eventually(|| !target.exists(), "d.txt removed").await;

    settle().await;
    assert!(!pushed(&mock, "d.txt"), "remote delete fed back into a push");

    client.shutdown().await;
}

#[tokio::test]
async fn stale_remote_event_is_dropped() {
    let dir = TempDir::new().unwrap();
    let root = sync_root(&dir);
    let target = root.join("c.txt");
    fs::write(&target, b"current").unwrap();
    filetime::set_file_mtime(&target, filetime::FileTime::from_unix_time(500, 0)).unwrap();

    let mock = Arc::new(MockConnector::new());
    mock.put_file("c.txt", b"stale".to_vec());
    // The server agrees with the local state, so the merge is silent.
    let remote: Metadata = [("c.txt".to_string(), FileData::new(500))]
        .into_iter()
        .collect();
    mock.set_metadata(remote);

    let mut client = client_for(&mock, &root).await;
    client.start().unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;

    mock.queue_push("c.txt", FileData::new(300));
    settle().await;

    assert!(fetched(&mock, "c.txt").is_empty(), "stale event was applied");
    assert_eq!(b"current".to_vec(), fs::read(&target).unwrap());
    assert_eq!(500, mtime(&target));

    client.shutdown().await;
}

#[tokio::test]
async fn last_writer_wins_across_out_of_order_pushes() {
    let mock = Arc::new(MockConnector::new());
    let (client, _dir, root) = started_client(&mock).await;
    let target = root.join("p.txt");

    mock.put_file("p.txt", b"v400".to_vec());
    mock.queue_push("p.txt", FileData::new(400));
    eventually(|| mtime(&target) == 400, "p.txt at 400").await;

    // An older event arriving late is stale and must not be applied.
    mock.put_file("p.txt", b"v100".to_vec());
    mock.queue_push("p.txt", FileData::new(100));
    settle().await;
    assert_eq!(b"v400".to_vec(), fs::read(&target).unwrap());

    mock.put_file("p.txt", b"v600".to_vec());
    mock.queue_push("p.txt", FileData::new(600));
    eventually(|| mtime(&target) == 600, "p.txt at 600").await;
    assert_eq!(b"v600".to_vec(), fs::read(&target).unwrap());

    assert_eq!(vec![400, 600], fetched(&mock, "p.txt"));

    client.shutdown().await;
}

// ── Startup merge ────────────────────────────────────────────────

#[tokio::test]
async fn startup_merge_pulls_newer_remote_files() {
    let dir = TempDir::new().unwrap();
    let root = sync_root(&dir);
    let mock = Arc::new(MockConnector::new());
    mock.put_file("seed.txt", b"from server".to_vec());
    let remote: Metadata = [("seed.txt".to_string(), FileData::new(321))]
        .into_iter()
        .collect();
    mock.set_metadata(remote);

    let mut client = client_for(&mock, &root).await;
    client.start().unwrap();

    let target = root.join("seed.txt");
    eventually(|| mtime(&target) == 321, "seed.txt pulled at startup").await;
    assert_eq!(b"from server".to_vec(), fs::read(&target).unwrap());

    client.shutdown().await;
}

// ── Shutdown ─────────────────────────────────────────────────────

#[tokio::test]
async fn shutdown_abandons_pending_events() {
    let dir = TempDir::new().unwrap();
    let root = sync_root(&dir);
    let mock = Arc::new(MockConnector::new());
    let remote: Metadata = (1..=5)
        .map(|i| (format!("q{i}.txt"), FileData::new(10)))
        .collect();
    mock.set_metadata(remote);

    // Construction seeds the queue with five remote pulls; the roles are
    // never started, so destruction must apply none of them.
    let client = client_for(&mock, &root).await;
    client.shutdown().await;

    assert!(mock.is_closed());
    assert!(fs::read_dir(&root).unwrap().next().is_none());
    assert!(mock.calls().is_empty(), "pending events were applied");
}

#[tokio::test]
async fn shutdown_joins_all_roles() {
    let mock = Arc::new(MockConnector::new());
    let (client, _dir, _root) = started_client(&mock).await;

    tokio::time::timeout(Duration::from_secs(5), client.shutdown())
        .await
        .expect("shutdown hung");
    assert!(mock.is_closed());
}
