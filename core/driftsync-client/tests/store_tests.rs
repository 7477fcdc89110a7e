use driftsync_client::MetaStore;
use driftsync_types::{unix_now, FileData, Metadata};
use std::fs;
use tempfile::TempDir;

fn sync_dir(root: &TempDir) -> std::path::PathBuf {
    let dir = root.path().join("notes");
    fs::create_dir(&dir).unwrap();
    dir
}

#[test]
fn snapshot_lives_beside_the_sync_dir() {
    let root = TempDir::new().unwrap();
    let dir = sync_dir(&root);
    let store = MetaStore::new(&dir);

    let snapshot = store.snapshot_path();
    assert_eq!(root.path(), snapshot.parent().unwrap());
    assert_eq!(".notes.driftsync-meta.json", snapshot.file_name().unwrap());
}

#[tokio::test]
async fn scan_builds_metadata_from_disk() {
    let root = TempDir::new().unwrap();
    let dir = sync_dir(&root);
    fs::write(dir.join("a.txt"), b"one").unwrap();
    fs::create_dir_all(dir.join("sub/deeper")).unwrap();
    fs::write(dir.join("sub/deeper/b.txt"), b"two").unwrap();

    let store = MetaStore::new(&dir);
    let meta = store.load().await.unwrap();

    assert_eq!(2, meta.len());
    let a = meta.get_file("a.txt");
    assert!(!a.deleted);
    assert!(a.modified > 0);
    assert!(!meta.get_file("sub/deeper/b.txt").deleted);
}

#[tokio::test]
async fn save_load_roundtrip() {
    let root = TempDir::new().unwrap();
    let dir = sync_dir(&root);
    fs::write(dir.join("kept.txt"), b"body").unwrap();

    let store = MetaStore::new(&dir);
    let meta = store.load().await.unwrap();
    store.save(&meta).await.unwrap();

    let again = store.load().await.unwrap();
    assert_eq!(meta, again);
}

#[tokio::test]
async fn offline_deletion_becomes_a_fresh_tombstone() {
    let root = TempDir::new().unwrap();
    let dir = sync_dir(&root);
    let store = MetaStore::new(&dir);

    // Previous run recorded the file as alive; it is gone from disk now.
    let mut previous = Metadata::new();
    previous.set_file("vanished.txt", FileData::new(1_000));
    store.save(&previous).await.unwrap();

    let before = unix_now();
    let meta = store.load().await.unwrap();
    let record = meta.get_file("vanished.txt");

    assert!(record.deleted);
    // Stamped with the scan time so the deletion still wins the merge.
    assert!(record.modified >= before);
}

#[tokio::test]
async fn existing_tombstones_carry_over_unchanged() {
    let root = TempDir::new().unwrap();
    let dir = sync_dir(&root);
    let store = MetaStore::new(&dir);

    let mut previous = Metadata::new();
    previous.set_file("long-gone.txt", FileData::tombstone(7));
    store.save(&previous).await.unwrap();

    let meta = store.load().await.unwrap();
    assert_eq!(FileData::tombstone(7), meta.get_file("long-gone.txt"));
}

#[tokio::test]
async fn disk_beats_stale_snapshot() {
    let root = TempDir::new().unwrap();
    let dir = sync_dir(&root);
    let store = MetaStore::new(&dir);

    let mut previous = Metadata::new();
    previous.set_file("back.txt", FileData::tombstone(5));
    store.save(&previous).await.unwrap();

    // The file reappeared since the snapshot was written.
    fs::write(dir.join("back.txt"), b"returned").unwrap();

    let meta = store.load().await.unwrap();
    assert!(!meta.get_file("back.txt").deleted);
}

#[tokio::test]
async fn snapshot_file_is_not_part_of_the_tree() {
    let root = TempDir::new().unwrap();
    let dir = sync_dir(&root);
    let store = MetaStore::new(&dir);
    store.save(&Metadata::new()).await.unwrap();

    let meta = store.load().await.unwrap();
    assert!(meta.is_empty());
}
