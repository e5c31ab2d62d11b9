use super::*;

use std::fs;

use clap::Parser;
use notify::event::{AccessKind, CreateKind, ModifyKind};

fn config_yaml(base: u8) -> String {
    let mut doc = String::from("midi:\n  port_name: test\n  buttons:\n");
    for i in 0..9u8 {
        doc.push_str(&format!("    - note: {}\n      label: B{i}\n", base + i));
    }
    doc
}

async fn wait_for_first_note(store: &ConfigStore, note: u8) -> bool {
    tokio::time::timeout(Duration::from_secs(5), async {
        while store.get().midi.buttons[0].note.get() != note {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}

#[test]
fn cli_defaults() {
    let cli = Cli::parse_from(["remote-midi-server"]);
    assert_eq!(cli.config, PathBuf::from("config.yaml"));
    assert!(!cli.dry_run);
    assert_eq!(cli.reload_debounce(), Duration::from_millis(200));

    let cli = Cli::parse_from([
        "remote-midi-server",
        "--config",
        "/etc/midi.yaml",
        "--dry-run",
        "--reload-debounce-ms",
        "5",
    ]);
    assert_eq!(cli.config, PathBuf::from("/etc/midi.yaml"));
    assert!(cli.dry_run);
    assert_eq!(cli.reload_debounce(), Duration::from_millis(5));
}

#[test]
fn watches_parent_directory() {
    assert_eq!(watch_dir(Path::new("/etc/midi/config.yaml")), Path::new("/etc/midi"));
    assert_eq!(watch_dir(Path::new("config.yaml")), Path::new("."));
}

#[test]
fn only_non_access_events_on_the_config_file_count() {
    let name = OsStr::new("config.yaml");
    let modified = Event::new(EventKind::Modify(ModifyKind::Any))
        .add_path(PathBuf::from("/etc/midi/config.yaml"));
    let created = Event::new(EventKind::Create(CreateKind::File))
        .add_path(PathBuf::from("./config.yaml"));
    let sibling = Event::new(EventKind::Modify(ModifyKind::Any))
        .add_path(PathBuf::from("/etc/midi/config.yaml.swp"));
    let read = Event::new(EventKind::Access(AccessKind::Any))
        .add_path(PathBuf::from("/etc/midi/config.yaml"));

    assert!(touches(&modified, name));
    assert!(touches(&created, name));
    assert!(!touches(&sibling, name));
    assert!(!touches(&read, name));
}

#[tokio::test]
async fn watcher_reloads_store_when_file_changes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.yaml");
    fs::write(&path, config_yaml(60)).expect("write");
    let store = Arc::new(ConfigStore::open(&path).expect("open"));
    let watcher =
        spawn_config_watcher(Arc::clone(&store), Duration::from_millis(20)).expect("watch");

    fs::write(&path, config_yaml(100)).expect("rewrite");

    let reloaded = wait_for_first_note(&store, 100).await;
    drop(watcher);
    assert!(reloaded, "watcher never reloaded the config");
}

#[tokio::test]
async fn watcher_follows_save_by_rename() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.yaml");
    fs::write(&path, config_yaml(60)).expect("write");
    let store = Arc::new(ConfigStore::open(&path).expect("open"));
    let watcher =
        spawn_config_watcher(Arc::clone(&store), Duration::from_millis(20)).expect("watch");

    let staged = dir.path().join(".config.yaml.tmp");
    fs::write(&staged, config_yaml(80)).expect("stage");
    fs::rename(&staged, &path).expect("rename");

    let reloaded = wait_for_first_note(&store, 80).await;
    drop(watcher);
    assert!(reloaded, "watcher missed the renamed file");
}

#[tokio::test]
async fn unrelated_files_do_not_reload() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.yaml");
    fs::write(&path, config_yaml(60)).expect("write");
    let store = Arc::new(ConfigStore::open(&path).expect("open"));
    let before = store.get();
    let watcher =
        spawn_config_watcher(Arc::clone(&store), Duration::from_millis(20)).expect("watch");

    fs::write(dir.path().join("notes.txt"), "hello").expect("sibling");
    tokio::time::sleep(Duration::from_millis(200)).await;
    drop(watcher);

    assert!(Arc::ptr_eq(&before, &store.get()));
}

#[tokio::test]
async fn watcher_keeps_snapshot_when_file_is_removed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.yaml");
    fs::write(&path, config_yaml(60)).expect("write");
    let store = Arc::new(ConfigStore::open(&path).expect("open"));
    let before = store.get();
    let watcher =
        spawn_config_watcher(Arc::clone(&store), Duration::from_millis(20)).expect("watch");

    fs::remove_file(&path).expect("remove");
    tokio::time::sleep(Duration::from_millis(200)).await;
    drop(watcher);

    assert!(Arc::ptr_eq(&before, &store.get()));
}
