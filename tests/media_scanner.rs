use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};

use reelshelf::media::id::item_id;
use reelshelf::media::library::build_tree;
use reelshelf::media::metadata::Metadata;
use reelshelf::media::scanner::{LibraryScanner, ScanError};
use reelshelf::store::{
    ContinueWatchingItem, FolderRecord, MediaRecord, MediaStore, MemoryStore, PlaybackState,
    SqliteStore, StoreError, ROOT_FOLDER_ID,
};

/// root/
///   Movies/Inception.mkv
///   Movies/Extras/trailer.mp4
///   Movies/poster.jpg
///   Empty/
///   .hidden/secret.mp4
///   loose.mp4
///   notes.txt
fn make_library() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("Movies/Extras")).unwrap();
    fs::create_dir_all(root.join("Empty")).unwrap();
    fs::create_dir_all(root.join(".hidden")).unwrap();
    fs::write(root.join("Movies/Inception.mkv"), vec![0u8; 2048]).unwrap();
    fs::write(root.join("Movies/Extras/trailer.mp4"), b"trailer").unwrap();
    fs::write(root.join("Movies/poster.jpg"), b"jpeg").unwrap();
    fs::write(root.join(".hidden/secret.mp4"), b"secret").unwrap();
    fs::write(root.join("loose.mp4"), b"loose").unwrap();
    fs::write(root.join("notes.txt"), b"notes").unwrap();
    dir
}

fn scanner_with(store: Arc<dyn MediaStore>) -> LibraryScanner {
    LibraryScanner::new(store)
}

fn stores() -> Vec<Arc<dyn MediaStore>> {
    vec![
        Arc::new(MemoryStore::new()),
        Arc::new(SqliteStore::open_in_memory().unwrap()),
    ]
}

fn id(root: &Path, rel: &str) -> String {
    item_id(&root.join(rel))
}

#[test]
fn scan_records_folders_and_videos() {
    for store in stores() {
        let lib = make_library();
        let root = lib.path();
        let stats = scanner_with(store.clone())
            .scan_path(root, "Test")
            .unwrap()
            .expect("scan should run");

        assert_eq!(stats.folders, 3, "Movies, Extras, Empty");
        assert_eq!(stats.media, 3, "Inception, trailer, loose");

        let movie = store.media_item(&id(root, "Movies/Inception.mkv")).unwrap().unwrap();
        assert_eq!(movie.title, "Inception");
        assert_eq!(movie.size, 2048);
        assert_eq!(movie.folder_id, id(root, "Movies"));
        assert!(!movie.is_enriched());

        let trailer = store.media_item(&id(root, "Movies/Extras/trailer.mp4")).unwrap().unwrap();
        assert_eq!(trailer.folder_id, id(root, "Movies/Extras"));
    }
}

#[test]
fn root_level_entries_have_no_parent() {
    for store in stores() {
        let lib = make_library();
        let root = lib.path();
        scanner_with(store.clone()).scan_path(root, "Test").unwrap();

        let roots: Vec<String> = store.root_folders().unwrap().into_iter().map(|f| f.name).collect();
        assert_eq!(roots, vec!["Empty".to_string(), "Movies".to_string()]);

        let extras = store.folder(&id(root, "Movies/Extras")).unwrap().unwrap();
        assert_eq!(extras.parent_id.as_deref(), Some(id(root, "Movies").as_str()));

        let loose = store.root_media().unwrap();
        assert_eq!(loose.len(), 1);
        assert_eq!(loose[0].title, "loose");
        assert_eq!(loose[0].folder_id, ROOT_FOLDER_ID);
        assert!(loose[0].is_root_level());
    }
}

#[test]
fn hidden_directories_and_non_videos_are_skipped() {
    let store: Arc<dyn MediaStore> = Arc::new(MemoryStore::new());
    let lib = make_library();
    let root = lib.path();
    scanner_with(store.clone()).scan_path(root, "Test").unwrap();

    assert!(store.folder(&id(root, ".hidden")).unwrap().is_none());
    assert!(store.media_item(&id(root, ".hidden/secret.mp4")).unwrap().is_none());
    assert!(store.media_item(&id(root, "Movies/poster.jpg")).unwrap().is_none());
    assert!(store.media_item(&id(root, "notes.txt")).unwrap().is_none());
}

#[test]
fn folder_item_count_is_direct_media_only() {
    let store: Arc<dyn MediaStore> = Arc::new(MemoryStore::new());
    let lib = make_library();
    let root = lib.path();
    scanner_with(store.clone()).scan_path(root, "Test").unwrap();

    assert_eq!(store.folder(&id(root, "Movies")).unwrap().unwrap().item_count, 1);
    assert_eq!(store.folder(&id(root, "Movies/Extras")).unwrap().unwrap().item_count, 1);
    assert_eq!(store.folder(&id(root, "Empty")).unwrap().unwrap().item_count, 0);
}

#[test]
fn rescan_is_idempotent_and_keeps_enrichment() {
    for store in stores() {
        let lib = make_library();
        let root = lib.path();
        let scanner = scanner_with(store.clone());
        scanner.scan_path(root, "Test").unwrap();

        let movie_id = id(root, "Movies/Inception.mkv");
        let meta = reelshelf::media::metadata::Metadata {
            duration_secs: Some(8880),
            width: Some(1920),
            height: Some(800),
            ..Default::default()
        };
        store.update_media_metadata(&movie_id, &meta).unwrap();

        let stats = scanner.scan_path(root, "Test").unwrap().unwrap();
        assert_eq!(stats.media, 3);
        assert_eq!(store.all_media_paths().unwrap().len(), 3);
        assert_eq!(store.all_folder_paths().unwrap().len(), 3);

        let movie = store.media_item(&movie_id).unwrap().unwrap();
        assert_eq!(movie.duration_secs, Some(8880));
        assert_eq!(movie.width, Some(1920));
    }
}

#[test]
fn rescan_refreshes_size() {
    let store: Arc<dyn MediaStore> = Arc::new(MemoryStore::new());
    let lib = make_library();
    let root = lib.path();
    let scanner = scanner_with(store.clone());
    scanner.scan_path(root, "Test").unwrap();

    fs::write(root.join("loose.mp4"), vec![0u8; 4096]).unwrap();
    scanner.scan_path(root, "Test").unwrap();

    let loose = store.media_item(&id(root, "loose.mp4")).unwrap().unwrap();
    assert_eq!(loose.size, 4096);
}

#[test]
fn rescan_drops_deleted_file_and_keeps_others() {
    for store in stores() {
        let lib = make_library();
        let root = lib.path();
        let scanner = scanner_with(store.clone());
        scanner.scan_path(root, "Test").unwrap();

        fs::remove_file(root.join("loose.mp4")).unwrap();
        scanner.scan_path(root, "Test").unwrap();

        assert!(store.media_item(&id(root, "loose.mp4")).unwrap().is_none());
        assert!(store.media_item(&id(root, "Movies/Inception.mkv")).unwrap().is_some());
    }
}

#[test]
fn cleanup_removes_deleted_folder_and_its_contents() {
    for store in stores() {
        let lib = make_library();
        let root = lib.path();
        let scanner = scanner_with(store.clone());
        scanner.scan_path(root, "Test").unwrap();

        fs::remove_dir_all(root.join("Movies")).unwrap();
        let stats = scanner.cleanup_deleted_files().unwrap();

        assert_eq!(stats.media, 2);
        assert!(stats.folders >= 1);
        assert!(store.folder(&id(root, "Movies")).unwrap().is_none());
        assert!(store.folder(&id(root, "Movies/Extras")).unwrap().is_none());
        assert!(store.folder(&id(root, "Empty")).unwrap().is_some());
        assert!(store.media_item(&id(root, "loose.mp4")).unwrap().is_some());
    }
}

#[test]
fn cleanup_with_nothing_missing_is_a_no_op() {
    let store: Arc<dyn MediaStore> = Arc::new(MemoryStore::new());
    let lib = make_library();
    let scanner = scanner_with(store.clone());
    scanner.scan_path(lib.path(), "Test").unwrap();

    let stats = scanner.cleanup_deleted_files().unwrap();
    assert_eq!(stats.media, 0);
    assert_eq!(stats.folders, 0);
    assert_eq!(store.all_media_paths().unwrap().len(), 3);
}

#[test]
fn scan_nonexistent_path_errors() {
    let scanner = scanner_with(Arc::new(MemoryStore::new()));
    let err = scanner
        .scan_path(Path::new("/nonexistent/path/does/not/exist"), "Test")
        .unwrap_err();
    assert!(matches!(err, ScanError::NotFound(_)));
    assert!(!scanner.is_scanning());
}

#[test]
fn scan_file_path_errors() {
    let lib = make_library();
    let scanner = scanner_with(Arc::new(MemoryStore::new()));
    let err = scanner
        .scan_path(&lib.path().join("loose.mp4"), "Test")
        .unwrap_err();
    assert!(matches!(err, ScanError::NotADirectory(_)));
}

#[test]
fn scanning_flag_is_cleared_after_scan() {
    let lib = make_library();
    let scanner = scanner_with(Arc::new(MemoryStore::new()));
    assert!(!scanner.is_scanning());
    scanner.scan_path(lib.path(), "Test").unwrap();
    assert!(!scanner.is_scanning());
}

/// Holds the first folder write until the test releases it.
struct BlockingStore {
    inner: MemoryStore,
    armed: AtomicBool,
    entered: Barrier,
    release: Barrier,
}

impl BlockingStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            armed: AtomicBool::new(true),
            entered: Barrier::new(2),
            release: Barrier::new(2),
        }
    }
}

impl MediaStore for BlockingStore {
    fn upsert_folder(&self, folder: &FolderRecord) -> Result<(), StoreError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.wait();
            self.release.wait();
        }
        self.inner.upsert_folder(folder)
    }
    fn folder(&self, id: &str) -> Result<Option<FolderRecord>, StoreError> {
        self.inner.folder(id)
    }
    fn root_folders(&self) -> Result<Vec<FolderRecord>, StoreError> {
        self.inner.root_folders()
    }
    fn sub_folders(&self, parent_id: &str) -> Result<Vec<FolderRecord>, StoreError> {
        self.inner.sub_folders(parent_id)
    }
    fn update_folder_item_count(&self, id: &str, count: usize) -> Result<(), StoreError> {
        self.inner.update_folder_item_count(id, count)
    }
    fn delete_folder(&self, id: &str) -> Result<(), StoreError> {
        self.inner.delete_folder(id)
    }
    fn all_folder_paths(&self) -> Result<Vec<(String, PathBuf)>, StoreError> {
        self.inner.all_folder_paths()
    }
    fn upsert_media(&self, item: &MediaRecord) -> Result<(), StoreError> {
        self.inner.upsert_media(item)
    }
    fn media_item(&self, id: &str) -> Result<Option<MediaRecord>, StoreError> {
        self.inner.media_item(id)
    }
    fn media_by_folder(&self, folder_id: &str) -> Result<Vec<MediaRecord>, StoreError> {
        self.inner.media_by_folder(folder_id)
    }
    fn update_media_metadata(&self, id: &str, meta: &Metadata) -> Result<(), StoreError> {
        self.inner.update_media_metadata(id, meta)
    }
    fn media_without_metadata(
        &self,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MediaRecord>, StoreError> {
        self.inner.media_without_metadata(after, limit)
    }
    fn delete_media(&self, id: &str) -> Result<(), StoreError> {
        self.inner.delete_media(id)
    }
    fn all_media_paths(&self) -> Result<Vec<(String, PathBuf)>, StoreError> {
        self.inner.all_media_paths()
    }
    fn save_playback_state(&self, state: &PlaybackState) -> Result<(), StoreError> {
        self.inner.save_playback_state(state)
    }
    fn playback_state(&self, media_id: &str) -> Result<Option<PlaybackState>, StoreError> {
        self.inner.playback_state(media_id)
    }
    fn continue_watching(&self, limit: usize) -> Result<Vec<ContinueWatchingItem>, StoreError> {
        self.inner.continue_watching(limit)
    }
}

#[test]
fn concurrent_scan_is_refused_while_one_is_running() {
    let lib = make_library();
    let store = Arc::new(BlockingStore::new());
    let scanner = Arc::new(scanner_with(store.clone()));

    let running = {
        let scanner = scanner.clone();
        let root = lib.path().to_path_buf();
        std::thread::spawn(move || scanner.scan_path(&root, "Test"))
    };

    store.entered.wait();
    assert!(scanner.is_scanning());
    assert!(scanner.scan_path(lib.path(), "Test").unwrap().is_none());
    store.release.wait();

    let stats = running.join().unwrap().unwrap();
    assert!(stats.is_some());
    assert!(!scanner.is_scanning());
    assert_eq!(store.all_media_paths().unwrap().len(), 3);
}

#[cfg(unix)]
#[test]
fn symlink_loop_terminates() {
    let store: Arc<dyn MediaStore> = Arc::new(MemoryStore::new());
    let lib = make_library();
    let root = lib.path();
    std::os::unix::fs::symlink(root.join("Movies"), root.join("Movies/Extras/back")).unwrap();

    let stats = scanner_with(store.clone())
        .scan_path(root, "Test")
        .unwrap()
        .unwrap();
    assert!(stats.media >= 3);
}

// ── library tree ─────────────────────────────────────────────────────────────

#[test]
fn tree_nests_folders_and_lists_root_media() {
    let store: Arc<dyn MediaStore> = Arc::new(MemoryStore::new());
    let lib = make_library();
    scanner_with(store.clone()).scan_path(lib.path(), "Test").unwrap();

    let tree = build_tree(store.as_ref(), "Test").unwrap();
    assert_eq!(tree.name, "Test");
    assert_eq!(tree.folders.len(), 2);
    assert_eq!(tree.media.len(), 1);

    let movies = tree.folders.iter().find(|f| f.name == "Movies").unwrap();
    assert_eq!(movies.media.len(), 1);
    assert_eq!(movies.sub_folders.len(), 1);
    assert_eq!(movies.sub_folders[0].name, "Extras");
}

#[test]
fn tree_unwraps_single_top_level_folder() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("Only/Sub")).unwrap();
    fs::write(dir.path().join("Only/a.mp4"), b"a").unwrap();
    fs::write(dir.path().join("Only/Sub/b.mkv"), b"b").unwrap();

    let store: Arc<dyn MediaStore> = Arc::new(MemoryStore::new());
    scanner_with(store.clone()).scan_path(dir.path(), "Test").unwrap();

    let tree = build_tree(store.as_ref(), "Test").unwrap();
    assert_eq!(tree.media.len(), 1);
    assert_eq!(tree.media[0].title, "a");
    assert_eq!(tree.folders.len(), 1);
    assert_eq!(tree.folders[0].name, "Sub");
}
