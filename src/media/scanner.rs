use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use crate::media::id::{clean_path, item_id};
use crate::media::mime::is_supported_video;
use crate::store::{FolderRecord, MediaRecord, MediaStore, StoreError, ROOT_FOLDER_ID};

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("library path does not exist: {0}")]
    NotFound(PathBuf),
    #[error("library path is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Counters for the summary line logged after each scan.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    pub folders: usize,
    pub media: usize,
    pub skipped: usize,
}

/// Counters for the summary line logged after each cleanup pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupStats {
    pub media: usize,
    pub folders: usize,
}

/// A directory waiting to be enumerated, with the folder record it belongs to.
/// `folder_id == None` is the library root itself.
struct PendingDir {
    path: PathBuf,
    folder_id: Option<String>,
}

/// Walks a library root and mirrors it into the store.
///
/// Only one scan runs at a time per scanner; a call arriving while another
/// is in progress returns immediately without doing anything.
pub struct LibraryScanner {
    store: Arc<dyn MediaStore>,
    scanning: Mutex<bool>,
}

/// Clears the scanning flag when the scan ends, however it ends.
struct ScanGuard<'a>(&'a Mutex<bool>);

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        let mut flag = self.0.lock().unwrap_or_else(|p| p.into_inner());
        *flag = false;
    }
}

impl LibraryScanner {
    pub fn new(store: Arc<dyn MediaStore>) -> Self {
        Self {
            store,
            scanning: Mutex::new(false),
        }
    }

    pub fn is_scanning(&self) -> bool {
        *self.scanning.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn try_begin(&self) -> Option<ScanGuard<'_>> {
        let mut flag = self.scanning.lock().unwrap_or_else(|p| p.into_inner());
        if *flag {
            return None;
        }
        *flag = true;
        Some(ScanGuard(&self.scanning))
    }

    /// Scan `root` into the store.
    ///
    /// Sub-directories of `root` become root-level folders and videos directly
    /// in `root` become root-level media. Returns `Ok(None)` when another scan
    /// was already running.
    pub fn scan_path(&self, root: &Path, name: &str) -> Result<Option<ScanStats>, ScanError> {
        let Some(_guard) = self.try_begin() else {
            tracing::debug!("scan already in progress, ignoring request");
            return Ok(None);
        };

        let root = clean_path(root);
        match std::fs::metadata(&root) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ScanError::NotFound(root))
            }
            Err(source) => return Err(ScanError::Io { path: root, source }),
            Ok(meta) if !meta.is_dir() => return Err(ScanError::NotADirectory(root)),
            Ok(_) => {}
        }

        tracing::info!(path = %root.display(), name, "scanning library");
        let start = Instant::now();

        if let Err(e) = self.cleanup_deleted_files() {
            tracing::warn!(error = %e, "cleanup failed, continuing with scan");
        }

        let stats = self.walk(&root)?;

        tracing::info!(
            folders = stats.folders,
            media = stats.media,
            skipped = stats.skipped,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "library scan completed"
        );
        Ok(Some(stats))
    }

    /// Enumerate one directory level at a time from an explicit stack, so deep
    /// trees do not grow the call stack.
    fn walk(&self, root: &Path) -> Result<ScanStats, ScanError> {
        let mut stats = ScanStats::default();
        let mut visited: HashSet<PathBuf> = HashSet::new();
        let mut pending = vec![PendingDir {
            path: root.to_path_buf(),
            folder_id: None,
        }];

        while let Some(dir) = pending.pop() {
            // Symlinked directories are followed; the canonical path breaks loops.
            if let Ok(canonical) = std::fs::canonicalize(&dir.path) {
                if !visited.insert(canonical) {
                    tracing::debug!(path = %dir.path.display(), "directory already scanned, skipping");
                    continue;
                }
            }

            match self.scan_level(&dir, &mut pending, &mut stats) {
                Ok(()) => {}
                // Only the root failing to enumerate is fatal.
                Err(e) if dir.folder_id.is_none() => return Err(e),
                Err(e) => {
                    tracing::error!(path = %dir.path.display(), error = %e, "failed to scan folder");
                    stats.skipped += 1;
                }
            }
        }

        Ok(stats)
    }

    fn scan_level(
        &self,
        dir: &PendingDir,
        pending: &mut Vec<PendingDir>,
        stats: &mut ScanStats,
    ) -> Result<(), ScanError> {
        let entries = WalkDir::new(&dir.path)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name();

        let mut media_count = 0usize;

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(ScanError::Io {
                        path: dir.path.clone(),
                        source: e.into(),
                    })
                }
                Err(e) => {
                    tracing::warn!(error = %e, "cannot access entry");
                    stats.skipped += 1;
                    continue;
                }
            };

            let path = entry.path().to_path_buf();
            let file_name = entry.file_name().to_string_lossy().into_owned();

            if entry.file_type().is_dir() {
                if file_name.starts_with('.') {
                    continue;
                }
                let folder = FolderRecord {
                    id: item_id(&path),
                    name: file_name,
                    path: path.clone(),
                    parent_id: dir.folder_id.clone(),
                    item_count: 0,
                    created_at: Utc::now(),
                };
                if let Err(e) = self.store.upsert_folder(&folder) {
                    tracing::error!(path = %path.display(), error = %e, "failed to create folder");
                    stats.skipped += 1;
                    continue;
                }
                stats.folders += 1;
                pending.push(PendingDir {
                    path,
                    folder_id: Some(folder.id),
                });
                continue;
            }

            if !is_supported_video(&path) {
                continue;
            }

            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "failed to get file info");
                    stats.skipped += 1;
                    continue;
                }
            };

            let title = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| file_name.clone());
            let modified_at = meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            let folder_id = dir
                .folder_id
                .clone()
                .unwrap_or_else(|| ROOT_FOLDER_ID.to_string());

            let item = MediaRecord::new(
                item_id(&path),
                folder_id,
                title,
                path.clone(),
                meta.len(),
                modified_at,
            );
            if let Err(e) = self.store.upsert_media(&item) {
                tracing::error!(path = %path.display(), error = %e, "failed to create media item");
                stats.skipped += 1;
                continue;
            }

            media_count += 1;
            stats.media += 1;
            tracing::debug!(title = %item.title, size = item.size, "added media item");
        }

        if let Some(folder_id) = &dir.folder_id {
            if let Err(e) = self.store.update_folder_item_count(folder_id, media_count) {
                tracing::error!(id = %folder_id, error = %e, "failed to update folder item count");
            }
        }

        Ok(())
    }

    /// Drop every media and folder record whose path no longer exists.
    ///
    /// Deleting a folder also removes everything recorded beneath it.
    pub fn cleanup_deleted_files(&self) -> Result<CleanupStats, ScanError> {
        let mut stats = CleanupStats::default();

        for (id, path) in self.store.all_media_paths()? {
            if !is_missing(&path) {
                continue;
            }
            match self.store.delete_media(&id) {
                Ok(()) => {
                    stats.media += 1;
                    tracing::debug!(path = %path.display(), "deleted missing media item");
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "failed to delete media item")
                }
            }
        }

        for (id, path) in self.store.all_folder_paths()? {
            if !is_missing(&path) {
                continue;
            }
            match self.store.delete_folder(&id) {
                Ok(()) => {
                    stats.folders += 1;
                    tracing::debug!(path = %path.display(), "deleted missing folder");
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "failed to delete folder")
                }
            }
        }

        if stats.media > 0 || stats.folders > 0 {
            tracing::info!(media = stats.media, folders = stats.folders, "cleanup completed");
        }
        Ok(stats)
    }
}

// Any stat error other than NotFound (permissions, a flaky mount) keeps the record.
fn is_missing(path: &Path) -> bool {
    matches!(
        std::fs::metadata(path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound
    )
}
