//! Persisted folder and media records.
//!
//! The scanner and the thumbnail service only talk to [`MediaStore`]; each
//! call is expected to be atomic on its own. Two implementations ship:
//! [`SqliteStore`] for the server and [`MemoryStore`] for tests and
//! throwaway libraries.

pub mod memory;
pub mod models;
pub mod sqlite;

use std::path::PathBuf;

pub use memory::MemoryStore;
pub use models::{ContinueWatchingItem, FolderRecord, MediaRecord, PlaybackState, ROOT_FOLDER_ID};
pub use sqlite::SqliteStore;

use crate::media::metadata::Metadata;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to prepare database directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("store lock poisoned")]
    Poisoned,
}

pub trait MediaStore: Send + Sync {
    /// Insert a folder, or rename the existing folder with the same path.
    fn upsert_folder(&self, folder: &FolderRecord) -> Result<(), StoreError>;
    fn folder(&self, id: &str) -> Result<Option<FolderRecord>, StoreError>;
    /// Folders with no parent, ordered by name.
    fn root_folders(&self) -> Result<Vec<FolderRecord>, StoreError>;
    /// Direct children of `parent_id`, ordered by name.
    fn sub_folders(&self, parent_id: &str) -> Result<Vec<FolderRecord>, StoreError>;
    fn update_folder_item_count(&self, id: &str, count: usize) -> Result<(), StoreError>;
    /// Delete a folder together with every descendant folder, the media inside
    /// them and their playback states.
    fn delete_folder(&self, id: &str) -> Result<(), StoreError>;
    /// `(id, path)` of every folder.
    fn all_folder_paths(&self) -> Result<Vec<(String, PathBuf)>, StoreError>;

    /// Insert a media record, or refresh title/size/modified time of the
    /// record with the same path. Enrichment fields are never overwritten.
    fn upsert_media(&self, item: &MediaRecord) -> Result<(), StoreError>;
    fn media_item(&self, id: &str) -> Result<Option<MediaRecord>, StoreError>;
    /// Media directly inside `folder_id`, ordered by title.
    fn media_by_folder(&self, folder_id: &str) -> Result<Vec<MediaRecord>, StoreError>;
    /// Media in the library root, ordered by title.
    fn root_media(&self) -> Result<Vec<MediaRecord>, StoreError> {
        self.media_by_folder(ROOT_FOLDER_ID)
    }
    fn update_media_metadata(&self, id: &str, meta: &Metadata) -> Result<(), StoreError>;
    /// Up to `limit` records without duration, ordered by ID, strictly after `after`.
    fn media_without_metadata(
        &self,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MediaRecord>, StoreError>;
    /// Delete a media record together with its playback state.
    fn delete_media(&self, id: &str) -> Result<(), StoreError>;
    /// `(id, path)` of every media record.
    fn all_media_paths(&self) -> Result<Vec<(String, PathBuf)>, StoreError>;

    /// Insert or replace the playback state of `state.media_id`, stamping it now.
    fn save_playback_state(&self, state: &PlaybackState) -> Result<(), StoreError>;
    fn playback_state(&self, media_id: &str) -> Result<Option<PlaybackState>, StoreError>;
    /// Up to `limit` items that are started but not finished, most recently
    /// watched first.
    fn continue_watching(&self, limit: usize) -> Result<Vec<ContinueWatchingItem>, StoreError>;
}
