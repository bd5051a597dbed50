use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::media::metadata::Metadata;
use crate::store::{
    ContinueWatchingItem, FolderRecord, MediaRecord, MediaStore, PlaybackState, StoreError,
};

#[derive(Debug, Default)]
struct Tables {
    folders: BTreeMap<String, FolderRecord>,
    media: BTreeMap<String, MediaRecord>,
    playback: HashMap<String, PlaybackState>,
}

/// In-process store. Nothing survives a restart.
///
/// Records are keyed by ID; since IDs are derived from paths, a path
/// conflict is the same thing as an ID conflict.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables.write().map_err(|_| StoreError::Poisoned)
    }
}

fn sorted_folders<'a>(it: impl Iterator<Item = &'a FolderRecord>) -> Vec<FolderRecord> {
    let mut out: Vec<_> = it.cloned().collect();
    out.sort_by(|a, b| a.name.cmp(&b.name));
    out
}

impl MediaStore for MemoryStore {
    fn upsert_folder(&self, folder: &FolderRecord) -> Result<(), StoreError> {
        let mut t = self.write()?;
        t.folders
            .entry(folder.id.clone())
            .and_modify(|existing| existing.name = folder.name.clone())
            .or_insert_with(|| folder.clone());
        Ok(())
    }

    fn folder(&self, id: &str) -> Result<Option<FolderRecord>, StoreError> {
        Ok(self.read()?.folders.get(id).cloned())
    }

    fn root_folders(&self) -> Result<Vec<FolderRecord>, StoreError> {
        let t = self.read()?;
        Ok(sorted_folders(t.folders.values().filter(|f| f.parent_id.is_none())))
    }

    fn sub_folders(&self, parent_id: &str) -> Result<Vec<FolderRecord>, StoreError> {
        let t = self.read()?;
        Ok(sorted_folders(
            t.folders
                .values()
                .filter(|f| f.parent_id.as_deref() == Some(parent_id)),
        ))
    }

    fn update_folder_item_count(&self, id: &str, count: usize) -> Result<(), StoreError> {
        if let Some(folder) = self.write()?.folders.get_mut(id) {
            folder.item_count = count;
        }
        Ok(())
    }

    fn delete_folder(&self, id: &str) -> Result<(), StoreError> {
        let mut t = self.write()?;

        let mut doomed: HashSet<String> = HashSet::new();
        let mut pending = vec![id.to_string()];
        while let Some(current) = pending.pop() {
            pending.extend(
                t.folders
                    .values()
                    .filter(|f| f.parent_id.as_deref() == Some(current.as_str()))
                    .map(|f| f.id.clone()),
            );
            doomed.insert(current);
        }

        t.folders.retain(|fid, _| !doomed.contains(fid));
        t.media.retain(|_, m| !doomed.contains(&m.folder_id));
        let Tables { media, playback, .. } = &mut *t;
        playback.retain(|mid, _| media.contains_key(mid));
        Ok(())
    }

    fn all_folder_paths(&self) -> Result<Vec<(String, PathBuf)>, StoreError> {
        let t = self.read()?;
        Ok(t.folders
            .values()
            .map(|f| (f.id.clone(), f.path.clone()))
            .collect())
    }

    fn upsert_media(&self, item: &MediaRecord) -> Result<(), StoreError> {
        let mut t = self.write()?;
        match t.media.get_mut(&item.id) {
            Some(existing) => {
                existing.title = item.title.clone();
                existing.size = item.size;
                existing.modified_at = item.modified_at;
            }
            None => {
                t.media.insert(item.id.clone(), item.clone());
            }
        }
        Ok(())
    }

    fn media_item(&self, id: &str) -> Result<Option<MediaRecord>, StoreError> {
        Ok(self.read()?.media.get(id).cloned())
    }

    fn media_by_folder(&self, folder_id: &str) -> Result<Vec<MediaRecord>, StoreError> {
        let t = self.read()?;
        let mut out: Vec<_> = t
            .media
            .values()
            .filter(|m| m.folder_id == folder_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(out)
    }

    fn update_media_metadata(&self, id: &str, meta: &Metadata) -> Result<(), StoreError> {
        if let Some(item) = self.write()?.media.get_mut(id) {
            item.apply_metadata(meta);
        }
        Ok(())
    }

    fn media_without_metadata(
        &self,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MediaRecord>, StoreError> {
        let t = self.read()?;
        Ok(t.media
            .values()
            .filter(|m| after.map_or(true, |a| m.id.as_str() > a))
            .filter(|m| !m.is_enriched())
            .take(limit)
            .cloned()
            .collect())
    }

    fn delete_media(&self, id: &str) -> Result<(), StoreError> {
        let mut t = self.write()?;
        t.media.remove(id);
        t.playback.remove(id);
        Ok(())
    }

    fn all_media_paths(&self) -> Result<Vec<(String, PathBuf)>, StoreError> {
        let t = self.read()?;
        Ok(t.media
            .values()
            .map(|m| (m.id.clone(), m.path.clone()))
            .collect())
    }

    fn save_playback_state(&self, state: &PlaybackState) -> Result<(), StoreError> {
        let mut state = state.clone();
        state.updated_at = chrono::Utc::now();
        self.write()?.playback.insert(state.media_id.clone(), state);
        Ok(())
    }

    fn playback_state(&self, media_id: &str) -> Result<Option<PlaybackState>, StoreError> {
        Ok(self.read()?.playback.get(media_id).cloned())
    }

    fn continue_watching(&self, limit: usize) -> Result<Vec<ContinueWatchingItem>, StoreError> {
        let t = self.read()?;
        let mut items: Vec<ContinueWatchingItem> = t
            .playback
            .values()
            .filter(|p| p.is_in_progress())
            .filter_map(|p| {
                t.media.get(&p.media_id).map(|m| ContinueWatchingItem {
                    media: m.clone(),
                    playback_state: p.clone(),
                })
            })
            .collect();
        items.sort_by(|a, b| b.playback_state.updated_at.cmp(&a.playback_state.updated_at));
        items.truncate(limit);
        Ok(items)
    }
}
