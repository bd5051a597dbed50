use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::media::metadata::Metadata;
use crate::store::models::{CONTINUE_MAX_PROGRESS, CONTINUE_MIN_PROGRESS};
use crate::store::{
    ContinueWatchingItem, FolderRecord, MediaRecord, MediaStore, PlaybackState, StoreError,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS folders (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    path        TEXT NOT NULL UNIQUE,
    parent_id   TEXT,
    item_count  INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS media_items (
    id               TEXT PRIMARY KEY,
    folder_id        TEXT NOT NULL DEFAULT '',
    title            TEXT NOT NULL,
    path             TEXT NOT NULL UNIQUE,
    size             INTEGER NOT NULL,
    duration         INTEGER,
    width            INTEGER,
    height           INTEGER,
    video_codec      TEXT,
    audio_codec      TEXT,
    audio_channels   INTEGER,
    bitrate          INTEGER,
    file_modified_at TEXT NOT NULL,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_media_folder ON media_items(folder_id);
CREATE INDEX IF NOT EXISTS idx_media_title ON media_items(title);
CREATE INDEX IF NOT EXISTS idx_folders_parent ON folders(parent_id);

CREATE TABLE IF NOT EXISTS playback_states (
    media_id    TEXT PRIMARY KEY,
    position    INTEGER NOT NULL,
    duration    INTEGER NOT NULL,
    progress    REAL NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_playback_updated ON playback_states(updated_at DESC);
";

const FOLDER_COLUMNS: &str = "id, name, path, parent_id, item_count, created_at";

const MEDIA_COLUMNS: &str = "id, folder_id, title, path, size, duration, width, height, \
     video_codec, audio_codec, audio_channels, bitrate, file_modified_at, created_at";
const MEDIA_COLUMN_COUNT: usize = 14;

/// SQLite-backed store.
///
/// All access goes through one connection behind a mutex, so writes are
/// serialized the same way the rest of the server expects.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and apply the schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        Self::init(conn)
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn query_folders(
        &self,
        filter: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<FolderRecord>, StoreError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {FOLDER_COLUMNS} FROM folders {filter}");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params, folder_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn query_media(
        &self,
        filter: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<MediaRecord>, StoreError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {MEDIA_COLUMNS} FROM media_items {filter}");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params, media_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn id_paths(&self, table: &str) -> Result<Vec<(String, PathBuf)>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT id, path FROM {table}"))?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, PathBuf::from(row.get::<_, String>(1)?)))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn path_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn folder_from_row(row: &Row<'_>) -> rusqlite::Result<FolderRecord> {
    Ok(FolderRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        path: PathBuf::from(row.get::<_, String>(2)?),
        parent_id: row.get(3)?,
        item_count: row.get::<_, i64>(4)?.max(0) as usize,
        created_at: row.get(5)?,
    })
}

fn media_from_row(row: &Row<'_>) -> rusqlite::Result<MediaRecord> {
    Ok(MediaRecord {
        id: row.get(0)?,
        folder_id: row.get(1)?,
        title: row.get(2)?,
        path: PathBuf::from(row.get::<_, String>(3)?),
        size: row.get::<_, i64>(4)?.max(0) as u64,
        duration_secs: row.get::<_, Option<i64>>(5)?.map(|d| d.max(0) as u64),
        width: row.get(6)?,
        height: row.get(7)?,
        video_codec: row.get(8)?,
        audio_codec: row.get(9)?,
        audio_channels: row.get(10)?,
        bitrate: row.get::<_, Option<i64>>(11)?.map(|b| b.max(0) as u64),
        modified_at: row.get(12)?,
        created_at: row.get(13)?,
    })
}

impl MediaStore for SqliteStore {
    fn upsert_folder(&self, folder: &FolderRecord) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO folders (id, name, path, parent_id, item_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(path) DO UPDATE SET name = excluded.name",
            params![
                folder.id,
                folder.name,
                path_text(&folder.path),
                folder.parent_id,
                folder.item_count as i64,
                folder.created_at,
            ],
        )?;
        Ok(())
    }

    fn folder(&self, id: &str) -> Result<Option<FolderRecord>, StoreError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {FOLDER_COLUMNS} FROM folders WHERE id = ?1");
        Ok(conn
            .query_row(&sql, params![id], folder_from_row)
            .optional()?)
    }

    fn root_folders(&self) -> Result<Vec<FolderRecord>, StoreError> {
        self.query_folders("WHERE parent_id IS NULL ORDER BY name", [])
    }

    fn sub_folders(&self, parent_id: &str) -> Result<Vec<FolderRecord>, StoreError> {
        self.query_folders("WHERE parent_id = ?1 ORDER BY name", params![parent_id])
    }

    fn update_folder_item_count(&self, id: &str, count: usize) -> Result<(), StoreError> {
        self.conn()?.execute(
            "UPDATE folders SET item_count = ?1 WHERE id = ?2",
            params![count as i64, id],
        )?;
        Ok(())
    }

    fn delete_folder(&self, id: &str) -> Result<(), StoreError> {
        const SUBTREE: &str = "WITH RECURSIVE subtree(id) AS (
                SELECT ?1
                UNION ALL
                SELECT f.id FROM folders f JOIN subtree s ON f.parent_id = s.id
            )";

        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            &format!(
                "{SUBTREE} DELETE FROM playback_states WHERE media_id IN (
                     SELECT m.id FROM media_items m WHERE m.folder_id IN (SELECT id FROM subtree)
                 )"
            ),
            params![id],
        )?;
        tx.execute(
            &format!("{SUBTREE} DELETE FROM media_items WHERE folder_id IN (SELECT id FROM subtree)"),
            params![id],
        )?;
        tx.execute(
            &format!("{SUBTREE} DELETE FROM folders WHERE id IN (SELECT id FROM subtree)"),
            params![id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn all_folder_paths(&self) -> Result<Vec<(String, PathBuf)>, StoreError> {
        self.id_paths("folders")
    }

    fn upsert_media(&self, item: &MediaRecord) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO media_items (
                 id, folder_id, title, path, size, file_modified_at, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(path) DO UPDATE SET
                 title = excluded.title,
                 size = excluded.size,
                 file_modified_at = excluded.file_modified_at,
                 updated_at = excluded.updated_at",
            params![
                item.id,
                item.folder_id,
                item.title,
                path_text(&item.path),
                item.size as i64,
                item.modified_at,
                item.created_at,
                chrono::Utc::now(),
            ],
        )?;
        Ok(())
    }

    fn media_item(&self, id: &str) -> Result<Option<MediaRecord>, StoreError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {MEDIA_COLUMNS} FROM media_items WHERE id = ?1");
        Ok(conn.query_row(&sql, params![id], media_from_row).optional()?)
    }

    fn media_by_folder(&self, folder_id: &str) -> Result<Vec<MediaRecord>, StoreError> {
        self.query_media("WHERE folder_id = ?1 ORDER BY title", params![folder_id])
    }

    fn update_media_metadata(&self, id: &str, meta: &Metadata) -> Result<(), StoreError> {
        self.conn()?.execute(
            "UPDATE media_items SET
                 duration = ?1, width = ?2, height = ?3,
                 video_codec = ?4, audio_codec = ?5, audio_channels = ?6,
                 bitrate = ?7, updated_at = ?8
             WHERE id = ?9",
            params![
                meta.duration_secs.unwrap_or(0) as i64,
                meta.width,
                meta.height,
                meta.video_codec,
                meta.audio_codec,
                meta.audio_channels,
                meta.bitrate.map(|b| b as i64),
                chrono::Utc::now(),
                id,
            ],
        )?;
        Ok(())
    }

    fn media_without_metadata(
        &self,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MediaRecord>, StoreError> {
        self.query_media(
            "WHERE duration IS NULL AND (?1 IS NULL OR id > ?1) ORDER BY id LIMIT ?2",
            params![after, limit as i64],
        )
    }

    fn delete_media(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM playback_states WHERE media_id = ?1", params![id])?;
        tx.execute("DELETE FROM media_items WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(())
    }

    fn all_media_paths(&self) -> Result<Vec<(String, PathBuf)>, StoreError> {
        self.id_paths("media_items")
    }

    fn save_playback_state(&self, state: &PlaybackState) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO playback_states (media_id, position, duration, progress, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(media_id) DO UPDATE SET
                 position = excluded.position,
                 duration = excluded.duration,
                 progress = excluded.progress,
                 updated_at = excluded.updated_at",
            params![
                state.media_id,
                state.position as i64,
                state.duration as i64,
                state.progress,
                chrono::Utc::now(),
            ],
        )?;
        Ok(())
    }

    fn playback_state(&self, media_id: &str) -> Result<Option<PlaybackState>, StoreError> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                "SELECT media_id, position, duration, progress, updated_at
                 FROM playback_states WHERE media_id = ?1",
                params![media_id],
                |row| playback_from_row(row, 0),
            )
            .optional()?)
    }

    fn continue_watching(&self, limit: usize) -> Result<Vec<ContinueWatchingItem>, StoreError> {
        let conn = self.conn()?;
        let media_columns = MEDIA_COLUMNS
            .split(", ")
            .map(|c| format!("m.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {media_columns}, p.media_id, p.position, p.duration, p.progress, p.updated_at
             FROM playback_states p
             JOIN media_items m ON p.media_id = m.id
             WHERE p.progress > ?1 AND p.progress < ?2
             ORDER BY p.updated_at DESC
             LIMIT ?3"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![CONTINUE_MIN_PROGRESS, CONTINUE_MAX_PROGRESS, limit as i64],
            |row| {
                Ok(ContinueWatchingItem {
                    media: media_from_row(row)?,
                    playback_state: playback_from_row(row, MEDIA_COLUMN_COUNT)?,
                })
            },
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn playback_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<PlaybackState> {
    Ok(PlaybackState {
        media_id: row.get(offset)?,
        position: row.get::<_, i64>(offset + 1)?.max(0) as u64,
        duration: row.get::<_, i64>(offset + 2)?.max(0) as u64,
        progress: row.get(offset + 3)?,
        updated_at: row.get(offset + 4)?,
    })
}
