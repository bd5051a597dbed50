use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::media::metadata::Metadata;

/// `folder_id` value for media files that sit directly in the library root.
pub const ROOT_FOLDER_ID: &str = "";

/// A directory in the library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderRecord {
    pub id: String,
    pub name: String,
    #[serde(skip)]
    pub path: PathBuf,
    /// `None` for folders directly under the library root.
    #[serde(skip)]
    pub parent_id: Option<String>,
    /// Direct media children only, written by the scanner after each pass.
    #[serde(skip)]
    pub item_count: usize,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
}

/// A video file in the library.
///
/// The enrichment fields stay `None` until the metadata pass has run;
/// `duration_secs == None` is what marks a record as not yet enriched.
/// Rescans never touch them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaRecord {
    pub id: String,
    /// Owning folder ID, or [`ROOT_FOLDER_ID`] for root-level media.
    #[serde(skip)]
    pub folder_id: String,
    pub title: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub size: u64,
    #[serde(skip)]
    pub modified_at: DateTime<Utc>,
    #[serde(rename = "duration", skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_codec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_channels: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u64>,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
}

impl MediaRecord {
    /// A freshly scanned record with no enrichment.
    pub fn new(
        id: String,
        folder_id: String,
        title: String,
        path: PathBuf,
        size: u64,
        modified_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            folder_id,
            title,
            path,
            size,
            modified_at,
            duration_secs: None,
            width: None,
            height: None,
            video_codec: None,
            audio_codec: None,
            audio_channels: None,
            bitrate: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_root_level(&self) -> bool {
        self.folder_id == ROOT_FOLDER_ID
    }

    pub fn is_enriched(&self) -> bool {
        self.duration_secs.is_some()
    }

    /// Copy extracted metadata onto this record.
    ///
    /// A probe that reports no duration still marks the record enriched with
    /// a zero duration, otherwise it would be picked up by every sweep.
    pub fn apply_metadata(&mut self, meta: &Metadata) {
        self.duration_secs = Some(meta.duration_secs.unwrap_or(0));
        self.width = meta.width;
        self.height = meta.height;
        self.video_codec = meta.video_codec.clone();
        self.audio_codec = meta.audio_codec.clone();
        self.audio_channels = meta.audio_channels;
        self.bitrate = meta.bitrate;
    }
}

/// Progress strictly above this fraction counts as started.
pub const CONTINUE_MIN_PROGRESS: f64 = 0.02;
/// Progress at or above this fraction counts as finished.
pub const CONTINUE_MAX_PROGRESS: f64 = 0.95;

/// Last known playback position of one media item, in whole seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackState {
    pub media_id: String,
    pub position: u64,
    pub duration: u64,
    /// `position / duration`, 0.0 to 1.0.
    pub progress: f64,
    #[serde(skip)]
    pub updated_at: DateTime<Utc>,
}

impl PlaybackState {
    /// Build a state from a client report. The position is clamped to the
    /// duration, which must be non-zero.
    pub fn new(media_id: String, position: u64, duration: u64) -> Self {
        let position = position.min(duration);
        let progress = if duration == 0 {
            0.0
        } else {
            position as f64 / duration as f64
        };
        Self {
            media_id,
            position,
            duration,
            progress,
            updated_at: Utc::now(),
        }
    }

    /// Started but not finished.
    pub fn is_in_progress(&self) -> bool {
        self.progress > CONTINUE_MIN_PROGRESS && self.progress < CONTINUE_MAX_PROGRESS
    }
}

/// A media record together with where playback stopped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContinueWatchingItem {
    pub media: MediaRecord,
    pub playback_state: PlaybackState,
}
