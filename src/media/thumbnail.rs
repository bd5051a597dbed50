use std::path::{Path, PathBuf};
use std::process::Command;

/// Maximum thumbnail width in pixels; height follows the aspect ratio.
pub const THUMBNAIL_WIDTH: u32 = 320;

/// Seek position used when the duration is unknown, and the upper bound otherwise.
pub const MAX_SEEK_SECS: u64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ThumbnailError {
    #[error("thumbnail generator is not available")]
    Unavailable,
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("frame extraction exited with {status}: {stderr}")]
    Failed {
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("thumbnail file not created: {0}")]
    NotCreated(PathBuf),
    #[error("thumbnail I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Store(#[from] crate::store::StoreError),
}

/// Seek offset in seconds for the preview frame.
///
/// 10% into the video, capped at [`MAX_SEEK_SECS`] to stay near the start,
/// and pulled back to half the duration when the cap would land past the end
/// of a very short clip. Unknown or zero durations seek to the cap.
pub fn seek_offset(duration_secs: Option<u64>) -> u64 {
    let mut offset = MAX_SEEK_SECS;
    if let Some(duration) = duration_secs.filter(|d| *d > 0) {
        let tenth = duration / 10;
        if tenth > 0 && tenth < offset {
            offset = tenth;
        }
        if offset > duration {
            offset = duration / 2;
        }
    }
    offset
}

/// Producer of one preview JPEG per media ID, stored at a deterministic path.
pub trait ThumbnailGenerator: Send + Sync {
    fn is_available(&self) -> bool;

    /// Create the thumbnail for `id` from `video`, or return the existing one.
    fn generate(
        &self,
        video: &Path,
        id: &str,
        duration_hint: Option<u64>,
    ) -> Result<PathBuf, ThumbnailError>;

    /// Where the thumbnail for `id` lives, whether or not it exists yet.
    fn path_for(&self, id: &str) -> PathBuf;

    fn exists(&self, id: &str) -> bool {
        self.path_for(id).is_file()
    }

    fn delete(&self, id: &str) -> std::io::Result<()> {
        std::fs::remove_file(self.path_for(id))
    }
}

/// Thumbnail generator backed by the `ffmpeg` executable.
#[derive(Debug, Clone)]
pub struct FfmpegThumbnailer {
    program: PathBuf,
    output_dir: PathBuf,
}

impl FfmpegThumbnailer {
    /// Resolve `ffmpeg` on `PATH` and make sure `output_dir` exists.
    pub fn new(output_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        Self::with_program("ffmpeg", output_dir)
    }

    pub fn with_program(
        program: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> std::io::Result<Self> {
        let program = program.into();
        let program = which::which(&program).unwrap_or(program);
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self { program, output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl ThumbnailGenerator for FfmpegThumbnailer {
    fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }

    fn generate(
        &self,
        video: &Path,
        id: &str,
        duration_hint: Option<u64>,
    ) -> Result<PathBuf, ThumbnailError> {
        let output_path = self.path_for(id);
        if output_path.is_file() {
            return Ok(output_path);
        }

        let offset = seek_offset(duration_hint);
        let scale = format!("scale={THUMBNAIL_WIDTH}:-1");

        // -ss before -i seeks on keyframes, which is far cheaper on weak CPUs.
        let output = Command::new(&self.program)
            .arg("-ss")
            .arg(offset.to_string())
            .arg("-i")
            .arg(video)
            .args(["-vframes", "1", "-vf", &scale, "-q:v", "2", "-y"])
            .arg(&output_path)
            .output()
            .map_err(|source| ThumbnailError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.lines().last().unwrap_or_default().to_string();
            tracing::debug!(
                video = %video.display(),
                status = %output.status,
                stderr = %stderr,
                "ffmpeg thumbnail generation failed"
            );
            return Err(ThumbnailError::Failed {
                status: output.status,
                stderr,
            });
        }

        if !output_path.is_file() {
            return Err(ThumbnailError::NotCreated(output_path));
        }

        tracing::debug!(
            video = %video.display(),
            thumbnail = %output_path.display(),
            offset,
            "thumbnail generated"
        );
        Ok(output_path)
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.output_dir.join(format!("{id}.jpg"))
    }
}
