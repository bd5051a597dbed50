use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;

/// Technical metadata reduced from a probe report.
///
/// Every field is optional: a file without an audio stream simply has no
/// audio codec, it is not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    /// Container duration in whole seconds.
    pub duration_secs: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Uppercased codec name of the first video stream, e.g. "H264".
    pub video_codec: Option<String>,
    /// Uppercased codec name of the first audio stream, e.g. "AAC".
    pub audio_codec: Option<String>,
    /// Channel count of the first audio stream (2 = stereo, 6 = 5.1).
    pub audio_channels: Option<u32>,
    /// Container bitrate in bits per second.
    pub bitrate: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("probe exited with {status} for {path}")]
    Failed { status: std::process::ExitStatus, path: PathBuf },
    #[error("unreadable probe report: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Source of technical metadata for a video file.
///
/// Implementations must be cheap to query for availability; callers check
/// [`MetadataExtractor::is_available`] before relying on [`MetadataExtractor::extract`].
pub trait MetadataExtractor: Send + Sync {
    fn is_available(&self) -> bool;
    fn extract(&self, path: &Path) -> Result<Metadata, MetadataError>;
}

/// Metadata extractor backed by the `ffprobe` executable.
#[derive(Debug, Clone)]
pub struct FfprobeExtractor {
    program: PathBuf,
}

impl FfprobeExtractor {
    /// Resolve `ffprobe` on `PATH`, keeping the bare name when it is missing so
    /// that [`is_available`](MetadataExtractor::is_available) reports false.
    pub fn new() -> Self {
        Self::with_program("ffprobe")
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let program = which::which(&program).unwrap_or(program);
        Self { program }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for FfprobeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataExtractor for FfprobeExtractor {
    fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }

    fn extract(&self, path: &Path) -> Result<Metadata, MetadataError> {
        let output = Command::new(&self.program)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .output()
            .map_err(|source| MetadataError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            tracing::debug!(file = %path.display(), status = %output.status, "ffprobe failed");
            return Err(MetadataError::Failed {
                status: output.status,
                path: path.to_path_buf(),
            });
        }

        parse_probe_output(&output.stdout)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ProbeReport {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: ProbeFormat,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    channels: Option<u32>,
}

// ffprobe reports these as decimal strings, not numbers.
#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

/// Reduce an `ffprobe -print_format json -show_format -show_streams` report.
///
/// The first video stream supplies codec and dimensions, the first audio
/// stream supplies codec and channel count, and the container supplies
/// duration (truncated to whole seconds) and bitrate.
pub fn parse_probe_output(json: &[u8]) -> Result<Metadata, MetadataError> {
    let report: ProbeReport = serde_json::from_slice(json)?;

    let mut meta = Metadata {
        duration_secs: report
            .format
            .duration
            .as_deref()
            .and_then(|d| d.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| d as u64),
        bitrate: report
            .format
            .bit_rate
            .as_deref()
            .and_then(|b| b.trim().parse::<u64>().ok()),
        ..Metadata::default()
    };

    for stream in &report.streams {
        match stream.codec_type.as_deref() {
            Some("video") if meta.video_codec.is_none() => {
                meta.video_codec = Some(upper_codec(stream));
                meta.width = stream.width;
                meta.height = stream.height;
            }
            Some("audio") if meta.audio_codec.is_none() => {
                meta.audio_codec = Some(upper_codec(stream));
                meta.audio_channels = stream.channels;
            }
            _ => {}
        }
    }

    Ok(meta)
}

fn upper_codec(stream: &ProbeStream) -> String {
    stream.codec_name.as_deref().unwrap_or_default().to_ascii_uppercase()
}
