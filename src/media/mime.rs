use std::path::Path;

/// Fallback content type for anything the classifier does not recognize.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Every video extension the library indexes, with its HTTP content type.
/// Extensions are stored lowercase and without the leading dot.
pub const SUPPORTED_EXTENSIONS: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("m4v", "video/mp4"),
    ("mkv", "video/x-matroska"),
    ("avi", "video/x-msvideo"),
    ("webm", "video/webm"),
    ("mov", "video/quicktime"),
    ("wmv", "video/x-ms-wmv"),
    ("flv", "video/x-flv"),
];

fn lookup(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    SUPPORTED_EXTENSIONS
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
}

/// True when the file extension (case-insensitive) is a supported video container.
///
/// Only the extension is inspected; the file is never opened.
pub fn is_supported_video(path: &Path) -> bool {
    lookup(path).is_some()
}

/// Content type for streaming `path`, or [`OCTET_STREAM`] for unknown extensions.
pub fn content_type(path: &Path) -> &'static str {
    lookup(path).unwrap_or(OCTET_STREAM)
}
