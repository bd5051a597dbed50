use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};

/// Number of hash bytes kept in an item ID (16 hex characters).
pub const ID_BYTES: usize = 8;

/// Derive the stable ID of a folder or media file from its path.
///
/// The path is made absolute and cleaned first, then its UTF-8 form is hashed
/// with SHA-256 and the first [`ID_BYTES`] bytes are hex-encoded. The same
/// logical path always yields the same ID, across restarts and platforms,
/// which is what lets the store upsert by path without a lookup.
pub fn item_id(path: &Path) -> String {
    let cleaned = clean_path(path);
    id_for_str(&cleaned.to_string_lossy())
}

/// Hash an already-normalized path string.
pub fn id_for_str(path: &str) -> String {
    let digest = Sha256::digest(path.as_bytes());
    hex::encode(&digest[..ID_BYTES])
}

/// Absolute, lexically cleaned form of `path`.
///
/// `.` components and trailing separators are dropped and `..` removes the
/// preceding component, as far as the root. Symlinks are NOT resolved: the ID
/// follows the path the library was configured with.
pub fn clean_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut cleaned = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(cleaned.components().next_back(), Some(Component::Normal(_))) {
                    cleaned.pop();
                }
            }
            other => cleaned.push(other),
        }
    }
    cleaned
}
