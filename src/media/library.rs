use serde::Serialize;

use crate::store::{FolderRecord, MediaRecord, MediaStore, StoreError};

/// The whole library as nested folders, for clients that browse it in one request.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LibraryTree {
    pub name: String,
    pub folders: Vec<FolderNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<MediaRecord>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FolderNode {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_folders: Vec<FolderNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<MediaRecord>,
}

/// Assemble the library tree from the store.
///
/// A library holding exactly one top-level folder and no loose files is
/// unwrapped, so clients land directly inside that folder.
pub fn build_tree(store: &dyn MediaStore, name: &str) -> Result<LibraryTree, StoreError> {
    let root_media = store.root_media().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to get root media");
        Vec::new()
    });

    let mut folders = store
        .root_folders()?
        .into_iter()
        .map(|f| folder_node(store, f))
        .collect::<Vec<_>>();

    if folders.len() == 1 && root_media.is_empty() {
        if let Some(only) = folders.pop() {
            return Ok(LibraryTree {
                name: name.to_string(),
                folders: only.sub_folders,
                media: only.media,
            });
        }
    }

    Ok(LibraryTree {
        name: name.to_string(),
        folders,
        media: root_media,
    })
}

// Branches that fail to load are shown empty rather than failing the whole tree.
fn folder_node(store: &dyn MediaStore, folder: FolderRecord) -> FolderNode {
    let sub_folders = store
        .sub_folders(&folder.id)
        .unwrap_or_else(|e| {
            tracing::warn!(id = %folder.id, error = %e, "failed to list sub folders");
            Vec::new()
        })
        .into_iter()
        .map(|sub| folder_node(store, sub))
        .collect();
    let media = store.media_by_folder(&folder.id).unwrap_or_else(|e| {
        tracing::warn!(id = %folder.id, error = %e, "failed to list folder media");
        Vec::new()
    });

    FolderNode {
        id: folder.id,
        name: folder.name,
        sub_folders,
        media,
    }
}
