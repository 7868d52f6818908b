use serde::{Deserialize, Serialize};

pub(crate) const DEFAULT_FILE_NAME: &str = "Untitled";

/// One named text file.
///
/// Field names are the persisted blob schema; `lastSave` is milliseconds since
/// the Unix epoch.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FileRecord {
    pub id: String,
    pub name: String,
    pub content: String,
    #[serde(rename = "lastSave")]
    pub last_save: i64,
}

/// Name and content handed to the presentation layer for a local download.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FileExport {
    pub name: String,
    pub content: String,
}

/// Everything that gets persisted: both collections, in repository order.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct RepositorySnapshot {
    pub active: Vec<FileRecord>,
    pub deleted: Vec<FileRecord>,
}

/// Falls back to the default name when the user left it blank.
pub(crate) fn normalize_name(name: &str) -> String {
    if name.trim().is_empty() {
        DEFAULT_FILE_NAME.to_string()
    } else {
        name.to_string()
    }
}
