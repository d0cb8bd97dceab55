use serde::{Deserialize, Serialize};

/// An uploaded asset (attachment, avatar, icon, banner).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    #[serde(rename = "_id")]
    pub id: String,
    pub tag: String,
    pub size: u64,
    pub filename: String,
    pub metadata: FileMetadata,
    pub content_type: String,
}

impl File {
    /// Public URL of this asset on the given file server.
    pub fn url(&self, file_server: &str) -> String {
        format!("{}/{}/{}", file_server.trim_end_matches('/'), self.tag, self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FileMetadata {
    File,
    Text,
    Audio,
    Image { width: u32, height: u32 },
    Video { width: u32, height: u32 },
}
