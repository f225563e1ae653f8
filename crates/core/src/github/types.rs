//! Request and response shapes for the subset of the GitHub API the client uses.
//!
//! Response structs only name the fields the admin reads; serde ignores the rest.

use serde::{Deserialize, Serialize};

/// Repository metadata from `GET /repos/{owner}/{repo}`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct RepoInfo {
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub default_branch: String,
}

/// A decoded file from the contents API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileContent {
    pub content: String,
    pub sha: String,
    pub path: String,
    pub name: String,
}

/// Raw contents API entry before base64 decoding.
#[derive(Debug, Deserialize)]
pub(crate) struct ContentsEntry {
    #[serde(default)]
    pub content: Option<String>,
    pub sha: String,
    pub path: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ShaRef {
    pub sha: String,
}

/// Result of a contents API write or delete.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct FileCommit {
    /// New blob for the file; `None` after a delete.
    #[serde(default)]
    pub content: Option<ShaRef>,
    #[serde(default)]
    pub commit: Option<ShaRef>,
}

/// A commit object from the git database API.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct CommitInfo {
    pub sha: String,
    pub tree: ShaRef,
    #[serde(default)]
    pub message: String,
}

/// Content of one file in a batch commit.
///
/// `Binary` is always uploaded base64-encoded. `Text` is sniffed for NUL bytes and only falls back
/// to base64 when one is present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlobContent {
    Text(String),
    Binary(Vec<u8>),
}

impl BlobContent {
    pub fn is_binary(&self) -> bool {
        match self {
            Self::Text(text) => text.contains('\0'),
            Self::Binary(_) => true,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }
}

impl From<String> for BlobContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for BlobContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<u8>> for BlobContent {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}

/// One file to write in a batch commit, addressed by repository-relative path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchFile {
    pub path: String,
    pub content: BlobContent,
}

impl BatchFile {
    pub fn new(path: impl Into<String>, content: impl Into<BlobContent>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Tree entry pointing at a freshly created blob.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TreeEntry {
    pub path: String,
    pub mode: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RefResponse {
    pub object: ShaRef,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_with_nul_byte_is_binary() {
        assert!(!BlobContent::from("<html></html>").is_binary());
        assert!(BlobContent::from("abc\0def").is_binary());
        assert!(BlobContent::from(vec![1u8, 2, 3]).is_binary());
    }

    #[test]
    fn tree_entry_serialises_type_field() {
        let entry = TreeEntry {
            path: "reports/a.html".into(),
            mode: "100644",
            kind: "blob",
            sha: "abc".into(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"path": "reports/a.html", "mode": "100644", "type": "blob", "sha": "abc"})
        );
    }
}
