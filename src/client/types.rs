//! Typed payloads for the remote tree API.
//!
//! All remote responses are parsed into these types at the client boundary.
//! A response that does not parse is surfaced as a transport-class failure,
//! never passed deeper into the core as untyped data.

use serde::{Deserialize, Serialize};

/// A SHA identifying a remote object (blob, tree, or commit) as a lowercase
/// hexadecimal string. Doubles as the optimistic-concurrency precondition for
/// content writes.
pub type Sha = String;

// =============================================================================
// Repository Metadata
// =============================================================================

/// Metadata describing a remote repository, fetched when it is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoInfo {
    /// Owner login.
    pub owner: String,
    /// Repository name (without the owner).
    pub name: String,
    /// Name of the default branch.
    pub default_branch: String,
    /// Clone URL, if the remote reports one.
    pub clone_url: Option<String>,
    /// Browser URL, if the remote reports one.
    pub html_url: Option<String>,
    /// Whether the repository is a fork.
    #[serde(default)]
    pub fork: bool,
    /// Whether the repository is private.
    #[serde(default)]
    pub private: bool,
}

// =============================================================================
// Branches
// =============================================================================

/// The head of a branch: its commit and that commit's root tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchHead {
    /// Branch name.
    pub name: String,
    /// SHA of the head commit.
    pub commit_sha: Sha,
    /// SHA of the head commit's root tree.
    pub tree_sha: Sha,
}

// =============================================================================
// Trees
// =============================================================================

/// File mode of a tree entry, using the remote service's octal conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FileMode {
    /// A regular file.
    #[default]
    #[serde(rename = "100644")]
    Regular,
    /// An executable file.
    #[serde(rename = "100755")]
    Executable,
    /// A symbolic link.
    #[serde(rename = "120000")]
    Symlink,
    /// A submodule reference.
    #[serde(rename = "160000")]
    Submodule,
    /// A subtree (directory).
    #[serde(rename = "040000")]
    Directory,
}

impl FileMode {
    /// The mode as the remote service's octal string.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileMode::Regular => "100644",
            FileMode::Executable => "100755",
            FileMode::Symlink => "120000",
            FileMode::Submodule => "160000",
            FileMode::Directory => "040000",
        }
    }
}

/// Object type of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// A file content object.
    Blob,
    /// A subtree.
    Tree,
    /// A submodule commit reference.
    Commit,
}

/// One entry in a recursive tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Slash-separated path relative to the repository root.
    pub path: String,
    /// File mode.
    #[serde(default)]
    pub mode: FileMode,
    /// Entry type.
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    /// SHA of the referenced object.
    pub sha: Sha,
    /// Size in bytes; present for blobs only.
    #[serde(default)]
    pub size: Option<u64>,
    /// API URL of the referenced object, if reported.
    #[serde(default)]
    pub url: Option<String>,
}

/// A recursive tree listing: the tree's own SHA plus its flattened entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeListing {
    /// SHA of the tree itself.
    pub sha: Sha,
    /// Flattened entries.
    #[serde(rename = "tree")]
    pub entries: Vec<TreeEntry>,
    /// Whether the remote truncated the listing.
    #[serde(default)]
    pub truncated: bool,
}

/// An entry submitted to create-tree.
///
/// `sha: None` serializes as an explicit null, which signals deletion of the
/// path when a base tree is supplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTreeEntry {
    /// Slash-separated path relative to the repository root.
    pub path: String,
    /// File mode.
    pub mode: FileMode,
    /// Entry type.
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    /// SHA of the object at this path, or `None` to delete the path.
    pub sha: Option<Sha>,
}

impl NewTreeEntry {
    /// Entry keeping or introducing a blob at `path`.
    pub fn blob(path: impl Into<String>, mode: FileMode, sha: Sha) -> Self {
        Self {
            path: path.into(),
            mode,
            entry_type: EntryType::Blob,
            sha: Some(sha),
        }
    }

    /// Entry deleting the blob at `path` (relative to a base tree).
    pub fn deletion(path: impl Into<String>, mode: FileMode) -> Self {
        Self {
            path: path.into(),
            mode,
            entry_type: EntryType::Blob,
            sha: None,
        }
    }
}

// =============================================================================
// Content
// =============================================================================

/// A file's content as returned by get-content: metadata plus the payload in
/// the service's transport encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentInfo {
    /// Slash-separated path relative to the repository root.
    pub path: String,
    /// Content SHA.
    pub sha: Sha,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Transport-encoded payload, if the remote inlined it.
    #[serde(default)]
    pub content: Option<String>,
    /// Transport encoding of `content`; the service uses "base64".
    #[serde(default)]
    pub encoding: Option<String>,
    /// Raw download URL, if reported.
    #[serde(default)]
    pub download_url: Option<String>,
}

/// Decode a transport-encoded (base64) content payload into raw bytes.
///
/// The remote wraps encoded payloads with newlines, which are stripped before
/// decoding.
pub fn decode_content(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD.decode(compact.as_bytes())
}

/// Encode raw bytes into the service's transport encoding.
pub fn encode_content(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

// =============================================================================
// Commits and Writes
// =============================================================================

/// A commit as seen by this core: identity, root tree, and parentage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// SHA of the commit.
    pub sha: Sha,
    /// SHA of the commit's root tree.
    pub tree_sha: Sha,
    /// SHAs of the parent commits.
    pub parents: Vec<Sha>,
    /// Commit message.
    pub message: String,
}

/// The result of a successful create-or-update-content call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenContent {
    /// New content SHA of the written blob.
    pub sha: Sha,
    /// Size of the written blob in bytes.
    pub size: u64,
    /// Blob URL, if reported.
    pub url: Option<String>,
    /// The commit the remote created for this write.
    pub commit: CommitInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_content_strips_newlines() {
        // "hello world" encoded with a line break in the middle.
        let encoded = "aGVsbG8g\nd29ybGQ=\n";
        assert_eq!(decode_content(encoded).unwrap(), b"hello world");
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let bytes = b"forgefs \x00\x01 payload";
        assert_eq!(decode_content(&encode_content(bytes)).unwrap(), bytes);
    }

    #[test]
    fn test_new_tree_entry_deletion_serializes_null_sha() {
        let entry = NewTreeEntry::deletion("a.txt", FileMode::Regular);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["sha"], serde_json::Value::Null);
        assert_eq!(json["mode"], "100644");
        assert_eq!(json["type"], "blob");
    }

    #[test]
    fn test_tree_listing_parses_remote_shape() {
        let json = r#"{
            "sha": "t0",
            "tree": [
                {"path": "src/a.rs", "mode": "100644", "type": "blob", "sha": "b0", "size": 12},
                {"path": "src", "mode": "040000", "type": "tree", "sha": "t1"}
            ],
            "truncated": false
        }"#;
        let listing: TreeListing = serde_json::from_str(json).unwrap();
        assert_eq!(listing.sha, "t0");
        assert_eq!(listing.entries.len(), 2);
        assert_eq!(listing.entries[0].entry_type, EntryType::Blob);
        assert_eq!(listing.entries[0].size, Some(12));
        assert_eq!(listing.entries[1].mode, FileMode::Directory);
    }
}
