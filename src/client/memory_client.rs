//! In-memory implementation of the remote tree client, intended for testing.
//!
//! Honors the real service's write semantics: content SHAs are preconditions
//! on single-file writes, and ref updates must be fast-forward. Every call is
//! recorded so tests can assert the exact call shapes a transaction produced.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::tree_client::{ClientError, Result, TreeClient};
use super::types::{
    encode_content, BranchHead, CommitInfo, ContentInfo, EntryType, FileMode, NewTreeEntry,
    RepoInfo, Sha, TreeEntry, TreeListing, WrittenContent,
};

/// A call observed by the fake remote, with the fields tests care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    GetRepository,
    GetBranch,
    GetTree { tree_sha: Sha },
    GetContent { path: String },
    WriteContent { path: String, prior_sha: Option<Sha> },
    DeleteContent { path: String },
    CreateTree { base_tree: Option<Sha>, entries: Vec<(String, Option<Sha>)> },
    CreateCommit { tree_sha: Sha, parents: Vec<Sha> },
    UpdateRef { ref_name: String, commit_sha: Sha },
}

/// Flat recursive tree: path -> (blob SHA, mode).
type FlatTree = BTreeMap<String, (Sha, FileMode)>;

struct RemoteRepo {
    info: RepoInfo,
    blobs: HashMap<Sha, Vec<u8>>,
    trees: HashMap<Sha, FlatTree>,
    commits: HashMap<Sha, CommitInfo>,
    head: Sha,
    next_commit: u64,
}

impl RemoteRepo {
    fn head_tree(&self) -> &FlatTree {
        // The head commit and its tree are always registered together.
        let commit = &self.commits[&self.head];
        &self.trees[&commit.tree_sha]
    }

    fn register_tree(&mut self, flat: FlatTree) -> Sha {
        let sha = tree_sha(&flat);
        self.trees.insert(sha.clone(), flat);
        sha
    }

    fn register_commit(&mut self, tree_sha: Sha, parents: Vec<Sha>, message: &str) -> CommitInfo {
        let sha = hash_hex(format!("commit:{}:{}", self.next_commit, tree_sha).as_bytes());
        self.next_commit += 1;
        let commit = CommitInfo {
            sha: sha.clone(),
            tree_sha,
            parents,
            message: message.to_string(),
        };
        self.commits.insert(sha, commit.clone());
        commit
    }

    /// Whether `ancestor` is reachable from `commit` through parent links.
    fn is_ancestor(&self, ancestor: &str, commit: &str) -> bool {
        let mut queue: VecDeque<&str> = VecDeque::from([commit]);
        while let Some(sha) = queue.pop_front() {
            if sha == ancestor {
                return true;
            }
            if let Some(c) = self.commits.get(sha) {
                for parent in &c.parents {
                    queue.push_back(parent);
                }
            }
        }
        false
    }
}

fn hash_hex(data: &[u8]) -> Sha {
    format!("{:x}", Sha256::digest(data))
}

fn tree_sha(flat: &FlatTree) -> Sha {
    let mut buf = String::new();
    for (path, (sha, mode)) in flat {
        buf.push_str(path);
        buf.push(' ');
        buf.push_str(mode.as_str());
        buf.push(' ');
        buf.push_str(sha);
        buf.push('\n');
    }
    hash_hex(buf.as_bytes())
}

/// An in-memory implementation of [`TreeClient`].
pub struct MemoryTreeClient {
    repos: RwLock<HashMap<String, RemoteRepo>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MemoryTreeClient {
    /// Create a new empty fake remote.
    pub fn new() -> Self {
        Self {
            repos: RwLock::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Add a repository seeded with the given files on its default branch.
    pub fn add_repository(
        &self,
        owner: &str,
        name: &str,
        default_branch: &str,
        files: &[(&str, &[u8])],
    ) {
        let mut repo = RemoteRepo {
            info: RepoInfo {
                owner: owner.to_string(),
                name: name.to_string(),
                default_branch: default_branch.to_string(),
                clone_url: None,
                html_url: None,
                fork: false,
                private: false,
            },
            blobs: HashMap::new(),
            trees: HashMap::new(),
            commits: HashMap::new(),
            head: String::new(),
            next_commit: 0,
        };

        let mut flat = FlatTree::new();
        for (path, bytes) in files {
            let sha = hash_hex(bytes);
            repo.blobs.insert(sha.clone(), bytes.to_vec());
            flat.insert(path.to_string(), (sha, FileMode::Regular));
        }
        let tree = repo.register_tree(flat);
        let commit = repo.register_commit(tree, Vec::new(), "seed");
        repo.head = commit.sha;

        let mut repos = self.repos.write().unwrap();
        repos.insert(repo_key(owner, name), repo);
    }

    /// Commit a file change out-of-band, simulating a concurrent remote
    /// writer. Not recorded in the call log.
    pub fn commit_external(&self, owner: &str, name: &str, path: &str, bytes: &[u8]) {
        let mut repos = self.repos.write().unwrap();
        let repo = repos.get_mut(&repo_key(owner, name)).expect("repository");
        let sha = hash_hex(bytes);
        repo.blobs.insert(sha.clone(), bytes.to_vec());
        let mut flat = repo.head_tree().clone();
        flat.insert(path.to_string(), (sha, FileMode::Regular));
        let tree = repo.register_tree(flat);
        let head = repo.head.clone();
        let commit = repo.register_commit(tree, vec![head], "external change");
        repo.head = commit.sha;
    }

    /// Snapshot of every call observed so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Discard the recorded call log.
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// The current head commit of a repository's default branch.
    pub fn head_commit(&self, owner: &str, name: &str) -> Option<CommitInfo> {
        let repos = self.repos.read().unwrap();
        let repo = repos.get(&repo_key(owner, name))?;
        repo.commits.get(&repo.head).cloned()
    }

    /// The bytes of a file at the current head, if it exists.
    pub fn file_bytes(&self, owner: &str, name: &str, path: &str) -> Option<Vec<u8>> {
        let repos = self.repos.read().unwrap();
        let repo = repos.get(&repo_key(owner, name))?;
        let (sha, _) = repo.head_tree().get(path)?;
        repo.blobs.get(sha).cloned()
    }

    fn record(&self, call: RecordedCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Default for MemoryTreeClient {
    fn default() -> Self {
        Self::new()
    }
}

fn repo_key(owner: &str, name: &str) -> String {
    format!("{}/{}", owner, name)
}

#[async_trait]
impl TreeClient for MemoryTreeClient {
    async fn get_repository(&self, owner: &str, repo: &str) -> Result<RepoInfo> {
        self.record(RecordedCall::GetRepository);
        let repos = self.repos.read().unwrap();
        repos
            .get(&repo_key(owner, repo))
            .map(|r| r.info.clone())
            .ok_or(ClientError::NotFound)
    }

    async fn get_branch(&self, owner: &str, repo: &str, branch: &str) -> Result<BranchHead> {
        self.record(RecordedCall::GetBranch);
        let repos = self.repos.read().unwrap();
        let r = repos.get(&repo_key(owner, repo)).ok_or(ClientError::NotFound)?;
        if branch != r.info.default_branch {
            return Err(ClientError::NotFound);
        }
        let head = &r.commits[&r.head];
        Ok(BranchHead {
            name: branch.to_string(),
            commit_sha: head.sha.clone(),
            tree_sha: head.tree_sha.clone(),
        })
    }

    async fn get_tree(&self, owner: &str, repo: &str, tree_sha: &str) -> Result<TreeListing> {
        self.record(RecordedCall::GetTree {
            tree_sha: tree_sha.to_string(),
        });
        let repos = self.repos.read().unwrap();
        let r = repos.get(&repo_key(owner, repo)).ok_or(ClientError::NotFound)?;
        let flat = r.trees.get(tree_sha).ok_or(ClientError::NotFound)?;
        let entries = flat
            .iter()
            .map(|(path, (sha, mode))| TreeEntry {
                path: path.clone(),
                mode: *mode,
                entry_type: EntryType::Blob,
                sha: sha.clone(),
                size: r.blobs.get(sha).map(|b| b.len() as u64),
                url: None,
            })
            .collect();
        Ok(TreeListing {
            sha: tree_sha.to_string(),
            entries,
            truncated: false,
        })
    }

    async fn get_content(&self, owner: &str, repo: &str, path: &str) -> Result<ContentInfo> {
        self.record(RecordedCall::GetContent {
            path: path.to_string(),
        });
        let repos = self.repos.read().unwrap();
        let r = repos.get(&repo_key(owner, repo)).ok_or(ClientError::NotFound)?;
        let (sha, _) = r.head_tree().get(path).ok_or(ClientError::NotFound)?;
        let bytes = r.blobs.get(sha).ok_or(ClientError::NotFound)?;
        Ok(ContentInfo {
            path: path.to_string(),
            sha: sha.clone(),
            size: bytes.len() as u64,
            content: Some(encode_content(bytes)),
            encoding: Some("base64".to_string()),
            download_url: None,
        })
    }

    async fn write_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        content: &[u8],
        message: &str,
        prior_sha: Option<&str>,
        branch: &str,
    ) -> Result<WrittenContent> {
        self.record(RecordedCall::WriteContent {
            path: path.to_string(),
            prior_sha: prior_sha.map(|s| s.to_string()),
        });
        let mut repos = self.repos.write().unwrap();
        let r = repos.get_mut(&repo_key(owner, repo)).ok_or(ClientError::NotFound)?;
        if branch != r.info.default_branch {
            return Err(ClientError::NotFound);
        }

        let mut flat = r.head_tree().clone();
        let mode = match (flat.get(path), prior_sha) {
            (Some((current, mode)), Some(prior)) if current == prior => *mode,
            (Some(_), _) => {
                return Err(ClientError::Conflict(format!(
                    "content sha precondition failed for {}",
                    path
                )))
            }
            (None, Some(_)) => {
                return Err(ClientError::Conflict(format!("no existing content at {}", path)))
            }
            (None, None) => FileMode::Regular,
        };

        let sha = hash_hex(content);
        r.blobs.insert(sha.clone(), content.to_vec());
        flat.insert(path.to_string(), (sha.clone(), mode));
        let tree = r.register_tree(flat);
        let head = r.head.clone();
        let commit = r.register_commit(tree, vec![head], message);
        r.head = commit.sha.clone();

        Ok(WrittenContent {
            sha,
            size: content.len() as u64,
            url: None,
            commit,
        })
    }

    async fn delete_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        message: &str,
        sha: &str,
        branch: &str,
    ) -> Result<CommitInfo> {
        self.record(RecordedCall::DeleteContent {
            path: path.to_string(),
        });
        let mut repos = self.repos.write().unwrap();
        let r = repos.get_mut(&repo_key(owner, repo)).ok_or(ClientError::NotFound)?;
        if branch != r.info.default_branch {
            return Err(ClientError::NotFound);
        }

        let mut flat = r.head_tree().clone();
        match flat.get(path) {
            Some((current, _)) if current == sha => {}
            Some(_) => {
                return Err(ClientError::Conflict(format!(
                    "content sha precondition failed for {}",
                    path
                )))
            }
            None => return Err(ClientError::NotFound),
        }
        flat.remove(path);
        let tree = r.register_tree(flat);
        let head = r.head.clone();
        let commit = r.register_commit(tree, vec![head], message);
        r.head = commit.sha.clone();
        Ok(commit)
    }

    async fn create_tree(
        &self,
        owner: &str,
        repo: &str,
        base_tree: Option<&str>,
        entries: &[NewTreeEntry],
    ) -> Result<Sha> {
        self.record(RecordedCall::CreateTree {
            base_tree: base_tree.map(|s| s.to_string()),
            entries: entries
                .iter()
                .map(|e| (e.path.clone(), e.sha.clone()))
                .collect(),
        });
        let mut repos = self.repos.write().unwrap();
        let r = repos.get_mut(&repo_key(owner, repo)).ok_or(ClientError::NotFound)?;

        let mut flat = match base_tree {
            Some(base) => r.trees.get(base).ok_or(ClientError::NotFound)?.clone(),
            None => FlatTree::new(),
        };
        for entry in entries {
            if entry.entry_type != EntryType::Blob {
                continue;
            }
            match &entry.sha {
                Some(sha) => {
                    if !r.blobs.contains_key(sha) {
                        return Err(ClientError::Status {
                            status: 422,
                            message: format!("unknown blob sha {}", sha),
                        });
                    }
                    flat.insert(entry.path.clone(), (sha.clone(), entry.mode));
                }
                None => {
                    flat.remove(&entry.path);
                }
            }
        }
        Ok(r.register_tree(flat))
    }

    async fn create_commit(
        &self,
        owner: &str,
        repo: &str,
        message: &str,
        tree_sha: &str,
        parents: &[Sha],
    ) -> Result<CommitInfo> {
        self.record(RecordedCall::CreateCommit {
            tree_sha: tree_sha.to_string(),
            parents: parents.to_vec(),
        });
        let mut repos = self.repos.write().unwrap();
        let r = repos.get_mut(&repo_key(owner, repo)).ok_or(ClientError::NotFound)?;
        if !r.trees.contains_key(tree_sha) {
            return Err(ClientError::NotFound);
        }
        Ok(r.register_commit(tree_sha.to_string(), parents.to_vec(), message))
    }

    async fn update_ref(
        &self,
        owner: &str,
        repo: &str,
        ref_name: &str,
        commit_sha: &str,
    ) -> Result<()> {
        self.record(RecordedCall::UpdateRef {
            ref_name: ref_name.to_string(),
            commit_sha: commit_sha.to_string(),
        });
        let mut repos = self.repos.write().unwrap();
        let r = repos.get_mut(&repo_key(owner, repo)).ok_or(ClientError::NotFound)?;
        if ref_name != format!("heads/{}", r.info.default_branch) {
            return Err(ClientError::NotFound);
        }
        if !r.commits.contains_key(commit_sha) {
            return Err(ClientError::NotFound);
        }
        let head = r.head.clone();
        if !r.is_ancestor(&head, commit_sha) {
            return Err(ClientError::Conflict("non-fast-forward ref update".to_string()));
        }
        r.head = commit_sha.to_string();
        Ok(())
    }
}
