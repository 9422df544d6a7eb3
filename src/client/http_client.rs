//! HTTP implementation of the remote tree client.
//!
//! Operates against the hosting service's REST API. Status codes are mapped
//! onto the [`ClientError`] taxonomy at each call site: 404 is NotFound,
//! 409/422 on write paths are Conflict, everything else unexpected is Status.

use async_trait::async_trait;
use percent_encoding::{percent_encode, NON_ALPHANUMERIC};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::tree_client::{ClientError, Result, TreeClient};
use super::types::{
    encode_content, BranchHead, CommitInfo, ContentInfo, NewTreeEntry, RepoInfo, Sha, TreeListing,
    WrittenContent,
};

const USER_AGENT: &str = concat!("forgefs-rs/", env!("CARGO_PKG_VERSION"));
const ACCEPT_JSON: &str = "application/vnd.github+json";

/// An HTTP-based implementation of [`TreeClient`].
pub struct HttpTreeClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpTreeClient {
    /// Create a new HTTP client pointing at the given API base URL.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Create a new HTTP client with a custom reqwest client.
    pub fn with_client(client: Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn repo_url(&self, owner: &str, repo: &str) -> String {
        format!("{}/repos/{}/{}", self.base_url, owner, repo)
    }

    fn branch_url(&self, owner: &str, repo: &str, branch: &str) -> String {
        format!("{}/branches/{}", self.repo_url(owner, repo), branch)
    }

    fn contents_url(&self, owner: &str, repo: &str, path: &str) -> String {
        format!(
            "{}/contents/{}",
            self.repo_url(owner, repo),
            encode_path(path)
        )
    }

    fn trees_url(&self, owner: &str, repo: &str) -> String {
        format!("{}/git/trees", self.repo_url(owner, repo))
    }

    fn commits_url(&self, owner: &str, repo: &str) -> String {
        format!("{}/git/commits", self.repo_url(owner, repo))
    }

    fn ref_url(&self, owner: &str, repo: &str, ref_name: &str) -> String {
        format!("{}/git/refs/{}", self.repo_url(owner, repo), ref_name)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, ACCEPT_JSON);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        self.authorize(builder)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }
}

/// Percent-encode each path segment, keeping the separators.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| percent_encode(segment.as_bytes(), NON_ALPHANUMERIC).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

async fn decode_json<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| ClientError::Decode(e.to_string()))
}

/// Map an unexpected status to an error, reading the body as best effort.
async fn unexpected_status(response: Response) -> ClientError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    ClientError::Status { status, message }
}

/// Map a write-path failure status, treating precondition failures as
/// conflicts.
async fn write_failure(response: Response) -> ClientError {
    let status = response.status();
    let message = response.text().await.unwrap_or_default();
    match status {
        StatusCode::NOT_FOUND => ClientError::NotFound,
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => ClientError::Conflict(message),
        status => ClientError::Status {
            status: status.as_u16(),
            message,
        },
    }
}

// =============================================================================
// Raw response shapes
// =============================================================================

#[derive(Deserialize)]
struct ApiOwner {
    login: String,
}

#[derive(Deserialize)]
struct ApiRepo {
    name: String,
    owner: ApiOwner,
    default_branch: String,
    clone_url: Option<String>,
    html_url: Option<String>,
    #[serde(default)]
    fork: bool,
    #[serde(default)]
    private: bool,
}

#[derive(Deserialize)]
struct ApiTreeRef {
    sha: String,
}

#[derive(Deserialize)]
struct ApiCommitDetail {
    tree: ApiTreeRef,
}

#[derive(Deserialize)]
struct ApiBranchCommit {
    sha: String,
    commit: ApiCommitDetail,
}

#[derive(Deserialize)]
struct ApiBranch {
    name: String,
    commit: ApiBranchCommit,
}

#[derive(Deserialize)]
struct ApiParent {
    sha: String,
}

#[derive(Deserialize)]
struct ApiGitCommit {
    sha: String,
    tree: ApiTreeRef,
    #[serde(default)]
    parents: Vec<ApiParent>,
    #[serde(default)]
    message: String,
}

impl From<ApiGitCommit> for CommitInfo {
    fn from(c: ApiGitCommit) -> Self {
        CommitInfo {
            sha: c.sha,
            tree_sha: c.tree.sha,
            parents: c.parents.into_iter().map(|p| p.sha).collect(),
            message: c.message,
        }
    }
}

#[derive(Deserialize)]
struct ApiWrittenContent {
    sha: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Deserialize)]
struct ApiWriteResponse {
    content: ApiWrittenContent,
    commit: ApiGitCommit,
}

#[derive(Deserialize)]
struct ApiDeleteResponse {
    commit: ApiGitCommit,
}

#[derive(Deserialize)]
struct ApiCreatedTree {
    sha: String,
}

// =============================================================================
// TreeClient implementation
// =============================================================================

#[async_trait]
impl TreeClient for HttpTreeClient {
    async fn get_repository(&self, owner: &str, repo: &str) -> Result<RepoInfo> {
        let response = self.send(self.client.get(self.repo_url(owner, repo))).await?;
        match response.status() {
            StatusCode::OK => {
                let raw: ApiRepo = decode_json(response).await?;
                Ok(RepoInfo {
                    owner: raw.owner.login,
                    name: raw.name,
                    default_branch: raw.default_branch,
                    clone_url: raw.clone_url,
                    html_url: raw.html_url,
                    fork: raw.fork,
                    private: raw.private,
                })
            }
            StatusCode::NOT_FOUND => Err(ClientError::NotFound),
            _ => Err(unexpected_status(response).await),
        }
    }

    async fn get_branch(&self, owner: &str, repo: &str, branch: &str) -> Result<BranchHead> {
        let response = self
            .send(self.client.get(self.branch_url(owner, repo, branch)))
            .await?;
        match response.status() {
            StatusCode::OK => {
                let raw: ApiBranch = decode_json(response).await?;
                Ok(BranchHead {
                    name: raw.name,
                    commit_sha: raw.commit.sha,
                    tree_sha: raw.commit.commit.tree.sha,
                })
            }
            StatusCode::NOT_FOUND => Err(ClientError::NotFound),
            _ => Err(unexpected_status(response).await),
        }
    }

    async fn get_tree(&self, owner: &str, repo: &str, tree_sha: &str) -> Result<TreeListing> {
        let url = format!("{}/{}?recursive=1", self.trees_url(owner, repo), tree_sha);
        let response = self.send(self.client.get(url)).await?;
        match response.status() {
            StatusCode::OK => decode_json(response).await,
            StatusCode::NOT_FOUND => Err(ClientError::NotFound),
            _ => Err(unexpected_status(response).await),
        }
    }

    async fn get_content(&self, owner: &str, repo: &str, path: &str) -> Result<ContentInfo> {
        tracing::debug!(owner, repo, path, "fetching content");
        let response = self
            .send(self.client.get(self.contents_url(owner, repo, path)))
            .await?;
        match response.status() {
            StatusCode::OK => decode_json(response).await,
            StatusCode::NOT_FOUND => Err(ClientError::NotFound),
            _ => Err(unexpected_status(response).await),
        }
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
        tracing::debug!(owner, repo, path, update = prior_sha.is_some(), "writing content");
        let mut body = json!({
            "message": message,
            "content": encode_content(content),
            "branch": branch,
        });
        if let Some(sha) = prior_sha {
            body["sha"] = json!(sha);
        }
        let response = self
            .send(
                self.client
                    .put(self.contents_url(owner, repo, path))
                    .json(&body),
            )
            .await?;
        if response.status().is_success() {
            let raw: ApiWriteResponse = decode_json(response).await?;
            Ok(WrittenContent {
                sha: raw.content.sha,
                size: raw.content.size,
                url: raw.content.url,
                commit: raw.commit.into(),
            })
        } else {
            Err(write_failure(response).await)
        }
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
        tracing::debug!(owner, repo, path, "deleting content");
        let body = json!({
            "message": message,
            "sha": sha,
            "branch": branch,
        });
        let response = self
            .send(
                self.client
                    .delete(self.contents_url(owner, repo, path))
                    .json(&body),
            )
            .await?;
        if response.status().is_success() {
            let raw: ApiDeleteResponse = decode_json(response).await?;
            Ok(raw.commit.into())
        } else {
            Err(write_failure(response).await)
        }
    }

    async fn create_tree(
        &self,
        owner: &str,
        repo: &str,
        base_tree: Option<&str>,
        entries: &[NewTreeEntry],
    ) -> Result<Sha> {
        tracing::debug!(owner, repo, entries = entries.len(), base = base_tree.is_some(), "creating tree");
        let mut body = json!({ "tree": entries });
        if let Some(base) = base_tree {
            body["base_tree"] = json!(base);
        }
        let response = self
            .send(self.client.post(self.trees_url(owner, repo)).json(&body))
            .await?;
        if response.status().is_success() {
            let raw: ApiCreatedTree = decode_json(response).await?;
            Ok(raw.sha)
        } else {
            Err(write_failure(response).await)
        }
    }

    async fn create_commit(
        &self,
        owner: &str,
        repo: &str,
        message: &str,
        tree_sha: &str,
        parents: &[Sha],
    ) -> Result<CommitInfo> {
        let body = json!({
            "message": message,
            "tree": tree_sha,
            "parents": parents,
        });
        let response = self
            .send(self.client.post(self.commits_url(owner, repo)).json(&body))
            .await?;
        if response.status().is_success() {
            let raw: ApiGitCommit = decode_json(response).await?;
            Ok(raw.into())
        } else {
            Err(write_failure(response).await)
        }
    }

    async fn update_ref(
        &self,
        owner: &str,
        repo: &str,
        ref_name: &str,
        commit_sha: &str,
    ) -> Result<()> {
        tracing::debug!(owner, repo, ref_name, commit_sha, "updating ref");
        let body = json!({ "sha": commit_sha, "force": false });
        let response = self
            .send(
                self.client
                    .patch(self.ref_url(owner, repo, ref_name))
                    .json(&body),
            )
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(write_failure(response).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_path_preserves_separators() {
        assert_eq!(encode_path("docs/read me.md"), "docs/read%20me%2Emd");
    }

    #[test]
    fn test_urls() {
        let client = HttpTreeClient::new("https://api.example.com/", None);
        assert_eq!(
            client.repo_url("octo", "widgets"),
            "https://api.example.com/repos/octo/widgets"
        );
        assert_eq!(
            client.ref_url("octo", "widgets", "heads/main"),
            "https://api.example.com/repos/octo/widgets/git/refs/heads/main"
        );
    }
}
