//! Virtual path addressing.
//!
//! A virtual path is `forgefs://<owner>/<repo>/<path-within-repo>`. The
//! authority segment carries the repository identity so distinct repositories
//! never collide in path space. The root path denotes the repository itself
//! and is always a directory.

use std::fmt;
use std::str::FromStr;

use percent_encoding::percent_decode_str;
use thiserror::Error;

use crate::store::RepoId;

/// URI scheme for virtual paths.
pub const URI_SCHEME: &str = "forgefs";

// =============================================================================
// Error Types
// =============================================================================

/// Errors parsing a virtual path URI.
#[derive(Debug, Clone, Error)]
pub enum UriError {
    /// The string has no `scheme://` prefix.
    #[error("invalid uri '{0}': missing scheme")]
    MissingScheme(String),

    /// The scheme is not [`URI_SCHEME`].
    #[error("unsupported scheme in '{0}'")]
    UnsupportedScheme(String),

    /// The authority does not carry an `owner/repo` identity.
    #[error("invalid uri '{0}': missing repository")]
    MissingRepository(String),

    /// The path contains invalid percent-encoding.
    #[error("invalid percent-encoding in '{0}'")]
    BadEncoding(String),
}

// =============================================================================
// RepoUri
// =============================================================================

/// A parsed virtual path: repository identity plus a normalized path within
/// the repository (empty string for the root).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoUri {
    /// Repository identity from the authority segment.
    pub repo: RepoId,
    /// Slash-separated path relative to the repository root; `""` is the root.
    pub path: String,
}

impl RepoUri {
    /// Create a URI from a repository and path, normalizing the path.
    pub fn new(repo: RepoId, path: impl AsRef<str>) -> Self {
        Self {
            repo,
            path: normalize_path(path.as_ref()),
        }
    }

    /// The repository root.
    pub fn root(repo: RepoId) -> Self {
        Self {
            repo,
            path: String::new(),
        }
    }

    /// Whether this is the repository root.
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// The final path segment (empty for the root).
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or("")
    }

    /// The parent URI, or `None` at the root.
    pub fn parent(&self) -> Option<RepoUri> {
        if self.is_root() {
            return None;
        }
        let parent = match self.path.rsplit_once('/') {
            Some((prefix, _)) => prefix.to_string(),
            None => String::new(),
        };
        Some(RepoUri {
            repo: self.repo.clone(),
            path: parent,
        })
    }

    /// A child of this URI.
    pub fn join(&self, name: &str) -> RepoUri {
        let path = if self.path.is_empty() {
            normalize_path(name)
        } else {
            format!("{}/{}", self.path, normalize_path(name))
        };
        RepoUri {
            repo: self.repo.clone(),
            path,
        }
    }
}

impl fmt::Display for RepoUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}://{}", URI_SCHEME, self.repo)
        } else {
            write!(f, "{}://{}/{}", URI_SCHEME, self.repo, self.path)
        }
    }
}

impl FromStr for RepoUri {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| UriError::MissingScheme(s.to_string()))?;
        if scheme != URI_SCHEME {
            return Err(UriError::UnsupportedScheme(s.to_string()));
        }
        let mut segments = rest.splitn(3, '/');
        let owner = segments.next().unwrap_or_default();
        let name = segments.next().unwrap_or_default();
        if owner.is_empty() || name.is_empty() {
            return Err(UriError::MissingRepository(s.to_string()));
        }
        let raw_path = segments.next().unwrap_or_default();
        let path = percent_decode_str(raw_path)
            .decode_utf8()
            .map_err(|_| UriError::BadEncoding(s.to_string()))?;
        Ok(RepoUri::new(RepoId::new(owner, name), path.as_ref()))
    }
}

/// Normalize a path within a repository: strip leading/trailing slashes and
/// collapse empty segments.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_uri() {
        let uri: RepoUri = "forgefs://octo/widgets/src/lib.rs".parse().unwrap();
        assert_eq!(uri.repo, RepoId::new("octo", "widgets"));
        assert_eq!(uri.path, "src/lib.rs");
        assert_eq!(uri.name(), "lib.rs");
        assert_eq!(uri.to_string(), "forgefs://octo/widgets/src/lib.rs");
    }

    #[test]
    fn test_parse_root_uri() {
        let uri: RepoUri = "forgefs://octo/widgets".parse().unwrap();
        assert!(uri.is_root());
        assert_eq!(uri.to_string(), "forgefs://octo/widgets");

        let slashed: RepoUri = "forgefs://octo/widgets/".parse().unwrap();
        assert!(slashed.is_root());
    }

    #[test]
    fn test_parse_rejects_bad_uris() {
        assert!(matches!(
            "octo/widgets".parse::<RepoUri>(),
            Err(UriError::MissingScheme(_))
        ));
        assert!(matches!(
            "http://octo/widgets".parse::<RepoUri>(),
            Err(UriError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            "forgefs://octo".parse::<RepoUri>(),
            Err(UriError::MissingRepository(_))
        ));
    }

    #[test]
    fn test_percent_decoding() {
        let uri: RepoUri = "forgefs://octo/widgets/docs/read%20me.md".parse().unwrap();
        assert_eq!(uri.path, "docs/read me.md");
    }

    #[test]
    fn test_parent_and_join() {
        let uri: RepoUri = "forgefs://octo/widgets/a/b/c.txt".parse().unwrap();
        let parent = uri.parent().unwrap();
        assert_eq!(parent.path, "a/b");
        assert_eq!(parent.join("c.txt"), uri);
        assert_eq!(RepoUri::root(uri.repo.clone()).parent(), None);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/src//lib.rs/"), "src/lib.rs");
        assert_eq!(normalize_path("./a/./b"), "a/b");
        assert_eq!(normalize_path(""), "");
    }
}
