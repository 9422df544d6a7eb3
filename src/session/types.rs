//! Persisted session state.
//!
//! The set of repositories a user has opened, plus their list-sorting
//! preference, survives restarts. State is stored as JSON keyed by the
//! `owner/name` repository form so it stays meaningful if the file is edited
//! by hand.

use serde::{Deserialize, Serialize};

// =============================================================================
// Sorting
// =============================================================================

/// Field to sort the repository list by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Sort by repository name, then owner.
    #[default]
    Name,
    /// Sort by owner, then repository name.
    Owner,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// The repository list's sort preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortState {
    pub key: SortKey,
    pub direction: SortDirection,
}

// =============================================================================
// Session State
// =============================================================================

/// Everything that persists across sessions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionState {
    /// Opened repositories in `owner/name` form, in open order.
    #[serde(default)]
    pub repositories: Vec<String>,
    /// Repository list sort preference.
    #[serde(default)]
    pub sort: SortState,
}

impl SessionState {
    /// Track a repository, keeping the list free of duplicates.
    pub fn add_repository(&mut self, full_name: &str) {
        if !self.repositories.iter().any(|r| r == full_name) {
            self.repositories.push(full_name.to_string());
        }
    }

    /// Stop tracking a repository. Returns whether it was present.
    pub fn remove_repository(&mut self, full_name: &str) -> bool {
        let before = self.repositories.len();
        self.repositories.retain(|r| r != full_name);
        self.repositories.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_repository_dedupes() {
        let mut state = SessionState::default();
        state.add_repository("octo/widgets");
        state.add_repository("octo/gadgets");
        state.add_repository("octo/widgets");
        assert_eq!(state.repositories, vec!["octo/widgets", "octo/gadgets"]);
    }

    #[test]
    fn test_remove_repository() {
        let mut state = SessionState::default();
        state.add_repository("octo/widgets");
        assert!(state.remove_repository("octo/widgets"));
        assert!(!state.remove_repository("octo/widgets"));
        assert!(state.repositories.is_empty());
    }

    #[test]
    fn test_state_roundtrips_as_json() {
        let mut state = SessionState::default();
        state.add_repository("octo/widgets");
        state.sort = SortState {
            key: SortKey::Owner,
            direction: SortDirection::Descending,
        };
        let json = serde_json::to_string(&state).unwrap();
        let back: SessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_missing_fields_default() {
        let state: SessionState = serde_json::from_str("{}").unwrap();
        assert_eq!(state, SessionState::default());
    }
}
