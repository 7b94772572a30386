use std::fmt;

use serde::{Deserialize, Serialize};

/// Names one commit: a repo plus a commit id.
///
/// Commits are the accumulation unit for filesets; the commit store keys its
/// staging lists and finished totals by this pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitRef {
    pub repo: String,
    pub id: String,
}

impl CommitRef {
    pub fn new(repo: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            id: id.into(),
        }
    }

    /// Map key combining repo and commit id.
    pub fn key(&self) -> String {
        format!("{}/{}", self.repo, self.id)
    }
}

impl fmt::Display for CommitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.repo, self.id)
    }
}
