use serde::Serialize;

use crate::sources::CommitInfo;

/// What the watcher knows about one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRecord {
    pub resource_id: String,
    /// Last-seen commit SHA. `None` until the first successful fetch.
    pub last_version_token: Option<String>,
    pub total_count: u64,
}

/// Outcome of comparing a fetch against the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// First sighting; token stored, nothing to announce.
    Seeded,
    Unchanged,
    Changed,
}

impl CommitRecord {
    pub fn new(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            last_version_token: None,
            total_count: 0,
        }
    }

    /// Fold a fetched commit into the record.
    pub fn observe(&mut self, info: &CommitInfo) -> Observation {
        match self.last_version_token.as_deref() {
            Some(token) if token == info.sha => Observation::Unchanged,
            Some(_) => {
                self.last_version_token = Some(info.sha.clone());
                self.total_count = info.total_commits;
                Observation::Changed
            }
            None => {
                self.last_version_token = Some(info.sha.clone());
                self.total_count = info.total_commits;
                Observation::Seeded
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(sha: &str, total: u64) -> CommitInfo {
        CommitInfo {
            sha: sha.into(),
            message: "msg".into(),
            author: "ana".into(),
            total_commits: total,
        }
    }

    #[test]
    fn first_observation_seeds() {
        let mut record = CommitRecord::new("demo-repo");
        assert_eq!(record.observe(&info("abc123", 5)), Observation::Seeded);
        assert_eq!(record.last_version_token.as_deref(), Some("abc123"));
        assert_eq!(record.total_count, 5);
    }

    #[test]
    fn same_token_is_unchanged_even_if_count_moves() {
        let mut record = CommitRecord::new("demo-repo");
        record.observe(&info("abc123", 5));
        assert_eq!(record.observe(&info("abc123", 9)), Observation::Unchanged);
        assert_eq!(record.total_count, 5);
    }

    #[test]
    fn new_token_is_a_change() {
        let mut record = CommitRecord::new("demo-repo");
        record.observe(&info("abc123", 5));
        assert_eq!(record.observe(&info("def456", 6)), Observation::Changed);
        assert_eq!(record.last_version_token.as_deref(), Some("def456"));
        assert_eq!(record.total_count, 6);
    }
}
