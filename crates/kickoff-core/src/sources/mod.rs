//! Where commit info comes from.
//!
//! The watcher only needs the newest commit and a total count per
//! repository. [`ProxyCommitSource`] asks a commit-info endpoint (usually
//! `kickoff serve`); [`GitHubCommitSource`] asks the GitHub REST API
//! directly, and is what that endpoint uses upstream.

mod github;
mod proxy;

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use github::{parse_last_page, GitHubCommitSource};
pub use proxy::ProxyCommitSource;

use crate::error::FetchError;

pub(crate) const USER_AGENT: &str = "kickoff";

/// Longest message summary shown in a notification, in characters.
pub const MESSAGE_SUMMARY_MAX_CHARS: usize = 80;

/// Newest commit of one repository, in the commit-info endpoint's wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitInfo {
    /// Version token; a new value means new commits.
    pub sha: String,
    pub message: String,
    pub author: String,
    pub total_commits: u64,
}

pub trait CommitSource: Send + Sync {
    fn fetch(
        &self,
        resource: &str,
    ) -> impl Future<Output = Result<CommitInfo, FetchError>> + Send;
}

impl<S: CommitSource> CommitSource for Arc<S> {
    fn fetch(
        &self,
        resource: &str,
    ) -> impl Future<Output = Result<CommitInfo, FetchError>> + Send {
        (**self).fetch(resource)
    }
}

/// First line of a commit message, cut to [`MESSAGE_SUMMARY_MAX_CHARS`].
pub fn summarize_message(message: &str) -> String {
    message
        .lines()
        .next()
        .unwrap_or("")
        .chars()
        .take(MESSAGE_SUMMARY_MAX_CHARS)
        .collect()
}
