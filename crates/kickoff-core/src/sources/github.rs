//! GitHub REST commit source.
//!
//! Two calls per repository: the commit list for the newest commit, and the
//! same list with `per_page=1`, whose `Link: <...&page=N>; rel="last"` header
//! gives the total commit count. A repository with a single page of history
//! sends no `Link` header and counts as 1.

use std::time::Duration;

use reqwest::header::{ACCEPT, LINK};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{CommitInfo, CommitSource, USER_AGENT};
use crate::error::FetchError;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ApiCommit {
    sha: String,
    commit: ApiCommitDetail,
    author: Option<ApiUser>,
}

#[derive(Debug, Deserialize)]
struct ApiCommitDetail {
    message: String,
    author: Option<ApiCommitAuthor>,
}

#[derive(Debug, Deserialize)]
struct ApiCommitAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    login: Option<String>,
}

impl ApiCommit {
    /// Commit author name, else the GitHub login, else "Unknown".
    fn author_name(&self) -> String {
        self.commit
            .author
            .as_ref()
            .and_then(|a| a.name.clone())
            .or_else(|| self.author.as_ref().and_then(|u| u.login.clone()))
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

#[derive(Debug, Clone)]
pub struct GitHubCommitSource {
    client: Client,
    api_base: String,
    org: String,
    token: Option<String>,
}

impl GitHubCommitSource {
    pub fn new(org: impl Into<String>, token: Option<String>) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            org: org.into(),
            token,
        }
    }

    /// Point at another API host (GitHub Enterprise, or a mock in tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    fn commits_url(&self, repo: &str) -> String {
        format!(
            "{}/repos/{}/{}/commits",
            self.api_base.trim_end_matches('/'),
            urlencoding::encode(&self.org),
            urlencoding::encode(repo)
        )
    }

    fn request(&self, url: &str) -> RequestBuilder {
        let req = self
            .client
            .get(url)
            .header(ACCEPT, "application/vnd.github+json");
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, repo: &str, req: RequestBuilder) -> Result<Response, FetchError> {
        let resp = req.send().await.map_err(|source| FetchError::Http {
            resource: repo.to_string(),
            source,
        })?;
        if !resp.status().is_success() {
            return Err(FetchError::Status {
                resource: repo.to_string(),
                status: resp.status().as_u16(),
            });
        }
        Ok(resp)
    }

    async fn latest_commit(&self, repo: &str) -> Result<ApiCommit, FetchError> {
        let url = self.commits_url(repo);
        let resp = self.send(repo, self.request(&url)).await?;
        let body = resp.text().await.map_err(|source| FetchError::Http {
            resource: repo.to_string(),
            source,
        })?;
        let commits: Vec<ApiCommit> =
            serde_json::from_str(&body).map_err(|e| FetchError::Malformed {
                resource: repo.to_string(),
                message: e.to_string(),
            })?;
        commits.into_iter().next().ok_or_else(|| FetchError::Malformed {
            resource: repo.to_string(),
            message: "repository has no commits".to_string(),
        })
    }

    async fn total_commits(&self, repo: &str) -> Result<u64, FetchError> {
        let url = self.commits_url(repo);
        let resp = self
            .send(repo, self.request(&url).query(&[("per_page", "1")]))
            .await?;
        let total = resp
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_last_page)
            .unwrap_or(1);
        Ok(total)
    }
}

impl CommitSource for GitHubCommitSource {
    async fn fetch(&self, resource: &str) -> Result<CommitInfo, FetchError> {
        debug!(org = %self.org, repo = resource, "fetching from GitHub");
        let (latest, total) =
            futures::try_join!(self.latest_commit(resource), self.total_commits(resource))?;
        let author = latest.author_name();
        Ok(CommitInfo {
            sha: latest.sha,
            message: latest
                .commit
                .message
                .lines()
                .next()
                .unwrap_or("")
                .to_string(),
            author,
            total_commits: total,
        })
    }
}

/// Page number of the `rel="last"` entry of a `Link` header.
pub fn parse_last_page(link: &str) -> Option<u64> {
    link.split(',').find_map(|part| {
        let mut segments = part.split(';');
        let target = segments.next()?.trim();
        let is_last = segments.any(|s| s.trim() == r#"rel="last""#);
        if !is_last {
            return None;
        }
        let url = Url::parse(target.strip_prefix('<')?.strip_suffix('>')?).ok()?;
        url.query_pairs()
            .find(|(k, _)| k == "page")
            .and_then(|(_, v)| v.parse().ok())
    })
}
