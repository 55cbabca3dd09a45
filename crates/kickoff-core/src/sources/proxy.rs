use std::time::Duration;

use reqwest::Client;
use tracing::debug;
use url::Url;

use super::{CommitInfo, CommitSource, USER_AGENT};
use crate::error::FetchError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Reads commit info from `GET <endpoint>?repo=<name>`.
#[derive(Debug, Clone)]
pub struct ProxyCommitSource {
    client: Client,
    endpoint: String,
}

impl ProxyCommitSource {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self::with_client(client, endpoint)
    }

    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url_for(&self, resource: &str) -> Result<Url, FetchError> {
        Url::parse_with_params(&self.endpoint, &[("repo", resource)]).map_err(|e| {
            FetchError::Malformed {
                resource: resource.to_string(),
                message: format!("invalid endpoint '{}': {e}", self.endpoint),
            }
        })
    }
}

impl CommitSource for ProxyCommitSource {
    async fn fetch(&self, resource: &str) -> Result<CommitInfo, FetchError> {
        let url = self.url_for(resource)?;
        debug!(%url, "fetching commit info");

        let http = |source| FetchError::Http {
            resource: resource.to_string(),
            source,
        };
        let resp = self.client.get(url).send().await.map_err(http)?;
        if !resp.status().is_success() {
            return Err(FetchError::Status {
                resource: resource.to_string(),
                status: resp.status().as_u16(),
            });
        }

        let body = resp.text().await.map_err(http)?;
        serde_json::from_str(&body).map_err(|e| FetchError::Malformed {
            resource: resource.to_string(),
            message: e.to_string(),
        })
    }
}
