// src/fetch/http.rs

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::trace;
use url::Url;

use super::policy::FetchFailure;

/// Status and body of one GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Seam between the fetcher and the network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a GET. Only failures to obtain a reply at all are errors;
    /// non-success statuses come back as a [`Reply`].
    async fn get(&self, url: &Url) -> Result<Reply, FetchFailure>;
}

/// reqwest-backed transport used by the binaries.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .context("building HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<Reply, FetchFailure> {
        trace!(path = url.path(), "GET");
        // error text must not carry the URL, it may contain the API key
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchFailure::Transport(e.without_url().to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| FetchFailure::Transport(e.without_url().to_string()))?;
        Ok(Reply { status, body })
    }
}
