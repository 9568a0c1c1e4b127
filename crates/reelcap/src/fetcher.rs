// Resource fetcher: the single-shot GET primitive everything else builds on.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::Client;
use reqwest::redirect::Policy;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace, warn};

use crate::AcquireError;
use crate::config::{HttpConfig, StatusPolicy};

/// Fetches a byte resource by URL with one request and no retries.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Returns the full response body.
    async fn fetch(&self, url: &str) -> Result<Bytes, AcquireError>;

    /// Writes the full response body to `dest`, creating or truncating it.
    /// Returns the number of bytes written.
    async fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64, AcquireError> {
        let body = self.fetch(url).await?;
        tokio::fs::write(dest, &body).await?;
        Ok(body.len() as u64)
    }
}

/// Builds the shared reqwest client from `config`.
pub fn build_client(config: &HttpConfig) -> Result<Client, AcquireError> {
    // reqwest is built without a bundled provider; install ours once per process.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let mut builder = Client::builder()
        .connect_timeout(config.connect_timeout)
        .user_agent(config.user_agent.as_str())
        .default_headers(config.headers.clone())
        .redirect(if config.follow_redirects {
            Policy::default()
        } else {
            Policy::none()
        });

    if !config.timeout.is_zero() {
        builder = builder.timeout(config.timeout);
    }

    if let Some(proxy) = &config.proxy {
        builder = builder.proxy(proxy.to_reqwest()?);
    } else if !config.use_system_proxy {
        builder = builder.no_proxy();
    }

    builder
        .build()
        .map_err(|e| AcquireError::configuration(format!("failed to build HTTP client: {e}")))
}

pub struct HttpFetcher {
    client: Client,
    status_policy: StatusPolicy,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self, AcquireError> {
        Ok(Self::with_client(build_client(config)?, config.status_policy))
    }

    pub fn with_client(client: Client, status_policy: StatusPolicy) -> Self {
        Self {
            client,
            status_policy,
        }
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response, AcquireError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AcquireError::network(url, e))?;

        let status = response.status();
        trace!(url, %status, version = ?response.version(), "Response received");

        if !status.is_success() {
            match self.status_policy {
                StatusPolicy::Strict => return Err(AcquireError::http_status(status, url)),
                StatusPolicy::Lenient => {
                    warn!(url, %status, "Keeping body of non-success response");
                }
            }
        }

        Ok(response)
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, AcquireError> {
        let response = self.send(url).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| AcquireError::network(url, e))?;
        debug!(url, size = body.len(), "Fetched resource");
        Ok(body)
    }

    async fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64, AcquireError> {
        let response = self.send(url).await?;
        let mut file = File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| AcquireError::network(url, e))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(url, dest = %dest.display(), size = written, "Fetched resource to file");
        Ok(written)
    }
}
