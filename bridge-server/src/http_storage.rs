//! Object Storage over pre-signed URLs using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{object_key, public_url, ObjectStorage, PresignedUrl, SignRequest, UrlSigner},
};
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy for storage requests
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Whether to use exponential backoff
    pub use_exponential_backoff: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            use_exponential_backoff: true,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if self.use_exponential_backoff {
            let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
            self.base_delay.saturating_mul(factor).min(self.max_delay)
        } else {
            self.base_delay
        }
    }
}

/// Reqwest-based object storage
///
/// Every object access goes through a URL minted by the injected [`UrlSigner`],
/// so this adapter never holds storage credentials. Reads and writes are
/// retried with exponential backoff on transport errors and on 5xx/429.
pub struct HttpObjectStorage {
    client: Client,
    signer: Arc<dyn UrlSigner>,
    cdn_domain: String,
    url_ttl: Duration,
    retry: RetryPolicy,
}

impl HttpObjectStorage {
    /// Create a storage adapter with a default HTTP client
    pub fn new(signer: Arc<dyn UrlSigner>, cdn_domain: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent("imgpipe-core/0.1.0")
            .build()
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self::with_client(client, signer, cdn_domain))
    }

    /// Create a storage adapter around an existing client
    pub fn with_client(client: Client, signer: Arc<dyn UrlSigner>, cdn_domain: impl Into<String>) -> Self {
        Self {
            client,
            signer,
            cdn_domain: cdn_domain.into(),
            url_ttl: Duration::from_secs(3600),
            retry: RetryPolicy::default(),
        }
    }

    /// Lifetime of URLs minted by this adapter
    pub fn with_url_ttl(mut self, ttl: Duration) -> Self {
        self.url_ttl = ttl;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn is_retryable(status: StatusCode) -> bool {
        status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
    }

    fn status_error(key: &str, status: StatusCode) -> BridgeError {
        if status == StatusCode::NOT_FOUND {
            BridgeError::NotFound(key.to_string())
        } else {
            BridgeError::Http {
                status: status.as_u16(),
                message: format!("request for {key} failed"),
            }
        }
    }

    /// Send the request produced by `build`, retrying per policy.
    ///
    /// Returns the first successful response; non-retryable statuses fail
    /// immediately.
    async fn send_with_retry<F>(&self, key: &str, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt < self.retry.max_attempts {
            debug!(
                attempt = attempt + 1,
                max_attempts = self.retry.max_attempts,
                key = %key,
                "Executing storage request"
            );

            match build().send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    if !Self::is_retryable(status) {
                        return Err(Self::status_error(key, status));
                    }
                    warn!(
                        status = status.as_u16(),
                        attempt = attempt + 1,
                        key = %key,
                        "Storage request failed with retryable status"
                    );
                    last_error = Some(Self::status_error(key, status));
                }
                Err(e) => {
                    // reqwest errors carry the signed URL; strip it before logging
                    let e = e.without_url();
                    warn!(error = %e, attempt = attempt + 1, key = %key, "Storage request failed");

                    last_error = Some(if e.is_timeout() {
                        BridgeError::OperationFailed(format!("Request for {key} timed out"))
                    } else if e.is_connect() {
                        BridgeError::OperationFailed(format!("Connection failed: {e}"))
                    } else {
                        BridgeError::OperationFailed(e.to_string())
                    });
                }
            }

            attempt += 1;

            if attempt < self.retry.max_attempts {
                let delay = self.retry.delay_after(attempt);
                debug!(delay_ms = delay.as_millis() as u64, "Retrying after delay");
                sleep(delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            BridgeError::OperationFailed("All retry attempts exhausted".to_string())
        }))
    }
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn fetch(&self, filename: &str) -> Result<Bytes> {
        let key = object_key(filename);
        let signed = self.signer.sign(SignRequest::get(&key, self.url_ttl)).await?;

        let response = self
            .send_with_retry(&key, || self.client.get(&signed.url))
            .await?;

        let body = response
            .bytes()
            .await
            .map_err(|e| BridgeError::OperationFailed(e.without_url().to_string()))?;

        debug!(key = %key, size = body.len(), "Fetched object");
        Ok(body)
    }

    async fn put_derivative(&self, filename: &str, data: Bytes, content_type: &str) -> Result<()> {
        let key = object_key(filename);
        let signed = self
            .signer
            .sign(SignRequest::put(&key, content_type, self.url_ttl))
            .await?;

        self.send_with_retry(&key, || {
            self.client
                .put(&signed.url)
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(data.clone())
        })
        .await?;

        debug!(key = %key, size = data.len(), "Uploaded derivative");
        Ok(())
    }

    async fn presign_upload(&self, filename: &str, content_type: &str) -> Result<PresignedUrl> {
        self.signer
            .sign(SignRequest::put(object_key(filename), content_type, self.url_ttl))
            .await
    }

    fn public_url(&self, filename: &str) -> String {
        public_url(&self.cdn_domain, filename)
    }
}
