use std::{
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};

use bytes::Bytes;

use crate::{
    error::{AbrError, AbrResult},
    util::http::HttpClient,
};

/// Payload of one completed transfer.
#[derive(Debug, Clone)]
pub struct FetchedSegment {
    pub data: Bytes,
    pub elapsed: Duration,
}

impl FetchedSegment {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Moves the bytes behind an address into memory.
pub trait SegmentTransport: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> impl Future<Output = AbrResult<FetchedSegment>> + Send;
}

impl<T> SegmentTransport for Arc<T>
where
    T: SegmentTransport,
{
    fn fetch(&self, url: &str) -> impl Future<Output = AbrResult<FetchedSegment>> + Send {
        self.as_ref().fetch(url)
    }
}

/// [`SegmentTransport`] over HTTP(S).
#[derive(Clone, Default)]
pub struct HttpTransport {
    client: HttpClient,
}

impl HttpTransport {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }
}

impl SegmentTransport for HttpTransport {
    async fn fetch(&self, url: &str) -> AbrResult<FetchedSegment> {
        let start = Instant::now();
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            if let Ok(body) = response.text().await {
                tracing::debug!("Error body: {body}");
            }
            return Err(AbrError::HttpError(status));
        }

        let data = response.bytes().await?;
        Ok(FetchedSegment {
            data,
            elapsed: start.elapsed(),
        })
    }
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const fn none() -> Self {
        Self {
            retries: 0,
            base_delay: Duration::from_millis(500),
        }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Fetches `url`, retrying transport errors that might go away.
///
/// Only the final attempt is returned, so its `elapsed` never includes backoff time.
pub async fn fetch_with_retry<T>(
    transport: &T,
    url: &str,
    policy: RetryPolicy,
) -> AbrResult<FetchedSegment>
where
    T: SegmentTransport + ?Sized,
{
    let mut attempt = 0;
    loop {
        match transport.fetch(url).await {
            Ok(fetched) => return Ok(fetched),
            Err(e) if attempt < policy.retries && e.is_retryable() => {
                let delay = policy.delay(attempt);
                tracing::warn!(
                    "Fetching {url} failed (attempt {}): {e}, retry in {delay:?}",
                    attempt + 1
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
