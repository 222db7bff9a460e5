use crate::error::FetchError;
use crate::snapshot::Snapshot;
use log::{error, info, warn};
use reqwest::{Client, StatusCode};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Default number of fetch attempts per poll cycle
pub const DEFAULT_RETRIES: u32 = 3;

/// Default delay between fetch attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// A place snapshots can be read from, one attempt at a time
pub trait SnapshotSource: Send + Sync {
    fn fetch_once<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Snapshot, FetchError>> + Send + 'a>>;
}

/// Reads snapshots with an HTTP GET against a JSON endpoint
pub struct HttpSnapshotSource {
    client: Client,
    url: String,
}

impl HttpSnapshotSource {
    /// Create a source for `url` with a per-request timeout
    ///
    /// # Errors
    ///
    /// Returns `FetchError::HttpError` if the HTTP client cannot be built.
    pub fn new(url: String, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl SnapshotSource for HttpSnapshotSource {
    fn fetch_once<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Snapshot, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let response = self.client.get(&self.url).send().await?;

            let status = response.status();
            if status != StatusCode::OK {
                return Err(FetchError::UnexpectedStatus(status.as_u16()));
            }

            let body = response.text().await?;
            Snapshot::from_json(&body)
        })
    }
}

/// Fetches snapshots with a bounded retry policy
///
/// Failures never escape: after the last failed attempt the fetcher logs the
/// error and hands back an empty snapshot, which the caller treats as "no
/// data this cycle".
pub struct Fetcher {
    source: Arc<dyn SnapshotSource>,
    retries: u32,
    retry_delay: Duration,
}

impl Fetcher {
    pub fn new(source: Arc<dyn SnapshotSource>) -> Self {
        Self::with_retry_policy(source, DEFAULT_RETRIES, DEFAULT_RETRY_DELAY)
    }

    /// Create a fetcher making up to `retries` attempts, `retry_delay` apart
    ///
    /// A `retries` of zero is treated as one attempt.
    pub fn with_retry_policy(
        source: Arc<dyn SnapshotSource>,
        retries: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            source,
            retries: retries.max(1),
            retry_delay,
        }
    }

    /// Fetch a snapshot, retrying on failure
    pub async fn fetch(&self) -> Snapshot {
        for attempt in 1..=self.retries {
            match self.source.fetch_once().await {
                Ok(snapshot) => {
                    info!(
                        "Fetched snapshot with {} entities (attempt {}/{})",
                        snapshot.entity_count(),
                        attempt,
                        self.retries
                    );
                    return snapshot;
                }
                Err(FetchError::UnexpectedStatus(status)) => {
                    warn!(
                        "Data source responded with status {} (attempt {}/{})",
                        status, attempt, self.retries
                    );
                }
                Err(e) => {
                    error!("Fetch failed (attempt {}/{}): {}", attempt, self.retries, e);
                }
            }

            if attempt < self.retries {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        error!(
            "Failed to fetch snapshot after {} attempts, skipping this cycle",
            self.retries
        );
        Snapshot::default()
    }
}
