//! Single-fetch HTTP download with abort classification.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;
use vireo_core::{Error, Result};

/// Fixed per-connection timeout applied to every individual HTTP operation.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of one fetch. `aborted` tells the caller to stop retrying
/// without treating the fetch as a hard error: the provider rate-limited
/// the request or the transport failed internally.
#[derive(Debug, Clone, Default)]
pub struct FetchResult {
    pub body: String,
    pub aborted: bool,
}

impl FetchResult {
    fn aborted() -> Self {
        Self {
            body: String::new(),
            aborted: true,
        }
    }
}

/// Network seam used by the resolver for every provider request.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Issue one GET and accumulate the full body.
    async fn fetch(&self, url: &str) -> Result<FetchResult>;

    /// Cancel the transport-level operation backing any in-progress fetch.
    fn abort(&self);
}

/// `reqwest`-backed downloader. One outstanding fetch per instance;
/// starting a resolution for a different video cancels the prior fetch
/// through [`Fetcher::abort`].
pub struct Downloader {
    http: reqwest::Client,
    active: Mutex<Option<Arc<Notify>>>,
}

impl Downloader {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|err| Error::TransientFetch(format!("failed to create HTTP client: {err}")))?;

        Ok(Self {
            http,
            active: Mutex::new(None),
        })
    }

    async fn download(&self, url: &str) -> Result<FetchResult> {
        let mut response = match self.http.get(url).send().await {
            Ok(response) => response,
            Err(err) => {
                // Connect and timeout failures play the role of the
                // transport's internal abort codes: stop retrying.
                debug!("transport failure for {url}: {err}");
                return Ok(FetchResult::aborted());
            }
        };

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            debug!("provider rate limit hit: {url}");
            return Ok(FetchResult::aborted());
        }
        if status != reqwest::StatusCode::OK {
            return Err(Error::TransientFetch(format!("response code: {status}")));
        }

        let mut body = Vec::new();
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => body.extend_from_slice(&chunk),
                Ok(None) => break,
                Err(err) => {
                    return Err(Error::TransientFetch(format!("body read failed: {err}")))
                }
            }
        }

        Ok(FetchResult {
            body: String::from_utf8_lossy(&body).into_owned(),
            aborted: false,
        })
    }
}

#[async_trait]
impl Fetcher for Downloader {
    async fn fetch(&self, url: &str) -> Result<FetchResult> {
        let cancel = Arc::new(Notify::new());
        *self.active.lock() = Some(Arc::clone(&cancel));

        let result = tokio::select! {
            result = self.download(url) => result,
            () = cancel.notified() => {
                debug!("fetch aborted: {url}");
                Ok(FetchResult::aborted())
            }
        };

        // Clear the slot unless a newer fetch already replaced it.
        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|n| Arc::ptr_eq(n, &cancel)) {
            *active = None;
        }

        result
    }

    fn abort(&self) {
        if let Some(cancel) = self.active.lock().take() {
            cancel.notify_one();
        }
    }
}
