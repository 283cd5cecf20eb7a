//! In-memory fetch service.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};

use super::{BoxFuture, FetchService};
use crate::error::FetchError;
use crate::scope::UrlParams;

/// Serves canned responses keyed by the `/`-joined parameter list.
///
/// Unknown keys fall back to the default response, or
/// [`FetchError::NotFound`] when none is set. Every request is recorded.
#[derive(Debug, Default)]
pub struct StaticFetchService {
    responses: RwLock<HashMap<String, Result<Bytes, FetchError>>>,
    fallback: RwLock<Option<Result<Bytes, FetchError>>>,
    latency: RwLock<Option<Duration>>,
    requests: Mutex<Vec<UrlParams>>,
}

impl StaticFetchService {
    /// An empty service that answers `NotFound` to everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for the parameters `key` (e.g. `"3/4/2"`).
    pub fn insert(&self, key: impl Into<String>, body: impl Into<Bytes>) {
        self.responses.write().insert(key.into(), Ok(body.into()));
    }

    /// Fail requests for `key` with `error`.
    pub fn insert_error(&self, key: impl Into<String>, error: FetchError) {
        self.responses.write().insert(key.into(), Err(error));
    }

    /// Drop the response for `key`.
    pub fn remove(&self, key: &str) {
        self.responses.write().remove(key);
    }

    /// Response for keys without an explicit entry.
    pub fn set_fallback(&self, response: Result<Bytes, FetchError>) {
        *self.fallback.write() = Some(response);
    }

    /// Delay every response by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write() = latency;
    }

    /// Builder form of [`StaticFetchService::set_fallback`].
    pub fn with_fallback(self, response: Result<Bytes, FetchError>) -> Self {
        self.set_fallback(response);
        self
    }

    /// Builder form of [`StaticFetchService::set_latency`].
    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(Some(latency));
        self
    }

    /// Parameters of every request so far, in arrival order.
    pub fn requests(&self) -> Vec<UrlParams> {
        self.requests.lock().clone()
    }

    /// Number of requests served for `key`.
    pub fn request_count(&self, key: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|p| p.to_string() == key)
            .count()
    }

    fn lookup(&self, key: &str) -> Result<Bytes, FetchError> {
        if let Some(response) = self.responses.read().get(key) {
            return response.clone();
        }
        self.fallback
            .read()
            .clone()
            .unwrap_or(Err(FetchError::NotFound))
    }
}

impl FetchService for StaticFetchService {
    fn name(&self) -> &str {
        "static"
    }

    fn fetch<'a>(&'a self, params: &'a UrlParams) -> BoxFuture<'a, Result<Bytes, FetchError>> {
        self.requests.lock().push(params.clone());
        let latency = *self.latency.read();
        Box::pin(async move {
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            self.lookup(&params.to_string())
        })
    }
}
