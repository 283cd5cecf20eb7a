//! Fetch and decode collaborators.
//!
//! The streaming core never performs I/O itself. Loaders hand positional
//! [`UrlParams`] to a [`FetchService`] on a tokio worker and run the returned
//! bytes through a [`PayloadDecoder`].
//!
//! # Implementations
//!
//! | Service | Use |
//! |---------|-----|
//! | [`HttpFetchService`] | reqwest GET against a `{0}/{1}/{2}` URL template |
//! | [`StaticFetchService`] | in-memory responses for tests and offline runs |

mod decoder;
mod http;
mod memory;

pub use decoder::{JsonDecoder, PayloadDecoder, RawDecoder};
pub use http::{render_url, HttpFetchService, DEFAULT_HTTP_TIMEOUT};
pub use memory::StaticFetchService;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use crate::error::FetchError;
use crate::scope::UrlParams;

/// Boxed future returned by [`FetchService::fetch`].
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Transport for one data feed.
///
/// Implementations must be cheap to share: a single instance serves every
/// worker task of a loader.
pub trait FetchService: Send + Sync + 'static {
    /// Short name used in log output.
    fn name(&self) -> &str;

    /// Fetch the raw bytes addressed by `params`.
    ///
    /// # Arguments
    ///
    /// * `params` - Positional parameters derived from the scope key
    ///
    /// # Returns
    ///
    /// The response body, or a [`FetchError`] describing why none is
    /// available.
    fn fetch<'a>(&'a self, params: &'a UrlParams) -> BoxFuture<'a, Result<Bytes, FetchError>>;
}
