//! HTTP fetch service backed by reqwest.

use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;

use super::{BoxFuture, FetchService};
use crate::error::FetchError;
use crate::scope::UrlParams;

/// Default request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Substitute positional `{0}`..`{n}` placeholders in `template`.
///
/// Placeholders without a matching parameter are left as is.
pub fn render_url(template: &str, params: &UrlParams) -> String {
    params
        .as_slice()
        .iter()
        .enumerate()
        .fold(template.to_string(), |url, (i, value)| {
            url.replace(&format!("{{{}}}", i), value)
        })
}

/// Fetches tiles over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFetchService {
    client: reqwest::Client,
    template: String,
    name: String,
}

impl HttpFetchService {
    /// Creates a service for `template` with the default timeout.
    ///
    /// # Arguments
    ///
    /// * `template` - URL with `{0}`..`{n}` placeholders,
    ///   e.g. `https://tiles.example.com/{0}/{1}/{2}.png`
    pub fn new(template: impl Into<String>) -> Result<Self, FetchError> {
        Self::with_timeout(template, DEFAULT_HTTP_TIMEOUT)
    }

    /// Creates a service with a custom request timeout.
    pub fn with_timeout(template: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(format!("Failed to create HTTP client: {}", e)))?;
        let template = template.into();
        let name = reqwest::Url::parse(&template)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| "http".to_string());

        Ok(Self {
            client,
            template,
            name,
        })
    }

    /// URL template.
    pub fn template(&self) -> &str {
        &self.template
    }

    async fn get(&self, url: String) -> Result<Bytes, FetchError> {
        let response = self.client.get(&url).send().await.map_err(classify)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }
        if status == StatusCode::NO_CONTENT {
            return Err(FetchError::NoData);
        }
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(classify)?;
        if body.is_empty() {
            return Err(FetchError::NoData);
        }
        Ok(body)
    }
}

fn classify(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else if let Some(status) = error.status() {
        FetchError::Http {
            status: status.as_u16(),
        }
    } else {
        FetchError::Network(error.to_string())
    }
}

impl FetchService for HttpFetchService {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch<'a>(&'a self, params: &'a UrlParams) -> BoxFuture<'a, Result<Bytes, FetchError>> {
        let url = render_url(&self.template, params);
        tracing::trace!(service = %self.name, url = %url, "HTTP fetch");
        Box::pin(self.get(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_url() {
        let params = UrlParams::new(vec!["12".into(), "654".into(), "1583".into()]);
        let url = render_url("https://tiles.example.com/{0}/{1}/{2}.png", &params);
        assert_eq!(url, "https://tiles.example.com/12/654/1583.png");
    }

    #[test]
    fn test_render_url_repeated_and_missing_placeholders() {
        let params = UrlParams::new(vec!["a".into()]);
        assert_eq!(render_url("/{0}/{0}/{1}", &params), "/a/a/{1}");
    }

    #[test]
    fn test_render_url_double_digit_positions() {
        let params = UrlParams::new((0..11).map(|i| format!("p{}", i)).collect());
        assert_eq!(render_url("{1}-{10}", &params), "p1-p10");
    }

    #[test]
    fn test_service_name_from_host() {
        let service = HttpFetchService::new("https://tiles.example.com/{0}/{1}/{2}").unwrap();
        assert_eq!(service.name(), "tiles.example.com");
        assert_eq!(service.template(), "https://tiles.example.com/{0}/{1}/{2}");
    }

    #[test]
    fn test_service_name_fallback() {
        let service = HttpFetchService::new("not a url {0}").unwrap();
        assert_eq!(service.name(), "http");
    }
}
