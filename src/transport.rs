//! Network transport for the search API and raw image bytes.
//!
//! The [`Transport`] trait is the seam between the cache/session core and
//! the network. [`UnsplashTransport`] is the production implementation;
//! tests substitute in-memory fakes.
//!
//! # Error mapping
//!
//! | Condition | Error |
//! |-----------|-------|
//! | connection failure, timeout, non-2xx status | [`Error::TransportFailure`] |
//! | empty body | [`Error::NoData`] |
//! | body is not the expected JSON | [`Error::DecodeFailure`] |
//! | credential env var unset | [`Error::MissingCredential`] |

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::models::{ResourceLocator, ResultPage, SearchResponse};

/// Source of search pages and resource bytes.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch one page (1-based) of search results.
    async fn search_photos(&self, query: &str, page: u32, page_size: u32) -> Result<ResultPage>;

    /// Fetch the raw bytes behind a locator.
    async fn fetch_bytes(&self, locator: &ResourceLocator) -> Result<Vec<u8>>;
}

/// [`Transport`] backed by the Unsplash REST API.
pub struct UnsplashTransport {
    client: reqwest::Client,
    base_url: String,
    credential_env: String,
}

impl UnsplashTransport {
    pub fn new(config: &ApiConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credential_env: config.credential_env.clone(),
        })
    }

    /// The credential is read on every search, not at construction, so a
    /// missing key only fails the search that needs it.
    fn credential(&self) -> Result<String> {
        match std::env::var(&self.credential_env) {
            Ok(v) if !v.trim().is_empty() => Ok(v),
            _ => Err(Error::MissingCredential(self.credential_env.clone())),
        }
    }

    async fn get_body(&self, request: reqwest::RequestBuilder, what: &str) -> Result<Vec<u8>> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::TransportFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::TransportFailure(format!(
                "{} returned {}: {}",
                what,
                status,
                body_text.trim()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::TransportFailure(e.to_string()))?;
        if body.is_empty() {
            return Err(Error::NoData(what.to_string()));
        }
        Ok(body.to_vec())
    }
}

#[async_trait]
impl Transport for UnsplashTransport {
    async fn search_photos(&self, query: &str, page: u32, page_size: u32) -> Result<ResultPage> {
        let client_id = self.credential()?;
        let url = format!("{}/search/photos", self.base_url);
        let request = self.client.get(&url).query(&[
            ("per_page", page_size.to_string()),
            ("page", page.to_string()),
            ("client_id", client_id),
            ("query", query.to_lowercase()),
        ]);

        debug!(query, page, page_size, "searching photos");
        let body = self.get_body(request, &url).await?;
        parse_search_response(&body, page)
    }

    async fn fetch_bytes(&self, locator: &ResourceLocator) -> Result<Vec<u8>> {
        let request = self.client.get(locator.as_str());
        self.get_body(request, locator.as_str()).await
    }
}

/// Decode a `/search/photos` response body into a [`ResultPage`].
pub fn parse_search_response(body: &[u8], page: u32) -> Result<ResultPage> {
    let response: SearchResponse =
        serde_json::from_slice(body).map_err(|e| Error::DecodeFailure(e.to_string()))?;
    Ok(response.into_page(page))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_config(env: &str) -> ApiConfig {
        ApiConfig {
            credential_env: env.to_string(),
            ..ApiConfig::default()
        }
    }

    #[test]
    fn test_parse_search_response() {
        let body = br#"{"total": 2, "total_pages": 1, "results": [
            {"id": "x", "urls": {"thumb": "https://t/x", "regular": "https://r/x"}},
            {"id": "y", "urls": {"thumb": "https://t/y", "regular": "https://r/y"}}
        ]}"#;
        let page = parse_search_response(body, 1).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page.results[1].id, "y");
        assert_eq!(page.total_pages, Some(1));
    }

    #[test]
    fn test_parse_search_response_decode_failure() {
        let err = parse_search_response(b"{\"errors\": [\"OAuth error\"]}", 1).unwrap_err();
        assert!(matches!(err, Error::DecodeFailure(_)));

        let err = parse_search_response(b"<html>", 1).unwrap_err();
        assert!(matches!(err, Error::DecodeFailure(_)));
    }

    #[tokio::test]
    async fn test_missing_credential_fails_at_search_time() {
        let env = "PHOTO_SEARCH_TEST_UNSET_CREDENTIAL";
        std::env::remove_var(env);
        // Construction succeeds without the credential.
        let transport = UnsplashTransport::new(&api_config(env)).unwrap();
        let err = transport.search_photos("cats", 1, 20).await.unwrap_err();
        assert_eq!(err, Error::MissingCredential(env.to_string()));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_failure() {
        let transport = UnsplashTransport::new(&api_config("UNUSED")).unwrap();
        // Port 9 on localhost (discard) is closed on test machines.
        let err = transport
            .fetch_bytes(&ResourceLocator::from("http://127.0.0.1:9/x.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TransportFailure(_)), "{:?}", err);
    }
}
