//! Retrieval of byte payloads over HTTP.
//!
//! No other module performs network I/O. Checkers receive a [`Fetcher`] so
//! tests can substitute an in-memory double.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HOST};
use tracing::debug;
use url::Url;

use crate::error::{CertStatusError, Result};

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

pub const OCSP_REQUEST_CONTENT_TYPE: &str = "application/ocsp-request";
pub const OCSP_RESPONSE_CONTENT_TYPE: &str = "application/ocsp-response";

/// Capability to download resources referenced by a certificate.
pub trait Fetcher {
    /// Plain download (issuer certificates, CRLs).
    fn get(&self, url: &str) -> Result<Vec<u8>>;

    /// OCSP exchange: POST a DER request body, return the DER response body.
    fn post_ocsp(&self, url: &str, body: &[u8]) -> Result<Vec<u8>>;
}

impl<F: Fetcher + ?Sized> Fetcher for &F {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        (**self).get(url)
    }

    fn post_ocsp(&self, url: &str, body: &[u8]) -> Result<Vec<u8>> {
        (**self).post_ocsp(url, body)
    }
}

impl<F: Fetcher + ?Sized> Fetcher for Box<F> {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        (**self).get(url)
    }

    fn post_ocsp(&self, url: &str, body: &[u8]) -> Result<Vec<u8>> {
        (**self).post_ocsp(url, body)
    }
}

/// [`Fetcher`] over a blocking `reqwest` client, built once and reused.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| CertStatusError::HttpClient {
                reason: e.to_string(),
            })?;
        Ok(HttpFetcher { client })
    }

    fn read(&self, url: &str, request: reqwest::blocking::RequestBuilder) -> Result<Vec<u8>> {
        let unavailable = |reason: String| CertStatusError::ResourceUnavailable {
            url: url.to_string(),
            reason,
        };

        let response = request.send().map_err(|e| unavailable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(format!("HTTP status {}", status)));
        }
        let body = response.bytes().map_err(|e| unavailable(e.to_string()))?;
        debug!(url, status = status.as_u16(), bytes = body.len(), "fetched");
        Ok(body.to_vec())
    }
}

impl Fetcher for HttpFetcher {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        debug!(url, "GET");
        self.read(url, self.client.get(url))
    }

    fn post_ocsp(&self, url: &str, body: &[u8]) -> Result<Vec<u8>> {
        let host = host_header(url)?;
        debug!(url, host = host.as_str(), bytes = body.len(), "POST OCSP request");
        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, OCSP_REQUEST_CONTENT_TYPE)
            .header(ACCEPT, OCSP_RESPONSE_CONTENT_TYPE)
            .header(HOST, host)
            .body(body.to_vec());
        self.read(url, request)
    }
}

/// Hostname of `url` without port; responders compare the Host header against it.
pub fn host_header(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|e| CertStatusError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    parsed
        .host_str()
        .map(str::to_owned)
        .ok_or_else(|| CertStatusError::InvalidUrl {
            url: url.to_string(),
            reason: "no host".to_string(),
        })
}
