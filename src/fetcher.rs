use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};

use crate::config::Config;
use crate::dataset::{Dataset, parse_body};
use crate::error::PortalError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Blocking GET transport. Implementations only fail on transport errors;
/// any HTTP status comes back as a [`RawResponse`].
pub trait PortalClient: Send + Sync {
    fn get(&self, url: &str) -> Result<RawResponse, PortalError>;
}

#[derive(Clone)]
pub struct PortalHttpClient {
    client: Client,
}

impl PortalHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, PortalError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("ena-pb/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| PortalError::Http(err.to_string()))?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/tab-separated-values, */*"),
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| PortalError::Http(err.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_config(config: &Config) -> Result<Self, PortalError> {
        Self::new(config.timeout)
    }
}

impl PortalClient for PortalHttpClient {
    fn get(&self, url: &str) -> Result<RawResponse, PortalError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| PortalError::Http(err.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|err| PortalError::Http(err.to_string()))?;
        Ok(RawResponse { status, body })
    }
}

pub struct DataFetcher<C> {
    client: C,
}

impl<C: PortalClient> DataFetcher<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Transport failures and non-2xx statuses are returned as errors; a
    /// successful body always yields a table, possibly an empty one.
    pub fn fetch(&self, url: &str) -> Result<Dataset, PortalError> {
        let response = self.client.get(url)?;
        tracing::debug!("got response {} for {url}", response.status);
        if !response.is_success() {
            tracing::warn!("portal API returned {} for {url}", response.status);
            let message = first_line(&response.body);
            return Err(PortalError::Status {
                status: response.status,
                message,
            });
        }
        Ok(parse_body(&response.body))
    }
}

fn first_line(body: &str) -> String {
    let line = body.lines().map(str::trim).find(|line| !line.is_empty());
    match line {
        Some(line) if line.chars().count() > 200 => line.chars().take(200).collect(),
        Some(line) => line.to_string(),
        None => "portal API request failed".to_string(),
    }
}

impl<T: PortalClient + ?Sized> PortalClient for std::sync::Arc<T> {
    fn get(&self, url: &str) -> Result<RawResponse, PortalError> {
        (**self).get(url)
    }
}
