//! Public IP lookups via HTTP/HTTPS
//!
//! This module provides HttpIpOracle for asking a plain-text IP echo
//! service which address our traffic currently leaves from.

use async_trait::async_trait;
use reqwest::Client;
use std::net::IpAddr;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

use crate::config::OracleSettings;

/// Errors that can occur during IP lookups
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP client creation failed: {0}")]
    ClientCreationFailed(#[from] reqwest::Error),

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Unexpected status code: {0}")]
    UnexpectedStatus(u16),

    #[error("Response is not an IP address: {0:?}")]
    InvalidResponse(String),
}

/// Any service that can report the caller's public IP
#[async_trait]
pub trait IpOracle: Send + Sync {
    async fn public_ip(&self) -> Result<IpAddr, OracleError>;
}

/// IP oracle backed by an HTTP endpoint that echoes the caller's address
#[derive(Debug)]
pub struct HttpIpOracle {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpIpOracle {
    /// Create a new oracle
    ///
    /// # Arguments
    /// * `endpoint` - HTTP/HTTPS URL answering with a bare IP address
    /// * `timeout` - Maximum duration to wait for a response
    #[tracing::instrument(skip(timeout), fields(endpoint = %endpoint, timeout_ms = timeout.as_millis()))]
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self, OracleError> {
        let url = Url::parse(&endpoint)
            .map_err(|e| OracleError::InvalidUrl(format!("Failed to parse URL: {}", e)))?;

        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(OracleError::InvalidUrl(format!(
                    "Only HTTP/HTTPS schemes are supported, got: {}",
                    scheme
                )));
            }
        }

        let client = Client::builder()
            .timeout(timeout)
            .use_rustls_tls()
            .user_agent(concat!("vpn-rotator/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    /// Create an oracle from configuration
    pub fn from_settings(settings: &OracleSettings) -> Result<Self, OracleError> {
        Self::new(settings.endpoint.clone(), settings.timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl IpOracle for HttpIpOracle {
    /// Fetch the public IP
    ///
    /// Succeeds only on a 2xx response whose trimmed body parses as an IP.
    #[tracing::instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn public_ip(&self) -> Result<IpAddr, OracleError> {
        let start = Instant::now();

        let response = self
            .client
            .get(&self.endpoint)
            .header(reqwest::header::ACCEPT, "text/plain")
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::UnexpectedStatus(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| self.classify(e))?;
        let trimmed = body.trim();
        let ip = trimmed
            .parse::<IpAddr>()
            .map_err(|_| OracleError::InvalidResponse(truncate(trimmed, 64)))?;

        debug!(%ip, duration_ms = start.elapsed().as_millis(), "Public IP lookup succeeded");
        Ok(ip)
    }
}

impl HttpIpOracle {
    fn classify(&self, e: reqwest::Error) -> OracleError {
        if e.is_timeout() {
            OracleError::Timeout(self.timeout)
        } else if e.is_connect() {
            OracleError::RequestFailed("Connection refused or unreachable".to_string())
        } else {
            OracleError::RequestFailed(e.to_string())
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
