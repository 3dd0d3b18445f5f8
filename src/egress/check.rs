//! IP check over the proxy

use crate::config::{CheckConfig, ProxyConfig};
use anyhow::{Context, Result};
use reqwest::Url;
use serde::Deserialize;
use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Why an IP check failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// Proxy or upstream refused / unreachable
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    /// Upstream answered with a non-2xx status
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// Body was not the JSON we expected
    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("{0}")]
    Request(String),
}

impl From<reqwest::Error> for ProbeError {
    fn from(e: reqwest::Error) -> Self {
        let detail = error_chain(&e);
        if e.is_timeout() {
            ProbeError::Timeout(detail)
        } else if e.is_connect() {
            ProbeError::Connect(detail)
        } else if let Some(status) = e.status() {
            ProbeError::Status(status.as_u16())
        } else if e.is_decode() || e.is_body() {
            ProbeError::Decode(detail)
        } else {
            ProbeError::Request(detail)
        }
    }
}

/// `outer: inner: root` rendering of an error and its sources
fn error_chain(e: &dyn StdError) -> String {
    let mut rendered = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !rendered.ends_with(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        source = cause.source();
    }
    rendered
}

/// Body of the IP-check response. httpbin says `origin`, ipify says `ip`.
#[derive(Debug, Deserialize)]
struct OriginResponse {
    origin: Option<String>,
    ip: Option<String>,
}

/// Extract the origin address from a response body
pub fn parse_origin(body: &str) -> Result<String, ProbeError> {
    let response: OriginResponse =
        serde_json::from_str(body).map_err(|e| ProbeError::Decode(e.to_string()))?;
    response
        .origin
        .or(response.ip)
        .ok_or_else(|| ProbeError::Decode("missing field `origin`".to_string()))
}

/// HTTP client bound to the configured proxies
pub struct IpChecker {
    client: reqwest::Client,
    url: Url,
}

impl IpChecker {
    /// Build a checker for `check.url` routed through `proxy`
    pub fn new(check: &CheckConfig, proxy: &ProxyConfig) -> Result<Self> {
        let url = Url::parse(&check.url)
            .with_context(|| format!("Invalid IP check URL: {}", check.url))?;

        let client = reqwest::Client::builder()
            .proxy(
                reqwest::Proxy::http(&proxy.http)
                    .with_context(|| format!("Invalid HTTP proxy: {}", proxy.http))?,
            )
            .proxy(
                reqwest::Proxy::https(&proxy.https)
                    .with_context(|| format!("Invalid HTTPS proxy: {}", proxy.https))?,
            )
            .timeout(Duration::from_secs(check.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        info!(
            "IP check configured: {} via http={} https={}",
            url, proxy.http, proxy.https
        );

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Fetch the current egress address
    pub async fn check(&self) -> Result<String, ProbeError> {
        debug!("GET {}", self.url);
        let response = self.client.get(self.url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let origin = parse_origin(&body)?;
        debug!("Egress address: {}", origin);
        Ok(origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origin_httpbin() {
        assert_eq!(parse_origin(r#"{"origin": "1.2.3.4"}"#).unwrap(), "1.2.3.4");
    }

    #[test]
    fn test_parse_origin_ipify() {
        assert_eq!(parse_origin(r#"{"ip":"185.220.101.7"}"#).unwrap(), "185.220.101.7");
    }

    #[test]
    fn test_parse_origin_prefers_origin_over_ip() {
        let body = r#"{"origin": "1.2.3.4", "ip": "5.6.7.8"}"#;
        assert_eq!(parse_origin(body).unwrap(), "1.2.3.4");
    }

    #[test]
    fn test_parse_origin_keeps_forwarded_list() {
        let origin = parse_origin(r#"{"origin": "10.0.0.1, 185.220.101.7"}"#).unwrap();
        assert_eq!(origin, "10.0.0.1, 185.220.101.7");
    }

    #[test]
    fn test_parse_origin_rejects_bad_bodies() {
        assert!(matches!(
            parse_origin("<html>blocked</html>"),
            Err(ProbeError::Decode(_))
        ));
        assert!(matches!(
            parse_origin(r#"{"address": "1.2.3.4"}"#),
            Err(ProbeError::Decode(_))
        ));
    }

    #[test]
    fn test_rejects_invalid_url() {
        let check = CheckConfig {
            url: "not a url".to_string(),
            timeout_secs: 5,
        };
        assert!(IpChecker::new(&check, &ProxyConfig::default()).is_err());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            ProbeError::Status(503).to_string(),
            "unexpected HTTP status 503"
        );
        assert_eq!(
            ProbeError::Connect("Connection refused (os error 111)".to_string()).to_string(),
            "connection failed: Connection refused (os error 111)"
        );
    }
}
