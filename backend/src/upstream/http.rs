//! reqwest-backed WebSoc client.
//!
//! The endpoint must answer with the pre-parsed raw document as JSON (see
//! [`RawResponse`]), as served by a WebSoc proxy. The registrar's own
//! HTML/XML pages are not decoded here.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::raw::RawResponse;
use super::{UpstreamError, UpstreamQuery, WebsocClient};
use crate::config::UpstreamConfig;
use crate::models::WebsocResponse;

const USER_AGENT: &str = concat!("websoc-api/", env!("CARGO_PKG_VERSION"));

/// Posts WebSoc forms over HTTP and normalizes the returned document.
///
/// The client sets no retry policy of its own. A timed-out call surfaces as
/// [`UpstreamError::Network`] and is retried by the batch executor like any
/// other failure.
#[derive(Debug, Clone)]
pub struct HttpWebsocClient {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpWebsocClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        if config.endpoint.trim().is_empty() {
            return Err(UpstreamError::Configuration(
                "upstream endpoint is not set".to_string(),
            ));
        }
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| UpstreamError::Configuration(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl WebsocClient for HttpWebsocClient {
    async fn query(&self, query: &UpstreamQuery) -> Result<WebsocResponse, UpstreamError> {
        let fields = query.form_fields();
        debug!(
            term = %query.term(),
            units = ?query.units,
            section_codes = query.section_codes.len(),
            "Querying WebSoc"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .form(&fields)
            .send()
            .await
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        decode_document(content_type.as_deref(), &body)
    }
}

/// Decode a raw JSON document into the canonical tree.
pub fn decode_document(
    content_type: Option<&str>,
    body: &[u8],
) -> Result<WebsocResponse, UpstreamError> {
    if let Some(content_type) = content_type {
        let mime = content_type.to_ascii_lowercase();
        if mime.contains("xml") || mime.contains("html") {
            return Err(UpstreamError::Decode(format!(
                "expected a JSON document, got {}",
                content_type
            )));
        }
    }
    let raw: RawResponse =
        serde_json::from_slice(body).map_err(|e| UpstreamError::Decode(e.to_string()))?;
    Ok(raw.normalize())
}
