//! HTTP checks against a deployed webhook service

use anyhow::{Context, Result};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, Request, StatusCode, Uri};
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info};

use crate::constants::endpoint;

#[cfg(test)]
mod tests;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Body returned by `GET /health`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub agent: Option<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == endpoint::HEALTHY
    }
}

/// Dialogflow CX webhook request, reduced to the fields the service reads
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRequest {
    pub text: String,
    pub session_info: SessionInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionInfo {
    #[serde(default)]
    pub session: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl WebhookRequest {
    pub fn new(text: impl Into<String>, session: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            session_info: SessionInfo {
                session: session.into(),
                parameters: Map::new(),
            },
        }
    }

    pub fn with_parameter(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.session_info
            .parameters
            .insert(key.to_string(), value.into());
        self
    }
}

/// What the agent replied to a test webhook call
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookReply {
    pub text: Option<String>,
    pub escalate: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookResponse {
    #[serde(default)]
    fulfillment_response: Option<FulfillmentResponse>,
    #[serde(default)]
    session_info: Option<SessionInfo>,
}

#[derive(Deserialize)]
struct FulfillmentResponse {
    #[serde(default)]
    messages: Vec<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    text: Option<MessageText>,
}

#[derive(Deserialize)]
struct MessageText {
    #[serde(default)]
    text: Vec<String>,
}

pub fn parse_health(body: &[u8]) -> Result<HealthReport> {
    serde_json::from_slice(body).context("Failed to parse health response")
}

pub fn parse_webhook_reply(body: &[u8]) -> Result<WebhookReply> {
    let response: WebhookResponse =
        serde_json::from_slice(body).context("Failed to parse webhook response")?;

    let text = response
        .fulfillment_response
        .into_iter()
        .flat_map(|f| f.messages)
        .filter_map(|m| m.text)
        .flat_map(|t| t.text)
        .next();

    let escalate = response
        .session_info
        .and_then(|s| s.parameters.get("escalate_to_agent").cloned())
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    Ok(WebhookReply { text, escalate })
}

/// Join a service base URL and an endpoint path
pub fn endpoint_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

pub struct ProbeClient {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    timeout: Duration,
}

impl Default for ProbeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ProbeClient {
    pub fn new() -> Self {
        let https = HttpsConnector::new();
        let client = Client::builder(TokioExecutor::new()).build(https);
        Self {
            client,
            timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn send(&self, method: Method, url: &str, body: Option<Vec<u8>>) -> Result<(StatusCode, Bytes)> {
        let uri: Uri = url
            .parse()
            .with_context(|| format!("Invalid service URL: {}", url))?;

        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header(hyper::header::CONTENT_TYPE, "application/json");
        }
        let request = builder
            .body(Full::new(Bytes::from(body.unwrap_or_default())))
            .context("Failed to build request")?;

        debug!("Sending {} {}", request.method(), url);
        let response = tokio::time::timeout(self.timeout, self.client.request(request))
            .await
            .with_context(|| format!("Request to {} timed out", url))?
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .context("Failed to read response body")?
            .to_bytes();
        Ok((status, bytes))
    }

    /// `GET <url>/health`
    pub async fn check_health(&self, base_url: &str) -> Result<HealthReport> {
        let url = endpoint_url(base_url, endpoint::HEALTH);
        info!("Checking health at {}", url);

        let (status, body) = self.send(Method::GET, &url, None).await?;
        if !status.is_success() {
            anyhow::bail!(
                "Health check failed with HTTP {}: {}",
                status,
                String::from_utf8_lossy(&body)
            );
        }
        parse_health(&body)
    }

    /// `POST <url>/webhook` with a Dialogflow CX request
    pub async fn send_test_webhook(
        &self,
        base_url: &str,
        request: &WebhookRequest,
    ) -> Result<WebhookReply> {
        let url = endpoint_url(base_url, endpoint::WEBHOOK);
        info!("Sending test webhook to {}", url);

        let payload = serde_json::to_vec(request)?;
        let (status, body) = self.send(Method::POST, &url, Some(payload)).await?;
        if !status.is_success() {
            anyhow::bail!(
                "Webhook call failed with HTTP {}: {}",
                status,
                String::from_utf8_lossy(&body)
            );
        }
        parse_webhook_reply(&body)
    }
}
