//! Gateway Bootstrap
//!
//! Resolves the gateway endpoint through the control plane and opens the
//! transport, retrying the open a bounded number of times. When resuming, the
//! session id and last sequence number ride along as query parameters.

use crate::error::{GatewayError, GatewayResult};
use crate::session::ResumeParams;
use crate::transport::{Connector, Transport};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Control-plane calls made before giving up
const RESOLVE_ATTEMPTS: u32 = 3;

/// Wait between control-plane calls
const RESOLVE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Longest a single control-plane call may take
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolves the current gateway endpoint
#[async_trait]
pub trait EndpointResolver: Send + Sync {
    /// Return the endpoint URL, or `EndpointUnavailable`
    async fn resolve_endpoint(&self) -> GatewayResult<String>;
}

/// A fixed endpoint
#[derive(Debug, Clone)]
pub struct StaticEndpoint {
    url: String,
}

impl StaticEndpoint {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl EndpointResolver for StaticEndpoint {
    async fn resolve_endpoint(&self) -> GatewayResult<String> {
        Ok(self.url.clone())
    }
}

/// Response of `GET /gateway/index`
#[derive(Debug, Deserialize)]
struct GatewayIndexResponse {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<GatewayIndexData>,
}

#[derive(Debug, Deserialize)]
struct GatewayIndexData {
    url: Option<String>,
}

/// Resolves the endpoint over the bot HTTP API
#[derive(Debug, Clone)]
pub struct HttpEndpointResolver {
    http: reqwest::Client,
    api_base_url: String,
    token: String,
    compress: bool,
    retry_delay: Duration,
    request_timeout: Duration,
}

impl HttpEndpointResolver {
    #[must_use]
    pub fn new(api_base_url: impl Into<String>, token: impl Into<String>, compress: bool) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base_url: api_base_url.into(),
            token: token.into(),
            compress,
            retry_delay: RESOLVE_RETRY_DELAY,
            request_timeout: REQUEST_TIMEOUT,
        }
    }

    /// Override how long one call may take before it counts as failed
    #[must_use]
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Override the wait between failed calls
    #[must_use]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    async fn fetch(&self) -> Result<String, String> {
        let url = format!("{}/gateway/index", self.api_base_url.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .query(&[("compress", if self.compress { "1" } else { "0" })])
            .header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.token))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }

        let body: GatewayIndexResponse = response.json().await.map_err(|e| e.to_string())?;
        if body.code != 0 {
            return Err(format!("code {}: {}", body.code, body.message));
        }

        body.data
            .and_then(|data| data.url)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| "response has no url".to_string())
    }
}

#[async_trait]
impl EndpointResolver for HttpEndpointResolver {
    async fn resolve_endpoint(&self) -> GatewayResult<String> {
        let mut last_error = String::new();

        for attempt in 1..=RESOLVE_ATTEMPTS {
            match self.fetch().await {
                Ok(url) => {
                    tracing::debug!(attempt = attempt, "Gateway endpoint resolved");
                    return Ok(url);
                }
                Err(e) => {
                    tracing::warn!(attempt = attempt, error = %e, "Gateway endpoint resolution failed");
                    last_error = e;
                }
            }
            if attempt < RESOLVE_ATTEMPTS {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        Err(GatewayError::EndpointUnavailable(last_error))
    }
}

/// Build the connection URL, adding resume parameters when present
pub fn connection_url(endpoint: &str, resume: Option<&ResumeParams>) -> GatewayResult<Url> {
    let mut url = Url::parse(endpoint)?;
    if let Some(params) = resume {
        url.query_pairs_mut()
            .append_pair("resume", "1")
            .append_pair("sn", &params.sn.to_string())
            .append_pair("session_id", &params.session_id);
    }
    Ok(url)
}

/// A freshly opened connection
#[derive(Debug)]
pub struct Established {
    pub transport: Transport,
    /// Endpoint the transport was opened against, without resume parameters
    pub endpoint: String,
}

/// Endpoint resolution plus transport open
pub struct Bootstrap {
    resolver: Arc<dyn EndpointResolver>,
    connector: Arc<dyn Connector>,
    open_retry_delays: Vec<Duration>,
}

impl Bootstrap {
    #[must_use]
    pub fn new(
        resolver: Arc<dyn EndpointResolver>,
        connector: Arc<dyn Connector>,
        open_retry_delays: Vec<Duration>,
    ) -> Self {
        Self {
            resolver,
            connector,
            open_retry_delays,
        }
    }

    /// Resolve the endpoint through the configured resolver
    pub async fn resolve_endpoint(&self) -> GatewayResult<String> {
        self.resolver.resolve_endpoint().await
    }

    /// Open the transport, retrying after each configured delay
    pub async fn open_transport(
        &self,
        endpoint: &str,
        resume: Option<&ResumeParams>,
    ) -> GatewayResult<Transport> {
        let url = connection_url(endpoint, resume)?;
        let mut delays = self.open_retry_delays.iter();
        let mut attempt = 1u32;

        loop {
            match self.connector.connect(&url).await {
                Ok(transport) => {
                    tracing::debug!(
                        attempt = attempt,
                        resume = resume.is_some(),
                        "Transport opened"
                    );
                    return Ok(transport);
                }
                Err(e) => {
                    let Some(delay) = delays.next() else {
                        tracing::warn!(attempt = attempt, error = %e, "Transport open failed, giving up");
                        return Err(match e {
                            GatewayError::TransportUnavailable(_) => e,
                            other => GatewayError::TransportUnavailable(other.to_string()),
                        });
                    };
                    tracing::warn!(
                        attempt = attempt,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "Transport open failed, retrying"
                    );
                    tokio::time::sleep(*delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Resolve then open; the future the orchestrator keeps in flight
    pub async fn establish(self: Arc<Self>, resume: Option<ResumeParams>) -> GatewayResult<Established> {
        let endpoint = self.resolve_endpoint().await?;
        let transport = self.open_transport(&endpoint, resume.as_ref()).await?;
        Ok(Established {
            transport,
            endpoint,
        })
    }
}

impl std::fmt::Debug for Bootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bootstrap")
            .field("open_retry_delays", &self.open_retry_delays)
            .finish_non_exhaustive()
    }
}
