//! Active application probing.
//!
//! # Responsibilities
//! - Perform one synthetic check per call (TCP connect or HTTP/HTTPS GET)
//! - Convert every transport failure into a health state
//! - Tell the committer which state stands in once the grace period expires
//!
//! # Design Decisions
//! - Connectivity failures are health signals, not errors: nothing here is fatal
//! - Redirects are never followed; a 3xx answer is a failed probe
//! - HTTPS only tests reachability, so certificates are not verified

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::net::TcpStream;

use crate::config::{ProbeConfig, ProbeProtocol};
use crate::health::state::{CustomMetrics, HealthState, ProbeSample};
use crate::resilience::timeouts::{with_timeout, PROBE_TIMEOUT};

/// User agent sent with every HTTP probe.
pub const USER_AGENT: &str = "ApplicationHealthExtension/1.0";

/// Why a probe did not report healthy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("failed to connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },

    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("probe was redirected with status {status} to {location:?}")]
    Redirect { status: u16, location: Option<String> },

    #[error("unsuccessful status code {0}")]
    Status(u16),

    #[error("response body is not valid health JSON: {0}")]
    Body(String),

    #[error("response has invalid applicationHealthState {0:?}")]
    InvalidState(Option<String>),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// TCP connect probe.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    address: String,
}

impl TcpProbe {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            address: format!("{}:{}", host, port),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub async fn evaluate(&self) -> ProbeSample {
        match with_timeout(PROBE_TIMEOUT, TcpStream::connect(&self.address)).await {
            Ok(Ok(stream)) => {
                // Close with RST instead of lingering in TIME_WAIT.
                if let Err(e) = stream.set_zero_linger() {
                    tracing::debug!(addr = %self.address, error = %e, "Could not disable linger");
                }
                drop(stream);
                ProbeSample::new(HealthState::Healthy)
            }
            Ok(Err(e)) => ProbeSample::failed(
                HealthState::Unhealthy,
                ProbeError::Connect {
                    addr: self.address.clone(),
                    reason: e.to_string(),
                },
            ),
            Err(_) => ProbeSample::failed(HealthState::Unhealthy, ProbeError::Timeout(PROBE_TIMEOUT)),
        }
    }
}

/// HTTP or HTTPS GET probe.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    url: String,
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(
        protocol: ProbeProtocol,
        host: &str,
        port: Option<u16>,
        request_path: &str,
    ) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(true)
            .no_proxy()
            .user_agent(USER_AGENT)
            .timeout(PROBE_TIMEOUT)
            .build()
            .map_err(|e| ProbeError::Client(e.to_string()))?;

        Ok(Self {
            url: probe_url(protocol, host, port, request_path),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn evaluate(&self) -> ProbeSample {
        let response = match self.client.get(&self.url).send().await {
            Ok(response) => response,
            Err(e) => return ProbeSample::failed(HealthState::Unknown, self.transport_error(e)),
        };

        let status = response.status();
        if status.is_redirection() {
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            return ProbeSample::failed(
                HealthState::Unknown,
                ProbeError::Redirect {
                    status: status.as_u16(),
                    location,
                },
            );
        }
        if !status.is_success() {
            return ProbeSample::failed(HealthState::Unknown, ProbeError::Status(status.as_u16()));
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return ProbeSample::failed(HealthState::Unknown, self.transport_error(e)),
        };

        match parse_health_body(&body) {
            Ok((state, custom_metrics)) => {
                if let CustomMetrics::Invalid { reason, .. } = &custom_metrics {
                    tracing::warn!(url = %self.url, reason = %reason, "Ignoring invalid custom metrics");
                }
                ProbeSample::new(state).with_custom_metrics(custom_metrics)
            }
            Err(e) => ProbeSample::failed(HealthState::Unknown, e),
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> ProbeError {
        if e.is_timeout() {
            ProbeError::Timeout(PROBE_TIMEOUT)
        } else {
            ProbeError::Request {
                url: self.url.clone(),
                reason: e.to_string(),
            }
        }
    }
}

/// The configured probe.
#[derive(Debug, Clone)]
pub enum Probe {
    Tcp(TcpProbe),
    Http(HttpProbe),
    /// No protocol configured: always healthy.
    Default,
}

impl Probe {
    /// Build the probe described by the configuration.
    pub fn from_config(config: &ProbeConfig) -> Result<Self, ProbeError> {
        match config.protocol {
            None => Ok(Probe::Default),
            Some(ProbeProtocol::Tcp) => {
                let port = config.port.ok_or_else(|| ProbeError::Connect {
                    addr: config.host.clone(),
                    reason: "no port configured".to_string(),
                })?;
                Ok(Probe::Tcp(TcpProbe::new(&config.host, port)))
            }
            Some(protocol) => Ok(Probe::Http(HttpProbe::new(
                protocol,
                &config.host,
                config.port,
                &config.request_path,
            )?)),
        }
    }

    /// Perform one check. Bounded by [`PROBE_TIMEOUT`].
    pub async fn evaluate(&self) -> ProbeSample {
        match self {
            Probe::Tcp(probe) => probe.evaluate().await,
            Probe::Http(probe) => probe.evaluate().await,
            Probe::Default => ProbeSample::new(HealthState::Healthy),
        }
    }

    /// State forced when the grace period runs out without a confirmed result.
    pub fn state_after_grace_expires(&self) -> HealthState {
        match self {
            Probe::Http(_) => HealthState::Unknown,
            Probe::Tcp(_) | Probe::Default => HealthState::Unhealthy,
        }
    }

    /// Short label for logs.
    pub fn describe(&self) -> String {
        match self {
            Probe::Tcp(probe) => format!("tcp://{}", probe.address()),
            Probe::Http(probe) => probe.url().to_string(),
            Probe::Default => "default (always healthy)".to_string(),
        }
    }
}

fn probe_url(protocol: ProbeProtocol, host: &str, port: Option<u16>, request_path: &str) -> String {
    let path = request_path.trim_start_matches('/');
    match port {
        Some(port) => format!("{}://{}:{}/{}", protocol.as_str(), host, port, path),
        None => format!("{}://{}/{}", protocol.as_str(), host, path),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    application_health_state: Option<String>,
    custom_metrics: Option<String>,
}

/// Decode a 2xx response body into a health state and custom metrics.
pub fn parse_health_body(body: &[u8]) -> Result<(HealthState, CustomMetrics), ProbeError> {
    let response: HealthResponse =
        serde_json::from_slice(body).map_err(|e| ProbeError::Body(e.to_string()))?;

    let state = match response.application_health_state.as_deref() {
        Some(s) if s.eq_ignore_ascii_case("healthy") => HealthState::Healthy,
        Some(s) if s.eq_ignore_ascii_case("unhealthy") => HealthState::Unhealthy,
        other => return Err(ProbeError::InvalidState(other.map(str::to_string))),
    };

    Ok((state, CustomMetrics::from_raw(response.custom_metrics)))
}
