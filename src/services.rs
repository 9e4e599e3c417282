use async_trait::async_trait;
use failsafe::futures::CircuitBreaker;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::circuit_breaker::{create_backend_circuit_breaker, BackendCircuitBreaker};
use crate::config::Config;
use crate::errors::BackendError;
use crate::models::{BackendCallRequest, BackendPayload, CallCandidate, ServiceName};

/// One blacklist backend, as seen by the aggregation engine.
///
/// `Ok(None)` means the backend answered with no payload at all.
#[async_trait]
pub trait BlacklistBackend: Send + Sync {
    async fn check(
        &self,
        request: &BackendCallRequest,
    ) -> Result<Option<CallCandidate>, BackendError>;
}

/// HTTP client for one blacklist backend.
#[derive(Clone)]
pub struct HttpBlacklistBackend {
    service: ServiceName,
    client: Client,
    url: String,
    breaker: BackendCircuitBreaker,
}

impl HttpBlacklistBackend {
    /// Creates a new `HttpBlacklistBackend`.
    ///
    /// # Arguments
    ///
    /// * `service` - The blacklist this client calls.
    /// * `url` - Endpoint receiving the JSON verification request.
    /// * `timeout` - Per-call timeout; expiry is reported as unavailable.
    pub fn new(service: ServiceName, url: String, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            BackendError::Request(format!("Failed to create {} client: {}", service, e))
        })?;

        Ok(Self {
            service,
            client,
            url,
            breaker: create_backend_circuit_breaker(),
        })
    }

    /// Turns a response body into a candidate. Anything that is not a JSON
    /// backend payload yields a candidate without status code.
    fn parse_body(&self, text: &str, http_status: u16) -> Option<CallCandidate> {
        if text.trim().is_empty() {
            tracing::warn!("{} returned an empty body (HTTP {})", self.service, http_status);
            return None;
        }

        let raw: Value = match serde_json::from_str(text) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("{} returned a non-JSON body: {}", self.service, e);
                return Some(CallCandidate {
                    status_code: None,
                    matched: false,
                    raw: Value::String(text.to_string()),
                    http_status,
                });
            }
        };

        match serde_json::from_value::<BackendPayload>(raw.clone()) {
            Ok(payload) => Some(CallCandidate::from_payload(&payload, raw, http_status)),
            Err(e) => {
                tracing::warn!("{} returned an unexpected payload shape: {}", self.service, e);
                Some(CallCandidate {
                    status_code: None,
                    matched: false,
                    raw,
                    http_status,
                })
            }
        }
    }
}

#[async_trait]
impl BlacklistBackend for HttpBlacklistBackend {
    async fn check(
        &self,
        request: &BackendCallRequest,
    ) -> Result<Option<CallCandidate>, BackendError> {
        tracing::info!("Calling {} at {}", self.service, self.url);

        let send = async {
            let mut builder = self.client.post(&self.url).json(request);
            for (name, value) in request.headers.pairs() {
                builder = builder.header(name, value);
            }
            let response = builder.send().await?;
            Ok::<reqwest::Response, BackendError>(response)
        };

        let response = match self.breaker.call(send).await {
            Ok(response) => response,
            Err(failsafe::Error::Inner(e)) => {
                tracing::error!("{} call failed: {}", self.service, e);
                return Err(e);
            }
            Err(failsafe::Error::Rejected) => {
                tracing::warn!("Circuit open for {}, failing fast", self.service);
                return Err(BackendError::Unavailable(format!(
                    "circuit open for {}",
                    self.service
                )));
            }
        };

        let http_status = response.status().as_u16();
        tracing::info!("HTTP status from {}: {}", self.service, http_status);

        let text = response.text().await?;
        let candidate = self.parse_body(&text, http_status);

        tracing::info!(
            target: "audit",
            service = %self.service,
            http_status,
            status_code = ?candidate.as_ref().and_then(|c| c.status_code),
            matched = candidate.as_ref().map(|c| c.matched).unwrap_or(false),
            "backend call completed"
        );
        tracing::debug!("{} response body: {}", self.service, text);

        Ok(candidate)
    }
}

/// The three backends consulted for every verification.
#[derive(Clone)]
pub struct Backends {
    defraudadores: Arc<dyn BlacklistBackend>,
    restringido: Arc<dyn BlacklistBackend>,
    externas: Arc<dyn BlacklistBackend>,
}

impl Backends {
    pub fn new(
        defraudadores: Arc<dyn BlacklistBackend>,
        restringido: Arc<dyn BlacklistBackend>,
        externas: Arc<dyn BlacklistBackend>,
    ) -> Self {
        Self {
            defraudadores,
            restringido,
            externas,
        }
    }

    /// Builds the HTTP clients for all three services from configuration.
    pub fn from_config(config: &Config) -> Result<Self, BackendError> {
        let timeout = Duration::from_secs(config.backend_timeout_secs);
        let client = |service: ServiceName| -> Result<Arc<dyn BlacklistBackend>, BackendError> {
            let url = config.service_url(service).to_string();
            Ok(Arc::new(HttpBlacklistBackend::new(service, url, timeout)?))
        };

        Ok(Self::new(
            client(ServiceName::Defraudadores)?,
            client(ServiceName::Restringido)?,
            client(ServiceName::Externas)?,
        ))
    }

    pub fn get(&self, service: ServiceName) -> Arc<dyn BlacklistBackend> {
        match service {
            ServiceName::Defraudadores => Arc::clone(&self.defraudadores),
            ServiceName::Restringido => Arc::clone(&self.restringido),
            ServiceName::Externas => Arc::clone(&self.externas),
        }
    }
}
