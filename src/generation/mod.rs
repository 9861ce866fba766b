//! Outbound generation requests and the failure taxonomy that keeps the chat
//! alive when the provider is not.
//!
//! One request per submission, no retries. Provider-side failures are
//! classified in a single place ([`classify_provider_failure`]) and mapped to
//! human-readable fallback replies; only a transport failure surfaces to the
//! session manager as a hard error.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::sync::mpsc;
use tracing::debug;

use crate::api::{GenerateRequest, GenerateResponse, RequestParameters, TemplateEntry};
use crate::core::catalog::ModelEntry;
use crate::utils::url::construct_api_url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3001";

/// Public model id → provider model identifier. Unknown ids never fail;
/// they fall back silently to the default mapping.
const PROVIDER_MODELS: &[(&str, &str)] = &[
    ("gemini-flash", "gemini-1.5-flash"),
    ("gemini-pro", "gemini-1.5-pro"),
];

const FALLBACK_PROVIDER_MODEL: &str = "gemini-1.5-flash";

pub fn provider_model_id(model: &str) -> &'static str {
    PROVIDER_MODELS
        .iter()
        .find(|(id, _)| *id == model)
        .map(|(_, provider_id)| *provider_id)
        .unwrap_or(FALLBACK_PROVIDER_MODEL)
}

/// Why a generation request yielded no usable text.
///
/// The first three variants are provider-side degradation and carry a
/// synthesized reply via [`GenerationError::degraded_reply`]; `Network` means
/// the call never produced a readable response and is the only variant the
/// session manager answers with its fixed local apology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    RateLimited(String),
    QuotaExceeded(String),
    TransientProvider(String),
    Network(String),
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::RateLimited(detail) => write!(f, "rate limited: {detail}"),
            GenerationError::QuotaExceeded(detail) => write!(f, "quota exceeded: {detail}"),
            GenerationError::TransientProvider(detail) => write!(f, "provider error: {detail}"),
            GenerationError::Network(detail) => write!(f, "network error: {detail}"),
        }
    }
}

impl std::error::Error for GenerationError {}

impl GenerationError {
    pub fn is_network(&self) -> bool {
        matches!(self, GenerationError::Network(_))
    }

    /// The human-readable fallback delivered through the normal reply path
    /// for provider-side degradation. `None` for transport failures.
    pub fn degraded_reply(&self, user_text: &str) -> Option<String> {
        let lead = match self {
            GenerationError::RateLimited(_) => {
                "I've reached my daily request limit. Please try again tomorrow or wait a few hours for the quota to reset."
            }
            GenerationError::QuotaExceeded(_) => {
                "I've exceeded my API quota. Please try again later."
            }
            GenerationError::TransientProvider(_) => {
                "I'm experiencing a technical issue right now."
            }
            GenerationError::Network(_) => return None,
        };

        Some(format!(
            "{lead}\n\nI'd still like to help you with \"{user_text}\".\n\n\
             Here are some suggestions:\n\
             • Try again in a few hours\n\
             • Ask a simpler question\n\
             • Check back tomorrow\n\n\
             I'm here to help with programming, general knowledge, writing, analysis, and many other topics. What would you like to know?"
        ))
    }
}

/// Sort a failed provider response into the taxonomy.
///
/// Rate-limit vs quota classification is a substring heuristic over the body
/// because the provider does not always supply a structured code; it is
/// quarantined here so a structured code can replace it in one place.
pub fn classify_provider_failure(status: StatusCode, body: &str) -> GenerationError {
    let detail = collapse_whitespace(body);
    let detail = if detail.is_empty() {
        status.to_string()
    } else {
        detail
    };

    if status == StatusCode::TOO_MANY_REQUESTS {
        GenerationError::RateLimited(detail)
    } else if detail.to_ascii_lowercase().contains("quota") {
        GenerationError::QuotaExceeded(detail)
    } else {
        GenerationError::TransientProvider(detail)
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Everything the backend needs to answer one submission. Produced by the
/// session manager at submit time so the snapshot cannot drift while the
/// request is in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRequest {
    pub session_id: String,
    pub message: String,
    pub model: String,
    pub parameters: RequestParameters,
}

/// Seam between the session manager and the transport, so tests and one-shot
/// flows can swap the HTTP client out.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, request: &ExchangeRequest) -> Result<String, GenerationError>;
}

/// HTTP client for the generation endpoint.
pub struct GenerationClient {
    http: reqwest::Client,
    base_url: String,
}

impl GenerationClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        GenerationClient {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send one generation request and normalize the result.
    ///
    /// The provider receives concrete parameters: absent fields take the
    /// builtin defaults, supplied values pass through verbatim.
    pub async fn generate(
        &self,
        message: &str,
        model: &str,
        parameters: &RequestParameters,
    ) -> Result<String, GenerationError> {
        let request = GenerateRequest {
            message: message.to_string(),
            model: provider_model_id(model).to_string(),
            parameters: parameters.resolve(),
        };

        let url = construct_api_url(&self.base_url, "api/chat");
        debug!(model = request.model.as_str(), "sending generation request");

        let response = self
            .http
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = classify_provider_failure(status, &body);
            debug!(%status, %error, "generation request failed");
            return Err(error);
        }

        let envelope: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        if envelope.success {
            Ok(envelope.response)
        } else {
            Err(GenerationError::TransientProvider(
                envelope
                    .error
                    .unwrap_or_else(|| "provider reported failure without detail".to_string()),
            ))
        }
    }

    /// Fetch the remote model catalog (`GET /api/models`).
    pub async fn fetch_models(&self) -> Result<Vec<ModelEntry>, GenerationError> {
        self.fetch_catalog("api/models").await
    }

    /// Fetch the remote template catalog (`GET /api/templates`).
    pub async fn fetch_templates(&self) -> Result<Vec<TemplateEntry>, GenerationError> {
        self.fetch_catalog("api/templates").await
    }

    async fn fetch_catalog<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
    ) -> Result<Vec<T>, GenerationError> {
        let url = construct_api_url(&self.base_url, endpoint);
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_provider_failure(status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))
    }
}

#[async_trait]
impl GenerationBackend for GenerationClient {
    async fn generate(&self, request: &ExchangeRequest) -> Result<String, GenerationError> {
        GenerationClient::generate(self, &request.message, &request.model, &request.parameters)
            .await
    }
}

/// Resolution of one spawned exchange, delivered back to the event loop.
#[derive(Debug)]
pub struct ExchangeOutcome {
    pub session_id: String,
    pub reply: Result<String, GenerationError>,
}

/// Runs generation requests off the event loop.
///
/// Every spawn sends exactly one [`ExchangeOutcome`] on every path, so the
/// session manager can rely on one completion per started exchange.
#[derive(Clone)]
pub struct GenerationService {
    backend: Arc<dyn GenerationBackend>,
    tx: mpsc::UnboundedSender<ExchangeOutcome>,
}

impl GenerationService {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
    ) -> (Self, mpsc::UnboundedReceiver<ExchangeOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (GenerationService { backend, tx }, rx)
    }

    pub fn spawn_exchange(&self, request: ExchangeRequest) {
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let reply = backend.generate(&request).await;
            let _ = tx.send(ExchangeOutcome {
                session_id: request.session_id,
                reply,
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedBackend(Result<String, GenerationError>);

    #[async_trait]
    impl GenerationBackend for CannedBackend {
        async fn generate(&self, _request: &ExchangeRequest) -> Result<String, GenerationError> {
            self.0.clone()
        }
    }

    fn request(session_id: &str) -> ExchangeRequest {
        ExchangeRequest {
            session_id: session_id.to_string(),
            message: "Hello".to_string(),
            model: "gemini-flash".to_string(),
            parameters: RequestParameters::default(),
        }
    }

    #[test]
    fn unknown_models_fall_back_to_the_default_mapping() {
        assert_eq!(provider_model_id("gemini-pro"), "gemini-1.5-pro");
        assert_eq!(provider_model_id("gemini-flash"), "gemini-1.5-flash");
        assert_eq!(provider_model_id("gpt-4"), "gemini-1.5-flash");
        assert_eq!(provider_model_id(""), "gemini-1.5-flash");
    }

    #[test]
    fn http_429_classifies_as_rate_limited() {
        let error = classify_provider_failure(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert_eq!(error, GenerationError::RateLimited("slow down".to_string()));
    }

    #[test]
    fn quota_mentions_classify_as_quota_exceeded() {
        let error = classify_provider_failure(
            StatusCode::FORBIDDEN,
            "{\"error\": \"Daily QUOTA exhausted\"}",
        );
        assert!(matches!(error, GenerationError::QuotaExceeded(_)));
    }

    #[test]
    fn other_provider_failures_are_transient() {
        let error = classify_provider_failure(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert_eq!(
            error,
            GenerationError::TransientProvider("boom".to_string())
        );
    }

    #[test]
    fn empty_bodies_fall_back_to_the_status_line() {
        let error = classify_provider_failure(StatusCode::BAD_GATEWAY, "  \n ");
        assert_eq!(
            error,
            GenerationError::TransientProvider("502 Bad Gateway".to_string())
        );
    }

    #[test]
    fn degraded_replies_quote_the_user_and_encourage_retry() {
        let error = GenerationError::RateLimited("429".to_string());
        let reply = error.degraded_reply("explain lifetimes").unwrap();

        assert!(reply.starts_with("I've reached my daily request limit."));
        assert!(reply.contains("\"explain lifetimes\""));
        assert!(reply.contains("Try again in a few hours"));
    }

    #[test]
    fn network_failures_have_no_degraded_reply() {
        let error = GenerationError::Network("connection refused".to_string());
        assert!(error.degraded_reply("anything").is_none());
        assert!(error.is_network());
    }

    #[tokio::test]
    async fn service_delivers_exactly_one_outcome_per_spawn() {
        let backend = Arc::new(CannedBackend(Ok("Hi there!".to_string())));
        let (service, mut rx) = GenerationService::new(backend);

        service.spawn_exchange(request("s1"));

        let outcome = rx.recv().await.expect("one outcome");
        assert_eq!(outcome.session_id, "s1");
        assert_eq!(outcome.reply, Ok("Hi there!".to_string()));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn service_delivers_failures_too() {
        let backend = Arc::new(CannedBackend(Err(GenerationError::Network(
            "unreachable".to_string(),
        ))));
        let (service, mut rx) = GenerationService::new(backend);

        service.spawn_exchange(request("s2"));

        let outcome = rx.recv().await.expect("one outcome");
        assert!(outcome.reply.unwrap_err().is_network());
    }
}
