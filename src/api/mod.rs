//! JSON payloads exchanged with the generation endpoint.
//!
//! Field names are camelCase on the wire. Domain types live in [`crate::core`];
//! these structs exist only to pin the wire contract.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::params::ModelParameters;

/// Sampling parameters as they may arrive at the request boundary: every
/// field optional. Absent fields take the builtin defaults at request-build
/// time; present values pass through verbatim, zero included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
}

impl RequestParameters {
    /// Fill in the builtin default for each absent field.
    ///
    /// Uses `Option::unwrap_or`, never truthiness, so a supplied `0` or `0.0`
    /// survives resolution.
    pub fn resolve(&self) -> ModelParameters {
        let defaults = ModelParameters::default();
        ModelParameters {
            temperature: self.temperature.unwrap_or(defaults.temperature),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            top_p: self.top_p.unwrap_or(defaults.top_p),
            frequency_penalty: self
                .frequency_penalty
                .unwrap_or(defaults.frequency_penalty),
            presence_penalty: self.presence_penalty.unwrap_or(defaults.presence_penalty),
        }
    }
}

impl From<ModelParameters> for RequestParameters {
    fn from(p: ModelParameters) -> Self {
        RequestParameters {
            temperature: Some(p.temperature),
            max_tokens: Some(p.max_tokens),
            top_p: Some(p.top_p),
            frequency_penalty: Some(p.frequency_penalty),
            presence_penalty: Some(p.presence_penalty),
        }
    }
}

/// Body of `POST /api/chat`.
#[derive(Debug, Serialize)]
pub struct GenerateRequest {
    pub message: String,
    pub model: String,
    pub parameters: ModelParameters,
}

/// Response envelope of `POST /api/chat`.
///
/// `success: true` does not prove a real model answer: providers deliver
/// quota and rate-limit degradation through this same envelope with fallback
/// text in `response`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub success: bool,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub parameters: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One entry of `GET /api/templates`.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub content: String,
}
