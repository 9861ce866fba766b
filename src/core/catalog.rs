use serde::{Deserialize, Serialize};

/// Model id selected when nothing else is configured.
pub const DEFAULT_MODEL_ID: &str = "gemini-flash";

/// One entry in the model catalog, as served by `GET /api/models` and
/// mirrored by the builtin list below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f64,
    pub provider: String,
    #[serde(default)]
    pub disabled: bool,
}

/// The catalog shipped with the binary, used when the remote catalog
/// endpoint is unreachable and for offline listings.
pub fn builtin_models() -> Vec<ModelEntry> {
    vec![
        ModelEntry {
            id: "gemini-flash".to_string(),
            name: "Gemini Flash".to_string(),
            description: "Fast and efficient, great for quick responses (Recommended)".to_string(),
            max_tokens: 16384,
            temperature: 0.7,
            provider: "Google".to_string(),
            disabled: false,
        },
        ModelEntry {
            id: "gemini-pro".to_string(),
            name: "Gemini Pro".to_string(),
            description: "Most capable Gemini model, excellent for complex tasks".to_string(),
            max_tokens: 32768,
            temperature: 0.7,
            provider: "Google".to_string(),
            disabled: false,
        },
        ModelEntry {
            id: "gpt-3.5-turbo".to_string(),
            name: "GPT-3.5 Turbo".to_string(),
            description: "OpenAI model (requires API key)".to_string(),
            max_tokens: 4096,
            temperature: 0.7,
            provider: "OpenAI".to_string(),
            disabled: true,
        },
        ModelEntry {
            id: "gpt-4".to_string(),
            name: "GPT-4 (Premium)".to_string(),
            description: "Most capable GPT model (Premium access required)".to_string(),
            max_tokens: 8192,
            temperature: 0.7,
            provider: "OpenAI".to_string(),
            disabled: true,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_is_in_the_builtin_catalog_and_enabled() {
        let models = builtin_models();
        let default = models
            .iter()
            .find(|m| m.id == DEFAULT_MODEL_ID)
            .expect("default model present");
        assert!(!default.disabled);
    }

    #[test]
    fn catalog_entries_parse_from_wire_json() {
        let json = r#"{"id":"gemini-pro","name":"Gemini Pro","provider":"Google","disabled":true}"#;
        let entry: ModelEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.id, "gemini-pro");
        assert!(entry.disabled);
        assert_eq!(entry.max_tokens, 0);
    }
}
