use serde::{Deserialize, Serialize};

/// Sampling configuration forwarded verbatim to the generation provider.
///
/// No cross-field invariant exists and no range validation happens here;
/// slider bounds in the presentation layer are the only enforcement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelParameters {
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
}

impl Default for ModelParameters {
    fn default() -> Self {
        ModelParameters {
            temperature: 0.7,
            max_tokens: 1000,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

/// Partial update merged into [`ModelParameters`]. `None` leaves the field
/// unchanged; a supplied value is taken verbatim, including zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterUpdate {
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

/// Holds the current sampling configuration and the currently selected model.
pub struct ParameterStore {
    current: ModelParameters,
    model: String,
}

impl ParameterStore {
    pub fn new(model: impl Into<String>) -> Self {
        ParameterStore {
            current: ModelParameters::default(),
            model: model.into(),
        }
    }

    pub fn get(&self) -> ModelParameters {
        self.current
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    /// Merge the supplied fields into the current value and return the result.
    pub fn apply(&mut self, update: ParameterUpdate) -> ModelParameters {
        if let Some(temperature) = update.temperature {
            self.current.temperature = temperature;
        }
        if let Some(max_tokens) = update.max_tokens {
            self.current.max_tokens = max_tokens;
        }
        if let Some(top_p) = update.top_p {
            self.current.top_p = top_p;
        }
        if let Some(frequency_penalty) = update.frequency_penalty {
            self.current.frequency_penalty = frequency_penalty;
        }
        if let Some(presence_penalty) = update.presence_penalty {
            self.current.presence_penalty = presence_penalty;
        }
        self.current
    }

    pub fn reset(&mut self) -> ModelParameters {
        self.current = ModelParameters::default();
        self.current
    }
}
