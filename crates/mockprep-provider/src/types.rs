use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmMessage {
    pub role: String,
    pub content: String,
}

impl LlmMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: text.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<LlmMessage>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Ask the provider for a single JSON object instead of free text.
    #[serde(default)]
    pub json_mode: bool,
}

fn default_max_tokens() -> u32 {
    1000
}

impl LlmRequest {
    pub fn simple(model: String, system: Option<String>, user: String) -> Self {
        Self {
            model,
            system,
            messages: vec![LlmMessage::user(user)],
            max_tokens: default_max_tokens(),
            temperature: None,
            json_mode: false,
        }
    }

    pub fn json(model: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            json_mode: true,
            ..Self::simple(model.into(), None, user.into())
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    pub stop_reason: Option<String>,
}

/// Recorded media handed to a speech-to-text provider.
#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    pub model: String,
    pub file_name: String,
    pub audio: Vec<u8>,
    pub language: Option<String>,
}

impl TranscriptionRequest {
    pub fn new(model: impl Into<String>, file_name: impl Into<String>, audio: Vec<u8>) -> Self {
        Self {
            model: model.into(),
            file_name: file_name.into(),
            audio,
            language: None,
        }
    }
}
