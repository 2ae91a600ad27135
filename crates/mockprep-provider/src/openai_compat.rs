//! Presets for OpenAI-compatible services.
//!
//! Chat and transcription share one base URL per service, so a provider id
//! from configuration resolves to both clients.

use crate::{OpenAiProvider, OpenAiTranscriber};

pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const OLLAMA_API_BASE: &str = "http://localhost:11434/v1";

/// Default base URL for a well-known provider id.
pub fn default_api_base(provider_id: &str) -> Option<&'static str> {
    match provider_id {
        "groq" => Some(GROQ_API_BASE),
        "openai" => Some(OPENAI_API_BASE),
        "ollama" => Some(OLLAMA_API_BASE),
        _ => None,
    }
}

/// Groq API - OpenAI compatible chat, hosted Whisper
/// https://console.groq.com/docs/api
pub fn groq(api_key: impl Into<String>) -> OpenAiProvider {
    OpenAiProvider::new(api_key, GROQ_API_BASE).with_label("groq")
}

pub fn groq_whisper(api_key: impl Into<String>) -> OpenAiTranscriber {
    OpenAiTranscriber::new(api_key, GROQ_API_BASE).with_label("groq")
}

pub fn openai(api_key: impl Into<String>) -> OpenAiProvider {
    OpenAiProvider::new(api_key, OPENAI_API_BASE)
}

pub fn openai_whisper(api_key: impl Into<String>) -> OpenAiTranscriber {
    OpenAiTranscriber::new(api_key, OPENAI_API_BASE)
}

/// Ollama local API - no key required, but the header must still be sent
pub fn ollama_with_base(base_url: impl Into<String>) -> OpenAiProvider {
    OpenAiProvider::new("ollama", base_url).with_label("ollama")
}

/// Custom OpenAI-compatible endpoint
pub fn custom(
    label: impl Into<String>,
    api_key: impl Into<String>,
    base_url: impl Into<String>,
) -> (OpenAiProvider, OpenAiTranscriber) {
    let label = label.into();
    let api_key = api_key.into();
    let base_url = base_url.into();
    (
        OpenAiProvider::new(api_key.clone(), base_url.clone()).with_label(label.clone()),
        OpenAiTranscriber::new(api_key, base_url).with_label(label),
    )
}
