pub mod error;
pub mod openai;
pub mod openai_compat;
pub mod transcription;
pub mod types;

use async_trait::async_trait;

pub use error::{ProviderError, ProviderErrorKind};
pub use openai::OpenAiProvider;
pub use openai_compat::{
    custom, default_api_base, groq, groq_whisper, ollama_with_base, openai, openai_whisper,
};
pub use transcription::OpenAiTranscriber;
pub use types::*;

/// Language-model provider used for scoring and insight generation.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse, ProviderError>;
}

/// Remote speech-to-text provider.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, request: TranscriptionRequest) -> Result<String, ProviderError>;
}
