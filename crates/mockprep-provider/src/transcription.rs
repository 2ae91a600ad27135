use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;

use crate::openai::api_error;
use crate::{ProviderError, SpeechToText, TranscriptionRequest};

const TRANSCRIBE_TIMEOUT_SECS: u64 = 120;

/// Speech-to-text client for OpenAI-compatible `/audio/transcriptions`
/// endpoints (OpenAI Whisper, Groq Whisper, local whisper servers).
#[derive(Debug, Clone)]
pub struct OpenAiTranscriber {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    label: String,
}

impl OpenAiTranscriber {
    pub fn new(api_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(TRANSCRIBE_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            label: "openai".to_string(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    fn build_form(request: TranscriptionRequest) -> Result<Form, ProviderError> {
        let mime = mime_guess::from_path(&request.file_name).first_or_octet_stream();
        let part = Part::bytes(request.audio)
            .file_name(request.file_name)
            .mime_str(mime.as_ref())?;

        let mut form = Form::new()
            .part("file", part)
            .text("model", request.model)
            .text("response_format", "text");
        if let Some(language) = request.language {
            form = form.text("language", language);
        }
        Ok(form)
    }
}

#[async_trait]
impl SpeechToText for OpenAiTranscriber {
    async fn transcribe(&self, request: TranscriptionRequest) -> Result<String, ProviderError> {
        let url = format!("{}/audio/transcriptions", self.api_base);
        tracing::debug!(
            provider = %self.label,
            model = %request.model,
            file_name = %request.file_name,
            bytes = request.audio.len(),
            "sending transcription request"
        );
        let form = Self::build_form(request)?;

        let resp = self
            .client
            .post(url)
            .header("authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderError::from_send(&self.label, TRANSCRIBE_TIMEOUT_SECS, e))?;

        let status = resp.status();
        let text = resp.text().await?;
        if status != StatusCode::OK {
            return Err(api_error(&self.label, status, &text));
        }

        Ok(text.trim().to_string())
    }
}
