use std::sync::Arc;

use mockprep_provider::{SpeechToText, TranscriptionRequest};

use crate::config::TranscriptionConfig;

/// Turns recorded media into plain text. Every failure becomes an empty
/// transcript; the caller decides what an empty transcript means.
pub struct TranscriptionAdapter {
    stt: Arc<dyn SpeechToText>,
    model: String,
    language: Option<String>,
}

impl TranscriptionAdapter {
    pub fn new(stt: Arc<dyn SpeechToText>, config: &TranscriptionConfig) -> Self {
        Self {
            stt,
            model: config.model.clone(),
            language: config.language.clone(),
        }
    }

    pub async fn transcribe(&self, file_name: &str, media: Vec<u8>) -> String {
        if media.is_empty() {
            tracing::warn!(file_name, "skipping transcription of empty media");
            return String::new();
        }

        let mut request = TranscriptionRequest::new(self.model.clone(), file_name, media);
        request.language = self.language.clone();

        match self.stt.transcribe(request).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                tracing::warn!(file_name, retryable = e.is_retryable(), "transcription failed: {e}");
                String::new()
            }
        }
    }
}
