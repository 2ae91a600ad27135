use std::sync::Arc;

use mockprep_provider::{LlmProvider, LlmRequest};
use mockprep_schema::Evaluation;

use crate::config::LlmConfig;
use crate::reply::{number_field, parse_object, string_field, string_list};
use crate::ScoringError;

const DEFAULT_SCORE: f64 = 50.0;
const FALLBACK_FEEDBACK: &str = "Could not analyze this response.";

/// Scores one transcribed answer with a JSON-mode model call.
pub struct ResponseScorer {
    llm: Arc<dyn LlmProvider>,
    config: LlmConfig,
}

impl ResponseScorer {
    pub fn new(llm: Arc<dyn LlmProvider>, config: LlmConfig) -> Self {
        Self { llm, config }
    }

    /// Never fails: any provider or parse error yields [`fallback_evaluation`].
    pub async fn score(&self, question: &str, transcript: &str, hint: Option<&str>) -> Evaluation {
        match self.try_score(question, transcript, hint).await {
            Ok(evaluation) => evaluation,
            Err(e) => {
                tracing::warn!(model = %self.config.model, "scoring failed, using fallback: {e}");
                fallback_evaluation()
            }
        }
    }

    pub async fn try_score(
        &self,
        question: &str,
        transcript: &str,
        hint: Option<&str>,
    ) -> Result<Evaluation, ScoringError> {
        let request = LlmRequest::json(
            self.config.model.clone(),
            build_prompt(question, transcript, hint),
        )
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens);

        let reply = self.llm.chat(request).await?;
        tracing::debug!(
            output_tokens = ?reply.output_tokens,
            stop_reason = ?reply.stop_reason,
            "scoring reply received"
        );
        parse_evaluation(&reply.text)
    }
}

pub fn build_prompt(question: &str, transcript: &str, hint: Option<&str>) -> String {
    let hint_line = match hint.map(str::trim) {
        Some(hint) if !hint.is_empty() => format!("Tips for this question: {hint}"),
        _ => String::new(),
    };

    format!(
        "You are an expert interview coach. Analyze this interview response and provide a detailed evaluation.

Question: {question}

Candidate's Response (transcript): {transcript}

{hint_line}

Provide your evaluation as a JSON object with these exact fields:
- \"score\": overall score from 0-100
- \"feedback\": 2-3 sentences of constructive feedback
- \"strengths\": array of 2-3 specific strengths observed
- \"improvements\": array of 2-3 specific areas for improvement
- \"communication_score\": score from 0-100 for communication clarity
- \"relevance_score\": score from 0-100 for answer relevance to the question
- \"structure_score\": score from 0-100 for answer structure and organization

Return ONLY valid JSON, no additional text."
    )
}

/// Missing numbers read as 50, missing text and lists as empty. All four
/// numbers come back clamped into [0, 100].
pub fn parse_evaluation(text: &str) -> Result<Evaluation, ScoringError> {
    let obj = parse_object(text)?;
    let evaluation = Evaluation {
        score: number_field(&obj, "score", DEFAULT_SCORE)?,
        feedback: string_field(&obj, "feedback"),
        strengths: string_list(&obj, "strengths"),
        improvements: string_list(&obj, "improvements"),
        communication_score: number_field(&obj, "communication_score", DEFAULT_SCORE)?,
        relevance_score: number_field(&obj, "relevance_score", DEFAULT_SCORE)?,
        structure_score: number_field(&obj, "structure_score", DEFAULT_SCORE)?,
    };
    Ok(evaluation.clamped())
}

pub fn fallback_evaluation() -> Evaluation {
    Evaluation {
        score: 0.0,
        feedback: FALLBACK_FEEDBACK.to_string(),
        strengths: Vec::new(),
        improvements: Vec::new(),
        communication_score: 0.0,
        relevance_score: 0.0,
        structure_score: 0.0,
    }
}
