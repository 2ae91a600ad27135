use std::fmt::Write as _;
use std::sync::Arc;

use mockprep_provider::{LlmProvider, LlmRequest};
use mockprep_schema::{BehavioralInsights, CommunicationStyle, Readiness};
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::reply::{parse_object, string_field, string_list};
use crate::ScoringError;

/// One transcribed and scored answer, as fed to the insight prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredAnswer {
    pub question: String,
    pub transcript: String,
    pub score: f64,
}

pub struct InsightGenerator {
    llm: Arc<dyn LlmProvider>,
    config: LlmConfig,
}

impl InsightGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>, config: LlmConfig) -> Self {
        Self { llm, config }
    }

    /// One model call over every answer. Failures yield [`fallback_insights`].
    pub async fn generate(&self, answers: &[ScoredAnswer]) -> BehavioralInsights {
        match self.try_generate(answers).await {
            Ok(insights) => insights,
            Err(e) => {
                tracing::warn!(
                    answers = answers.len(),
                    "insight generation failed, using fallback: {e}"
                );
                fallback_insights()
            }
        }
    }

    pub async fn try_generate(
        &self,
        answers: &[ScoredAnswer],
    ) -> Result<BehavioralInsights, ScoringError> {
        let request = LlmRequest::json(self.config.model.clone(), build_prompt(answers))
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens);

        let reply = self.llm.chat(request).await?;
        parse_insights(&reply.text)
    }
}

pub fn build_prompt(answers: &[ScoredAnswer]) -> String {
    let mut summary = String::new();
    for (i, answer) in answers.iter().enumerate() {
        let _ = write!(
            summary,
            "\nQuestion {}: {}\nResponse: {}\nScore: {}/100\n",
            i + 1,
            answer.question,
            answer.transcript,
            answer.score
        );
    }

    format!(
        "You are an expert interview coach. Based on these interview responses, provide overall behavioral insights.

{summary}

Provide your analysis as a JSON object with these exact fields:
- \"overall_impression\": 2-3 sentences summarizing the candidate's overall interview performance
- \"communication_style\": one of \"confident\", \"articulate\", \"hesitant\", \"verbose\", \"concise\"
- \"strengths\": array of 3-4 key strengths across all responses
- \"development_areas\": array of 2-3 areas that need improvement
- \"interview_readiness\": one of \"ready\", \"almost_ready\", \"needs_practice\", \"beginner\"
- \"tips\": array of 3-4 actionable tips for improvement

Return ONLY valid JSON, no additional text."
    )
}

/// Unknown style reads as `unknown`, unknown readiness as `needs_practice`.
pub fn parse_insights(text: &str) -> Result<BehavioralInsights, ScoringError> {
    let obj = parse_object(text)?;
    Ok(BehavioralInsights {
        overall_impression: string_field(&obj, "overall_impression"),
        communication_style: CommunicationStyle::from_label(&string_field(
            &obj,
            "communication_style",
        )),
        strengths: string_list(&obj, "strengths"),
        development_areas: string_list(&obj, "development_areas"),
        readiness: Readiness::from_label(&string_field(&obj, "interview_readiness")),
        tips: string_list(&obj, "tips"),
    })
}

pub fn fallback_insights() -> BehavioralInsights {
    BehavioralInsights {
        overall_impression: "Unable to generate behavioral insights.".to_string(),
        communication_style: CommunicationStyle::Unknown,
        strengths: Vec::new(),
        development_areas: Vec::new(),
        readiness: Readiness::NeedsPractice,
        tips: vec![
            "Practice answering questions out loud".to_string(),
            "Record yourself and review".to_string(),
        ],
    }
}
