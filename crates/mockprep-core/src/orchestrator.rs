use std::sync::Arc;

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use mockprep_provider::{LlmProvider, SpeechToText};
use mockprep_schema::{AnalysisStatus, Response, Session, SessionStatus};
use serde::Serialize;
use uuid::Uuid;

use super::affect::estimate_confidence;
use super::aggregate::{emotion_summary, mean_score};
use super::config::PipelineConfig;
use super::insights::{InsightGenerator, ScoredAnswer};
use super::scorer::ResponseScorer;
use super::store::{MediaStore, SessionStore};
use super::transcribe::TranscriptionAdapter;
use crate::{AnalysisError, StoreError};

const NO_SPEECH_FEEDBACK: &str = "No speech detected in recording.";
const ANALYSIS_INCOMPLETE_FEEDBACK: &str = "AI analysis could not be completed. Please try again.";

/// Result of one response's pipeline.
#[derive(Debug)]
pub enum ResponseOutcome {
    /// `scored` is `None` when no speech was detected.
    Completed {
        response_id: Uuid,
        scored: Option<ScoredAnswer>,
    },
    Failed {
        response_id: Uuid,
        cause: AnalysisError,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub session_id: Uuid,
    pub completed: usize,
    pub failed: usize,
    /// Responses without media; untouched by the pass.
    pub skipped: usize,
    /// Completed responses that had speech and received a score.
    pub scored: usize,
    pub overall_score: Option<f64>,
}

pub struct SessionAnalyzer {
    transcriber: TranscriptionAdapter,
    scorer: ResponseScorer,
    insights: InsightGenerator,
    media: Arc<dyn MediaStore>,
    store: Arc<dyn SessionStore>,
    max_concurrent: usize,
}

impl SessionAnalyzer {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        stt: Arc<dyn SpeechToText>,
        media: Arc<dyn MediaStore>,
        store: Arc<dyn SessionStore>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            transcriber: TranscriptionAdapter::new(stt, &config.transcription),
            scorer: ResponseScorer::new(llm.clone(), config.llm.clone()),
            insights: InsightGenerator::new(llm, config.llm.clone()),
            media,
            store,
            max_concurrent: 1,
        }
    }

    /// Analyze up to `max_concurrent` responses at once. Values below 1 are
    /// treated as 1.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Runs one analysis pass over `session`, mutating it in place.
    ///
    /// Per-response failures are recorded on the response and never abort
    /// the pass. The only error is a failure to persist the session itself.
    pub async fn analyze_session(&self, session: &mut Session) -> Result<AnalysisReport, StoreError> {
        let session_id = session.id;
        let skipped = session.responses.iter().filter(|r| r.media.is_none()).count();
        tracing::info!(
            %session_id,
            responses = session.responses.len(),
            skipped,
            max_concurrent = self.max_concurrent,
            "starting session analysis"
        );

        // buffered() yields in input order, so outcomes follow session order
        let outcomes: Vec<ResponseOutcome> = stream::iter(
            session
                .responses
                .iter_mut()
                .filter(|response| response.media.is_some()),
        )
        .map(|response| self.analyze_response(response))
        .buffered(self.max_concurrent)
        .collect()
        .await;

        let mut completed = 0;
        let mut failed = 0;
        let mut answers = Vec::new();
        for outcome in outcomes {
            match outcome {
                ResponseOutcome::Completed { scored, .. } => {
                    completed += 1;
                    answers.extend(scored);
                }
                ResponseOutcome::Failed { .. } => failed += 1,
            }
        }

        // every pass re-derives the session fields, so nothing scored clears them
        if answers.is_empty() {
            session.overall_feedback.clear();
            session.behavioral_insights = None;
        } else {
            let insights = self.insights.generate(&answers).await;
            session.overall_feedback = insights.overall_impression.clone();
            session.behavioral_insights = Some(insights);
        }

        let scores: Vec<f64> = answers.iter().map(|answer| answer.score).collect();
        session.overall_score = mean_score(&scores);
        session.emotion_summary = emotion_summary(
            session
                .responses
                .iter()
                .filter(|r| r.media.is_some())
                .filter_map(|r| r.emotion_data.as_ref()),
        );
        session.status = SessionStatus::Analyzed;
        self.store.save_session(session).await?;

        let report = AnalysisReport {
            session_id,
            completed,
            failed,
            skipped,
            scored: answers.len(),
            overall_score: session.overall_score,
        };
        tracing::info!(
            %session_id,
            completed,
            failed,
            scored = report.scored,
            overall_score = ?report.overall_score,
            "session analysis finished"
        );
        Ok(report)
    }

    /// Loads the session from the store, analyzes it, and returns the
    /// mutated session.
    pub async fn analyze_session_by_id(
        &self,
        session_id: Uuid,
    ) -> Result<(Session, AnalysisReport), StoreError> {
        let mut session = self.store.load_session(session_id).await?;
        let report = self.analyze_session(&mut session).await?;
        Ok((session, report))
    }

    /// Marks the session completed, then analyzes it. If analysis cannot be
    /// persisted the session keeps a retry notice as its overall feedback and
    /// the report is `None`.
    pub async fn complete_and_analyze(
        &self,
        session_id: Uuid,
    ) -> Result<(Session, Option<AnalysisReport>), StoreError> {
        let mut session = self.store.load_session(session_id).await?;
        session.status = SessionStatus::Completed;
        session.completed_at = Some(Utc::now());
        self.store.save_session(&session).await?;

        match self.analyze_session(&mut session).await {
            Ok(report) => Ok((session, Some(report))),
            Err(e) => {
                tracing::error!(%session_id, "session analysis failed: {e}");
                session.overall_feedback = ANALYSIS_INCOMPLETE_FEEDBACK.to_string();
                if let Err(e) = self.store.save_session(&session).await {
                    tracing::warn!(%session_id, "failed to record analysis failure: {e}");
                }
                Ok((session, None))
            }
        }
    }

    async fn analyze_response(&self, response: &mut Response) -> ResponseOutcome {
        let response_id = response.id;
        match self.run_pipeline(response).await {
            Ok(scored) => ResponseOutcome::Completed { response_id, scored },
            Err(cause) => {
                tracing::error!(
                    session_id = %response.session_id,
                    %response_id,
                    "response analysis failed: {cause}"
                );
                self.persist_failure(response).await;
                ResponseOutcome::Failed { response_id, cause }
            }
        }
    }

    /// Stores `analyzing` again before `failed`: the store may still hold
    /// `pending` if the first status write failed, and `pending -> failed` is
    /// not a valid transition. Rewriting the current status is accepted.
    async fn persist_failure(&self, response: &mut Response) {
        for status in [AnalysisStatus::Analyzing, AnalysisStatus::Failed] {
            response.analysis_status = status;
            if let Err(e) = self.store.update_analysis_status(response).await {
                tracing::warn!(response_id = %response.id, %status, "failed to persist status: {e}");
            }
        }
    }

    async fn run_pipeline(
        &self,
        response: &mut Response,
    ) -> Result<Option<ScoredAnswer>, AnalysisError> {
        let media = response.media.clone().ok_or(AnalysisError::MissingMedia)?;
        let response_id = response.id;

        response.analysis_status = AnalysisStatus::Analyzing;
        self.store
            .update_analysis_status(response)
            .await
            .map_err(AnalysisError::Persist)?;

        let bytes = self.media.open(&media).await.map_err(AnalysisError::Media)?;
        tracing::debug!(%response_id, bytes = bytes.len(), "transcribing");
        let transcript = self.transcriber.transcribe(media.file_name(), bytes).await;
        response.transcript = transcript.clone();

        let scored = if transcript.is_empty() {
            tracing::debug!(%response_id, "no speech detected");
            response.ai_score = Some(0.0);
            response.ai_feedback = Some(no_speech_feedback());
            None
        } else {
            tracing::debug!(%response_id, "scoring");
            let evaluation = self
                .scorer
                .score(
                    &response.question_text,
                    &transcript,
                    response.question_hint.as_deref(),
                )
                .await;
            response.ai_score = Some(evaluation.score);
            response.ai_feedback = Some(serde_json::to_value(&evaluation)?);
            Some(ScoredAnswer {
                question: response.question_text.clone(),
                transcript,
                score: evaluation.score,
            })
        };

        if let Some(emotions) = &response.emotion_data {
            response.confidence_score = Some(estimate_confidence(Some(emotions)));
        }

        response.analysis_status = AnalysisStatus::Completed;
        self.store
            .save_response(response)
            .await
            .map_err(AnalysisError::Persist)?;
        Ok(scored)
    }
}

fn no_speech_feedback() -> serde_json::Value {
    serde_json::json!({
        "score": 0,
        "feedback": NO_SPEECH_FEEDBACK,
        "strengths": [],
        "improvements": ["Ensure your microphone is working", "Speak clearly"],
    })
}
