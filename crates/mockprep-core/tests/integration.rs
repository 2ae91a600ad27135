use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mockprep_core::*;
use mockprep_provider::{
    LlmProvider, LlmRequest, LlmResponse, ProviderError, SpeechToText, TranscriptionRequest,
};
use mockprep_schema::{
    AnalysisStatus, CommunicationStyle, EmotionData, MediaRef, Readiness, Response, Session,
    SessionStatus, SessionType,
};
use uuid::Uuid;

const INSIGHTS_REPLY: &str = r#"{
    "overall_impression": "Strong and structured answers.",
    "communication_style": "articulate",
    "strengths": ["Clear examples"],
    "development_areas": ["Pacing"],
    "interview_readiness": "almost_ready",
    "tips": ["Slow down"]
}"#;

/// Maps transcripts to scoring replies and answers insight prompts with a
/// fixed reply.
#[derive(Default)]
struct ScriptedLlm {
    scores: HashMap<String, String>,
    insights: Option<String>,
    insight_prompts: Mutex<Vec<String>>,
    scoring_calls: AtomicUsize,
}

impl ScriptedLlm {
    fn new() -> Self {
        Self {
            insights: Some(INSIGHTS_REPLY.to_string()),
            ..Self::default()
        }
    }

    fn score(mut self, transcript: &str, score: u32) -> Self {
        self.scores.insert(
            transcript.to_string(),
            format!(
                r#"{{"score": {score}, "feedback": "ok", "strengths": [], "improvements": [], "communication_score": {score}, "relevance_score": {score}, "structure_score": {score}}}"#
            ),
        );
        self
    }

    fn reply(mut self, transcript: &str, reply: &str) -> Self {
        self.scores.insert(transcript.to_string(), reply.to_string());
        self
    }

    fn without_insights(mut self) -> Self {
        self.insights = None;
        self
    }

    fn insight_prompts(&self) -> Vec<String> {
        self.insight_prompts.lock().unwrap().clone()
    }
}

fn text_reply(text: &str) -> LlmResponse {
    LlmResponse {
        text: text.to_string(),
        input_tokens: None,
        output_tokens: None,
        stop_reason: Some("end_turn".into()),
    }
}

fn forced_failure() -> ProviderError {
    ProviderError::EmptyReply {
        provider: "scripted".into(),
        reason: "forced failure".into(),
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse, ProviderError> {
        assert!(request.json_mode);
        let prompt = request.messages[0].content.clone();
        if prompt.contains("overall behavioral insights") {
            self.insight_prompts.lock().unwrap().push(prompt);
            return self
                .insights
                .as_deref()
                .map(text_reply)
                .ok_or_else(forced_failure);
        }

        self.scoring_calls.fetch_add(1, Ordering::SeqCst);
        self.scores
            .iter()
            .find(|(transcript, _)| prompt.contains(&format!("(transcript): {transcript}\n")))
            .map(|(_, reply)| text_reply(reply))
            .ok_or_else(forced_failure)
    }
}

/// Transcribes by file name; unknown files fail.
#[derive(Default)]
struct ScriptedStt {
    transcripts: HashMap<String, String>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedStt {
    fn with(pairs: &[(&str, &str)]) -> Self {
        Self {
            transcripts: pairs
                .iter()
                .map(|(file, text)| (file.to_string(), text.to_string()))
                .collect(),
            ..Self::default()
        }
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl SpeechToText for ScriptedStt {
    async fn transcribe(&self, request: TranscriptionRequest) -> Result<String, ProviderError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.transcripts
            .get(&request.file_name)
            .cloned()
            .ok_or_else(forced_failure)
    }
}

struct Harness {
    analyzer: SessionAnalyzer,
    store: Arc<MemorySessionStore>,
    llm: Arc<ScriptedLlm>,
    stt: Arc<ScriptedStt>,
}

async fn harness(llm: ScriptedLlm, stt: ScriptedStt, session: &Session) -> Harness {
    let llm = Arc::new(llm);
    let stt = Arc::new(stt);
    let media = Arc::new(MemoryMediaStore::new());
    for response in &session.responses {
        if let Some(media_ref) = &response.media {
            if !media_ref.as_str().contains("missing") {
                media.put(media_ref.as_str(), vec![0x1a, 0x45, 0xdf, 0xa3]).await;
            }
        }
    }
    let store = Arc::new(MemorySessionStore::new());
    store.insert(session.clone()).await;

    let analyzer = SessionAnalyzer::new(
        llm.clone(),
        stt.clone(),
        media,
        store.clone(),
        &PipelineConfig::default(),
    );
    Harness {
        analyzer,
        store,
        llm,
        stt,
    }
}

fn session_with(media: &[Option<&str>]) -> Session {
    let mut session = Session::new(Uuid::new_v4(), SessionType::Behavioral);
    for (i, reference) in media.iter().enumerate() {
        let response = session.add_question(format!("Question number {}", i + 1));
        response.media = reference.map(MediaRef::new);
    }
    session
}

fn emotions(pairs: &[(&str, f64)]) -> EmotionData {
    EmotionData::from_averages(pairs.iter().map(|(k, v)| (k.to_string(), *v)))
}

#[tokio::test]
async fn mean_of_scored_responses() {
    let mut session = session_with(&[Some("s/1.webm"), Some("s/2.webm"), Some("s/3.webm")]);
    let h = harness(
        ScriptedLlm::new()
            .score("first answer", 80)
            .score("second answer", 60)
            .score("third answer", 100),
        ScriptedStt::with(&[
            ("1.webm", "first answer"),
            ("2.webm", "second answer"),
            ("3.webm", "third answer"),
        ]),
        &session,
    )
    .await;

    let report = h.analyzer.analyze_session(&mut session).await.unwrap();

    assert_eq!(session.overall_score, Some(80.0));
    assert_eq!(session.status, SessionStatus::Analyzed);
    assert_eq!(session.overall_feedback, "Strong and structured answers.");
    let insights = session.behavioral_insights.as_ref().unwrap();
    assert_eq!(insights.communication_style, CommunicationStyle::Articulate);
    assert_eq!(insights.readiness, Readiness::AlmostReady);
    assert_eq!(report.completed, 3);
    assert_eq!(report.scored, 3);
    assert_eq!(report.failed, 0);

    let scores: Vec<_> = session.responses.iter().map(|r| r.ai_score).collect();
    assert_eq!(scores, vec![Some(80.0), Some(60.0), Some(100.0)]);
    assert_eq!(session.responses[0].transcript, "first answer");
    assert_eq!(session.responses[1].evaluation().unwrap().relevance_score, 60.0);

    let prompts = h.llm.insight_prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Question 3: Question number 3\nResponse: third answer\nScore: 100/100"));

    let stored = h.store.get(session.id).await.unwrap();
    assert_eq!(stored, session);
}

#[tokio::test]
async fn responses_without_media_are_skipped() {
    let mut session = session_with(&[None, Some("s/2.webm")]);
    let skipped_id = session.responses[0].id;
    let h = harness(
        ScriptedLlm::new().score("only answer", 72),
        ScriptedStt::with(&[("2.webm", "only answer")]),
        &session,
    )
    .await;

    let report = h.analyzer.analyze_session(&mut session).await.unwrap();

    assert_eq!(session.overall_score, Some(72.0));
    assert_eq!(report.skipped, 1);
    assert_eq!(report.completed, 1);
    let skipped = session.response(skipped_id).unwrap();
    assert_eq!(skipped.analysis_status, AnalysisStatus::Pending);
    assert_eq!(skipped.ai_score, None);
    assert!(h.store.transitions_for(skipped_id).await.is_empty());
    assert!(!h.llm.insight_prompts()[0].contains("Question number 1"));
}

#[tokio::test]
async fn empty_transcript_gets_no_speech_feedback() {
    let mut session = session_with(&[Some("s/1.webm"), Some("s/2.webm")]);
    let h = harness(
        ScriptedLlm::new().score("spoken answer", 90),
        ScriptedStt::with(&[("1.webm", "   "), ("2.webm", "spoken answer")]),
        &session,
    )
    .await;

    let report = h.analyzer.analyze_session(&mut session).await.unwrap();

    let silent = &session.responses[0];
    assert_eq!(silent.analysis_status, AnalysisStatus::Completed);
    assert_eq!(silent.ai_score, Some(0.0));
    assert_eq!(silent.transcript, "");
    let feedback = silent.ai_feedback.as_ref().unwrap();
    assert_eq!(feedback["feedback"], "No speech detected in recording.");
    assert_eq!(feedback["improvements"][0], "Ensure your microphone is working");

    assert_eq!(h.llm.scoring_calls.load(Ordering::SeqCst), 1);
    assert_eq!(session.overall_score, Some(90.0));
    assert_eq!(report.completed, 2);
    assert_eq!(report.scored, 1);
    let prompts = h.llm.insight_prompts();
    assert!(!prompts[0].contains("Question number 1"));
    assert!(prompts[0].contains("Question 1: Question number 2"));
}

#[tokio::test]
async fn all_silent_session_has_no_score_or_insights() {
    let mut session = session_with(&[Some("s/1.webm")]);
    let h = harness(ScriptedLlm::new(), ScriptedStt::with(&[("1.webm", "")]), &session).await;

    h.analyzer.analyze_session(&mut session).await.unwrap();

    assert_eq!(session.overall_score, None);
    assert!(session.behavioral_insights.is_none());
    assert!(h.llm.insight_prompts().is_empty());
    assert_eq!(session.status, SessionStatus::Analyzed);
}

#[tokio::test]
async fn scorer_parse_failure_yields_zero_evaluation() {
    let mut session = session_with(&[Some("s/1.webm")]);
    let h = harness(
        ScriptedLlm::new().reply("rambling", "Great answer, 10/10!"),
        ScriptedStt::with(&[("1.webm", "rambling")]),
        &session,
    )
    .await;

    h.analyzer.analyze_session(&mut session).await.unwrap();

    let response = &session.responses[0];
    assert_eq!(response.analysis_status, AnalysisStatus::Completed);
    assert_eq!(response.ai_score, Some(0.0));
    assert_eq!(response.evaluation().unwrap(), fallback_evaluation());
    // a zero fallback score still counts toward the mean
    assert_eq!(session.overall_score, Some(0.0));
}

#[tokio::test]
async fn media_failure_marks_response_failed() {
    let mut session = session_with(&[Some("s/missing.webm"), Some("s/2.webm")]);
    let failed_id = session.responses[0].id;
    let h = harness(
        ScriptedLlm::new().score("fine answer", 70),
        ScriptedStt::with(&[("2.webm", "fine answer")]),
        &session,
    )
    .await;

    let report = h.analyzer.analyze_session(&mut session).await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.completed, 1);
    assert_eq!(
        h.store.transitions_for(failed_id).await,
        vec![AnalysisStatus::Analyzing, AnalysisStatus::Failed]
    );
    let stored = h.store.get(session.id).await.unwrap();
    assert_eq!(stored.responses[0].analysis_status, AnalysisStatus::Failed);
    assert_eq!(session.overall_score, Some(70.0));
    assert_eq!(session.status, SessionStatus::Analyzed);
}

#[tokio::test]
async fn insight_failure_uses_fallback() {
    let mut session = session_with(&[Some("s/1.webm")]);
    let h = harness(
        ScriptedLlm::new().score("answer", 55).without_insights(),
        ScriptedStt::with(&[("1.webm", "answer")]),
        &session,
    )
    .await;

    h.analyzer.analyze_session(&mut session).await.unwrap();

    assert_eq!(session.status, SessionStatus::Analyzed);
    assert_eq!(session.behavioral_insights, Some(fallback_insights()));
    assert_eq!(session.overall_feedback, "Unable to generate behavioral insights.");
    assert_eq!(session.overall_score, Some(55.0));
}

#[tokio::test]
async fn transcription_failure_counts_as_no_speech() {
    let mut session = session_with(&[Some("s/unknown.webm")]);
    let h = harness(ScriptedLlm::new(), ScriptedStt::with(&[]), &session).await;

    h.analyzer.analyze_session(&mut session).await.unwrap();

    let response = &session.responses[0];
    assert_eq!(response.analysis_status, AnalysisStatus::Completed);
    assert_eq!(response.ai_score, Some(0.0));
    assert_eq!(h.llm.scoring_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn every_processed_response_ends_terminal() {
    let mut session = session_with(&[
        Some("s/1.webm"),
        Some("s/missing.webm"),
        None,
        Some("s/4.webm"),
    ]);
    let h = harness(
        ScriptedLlm::new().score("one", 40),
        ScriptedStt::with(&[("1.webm", "one"), ("4.webm", "")]),
        &session,
    )
    .await;

    h.analyzer.analyze_session(&mut session).await.unwrap();

    for response in session.responses.iter().filter(|r| r.media.is_some()) {
        assert!(response.analysis_status.is_terminal());
        let transitions = h.store.transitions_for(response.id).await;
        assert_eq!(transitions.first(), Some(&AnalysisStatus::Analyzing));
        assert!(transitions.last().unwrap().is_terminal());
        assert_eq!(transitions.len(), 2);
    }
}

#[tokio::test]
async fn confidence_and_emotion_summary() {
    let mut session = session_with(&[Some("s/1.webm"), Some("s/2.webm"), None]);
    session.responses[0].emotion_data = Some(emotions(&[("happy", 0.5), ("neutral", 0.5)]));
    session.responses[1].emotion_data = Some(emotions(&[("happy", 0.2)]));
    // skipped responses never feed the summary
    session.responses[2].emotion_data = Some(emotions(&[("happy", 1.0), ("sad", 1.0)]));
    let h = harness(
        ScriptedLlm::new().score("a", 50).score("b", 50),
        ScriptedStt::with(&[("1.webm", "a"), ("2.webm", "b")]),
        &session,
    )
    .await;

    h.analyzer.analyze_session(&mut session).await.unwrap();

    assert_eq!(session.responses[0].confidence_score, Some(85.0));
    assert_eq!(session.responses[1].confidence_score, Some(56.0));
    assert_eq!(session.responses[2].confidence_score, None);
    assert_eq!(session.emotion_summary["happy"], 0.35);
    assert_eq!(session.emotion_summary["neutral"], 0.5);
    assert!(!session.emotion_summary.contains_key("sad"));
}

#[tokio::test]
async fn concurrent_run_matches_sequential_run() {
    let session = session_with(&[
        Some("s/1.webm"),
        Some("s/2.webm"),
        None,
        Some("s/missing.webm"),
        Some("s/5.webm"),
    ]);
    let llm = || ScriptedLlm::new().score("one", 81).score("two", 64).score("five", 77);
    let stt = || {
        ScriptedStt::with(&[("1.webm", "one"), ("2.webm", "two"), ("5.webm", "five")])
            .slow(Duration::from_millis(30))
    };

    let mut sequential = session.clone();
    let h = harness(llm(), stt(), &session).await;
    let sequential_report = h.analyzer.analyze_session(&mut sequential).await.unwrap();
    assert_eq!(h.stt.peak.load(Ordering::SeqCst), 1);

    let mut concurrent = session.clone();
    let mut h = harness(llm(), stt(), &session).await;
    h.analyzer = h.analyzer.with_max_concurrent(3);
    let concurrent_report = h.analyzer.analyze_session(&mut concurrent).await.unwrap();
    assert!(h.stt.peak.load(Ordering::SeqCst) > 1);

    assert_eq!(sequential, concurrent);
    assert_eq!(sequential_report, concurrent_report);
    assert_eq!(concurrent.overall_score, Some(74.0));
}

#[tokio::test]
async fn analyze_session_by_id_loads_from_store() {
    let session = session_with(&[Some("s/1.webm")]);
    let h = harness(
        ScriptedLlm::new().score("hello", 66),
        ScriptedStt::with(&[("1.webm", "hello")]),
        &session,
    )
    .await;

    let (analyzed, report) = h.analyzer.analyze_session_by_id(session.id).await.unwrap();
    assert_eq!(analyzed.overall_score, Some(66.0));
    assert_eq!(report.session_id, session.id);

    let missing = h.analyzer.analyze_session_by_id(Uuid::new_v4()).await;
    assert!(matches!(missing, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn complete_and_analyze_marks_completion() {
    let session = session_with(&[Some("s/1.webm")]);
    let h = harness(
        ScriptedLlm::new().score("hello", 66),
        ScriptedStt::with(&[("1.webm", "hello")]),
        &session,
    )
    .await;

    let (analyzed, report) = h.analyzer.complete_and_analyze(session.id).await.unwrap();
    assert!(report.is_some());
    assert!(analyzed.completed_at.is_some());
    assert_eq!(analyzed.status, SessionStatus::Analyzed);
    assert_eq!(h.store.get(session.id).await.unwrap().status, SessionStatus::Analyzed);
}

/// Accepts everything except persisting an analyzed session.
struct RejectAnalyzedStore(MemorySessionStore);

#[async_trait]
impl SessionStore for RejectAnalyzedStore {
    async fn load_session(&self, session_id: Uuid) -> Result<Session, StoreError> {
        self.0.load_session(session_id).await
    }

    async fn update_analysis_status(&self, response: &Response) -> Result<(), StoreError> {
        self.0.update_analysis_status(response).await
    }

    async fn save_response(&self, response: &Response) -> Result<(), StoreError> {
        self.0.save_response(response).await
    }

    async fn save_session(&self, session: &Session) -> Result<(), StoreError> {
        if session.status == SessionStatus::Analyzed {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        self.0.save_session(session).await
    }
}

#[tokio::test]
async fn complete_and_analyze_records_failed_analysis() {
    let session = session_with(&[Some("s/1.webm")]);
    let inner = MemorySessionStore::new();
    inner.insert(session.clone()).await;
    let media = Arc::new(MemoryMediaStore::new());
    media.put("s/1.webm", vec![1]).await;
    let analyzer = SessionAnalyzer::new(
        Arc::new(ScriptedLlm::new().score("hello", 66)),
        Arc::new(ScriptedStt::with(&[("1.webm", "hello")])),
        media,
        Arc::new(RejectAnalyzedStore(inner)),
        &PipelineConfig::default(),
    );

    let (session, report) = analyzer.complete_and_analyze(session.id).await.unwrap();
    assert!(report.is_none());
    assert_eq!(
        session.overall_feedback,
        "AI analysis could not be completed. Please try again."
    );
}

#[tokio::test]
async fn file_backed_pipeline_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let media_root = tmp.path().join("media");
    std::fs::create_dir_all(media_root.join("s")).unwrap();
    std::fs::write(media_root.join("s/1.webm"), b"fake-webm").unwrap();

    let session = session_with(&[Some("s/1.webm"), Some("../escape.webm")]);
    let store = Arc::new(FileSessionStore::new(tmp.path().join("data")));
    store.save_session(&session).await.unwrap();

    let analyzer = SessionAnalyzer::new(
        Arc::new(ScriptedLlm::new().score("from disk", 88)),
        Arc::new(ScriptedStt::with(&[("1.webm", "from disk")])),
        Arc::new(FsMediaStore::new(&media_root)),
        store.clone(),
        &PipelineConfig::default(),
    );
    let (_, report) = analyzer.analyze_session_by_id(session.id).await.unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(report.failed, 1);

    let reloaded = store.load_session(session.id).await.unwrap();
    assert_eq!(reloaded.status, SessionStatus::Analyzed);
    assert_eq!(reloaded.overall_score, Some(88.0));
    assert_eq!(reloaded.responses[0].transcript, "from disk");
    assert_eq!(reloaded.responses[1].analysis_status, AnalysisStatus::Failed);
}

/// Fails the first status write, then behaves like the wrapped store.
struct FlakyStatusStore {
    inner: MemorySessionStore,
    failed_once: AtomicUsize,
}

#[async_trait]
impl SessionStore for FlakyStatusStore {
    async fn load_session(&self, session_id: Uuid) -> Result<Session, StoreError> {
        self.inner.load_session(session_id).await
    }

    async fn update_analysis_status(&self, response: &Response) -> Result<(), StoreError> {
        if self.failed_once.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(StoreError::Io(std::io::Error::other("transient")));
        }
        self.inner.update_analysis_status(response).await
    }

    async fn save_response(&self, response: &Response) -> Result<(), StoreError> {
        self.inner.save_response(response).await
    }

    async fn save_session(&self, session: &Session) -> Result<(), StoreError> {
        self.inner.save_session(session).await
    }
}

#[tokio::test]
async fn failed_status_is_stored_when_analyzing_write_fails() {
    let mut session = session_with(&[Some("s/1.webm")]);
    let response_id = session.responses[0].id;
    let store = Arc::new(FlakyStatusStore {
        inner: MemorySessionStore::new(),
        failed_once: AtomicUsize::new(0),
    });
    store.inner.insert(session.clone()).await;
    let media = Arc::new(MemoryMediaStore::new());
    media.put("s/1.webm", vec![1]).await;
    let analyzer = SessionAnalyzer::new(
        Arc::new(ScriptedLlm::new().score("hello", 66)),
        Arc::new(ScriptedStt::with(&[("1.webm", "hello")])),
        media,
        store.clone(),
        &PipelineConfig::default(),
    );

    let report = analyzer.analyze_session(&mut session).await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(session.responses[0].analysis_status, AnalysisStatus::Failed);
    let stored = store.inner.get(session.id).await.unwrap();
    assert_eq!(stored.responses[0].analysis_status, AnalysisStatus::Failed);
    assert_eq!(
        store.inner.transitions_for(response_id).await,
        vec![AnalysisStatus::Analyzing, AnalysisStatus::Failed]
    );
}

#[tokio::test]
async fn second_pass_reanalyzes_and_rederives_session_fields() {
    let mut session = session_with(&[Some("s/1.webm")]);
    let response_id = session.responses[0].id;
    let store = Arc::new(MemorySessionStore::new());
    store.insert(session.clone()).await;
    let media = Arc::new(MemoryMediaStore::new());
    media.put("s/1.webm", vec![1]).await;
    let analyzer = |stt: ScriptedStt| {
        SessionAnalyzer::new(
            Arc::new(ScriptedLlm::new().score("a solid answer", 70)),
            Arc::new(stt),
            media.clone(),
            store.clone(),
            &PipelineConfig::default(),
        )
    };

    analyzer(ScriptedStt::with(&[("1.webm", "a solid answer")]))
        .analyze_session(&mut session)
        .await
        .unwrap();
    assert_eq!(session.overall_score, Some(70.0));
    assert!(session.behavioral_insights.is_some());

    // the already completed response is analyzed again, this time silent
    let report = analyzer(ScriptedStt::with(&[("1.webm", "")]))
        .analyze_session(&mut session)
        .await
        .unwrap();

    assert_eq!(report.completed, 1);
    assert_eq!(report.scored, 0);
    assert_eq!(session.responses[0].ai_score, Some(0.0));
    assert_eq!(session.overall_score, None);
    assert!(session.behavioral_insights.is_none());
    assert_eq!(session.overall_feedback, "");
    assert_eq!(
        store.transitions_for(response_id).await,
        vec![
            AnalysisStatus::Analyzing,
            AnalysisStatus::Completed,
            AnalysisStatus::Analyzing,
            AnalysisStatus::Completed,
        ]
    );
    assert_eq!(store.get(session.id).await.unwrap(), session);
}
