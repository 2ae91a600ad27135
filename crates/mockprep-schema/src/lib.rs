use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    InProgress,
    Completed,
    Analyzed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    #[default]
    Behavioral,
    Technical,
    Mixed,
}

/// Per-response lifecycle marker.
///
/// A pass moves a response `pending → analyzing → {completed | failed}`.
/// Re-running analysis starts a new pass from `analyzing`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    #[default]
    Pending,
    Analyzing,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn can_transition_to(self, next: AnalysisStatus) -> bool {
        match next {
            Self::Pending => false,
            Self::Analyzing => self != Self::Analyzing,
            Self::Completed | Self::Failed => self == Self::Analyzing,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Analyzing => "analyzing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque reference to an uploaded recording, resolved by a media store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct MediaRef(pub String);

impl MediaRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment, used as the upload file name.
    pub fn file_name(&self) -> &str {
        self.0
            .rsplit(['/', '\\'])
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("recording")
    }
}

impl fmt::Display for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Emotion labels produced by the browser-side face expression model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmotionLabel {
    Happy,
    Neutral,
    Surprised,
    Fearful,
    Sad,
    Angry,
    Disgusted,
}

impl EmotionLabel {
    pub const ALL: [EmotionLabel; 7] = [
        Self::Happy,
        Self::Neutral,
        Self::Surprised,
        Self::Fearful,
        Self::Sad,
        Self::Angry,
        Self::Disgusted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::Neutral => "neutral",
            Self::Surprised => "surprised",
            Self::Fearful => "fearful",
            Self::Sad => "sad",
            Self::Angry => "angry",
            Self::Disgusted => "disgusted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EmotionFrame {
    pub time: f64,
    #[serde(default)]
    pub emotions: BTreeMap<String, f64>,
}

/// Emotion detection payload recorded alongside a response.
///
/// `averages` is the per-response sample (label → mean intensity in [0,1]);
/// `dominant` and `timeline` are carried for display only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EmotionData {
    #[serde(default)]
    pub averages: BTreeMap<String, f64>,
    #[serde(default)]
    pub dominant: Option<String>,
    #[serde(default)]
    pub timeline: Vec<EmotionFrame>,
}

impl EmotionData {
    pub fn from_averages<I, K>(averages: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self {
            averages: averages.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            dominant: None,
            timeline: Vec::new(),
        }
    }

    pub fn has_averages(&self) -> bool {
        !self.averages.is_empty()
    }

    /// Intensity for a known label; missing labels read as 0.
    pub fn intensity(&self, label: EmotionLabel) -> f64 {
        self.averages.get(label.as_str()).copied().unwrap_or(0.0)
    }
}

/// Clamp a model-provided score into [0, 100]. Non-finite input maps to 0.
pub fn clamp_score(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Structured scoring output for one response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Evaluation {
    pub score: f64,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    #[serde(default)]
    pub communication_score: f64,
    #[serde(default)]
    pub relevance_score: f64,
    #[serde(default)]
    pub structure_score: f64,
}

impl Evaluation {
    pub fn clamped(mut self) -> Self {
        self.score = clamp_score(self.score);
        self.communication_score = clamp_score(self.communication_score);
        self.relevance_score = clamp_score(self.relevance_score);
        self.structure_score = clamp_score(self.structure_score);
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationStyle {
    Confident,
    Articulate,
    Hesitant,
    Verbose,
    Concise,
    #[default]
    #[serde(other)]
    Unknown,
}

impl CommunicationStyle {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "confident" => Self::Confident,
            "articulate" => Self::Articulate,
            "hesitant" => Self::Hesitant,
            "verbose" => Self::Verbose,
            "concise" => Self::Concise,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confident => "confident",
            Self::Articulate => "articulate",
            Self::Hesitant => "hesitant",
            Self::Verbose => "verbose",
            Self::Concise => "concise",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    AlmostReady,
    #[default]
    NeedsPractice,
    Beginner,
}

impl Readiness {
    /// Unrecognized labels fall back to `needs_practice`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "ready" => Self::Ready,
            "almost_ready" => Self::AlmostReady,
            "beginner" => Self::Beginner,
            _ => Self::NeedsPractice,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::AlmostReady => "almost_ready",
            Self::NeedsPractice => "needs_practice",
            Self::Beginner => "beginner",
        }
    }
}

/// Holistic summary across every scored response of a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BehavioralInsights {
    #[serde(default)]
    pub overall_impression: String,
    #[serde(default)]
    pub communication_style: CommunicationStyle,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub development_areas: Vec<String>,
    #[serde(default, rename = "interview_readiness")]
    pub readiness: Readiness,
    #[serde(default)]
    pub tips: Vec<String>,
}

/// One candidate's answer to one question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
    pub id: Uuid,
    pub session_id: Uuid,
    pub question_text: String,
    #[serde(default)]
    pub question_hint: Option<String>,
    #[serde(default)]
    pub question_order: u32,
    /// `None` means the candidate skipped this question.
    #[serde(default)]
    pub media: Option<MediaRef>,
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub ai_score: Option<f64>,
    #[serde(default)]
    pub ai_feedback: Option<serde_json::Value>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub emotion_data: Option<EmotionData>,
    #[serde(default)]
    pub duration_secs: u32,
    #[serde(default)]
    pub analysis_status: AnalysisStatus,
}

impl Response {
    pub fn new(session_id: Uuid, question_text: impl Into<String>, question_order: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            question_text: question_text.into(),
            question_hint: None,
            question_order,
            media: None,
            transcript: String::new(),
            ai_score: None,
            ai_feedback: None,
            confidence_score: None,
            emotion_data: None,
            duration_secs: 0,
            analysis_status: AnalysisStatus::Pending,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.question_hint = Some(hint.into());
        self
    }

    pub fn with_media(mut self, media: impl Into<String>) -> Self {
        self.media = Some(MediaRef::new(media));
        self
    }

    pub fn with_emotions(mut self, emotions: EmotionData) -> Self {
        self.emotion_data = Some(emotions);
        self
    }

    /// Decode the stored feedback payload, if any.
    pub fn evaluation(&self) -> Option<Evaluation> {
        self.ai_feedback
            .as_ref()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

/// A batch of question/answer attempts by one candidate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub candidate_id: Uuid,
    #[serde(default)]
    pub session_type: SessionType,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub overall_score: Option<f64>,
    #[serde(default)]
    pub overall_feedback: String,
    #[serde(default)]
    pub behavioral_insights: Option<BehavioralInsights>,
    #[serde(default)]
    pub emotion_summary: BTreeMap<String, f64>,
    #[serde(default = "default_question_count")]
    pub question_count: u32,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub responses: Vec<Response>,
}

fn default_question_count() -> u32 {
    5
}

impl Session {
    pub fn new(candidate_id: Uuid, session_type: SessionType) -> Self {
        Self {
            id: Uuid::new_v4(),
            candidate_id,
            session_type,
            status: SessionStatus::InProgress,
            overall_score: None,
            overall_feedback: String::new(),
            behavioral_insights: None,
            emotion_summary: BTreeMap::new(),
            question_count: default_question_count(),
            completed_at: None,
            responses: Vec::new(),
        }
    }

    /// Appends a response for `question_text` at the next question order.
    pub fn add_question(&mut self, question_text: impl Into<String>) -> &mut Response {
        let order = self.responses.len() as u32;
        self.responses
            .push(Response::new(self.id, question_text, order));
        let last = self.responses.len() - 1;
        &mut self.responses[last]
    }

    pub fn sort_responses(&mut self) {
        self.responses.sort_by_key(|r| r.question_order);
    }

    pub fn response(&self, response_id: Uuid) -> Option<&Response> {
        self.responses.iter().find(|r| r.id == response_id)
    }
}
