pub mod affect;
pub mod aggregate;
pub mod config;
pub mod error;
pub mod insights;
pub mod orchestrator;
mod reply;
pub mod scorer;
pub mod store;
pub mod transcribe;

pub use affect::estimate_confidence;
pub use config::*;
pub use error::*;
pub use insights::{fallback_insights, InsightGenerator, ScoredAnswer};
pub use orchestrator::*;
pub use scorer::{fallback_evaluation, ResponseScorer};
pub use store::*;
pub use transcribe::TranscriptionAdapter;
