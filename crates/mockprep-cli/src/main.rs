use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

use mockprep_core::*;
use mockprep_provider::{custom, default_api_base, LlmProvider, SpeechToText};
use mockprep_schema::Session;

#[derive(Parser)]
#[command(name = "mockprep", version, about = "mock interview analysis pipeline")]
struct Cli {
    #[arg(
        long,
        default_value = "~/.mockprep",
        help = "Config root directory (contains config/ and logs/)"
    )]
    config_root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Validate config files")]
    Validate,
    #[command(about = "Run AI analysis over a stored session")]
    Analyze {
        #[arg(help = "Session ID")]
        session_id: Uuid,
        #[arg(long, help = "Mark the session completed before analyzing")]
        complete: bool,
    },
    #[command(about = "Show a stored session and its analysis")]
    Show {
        #[arg(help = "Session ID")]
        session_id: Uuid,
        #[arg(long, help = "Print the raw JSON document")]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();
    cli.config_root = expand_home(&cli.config_root);

    let log_dir = cli.config_root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "mockprep.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = load_config(&cli.config_root.join("config"))?;

    match command {
        Commands::Validate => {
            let pipeline = &config.main.pipeline;
            println!(
                "Config valid. {} providers, llm {}/{}, transcription {}/{}.",
                config.providers.len(),
                pipeline.llm.provider,
                pipeline.llm.model,
                pipeline.transcription.provider,
                pipeline.transcription.model
            );
        }
        Commands::Analyze {
            session_id,
            complete,
        } => {
            let analyzer = build_analyzer(&cli.config_root, &config)?;
            let (session, report) = if complete {
                analyzer.complete_and_analyze(session_id).await?
            } else {
                let (session, report) = analyzer.analyze_session_by_id(session_id).await?;
                (session, Some(report))
            };

            match report {
                Some(report) => println!(
                    "Analyzed session {}: {} completed, {} failed, {} skipped. Overall score: {}",
                    report.session_id,
                    report.completed,
                    report.failed,
                    report.skipped,
                    format_score(report.overall_score)
                ),
                None => println!("Session {}: {}", session.id, session.overall_feedback),
            }
        }
        Commands::Show { session_id, json } => {
            let store = FileSessionStore::new(storage_path(
                &cli.config_root,
                &config.main.storage.data_dir,
            ));
            let session = store
                .load_session(session_id)
                .await
                .with_context(|| format!("failed to load session {session_id}"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&session)?);
            } else {
                print!("{}", render_session(&session));
            }
        }
    }

    Ok(())
}

fn expand_home(path: &Path) -> PathBuf {
    if path.starts_with("~") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(path.strip_prefix("~").unwrap_or(path));
        }
    }
    path.to_path_buf()
}

/// Relative storage paths live under the config root.
fn storage_path(config_root: &Path, configured: &str) -> PathBuf {
    let path = expand_home(Path::new(configured));
    if path.is_absolute() {
        path
    } else {
        config_root.join(path)
    }
}

fn build_clients(
    config: &MockprepConfig,
) -> Result<(Arc<dyn LlmProvider>, Arc<dyn SpeechToText>)> {
    let pipeline = &config.main.pipeline;
    let (llm, _) = provider_clients(config, &pipeline.llm.provider)?;
    let (_, stt) = provider_clients(config, &pipeline.transcription.provider)?;
    Ok((Arc::new(llm), Arc::new(stt)))
}

fn provider_clients(
    config: &MockprepConfig,
    provider_id: &str,
) -> Result<(
    mockprep_provider::OpenAiProvider,
    mockprep_provider::OpenAiTranscriber,
)> {
    let provider = config
        .provider(provider_id)
        .ok_or_else(|| anyhow!("provider not configured: {provider_id}"))?;
    let api_base = provider
        .api_base
        .clone()
        .filter(|base| !base.is_empty())
        .or_else(|| default_api_base(provider_id).map(str::to_string))
        .ok_or_else(|| anyhow!("provider {provider_id} needs an api_base"))?;
    let api_key = provider.api_key.clone().unwrap_or_default();
    if api_key.is_empty() {
        tracing::warn!(provider_id, "no api_key configured");
    }
    Ok(custom(provider_id, api_key, api_base))
}

fn build_analyzer(config_root: &Path, config: &MockprepConfig) -> Result<SessionAnalyzer> {
    let (llm, stt) = build_clients(config)?;
    let storage = &config.main.storage;
    let media = Arc::new(FsMediaStore::new(storage_path(config_root, &storage.media_root)));
    let store = Arc::new(FileSessionStore::new(storage_path(
        config_root,
        &storage.data_dir,
    )));

    Ok(
        SessionAnalyzer::new(llm, stt, media, store, &config.main.pipeline)
            .with_max_concurrent(config.main.runtime.max_concurrent),
    )
}

fn format_score(score: Option<f64>) -> String {
    score.map_or_else(|| "-".to_string(), |s| format!("{s:.1}"))
}

fn render_session(session: &Session) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Session {} ({:?})", session.id, session.status);
    let _ = writeln!(out, "  Overall score: {}", format_score(session.overall_score));
    if !session.overall_feedback.is_empty() {
        let _ = writeln!(out, "  Feedback: {}", session.overall_feedback);
    }
    if let Some(insights) = &session.behavioral_insights {
        let _ = writeln!(
            out,
            "  Style: {}  Readiness: {}",
            insights.communication_style.as_str(),
            insights.readiness.as_str()
        );
        for tip in &insights.tips {
            let _ = writeln!(out, "  - {tip}");
        }
    }
    for response in &session.responses {
        let _ = writeln!(
            out,
            "  [{}] Q{}: {} | score {} | confidence {}",
            response.analysis_status,
            response.question_order + 1,
            response.question_text,
            format_score(response.ai_score),
            format_score(response.confidence_score)
        );
        if let Some(evaluation) = response.evaluation() {
            if !evaluation.feedback.is_empty() {
                let _ = writeln!(out, "      {}", evaluation.feedback);
            }
        }
    }
    out
}
