//! Playsight CLI
//!
//! Analyze tactical plays from the command line.
//!
//! ```bash
//! playsight analyze overlap.yaml --type detailed
//! playsight analyze overlap.yaml --context trailing.yaml --json
//! playsight key overlap.yaml --type quick
//! playsight validate overlap.yaml
//! playsight stats --config playsight.yaml
//! ```
//!
//! Remote scoring backends are registered by host applications; the CLI
//! runs the local engine behind the cache.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use playsight_core::{AnalysisContext, AnalysisType, Play, StructuredAnalysis};
use playsight_runtime::{
    AnalyzeOptions, CacheKey, OrchestratorBuilder, PlaysightService, RuntimeConfig, SharedClock,
    SystemClock,
};

#[derive(Parser)]
#[command(name = "playsight", version, about = "Tactical play analysis")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a play
    Analyze {
        /// Play file (YAML or JSON)
        play: PathBuf,

        /// quick, detailed, comparative, opponent-perspective or learning
        #[arg(short = 't', long = "type", default_value = "quick")]
        analysis_type: AnalysisType,

        /// Match context file (YAML or JSON)
        #[arg(short, long)]
        context: Option<PathBuf>,

        /// Runtime configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the cache key for a request
    Key {
        play: PathBuf,

        #[arg(short = 't', long = "type", default_value = "quick")]
        analysis_type: AnalysisType,

        #[arg(short, long)]
        context: Option<PathBuf>,
    },

    /// Check that a play file parses and validates
    Validate { play: PathBuf },

    /// Show cache and usage statistics from the configured snapshot
    Stats {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            play,
            analysis_type,
            context,
            config,
            json,
        } => {
            let play = Play::from_file(&play).with_context(|| format!("Failed to load play {}", play.display()))?;
            let context = load_context(context.as_deref())?;
            let service = build_service(config.as_deref())?;

            service.start().await?;
            let analysis = service
                .analyze(&play, analysis_type, context.as_ref(), AnalyzeOptions::default())
                .await?;
            service.shutdown().await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                print_analysis(&play, &analysis);
            }
            Ok(())
        }

        Commands::Key {
            play,
            analysis_type,
            context,
        } => {
            let play = Play::from_file(&play).with_context(|| format!("Failed to load play {}", play.display()))?;
            let context = load_context(context.as_deref())?;
            println!("{}", CacheKey::derive(&play, analysis_type, context.as_ref()));
            Ok(())
        }

        Commands::Validate { play: path } => {
            let play = Play::from_file(&path).with_context(|| format!("Failed to load play {}", path.display()))?;
            println!(
                "{} is valid: {} players, {} movements",
                play.name,
                play.players.len(),
                play.movements.len()
            );
            Ok(())
        }

        Commands::Stats { config } => {
            let service = build_service(config.as_deref())?;
            let restored = service.start().await?;
            tracing::debug!(restored, "Loaded snapshot for stats");
            println!("{}", serde_json::to_string_pretty(&service.stats())?);
            service.shutdown().await?;
            Ok(())
        }
    }
}

fn build_service(config_path: Option<&Path>) -> Result<PlaysightService> {
    let config = match config_path {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    let clock: SharedClock = Arc::new(SystemClock);
    let orchestrator = OrchestratorBuilder::new()
        .config(config.clone())
        .clock(clock.clone())
        .build()?;
    Ok(PlaysightService::new(&config, clock, orchestrator))
}

fn load_context(path: Option<&Path>) -> Result<Option<AnalysisContext>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read context {}", path.display()))?;
    // JSON is valid YAML
    let context: AnalysisContext =
        serde_yaml::from_str(&contents).with_context(|| format!("Invalid context {}", path.display()))?;
    Ok(Some(context))
}

fn print_analysis(play: &Play, analysis: &StructuredAnalysis) {
    println!("{} ({})", play.name, analysis.metadata.analysis_type);
    println!(
        "Overall: {}/100  [source: {}, confidence: {}]",
        analysis.overall_score, analysis.metadata.source_backend, analysis.metadata.confidence
    );
    println!();

    let categories = &analysis.categories;
    for (label, score) in [
        ("Spacing", &categories.spacing),
        ("Timing", &categories.timing),
        ("Formation", &categories.formation),
        ("Effectiveness", &categories.effectiveness),
        ("Tactical", &categories.tactical),
    ] {
        println!("  {:<14}{:>3}/100", label, score.score);
    }

    if !analysis.suggestions.is_empty() {
        println!("\nSuggestions:");
        for suggestion in &analysis.suggestions {
            println!("  - [{:?}] {}", suggestion.priority, suggestion.text);
        }
    }

    if !analysis.risks.is_empty() {
        println!("\nRisks:");
        for risk in &analysis.risks {
            println!("  - [{:?}] {}", risk.severity, risk.description);
        }
    }
}
