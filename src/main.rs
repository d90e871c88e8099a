//! MDI Predictor - manual batch run
//!
//! Connects to the tabular store, loads the regression model and scores one
//! batch of sessions for one farm, exactly as an ingestion trigger would.
//!
//! ```text
//! mdi-predictor --farm-id <UUID> --session 1201 --session 1202
//! mdi-predictor                      # first farm, every session in the context window
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use mdi_predictor::{
    AppContext, Clock, IngestionTrigger, LinearRegressor, MdiRegressor, PgStore, PipelineRunner,
    PredictionStore, PredictorConfig, RunOutcome, SessionOid,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "mdi-predictor")]
#[command(about = "Mastitis risk prediction for newly ingested milking sessions")]
#[command(version)]
struct CliArgs {
    /// Path to predictor_config.toml (default: $MDI_PREDICTOR_CONFIG, then ./predictor_config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Farm to score (default: first registered farm)
    #[arg(long, env = "FARM_ID")]
    farm_id: Option<String>,

    /// Regression model artifact (overrides [model].path)
    #[arg(long, value_name = "PATH")]
    model: Option<PathBuf>,

    /// PostgreSQL connection URL (overrides [store].database_url)
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Session OID to treat as newly ingested; repeatable.
    /// Without any, every session in the context window is scored.
    #[arg(long = "session", value_name = "OID")]
    sessions: Vec<SessionOid>,
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // .env first so clap sees DATABASE_URL / FARM_ID from it
    dotenvy::dotenv().ok();

    init_logging();

    let args = CliArgs::parse();

    let config = match &args.config {
        Some(path) => PredictorConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PredictorConfig::load(),
    };

    let database_url = args
        .database_url
        .clone()
        .or_else(|| config.store.database_url.clone())
        .context("No database URL: pass --database-url or set DATABASE_URL")?;
    let store: Arc<dyn PredictionStore> = Arc::new(
        PgStore::connect(&database_url, &config.store)
            .await
            .context("Failed to connect to PostgreSQL")?,
    );

    let model_path = args
        .model
        .clone()
        .or_else(|| config.model.path.clone())
        .context("No model artifact: pass --model or set [model].path")?;
    let model: Arc<dyn MdiRegressor> = Arc::new(
        LinearRegressor::load(&model_path)
            .with_context(|| format!("Failed to load model {}", model_path.display()))?,
    );

    let context = Arc::new(AppContext::with_system_clock(
        config,
        store.clone(),
        Some(model),
    ));

    let farm_id = match args.farm_id {
        Some(id) => id,
        None => store
            .first_farm_id()
            .await
            .context("Failed to look up farms")?
            .context("No farm found")?,
    };
    info!("Using farm {}", farm_id);

    let new_sessions = if args.sessions.is_empty() {
        let window = context
            .pipeline
            .fetcher()
            .fetch_sessions(store.as_ref(), &farm_id, context.clock.now())
            .await
            .context("Failed to fetch sessions")?
            .context("No sessions found in recent or fallback window")?;
        info!(
            strategy = %window.strategy,
            "Scoring all {} sessions in the context window",
            window.sessions.len()
        );
        window.session_oids()
    } else {
        args.sessions
    };

    let runner = PipelineRunner::new(context);
    if let Some(handle) = runner.submit(IngestionTrigger::new(farm_id, new_sessions)) {
        match handle.outcome().await {
            Ok(RunOutcome::Persisted { rows }) => info!("Saved {} predictions", rows),
            Ok(RunOutcome::Skipped(reason)) => warn!("Nothing saved: {}", reason),
            Err(e) => error!("Prediction run failed: {}", e),
        }
    }
    runner.shutdown().await;
    info!("{}", runner.stats());

    Ok(())
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}
