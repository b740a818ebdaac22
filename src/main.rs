//! Risk Engine - Main Entry Point
//!
//! Reads requests as JSON lines on stdin and writes one JSON reply per line
//! to stdout. Lines are scored unless they carry a `kind` of `chat`,
//! `signup` or `login`. Logs go to stderr.

use anyhow::{Context, Result};
use behavioral_risk_engine::{
    base_score::{LabelEncoders, LogisticModel},
    config::{AppConfig, DEFAULT_CONFIG_PATH},
    BaseScorer, RequestHandler, ScoringService,
};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing::{debug, info};

fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = AppConfig::load_from_path(&config_path)?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                format!("behavioral_risk_engine={}", config.logging.level).parse()?,
            ),
        )
        .init();

    info!(path = %config_path, "Configuration loaded");
    info!(
        "History: {} records, session isolation: {} (max {} sessions)",
        config.scoring.max_history, config.scoring.session_isolation, config.scoring.max_sessions
    );

    let base = build_base_scorer(&config)?;
    let service = ScoringService::with_base_scorer(config.scoring.clone(), base);
    let mut handler = build_handler(&config, service);

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut handled = 0u64;
    let mut flagged = 0u64;

    for line in stdin.lock().lines() {
        let line = line.context("Failed to read stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        let reply = handler.handle_line(&line);
        handled += 1;
        if reply["isFraud"] == true {
            flagged += 1;
        }

        writeln!(out, "{}", reply)?;
        out.flush()?;
        debug!(handled, "Reply written");
    }

    info!(handled, flagged, "Input exhausted, shutting down");
    Ok(())
}

#[cfg(feature = "accounts")]
fn build_handler(config: &AppConfig, service: ScoringService) -> RequestHandler {
    use behavioral_risk_engine::AccountStore;

    RequestHandler::new(service).with_accounts(AccountStore::open(&config.accounts.db_path))
}

#[cfg(not(feature = "accounts"))]
fn build_handler(_config: &AppConfig, service: ScoringService) -> RequestHandler {
    RequestHandler::new(service)
}

fn build_base_scorer(config: &AppConfig) -> Result<BaseScorer> {
    let Some(model_path) = &config.model.model_path else {
        info!("No classifier configured, simulating base scores");
        return Ok(BaseScorer::simulated());
    };

    let model = LogisticModel::load(model_path)
        .with_context(|| format!("Failed to load model from {}", model_path))?;
    let encoders = match &config.model.encoders_path {
        Some(path) => LabelEncoders::load(path)
            .with_context(|| format!("Failed to load label encoders from {}", path))?,
        None => LabelEncoders::new(),
    };
    info!(path = %model_path, "Classifier loaded");

    Ok(BaseScorer::with_classifier(Arc::new(model), encoders))
}
