//! # Quizwire Server
//!
//! Realtime session-synchronization backend for quiz hosting.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! quizwire
//!
//! # Run with environment variables
//! QUIZWIRE_PORT=5000 QUIZWIRE_HOST=0.0.0.0 quizwire
//! ```
//!
//! Configuration is read from `quizwire.toml` if present; the `store.seed_path`
//! key points at a TOML file of quiz documents and score records loaded into
//! the in-memory store at startup.

use anyhow::{Context, Result};
use quizwire_core::{MemoryStore, QuizStore, StoreSeed};
use quizwire_server::{config, handlers, metrics};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizwire=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!("Starting Quizwire server on {}:{}", config.host, config.port);

    let store = build_store(&config)?;

    // Initialize metrics
    metrics::init_metrics();

    // Start the server
    handlers::run_server(config, store).await?;

    Ok(())
}

/// Build the quiz store, seeded from `store.seed_path` when configured.
fn build_store(config: &config::Config) -> Result<Arc<dyn QuizStore>> {
    let Some(path) = &config.store.seed_path else {
        return Ok(Arc::new(MemoryStore::new()));
    };

    let expanded = shellexpand::tilde(path);
    let contents = std::fs::read_to_string(expanded.as_ref())
        .with_context(|| format!("Failed to read store seed file: {expanded}"))?;
    let seed: StoreSeed = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse store seed file: {expanded}"))?;

    tracing::info!(
        quizzes = seed.quizzes.len(),
        scores = seed.scores.len(),
        "Loaded store seed from {expanded}"
    );

    Ok(Arc::new(MemoryStore::from_seed(seed)))
}
