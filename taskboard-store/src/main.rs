//! Taskboard store server.
//!
//! An axum server holding every user's tasks and columns. Board clients
//! connect over WebSocket to subscribe to snapshots and issue writes; the
//! same server answers AI due-date suggestions over HTTP.
//!
//! # Usage
//!
//! ```bash
//! # Memory-only on the default address 0.0.0.0:9100
//! cargo run --bin taskboard-store
//!
//! # Persist to a data file on a custom address
//! cargo run --bin taskboard-store -- --bind 127.0.0.1:9100 --data-file board.json
//! ```

use std::sync::Arc;

use clap::Parser;
use taskboard_store::config::{StoreCliArgs, StoreConfig};
use taskboard_store::documents::DocumentStore;
use taskboard_store::server::{self, ServerState};
use taskboard_store::suggest::OpenAiCompletion;

#[tokio::main]
async fn main() {
    let cli = StoreCliArgs::parse();

    let config = match StoreConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(addr = %config.bind_addr, "starting taskboard store server");

    let documents = match &config.data_file {
        Some(path) => match DocumentStore::open(path.clone()).await {
            Ok(store) => store,
            Err(e) => {
                tracing::error!(error = %e, "failed to open data file");
                std::process::exit(1);
            }
        },
        None => {
            tracing::warn!("no data file configured, records are kept in memory only");
            DocumentStore::new()
        }
    };

    if config.suggest.api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set, suggestion requests will likely fail");
    }
    let completion = match OpenAiCompletion::new(config.suggest.completion_settings()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to build completion client");
            std::process::exit(1);
        }
    };

    let state = Arc::new(ServerState::with_config(
        documents,
        completion,
        config.max_frame_size,
    ));

    match server::start_server_with_state(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "store server listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "store server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start store server");
            std::process::exit(1);
        }
    }
}
