//! # gigconnect-server
//!
//! HTTP front for the Gigconnect messaging engine.
//!
//! This binary provides:
//! - **REST API** (axum) to send messages, mark them read, fetch a
//!   conversation with its history, and count a user's unread messages
//! - **Pluggable message log**: in-memory, or SQLite with the conversation
//!   index rebuilt from disk at startup
//! - **Event log**: every engine state change is traced as it happens

mod api;
mod config;
mod error;

use std::sync::Arc;

use gigconnect_messaging::{MessagingEngine, MessagingEvent};
use gigconnect_store::{MemoryStore, MessageStore, SqliteStore};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::{ServerConfig, StorageBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,gigconnect_server=debug")),
        )
        .init();

    info!("Starting Gigconnect server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open the message log and rebuild the conversation index
    // -----------------------------------------------------------------------
    let store = open_store(&config)?;
    let engine = tokio::task::spawn_blocking({
        let buffer = config.event_buffer;
        move || MessagingEngine::open_with_event_buffer(store, buffer)
    })
    .await??;
    let engine = Arc::new(engine);

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------
    spawn_event_logger(&engine);

    let app_state = AppState {
        engine,
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

fn open_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn MessageStore>> {
    let store: Arc<dyn MessageStore> = match config.storage {
        StorageBackend::Memory => {
            warn!("Using in-memory message store; messages are lost on restart");
            Arc::new(MemoryStore::new())
        }
        StorageBackend::Sqlite => match &config.database_path {
            Some(path) => Arc::new(SqliteStore::open_at(path)?),
            None => Arc::new(SqliteStore::open_default()?),
        },
    };
    Ok(store)
}

fn spawn_event_logger(engine: &MessagingEngine) {
    let mut events = engine.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(MessagingEvent::MessageSent { message }) => debug!(
                    message_id = %message.id,
                    conversation = %message.conversation_id,
                    to = %message.recipient_inbox(),
                    "event: message sent"
                ),
                Ok(MessagingEvent::MessageRead {
                    message_id,
                    conversation_id,
                    inbox,
                    remaining_unread,
                }) => debug!(
                    message_id = %message_id,
                    conversation = %conversation_id,
                    inbox = %inbox,
                    remaining_unread,
                    "event: message read"
                ),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event logger fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
