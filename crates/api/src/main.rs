//! ChatDesk API server entry point

use anyhow::Context;
use chatdesk_api::{routes::create_router, AppState, Config};
use chatdesk_engine::{ChatEngine, EventSender, TypingStore};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = chatdesk_shared::create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to database")?;
    chatdesk_shared::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    let engine_config = config.engine_config();
    let typing = TypingStore::connect(&config.redis_url, &engine_config)
        .await
        .context("Failed to connect to the TTL store")?;

    // Notifier task consumes lifecycle/message events off the channel.
    let (events, event_rx) = EventSender::channel();
    let notifier = chatdesk_api::email::EmailNotifier::new(
        chatdesk_api::email::EmailConfig::from_config(&config),
        pool.clone(),
    );
    tokio::spawn(notifier.run(event_rx));

    let engine = ChatEngine::new(pool.clone(), typing, events, engine_config);

    let bind_address = config.bind_address.clone();
    let state = AppState::new(pool, engine, config);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    tracing::info!(address = %bind_address, "ChatDesk API listening");

    axum::serve(listener, router)
        .await
        .context("Server exited")?;

    Ok(())
}
