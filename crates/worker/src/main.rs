//! ChatDesk background worker
//!
//! Runs the timed sweeps the engine deliberately does not schedule itself:
//! auto-declining pending sessions no agent picked up, and closing active
//! sessions that went idle. Both go through the engine's public operations,
//! never raw SQL.

mod sweeps;

use anyhow::Context;
use chatdesk_api::Config;
use chatdesk_engine::{ChatEngine, EventSender, TypingStore};
use tokio_cron_scheduler::{Job, JobScheduler};
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

    let pool = chatdesk_shared::create_pool(&config.database_url, 3)
        .await
        .context("Failed to connect to database")?;

    let engine_config = config.engine_config();
    let typing = TypingStore::connect(&config.redis_url, &engine_config)
        .await
        .context("Failed to connect to the TTL store")?;

    // Sweeps act on sessions whose parties are gone; nobody is left to
    // notify, so the event channel stays disabled.
    let engine = ChatEngine::new(pool, typing, EventSender::disabled(), engine_config);

    let scheduler = JobScheduler::new()
        .await
        .context("Failed to create job scheduler")?;

    let decline_engine = engine.clone();
    scheduler
        .add(Job::new_async("0 * * * * *", move |_id, _sched| {
            let engine = decline_engine.clone();
            Box::pin(async move {
                sweeps::decline_stale_pending(&engine).await;
            })
        })?)
        .await
        .context("Failed to schedule auto-decline sweep")?;

    let idle_engine = engine.clone();
    scheduler
        .add(Job::new_async("30 * * * * *", move |_id, _sched| {
            let engine = idle_engine.clone();
            Box::pin(async move {
                sweeps::close_idle_sessions(&engine).await;
            })
        })?)
        .await
        .context("Failed to schedule idle-close sweep")?;

    scheduler.start().await.context("Failed to start scheduler")?;
    tracing::info!("ChatDesk worker started");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("ChatDesk worker shutting down");

    Ok(())
}
