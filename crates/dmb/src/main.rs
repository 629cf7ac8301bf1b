use std::sync::Arc;

use dmb_core::{
    config::Config,
    lifecycle::Lifecycle,
    ports::{AuditSink, ListingStore, NullAudit, ThreadService},
    sweep::Sweeper,
};
use dmb_discord::{DiscordRest, StaffLogAudit};
use dmb_sqlite::SqliteListingStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dmb_core::logging::init("dmb");

    let cfg = Arc::new(Config::load()?);
    tracing::info!(
        forum = cfg.forum_channel_id,
        db = %cfg.db_path.display(),
        "starting marketplace bot"
    );

    let store: Arc<dyn ListingStore> = Arc::new(SqliteListingStore::open(&cfg.db_path)?);
    let threads: Arc<dyn ThreadService> = Arc::new(DiscordRest::new(cfg.bot_token.clone())?);

    let audit: Arc<dyn AuditSink> = match cfg.staff_log_channel_id {
        Some(channel) => Arc::new(StaffLogAudit::new(cfg.bot_token.clone(), channel)?),
        None => Arc::new(NullAudit),
    };

    // Keep the persistent "Create Listing" button alive across restarts.
    let rest = DiscordRest::new(cfg.bot_token.clone())?;
    if let Err(e) = rest.ensure_create_message(cfg.create_channel_id).await {
        tracing::warn!("could not ensure create-listing message: {e}");
    }

    let engine = Arc::new(Lifecycle::new(threads, store, audit, cfg.clone()));

    // Interaction events arrive through the platform gateway, which hands
    // parsed actions to dmb_core::router::dispatch. This process owns the
    // time-driven side: the archive/delete sweep.
    let sweeper = Sweeper::new(cfg, engine);
    let handle = sweeper.start();

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    handle.stop().await;

    Ok(())
}
