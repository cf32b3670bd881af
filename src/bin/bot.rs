use anyhow::Result;
use dotenvy::dotenv;
use log::{debug, error, info, warn};
use serenity::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use remindme::commands::RemindHandler;
use remindme::core::Config;
use remindme::database::Database;
use remindme::discord::{DiscordNotifier, ReminderBot};
use remindme::features::ads::AdsManager;
use remindme::features::reminders::{
    FollowUpPrompt, Notifier, ParserOptions, ReminderScheduler, SessionStore, TimeParser,
};

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    info!("Starting reminder bot...");
    info!(
        "Reminder zone offset: {}, tick: {}s",
        config.utc_offset,
        config.tick_interval.as_secs()
    );

    let database = Database::new(&config.database_path).await?;
    info!(
        "📋 {} active reminder(s) loaded",
        database.active_reminder_count().await?
    );

    let parser = TimeParser::new(ParserOptions {
        utc_offset: config.utc_offset,
        align_weekly_first_occurrence: config.align_weekly_first_occurrence,
    });
    let handler = Arc::new(
        RemindHandler::new(
            Arc::new(database.clone()),
            parser,
            SessionStore::new(config.session_ttl),
        )
        .with_limits(config.max_reminders_per_user, config.max_task_length),
    );

    // Drop abandoned conversations
    let purge_handler = handler.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = purge_handler.sessions().purge_expired();
            if purged > 0 {
                debug!("Purged {purged} expired reminder session(s)");
            }
        }
    });

    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(ReminderBot::new(handler))
        .await
        .map_err(|e| {
            error!("Failed to create Discord client: {e}");
            anyhow::anyhow!("Client creation failed: {}", e)
        })?;

    // Start the reminder scheduler
    let http = client.cache_and_http.http.clone();
    let notifier: Arc<dyn Notifier> = Arc::new(DiscordNotifier::new(http));

    let mut scheduler = ReminderScheduler::new(
        Arc::new(database),
        notifier.clone(),
        config.utc_offset,
    )
    .with_tick_interval(config.tick_interval)
    .with_hook(Arc::new(FollowUpPrompt::new(notifier.clone())));

    let ads = Arc::new(AdsManager::new(config.ads.clone(), notifier)?);
    if ads.is_enabled() {
        info!("📢 Ads enabled (every {} deliveries)", config.ads.frequency);
        scheduler = scheduler.with_hook(ads.clone());
    } else if config.ads.enabled {
        warn!("ADS_ENABLED is set but ADSGRAM_BLOCK_ID is missing - ads disabled");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_task = tokio::spawn(scheduler.run(shutdown_rx));

    // Stop the scheduler between ticks and close the gateway on Ctrl-C
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e}");
            return;
        }
        info!("Shutdown requested");
        let _ = shutdown_tx.send(true);
        shard_manager.lock().await.shutdown_all().await;
    });

    info!("Establishing WebSocket connection to Discord gateway...");
    if let Err(why) = client.start().await {
        error!("Gateway connection failed: {why:?}");
        return Err(anyhow::anyhow!(
            "Failed to establish gateway connection: {}",
            why
        ));
    }

    if let Err(e) = scheduler_task.await {
        error!("Reminder scheduler task failed: {e}");
    }
    if ads.is_enabled() {
        match serde_json::to_string(&ads.stats()) {
            Ok(stats) => info!("Ad stats: {stats}"),
            Err(e) => warn!("Failed to serialize ad stats: {e}"),
        }
    }
    info!("Bot stopped");
    Ok(())
}
