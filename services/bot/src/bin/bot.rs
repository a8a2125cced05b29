//! services/bot/src/bin/bot.rs

use bot_lib::{
    adapters::{DbAdapter, TelegramAdapter, TvMazeAdapter},
    chat::{protocol::Command, run_update_loop, AppState, ReminderScheduler},
    config::Config,
    error::BotError,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), BotError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting bot...");

    // --- 2. Open the Database & Run Migrations ---
    info!("Opening database...");
    let db_adapter = Arc::new(DbAdapter::connect(&config.database_url).await?);
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let search_adapter = Arc::new(
        TvMazeAdapter::new(config.show_api_base_url.clone(), config.http_timeout)
            .map_err(|e| BotError::Internal(format!("HTTP client: {e}")))?,
    );
    let telegram = Arc::new(
        TelegramAdapter::new(
            &config.telegram_api_base_url,
            &config.telegram_bot_token,
            config.http_timeout,
            config.long_poll_timeout,
        )
        .map_err(|e| BotError::Internal(format!("HTTP client: {e}")))?,
    );

    let username = telegram.authenticate().await?;
    info!("Authorized as @{}", username);
    if let Err(e) = telegram.register_commands(Command::menu()).await {
        warn!("Failed to register the command menu: {}", e);
    }

    // --- 4. Build the Shared AppState ---
    let app_state = AppState::new(db_adapter.clone(), search_adapter, telegram.clone());

    // --- 5. Start the Reminder Scheduler ---
    let cancellation_token = CancellationToken::new();
    let scheduler = ReminderScheduler::new(
        db_adapter,
        telegram.clone(),
        config.reminder_poll_interval,
        config.reminder_lookahead,
    );
    let scheduler_handle = tokio::spawn(scheduler.run(cancellation_token.clone()));

    let shutdown_token = cancellation_token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        info!("Shutdown requested.");
        shutdown_token.cancel();
    });

    // --- 6. Process Inbound Events Until Shutdown ---
    run_update_loop(app_state, telegram.updates(cancellation_token.clone())).await;

    cancellation_token.cancel();
    if let Err(e) = scheduler_handle.await {
        error!("Reminder scheduler task failed: {}", e);
    }
    info!("Bot stopped.");
    Ok(())
}
