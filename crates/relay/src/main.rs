use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use relay_core::{
    config::Config,
    messaging::{
        port::{ChatPort, SocialPort},
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    router::UpdateRouter,
};
use relay_telegram::{
    polling::{connect, run_polling, PollOptions},
    TelegramMessenger,
};
use relay_twitter::TwitterClient;

#[tokio::main]
async fn main() -> Result<(), relay_core::Error> {
    relay_core::logging::init("relay")?;

    let cfg = Config::load()?;
    info!(?cfg, "configuration loaded");

    let (bot, _me) = connect(&cfg)
        .await
        .map_err(|e| relay_core::Error::Config(format!("telegram startup failed: {e:#}")))?;

    // Raw Telegram sends go through a throttling decorator; it only delays calls.
    let raw: Arc<dyn ChatPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let chat: Arc<dyn ChatPort> = Arc::new(ThrottledMessenger::new(raw, ThrottleConfig::default()));
    let home = chat.chat_title(cfg.home_chat_id).await.map_err(|e| {
        relay_core::Error::Config(format!("home chat {} not reachable: {e}", cfg.home_chat_id))
    })?;
    info!(home_chat = cfg.home_chat_id.0, "relay started in group {home}");

    let social: Arc<dyn SocialPort> =
        Arc::new(TwitterClient::new(cfg.twitter_post_url.clone(), cfg.http_timeout)?);

    // Built exactly once, before any update is consumed.
    let router = UpdateRouter::new(&cfg, chat, social);

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for shutdown signal: {e}");
                return;
            }
            info!("shutdown requested");
            shutdown.cancel();
        });
    }

    run_polling(bot, router, PollOptions::from(&cfg), shutdown)
        .await
        .map_err(|e| relay_core::Error::Transport(format!("update loop failed: {e:#}")))?;

    Ok(())
}
