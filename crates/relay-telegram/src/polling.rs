//! Long-polling producer + single sequential consumer.
//!
//! The producer owns the `getUpdates` offset and pushes converted messages into
//! an unbounded channel; the consumer hands them to the router one at a time.
//! Shutdown is checked only between updates, so an update in flight always
//! finishes.

use std::time::Duration;

use teloxide::{
    prelude::*,
    requests::Request,
    types::{Me, UpdateKind},
};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use relay_core::{config::Config, messaging::types::IncomingMessage, router::UpdateRouter};

use crate::handlers::incoming_from;

/// Slack on top of the long-poll timeout before the HTTP client gives up.
const HTTP_TIMEOUT_SLACK: Duration = Duration::from_secs(10);

#[derive(Clone, Copy, Debug)]
pub struct PollOptions {
    pub timeout: Duration,
    pub retry_delay: Duration,
}

impl From<&Config> for PollOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            timeout: cfg.poll_timeout,
            retry_delay: cfg.poll_retry_delay,
        }
    }
}

/// Build the bot client and verify the token.
///
/// Any failure here is fatal to the process.
pub async fn connect(cfg: &Config) -> anyhow::Result<(Bot, Me)> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(cfg.poll_timeout + HTTP_TIMEOUT_SLACK)
        .build()?;
    let bot = Bot::with_client(cfg.telegram_bot_token.clone(), client);

    let me = bot
        .get_me()
        .await
        .map_err(|e| anyhow::anyhow!("telegram login failed: {e}"))?;
    info!(bot = me.username(), "logged in");

    Ok((bot, me))
}

/// Run until `shutdown` is cancelled.
pub async fn run_polling(
    bot: Bot,
    mut router: UpdateRouter,
    opts: PollOptions,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    let producer = spawn_poller(bot, opts, tx, shutdown.clone());

    consume(rx, &mut router, &shutdown).await;

    shutdown.cancel();
    producer.await?;
    info!("consumer stopped");
    Ok(())
}

/// Hand queued messages to the router one at a time, in arrival order.
///
/// Cancellation is only observed between updates.
pub async fn consume(
    mut rx: mpsc::UnboundedReceiver<IncomingMessage>,
    router: &mut UpdateRouter,
    shutdown: &CancellationToken,
) {
    info!(
        target_chat = router.forward_target().0,
        started_at = %router.started_at(),
        "consuming updates"
    );

    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.cancelled() => None,
            msg = rx.recv() => msg,
        };
        let Some(msg) = next else {
            break;
        };

        let chat_id = msg.chat_id.0;
        let outcome = router.handle(msg).await;
        debug!(chat_id, ?outcome, "update handled");
    }
}

fn spawn_poller(
    bot: Bot,
    opts: PollOptions,
    tx: mpsc::UnboundedSender<IncomingMessage>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let timeout_secs = u32::try_from(opts.timeout.as_secs()).unwrap_or(u32::MAX);
        let mut offset: i32 = 0;

        loop {
            let req = bot.get_updates().offset(offset).timeout(timeout_secs);
            let res = tokio::select! {
                _ = shutdown.cancelled() => return,
                res = req.send() => res,
            };

            let updates = match res {
                Ok(u) => u,
                Err(e) => {
                    warn!(
                        retry_in_ms = opts.retry_delay.as_millis() as u64,
                        "getUpdates failed: {e}"
                    );
                    tokio::select! {
                        _ = shutdown.cancelled() => return,
                        _ = tokio::time::sleep(opts.retry_delay) => continue,
                    }
                }
            };

            for upd in updates {
                offset = upd.id + 1;
                let UpdateKind::Message(msg) = upd.kind else {
                    continue;
                };
                if tx.send(incoming_from(&msg)).is_err() {
                    return;
                }
            }
        }
    })
}
