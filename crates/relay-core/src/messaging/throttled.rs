use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ChatId, MessageRef},
    messaging::{port::ChatPort, types::OutboundMessage},
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* Telegram API calls (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between calls per chat (Telegram 1 msg/sec style limits).
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40), // ~25/sec
            per_chat_min_interval: Duration::from_millis(1050), // ~0.95/sec
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// ChatPort decorator that spaces outbound calls.
///
/// Calls are delayed, never dropped or repeated.
pub struct ThrottledMessenger {
    inner: Arc<dyn ChatPort>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_chat: Mutex<HashMap<i64, Arc<Mutex<IntervalLimiter>>>>,
}

impl ThrottledMessenger {
    pub fn new(inner: Arc<dyn ChatPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_chat: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter_for_chat(&self, chat_id: i64) -> Arc<Mutex<IntervalLimiter>> {
        let mut map = self.per_chat.lock().await;
        map.entry(chat_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(IntervalLimiter::new(
                    self.cfg.per_chat_min_interval,
                )))
            })
            .clone()
    }

    async fn throttle_chat(&self, chat_id: i64) {
        let global_wait = { self.global.lock().await.reserve() };
        let chat_wait = {
            let lim = self.limiter_for_chat(chat_id).await;
            let mut guard = lim.lock().await;
            guard.reserve()
        };

        let wait = global_wait.max(chat_wait);
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }

    async fn throttle_global(&self) {
        let wait = { self.global.lock().await.reserve() };
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl ChatPort for ThrottledMessenger {
    async fn chat_title(&self, chat_id: ChatId) -> Result<String> {
        // Lookups don't count against the per-chat send limit.
        self.throttle_global().await;
        self.inner.chat_title(chat_id).await
    }

    async fn send(&self, msg: OutboundMessage) -> Result<MessageRef> {
        self.throttle_chat(msg.chat_id().0).await;
        self.inner.send(msg).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;
    use crate::domain::MessageId;

    #[derive(Default)]
    struct Recorder {
        sent: StdMutex<Vec<(OutboundMessage, Instant)>>,
    }

    #[async_trait::async_trait]
    impl ChatPort for Recorder {
        async fn chat_title(&self, _chat_id: ChatId) -> Result<String> {
            Ok("title".to_string())
        }

        async fn send(&self, msg: OutboundMessage) -> Result<MessageRef> {
            let chat_id = msg.chat_id();
            self.sent.lock().unwrap().push((msg, Instant::now()));
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(1),
            })
        }
    }

    fn text(chat: i64) -> OutboundMessage {
        OutboundMessage::Text {
            chat_id: ChatId(chat),
            body: "x".to_string(),
        }
    }

    #[test]
    fn limiter_spaces_reservations() {
        let mut lim = IntervalLimiter::new(Duration::from_secs(10));
        assert!(lim.reserve().is_zero());
        assert!(lim.reserve() > Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn same_chat_sends_are_spaced() {
        let rec = Arc::new(Recorder::default());
        let t = ThrottledMessenger::new(rec.clone(), ThrottleConfig::default());

        t.send(text(5)).await.unwrap();
        t.send(text(5)).await.unwrap();

        let sent = rec.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        let gap = sent[1].1.duration_since(sent[0].1);
        assert!(gap >= Duration::from_millis(1050));
    }

    #[tokio::test(start_paused = true)]
    async fn different_chats_only_wait_for_global_slot() {
        let rec = Arc::new(Recorder::default());
        let t = ThrottledMessenger::new(rec.clone(), ThrottleConfig::default());

        t.send(text(5)).await.unwrap();
        t.send(text(6)).await.unwrap();

        let sent = rec.sent.lock().unwrap();
        let gap = sent[1].1.duration_since(sent[0].1);
        assert!(gap < Duration::from_millis(1050));
        assert_eq!(t.chat_title(ChatId(5)).await.unwrap(), "title");
    }
}
