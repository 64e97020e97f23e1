use async_trait::async_trait;

use crate::{
    credentials::CredentialBundle,
    domain::{ChatId, MessageRef},
    messaging::types::{OutboundMessage, PostReceipt},
    Result,
};

/// Chat-platform port.
///
/// Telegram is the only implementation; the router only ever needs to look up
/// a chat title and send one of the three outbound shapes.
#[async_trait]
pub trait ChatPort: Send + Sync {
    async fn chat_title(&self, chat_id: ChatId) -> Result<String>;

    async fn send(&self, msg: OutboundMessage) -> Result<MessageRef>;
}

/// Social-posting port.
///
/// Returns the HTTP status for any completed exchange; only transport failures
/// are errors.
#[async_trait]
pub trait SocialPort: Send + Sync {
    async fn post_text(&self, creds: &CredentialBundle, text: &str) -> Result<PostReceipt>;
}
