use chrono::{DateTime, Utc};

use crate::domain::{ChatId, MessageId, MessageRef, UserId};

/// Kind of chat an update arrived in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Channel,
}

/// One size variant of an attached image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
}

/// Messenger-agnostic inbound message.
///
/// Telegram-specific fields stay in the Telegram adapter.
#[derive(Clone, Debug)]
pub struct IncomingMessage {
    pub chat_id: ChatId,
    pub chat_kind: ChatKind,
    pub message_id: MessageId,
    pub sender: Option<UserId>,
    pub sent_at: DateTime<Utc>,
    pub text: Option<String>,
    pub caption: Option<String>,
    /// Size variants in platform order, smallest first.
    pub photos: Vec<PhotoSize>,
}

impl IncomingMessage {
    pub fn message_ref(&self) -> MessageRef {
        MessageRef {
            chat_id: self.chat_id,
            message_id: self.message_id,
        }
    }

    /// Highest-resolution variant (the last one).
    pub fn best_photo(&self) -> Option<&PhotoSize> {
        self.photos.last()
    }

    /// Text to post: the caption when a captioned image is attached, else the body.
    pub fn text_payload(&self) -> String {
        if self.best_photo().is_some() {
            if let Some(caption) = self.caption.as_deref().filter(|c| !c.is_empty()) {
                return caption.to_string();
            }
        }
        self.text.clone().unwrap_or_default()
    }
}

/// Outbound chat call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundMessage {
    Text {
        chat_id: ChatId,
        body: String,
    },
    Photo {
        chat_id: ChatId,
        file_ref: String,
        caption: String,
    },
    Forward {
        chat_id: ChatId,
        source: MessageRef,
    },
}

impl OutboundMessage {
    pub fn chat_id(&self) -> ChatId {
        match self {
            Self::Text { chat_id, .. } | Self::Photo { chat_id, .. } | Self::Forward { chat_id, .. } => {
                *chat_id
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Photo { .. } => "photo",
            Self::Forward { .. } => "forward",
        }
    }
}

/// HTTP outcome of a social post.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PostReceipt {
    pub status: u16,
}

impl PostReceipt {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
