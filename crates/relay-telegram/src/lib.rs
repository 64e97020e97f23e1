//! Telegram adapter (teloxide).
//!
//! This crate implements the `relay-core` ChatPort over the Telegram Bot API
//! and drives the update router from a long-polling loop.

use async_trait::async_trait;

use teloxide::{prelude::*, types::InputFile};

pub mod handlers;
pub mod polling;

use relay_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{port::ChatPort, types::OutboundMessage},
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::Transport(format!("telegram error: {e}"))
    }
}

#[async_trait]
impl ChatPort for TelegramMessenger {
    async fn chat_title(&self, chat_id: ChatId) -> Result<String> {
        let chat = self
            .bot
            .get_chat(Self::tg_chat(chat_id))
            .await
            .map_err(Self::map_err)?;
        Ok(chat.title().unwrap_or_default().to_string())
    }

    async fn send(&self, msg: OutboundMessage) -> Result<MessageRef> {
        let sent = match msg {
            OutboundMessage::Text { chat_id, body } => self
                .bot
                .send_message(Self::tg_chat(chat_id), body)
                .await
                .map_err(Self::map_err)?,
            OutboundMessage::Photo {
                chat_id,
                file_ref,
                caption,
            } => {
                let mut req = self
                    .bot
                    .send_photo(Self::tg_chat(chat_id), InputFile::file_id(file_ref));
                if !caption.is_empty() {
                    req = req.caption(caption);
                }
                req.await.map_err(Self::map_err)?
            }
            OutboundMessage::Forward { chat_id, source } => self
                .bot
                .forward_message(
                    Self::tg_chat(chat_id),
                    Self::tg_chat(source.chat_id),
                    Self::tg_msg_id(source.message_id),
                )
                .await
                .map_err(Self::map_err)?,
        };

        Ok(MessageRef {
            chat_id: ChatId(sent.chat.id.0),
            message_id: MessageId(sent.id.0),
        })
    }
}
