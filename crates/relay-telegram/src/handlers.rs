//! Telegram -> core update conversion.

use teloxide::types::Message;

use relay_core::{
    domain::{ChatId, MessageId, UserId},
    messaging::types::{ChatKind, IncomingMessage, PhotoSize},
};

pub fn incoming_from(msg: &Message) -> IncomingMessage {
    let chat_kind = if msg.chat.is_private() {
        ChatKind::Private
    } else if msg.chat.is_channel() {
        ChatKind::Channel
    } else {
        ChatKind::Group
    };

    let photos = msg
        .photo()
        .unwrap_or_default()
        .iter()
        .map(|p| PhotoSize {
            file_id: p.file.id.clone(),
            width: p.width,
            height: p.height,
        })
        .collect();

    IncomingMessage {
        chat_id: ChatId(msg.chat.id.0),
        chat_kind,
        message_id: MessageId(msg.id.0),
        sender: msg.from().map(|u| UserId(u.id.0 as i64)),
        sent_at: msg.date,
        text: msg.text().map(str::to_string),
        caption: msg.caption().map(str::to_string),
        photos,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: serde_json::Value) -> Message {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn private_text_message() {
        let msg = parse(serde_json::json!({
            "message_id": 7,
            "date": 1767268800,
            "chat": { "id": 42, "type": "private", "first_name": "Ann" },
            "from": { "id": 42, "is_bot": false, "first_name": "Ann" },
            "text": "hello"
        }));

        let inc = incoming_from(&msg);
        assert_eq!(inc.chat_id, ChatId(42));
        assert_eq!(inc.chat_kind, ChatKind::Private);
        assert_eq!(inc.message_id, MessageId(7));
        assert_eq!(inc.sender, Some(UserId(42)));
        assert_eq!(inc.sent_at.timestamp(), 1767268800);
        assert_eq!(inc.text.as_deref(), Some("hello"));
        assert!(inc.photos.is_empty());
    }

    #[test]
    fn captioned_photo_keeps_size_order() {
        let msg = parse(serde_json::json!({
            "message_id": 8,
            "date": 1767268800,
            "chat": { "id": 42, "type": "private", "first_name": "Ann" },
            "from": { "id": 42, "is_bot": false, "first_name": "Ann" },
            "photo": [
                { "file_id": "small", "file_unique_id": "s", "width": 90, "height": 90, "file_size": 1000 },
                { "file_id": "large", "file_unique_id": "l", "width": 1280, "height": 1280, "file_size": 90000 }
            ],
            "caption": "buy now"
        }));

        let inc = incoming_from(&msg);
        assert_eq!(inc.text, None);
        assert_eq!(inc.caption.as_deref(), Some("buy now"));
        assert_eq!(inc.best_photo().map(|p| p.file_id.as_str()), Some("large"));
        assert_eq!(inc.text_payload(), "buy now");
    }

    #[test]
    fn supergroup_message() {
        let msg = parse(serde_json::json!({
            "message_id": 9,
            "date": 1767268800,
            "chat": { "id": -1001111111111i64, "type": "supergroup", "title": "Home" },
            "from": { "id": 5, "is_bot": false, "first_name": "Bo" },
            "text": "/2073907096@relay_bot"
        }));

        let inc = incoming_from(&msg);
        assert_eq!(inc.chat_kind, ChatKind::Group);
        assert_eq!(inc.chat_id, ChatId(-1001111111111));
    }
}
