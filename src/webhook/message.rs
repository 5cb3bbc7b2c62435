//! Normalized inbound messages handed to message handlers.

use super::schemas::{
    ButtonContent, InboundMessage, InteractiveContent, LocationContent, MediaContent,
    MessageContext, OrderContent, ReactionContent, SharedContact, SystemContent, TextContent,
    WebhookError,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::{fmt, sync::Arc};

/// Message type tag used to route messages to handlers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageType {
    Text,
    Image,
    Video,
    Audio,
    Document,
    Sticker,
    Location,
    Contacts,
    Interactive,
    Button,
    Order,
    System,
    Reaction,
    /// Any tag without a dedicated variant (e.g. `unsupported`, `request_welcome`)
    Other(String),
}

impl MessageType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
            Self::Sticker => "sticker",
            Self::Location => "location",
            Self::Contacts => "contacts",
            Self::Interactive => "interactive",
            Self::Button => "button",
            Self::Order => "order",
            Self::System => "system",
            Self::Reaction => "reaction",
            Self::Other(tag) => tag,
        }
    }
}

impl From<&str> for MessageType {
    fn from(tag: &str) -> Self {
        match tag {
            "text" => Self::Text,
            "image" => Self::Image,
            "video" => Self::Video,
            "audio" => Self::Audio,
            "document" => Self::Document,
            "sticker" => Self::Sticker,
            "location" => Self::Location,
            "contacts" => Self::Contacts,
            "interactive" => Self::Interactive,
            "button" => Self::Button,
            "order" => Self::Order,
            "system" => Self::System,
            "reaction" => Self::Reaction,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type specific payload, at most one per message
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Text(TextContent),
    Image(MediaContent),
    Video(MediaContent),
    Audio(MediaContent),
    Document(MediaContent),
    Sticker(MediaContent),
    Location(LocationContent),
    Contacts(Vec<SharedContact>),
    Interactive(InteractiveContent),
    Button(ButtonContent),
    Order(OrderContent),
    System(SystemContent),
    Reaction(ReactionContent),
    /// Unknown type, or the field matching the type was absent
    Unsupported,
}

impl MessageContent {
    fn select(message: &mut InboundMessage, message_type: &MessageType) -> Self {
        let content = match message_type {
            MessageType::Text => message.text.take().map(Self::Text),
            MessageType::Image => message.image.take().map(Self::Image),
            MessageType::Video => message.video.take().map(Self::Video),
            MessageType::Audio => message.audio.take().map(Self::Audio),
            MessageType::Document => message.document.take().map(Self::Document),
            MessageType::Sticker => message.sticker.take().map(Self::Sticker),
            MessageType::Location => message.location.take().map(Self::Location),
            MessageType::Contacts => message.contacts.take().map(Self::Contacts),
            MessageType::Interactive => message.interactive.take().map(Self::Interactive),
            MessageType::Button => message.button.take().map(Self::Button),
            MessageType::Order => message.order.take().map(Self::Order),
            MessageType::System => message.system.take().map(Self::System),
            MessageType::Reaction => message.reaction.take().map(Self::Reaction),
            MessageType::Other(_) => None,
        };

        content.unwrap_or(Self::Unsupported)
    }
}

/// Inbound message after normalization
#[derive(Debug, Clone)]
pub struct WebhookMessage {
    pub id: String,
    pub from: String,
    pub timestamp: String,
    pub message_type: MessageType,
    /// Business phone number that received the message
    pub phone_number_id: String,
    pub content: MessageContent,
    pub context: Option<MessageContext>,
    pub errors: Option<Vec<WebhookError>>,
    /// The message exactly as delivered
    pub raw: Arc<Value>,
}

impl WebhookMessage {
    /// Builds a normalized message from one raw entry of `value.messages`
    pub fn normalize(raw: Value, phone_number_id: &str) -> serde_json::Result<Self> {
        let mut message: InboundMessage = serde_json::from_value(raw.clone())?;
        let message_type = MessageType::from(message.msg_type.as_str());
        let content = MessageContent::select(&mut message, &message_type);

        Ok(Self {
            id: message.id,
            from: message.from,
            timestamp: message.timestamp,
            message_type,
            phone_number_id: phone_number_id.to_string(),
            content,
            context: message.context,
            errors: message.errors,
            raw: Arc::new(raw),
        })
    }

    pub fn text_body(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(text) => Some(&text.body),
            _ => None,
        }
    }

    /// Send time, `None` when the timestamp is not unix seconds
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        let seconds = self.timestamp.parse::<i64>().ok()?;
        DateTime::from_timestamp(seconds, 0)
    }

    /// ID of the message this one replies to
    pub fn reply_to(&self) -> Option<&str> {
        self.context.as_ref().and_then(|context| context.id.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_text_message() {
        let raw = json!({
            "from": "16505551234",
            "id": "wamid.1",
            "timestamp": "1749416383",
            "type": "text",
            "text": {"body": "Hello"},
            "context": {"from": "15550783881", "id": "wamid.0"}
        });

        let message = WebhookMessage::normalize(raw.clone(), "106540352242922").unwrap();

        assert_eq!(message.id, "wamid.1");
        assert_eq!(message.from, "16505551234");
        assert_eq!(message.message_type, MessageType::Text);
        assert_eq!(message.phone_number_id, "106540352242922");
        assert_eq!(message.text_body(), Some("Hello"));
        assert_eq!(message.reply_to(), Some("wamid.0"));
        assert_eq!(*message.raw, raw);
        assert_eq!(
            message.sent_at().unwrap().to_rfc3339(),
            "2025-06-08T20:59:43+00:00"
        );
    }

    #[test]
    fn test_content_selected_by_type_only() {
        let message = WebhookMessage::normalize(
            json!({
                "from": "1", "id": "wamid.2", "timestamp": "1", "type": "image",
                "image": {"id": "media-1", "mime_type": "image/jpeg"},
                "text": {"body": "ignored"}
            }),
            "pn",
        )
        .unwrap();

        let MessageContent::Image(image) = &message.content else {
            panic!("expected image content");
        };
        assert_eq!(image.id, "media-1");
        assert_eq!(message.text_body(), None);
    }

    #[test]
    fn test_unknown_type_passes_through() {
        let message = WebhookMessage::normalize(
            json!({
                "from": "1", "id": "wamid.3", "timestamp": "1", "type": "unsupported",
                "errors": [{"code": 131051, "title": "Message type unknown"}]
            }),
            "pn",
        )
        .unwrap();

        assert_eq!(message.message_type, MessageType::Other("unsupported".into()));
        assert_eq!(message.content, MessageContent::Unsupported);
        assert_eq!(message.errors.unwrap()[0].code, 131051);
    }

    #[test]
    fn test_missing_base_field_is_an_error() {
        assert!(WebhookMessage::normalize(json!({"type": "text"}), "pn").is_err());
    }

    #[test]
    fn test_message_type_tags() {
        for tag in ["text", "interactive", "reaction", "request_welcome"] {
            assert_eq!(MessageType::from(tag).as_str(), tag);
        }
        assert_eq!(MessageType::Contacts.to_string(), "contacts");
    }
}
