//! # WhatsApp Webhook Schemas
//!
//! Payload structures Meta posts to the webhook. Inbound messages are kept as
//! raw JSON inside [`MessageChangeValue`] and typed one at a time during
//! normalization, so a single odd message only affects its own entry.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Root webhook payload
///
/// Entries stay raw until the dispatcher reaches them, a malformed entry
/// must not fail the whole delivery.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookPayload {
    /// The object type, `whatsapp_business_account` for WhatsApp
    pub object: String,
    /// Entries in delivery order
    #[serde(default)]
    pub entry: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Entry {
    /// Business Account ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Change {
    /// The field that changed (e.g., "messages", "message_template_status_update")
    pub field: String,
    /// Field specific value, typed by the consumer
    #[serde(default)]
    pub value: Value,
}

/// Value of a `messages` change
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessageChangeValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messaging_product: Option<String>,
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contacts: Vec<Contact>,
    /// Raw inbound messages
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Value>,
    /// Raw status updates for sent messages
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub statuses: Vec<Value>,
}

/// Metadata about the business phone number
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_phone_number: Option<String>,
    pub phone_number_id: String,
}

/// Sender information
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    /// WhatsApp ID (phone number)
    pub wa_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    pub name: String,
}

/// Inbound message as sent by Meta
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InboundMessage {
    pub id: String,
    /// Sender's WhatsApp ID
    pub from: String,
    /// Unix timestamp in seconds, as a string
    pub timestamp: String,
    /// Message type, selects which content field is set
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<MediaContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<MediaContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<MediaContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<MediaContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticker: Option<MediaContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Vec<SharedContact>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interactive: Option<InteractiveContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<ButtonContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction: Option<ReactionContent>,
    /// Set when the message replies to or forwards another one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<MessageContext>,
    /// Set for `unsupported` messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<WebhookError>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TextContent {
    pub body: String,
}

/// Media message content (image, video, audio, document, sticker)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MediaContent {
    /// Media ID, resolve it with the media API
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Voice note flag (audio only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<bool>,
    /// Animated flag (sticker only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animated: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LocationContent {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Contact card shared by the user
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SharedContact {
    pub name: ContactName,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phones: Vec<ContactPhone>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ContactName {
    pub formatted_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ContactPhone {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wa_id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub phone_type: Option<String>,
}

/// Reply to an interactive message
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractiveContent {
    ButtonReply { button_reply: ReplyOption },
    ListReply { list_reply: ReplyOption },
    /// Completed flow, `response_json` holds the flow output
    NfmReply { nfm_reply: FlowReply },
    #[serde(other)]
    Unknown,
}

impl InteractiveContent {
    /// ID of the selected button or row
    pub fn reply_id(&self) -> Option<&str> {
        match self {
            Self::ButtonReply { button_reply: reply } | Self::ListReply { list_reply: reply } => {
                Some(&reply.id)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReplyOption {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FlowReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// JSON document encoded as a string
    pub response_json: String,
}

impl FlowReply {
    pub fn response(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.response_json)
    }
}

/// Quick reply button of a template message
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ButtonContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OrderContent {
    pub catalog_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub product_items: Vec<ProductItem>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProductItem {
    pub product_retailer_id: String,
    pub quantity: u32,
    pub item_price: f64,
    pub currency: String,
}

/// Number change or identity change notice
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SystemContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub system_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wa_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReactionContent {
    /// Message the reaction applies to
    pub message_id: String,
    /// Absent when the reaction was removed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MessageContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// ID of the message being replied to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forwarded: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequently_forwarded: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referred_product: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WebhookError {
    pub code: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_data: Option<Value>,
}

/// Delivery status of a message sent by the business
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StatusUpdate {
    pub id: String,
    /// sent, delivered, read or failed
    pub status: String,
    pub timestamp: String,
    pub recipient_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<WebhookError>>,
}
