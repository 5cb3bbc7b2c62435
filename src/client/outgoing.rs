//! # Outgoing Message Schemas
//!
//! Bodies for `POST /{phone_number_id}/messages`. Every message shares the
//! envelope in [`OutgoingMessage`]; the type tag and the matching content
//! field come from [`OutgoingContent`].

use crate::consts;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message to send through the Cloud API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Always "whatsapp"
    pub messaging_product: String,
    pub recipient_type: String,
    /// Recipient's WhatsApp ID (phone number)
    pub to: String,
    /// Set to quote a previous message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ReplyContext>,
    #[serde(flatten)]
    pub content: OutgoingContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyContext {
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutgoingContent {
    Text { text: TextBody },
    Reaction { reaction: Reaction },
    Image { image: MediaObject },
    Document { document: MediaObject },
    Location { location: Location },
    Interactive { interactive: Interactive },
    Template { template: Template },
}

impl OutgoingMessage {
    pub fn new(to: impl Into<String>, content: OutgoingContent) -> Self {
        Self {
            messaging_product: consts::MESSAGING_PRODUCT.to_string(),
            recipient_type: "individual".to_string(),
            to: to.into(),
            context: None,
            content,
        }
    }

    pub fn text(to: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(
            to,
            OutgoingContent::Text {
                text: TextBody {
                    body: body.into(),
                    preview_url: None,
                },
            },
        )
    }

    /// Reacts to `message_id`, an empty emoji removes the reaction
    pub fn reaction(
        to: impl Into<String>,
        message_id: impl Into<String>,
        emoji: impl Into<String>,
    ) -> Self {
        Self::new(
            to,
            OutgoingContent::Reaction {
                reaction: Reaction {
                    message_id: message_id.into(),
                    emoji: emoji.into(),
                },
            },
        )
    }

    pub fn image(to: impl Into<String>, image: MediaObject) -> Self {
        Self::new(to, OutgoingContent::Image { image })
    }

    pub fn document(to: impl Into<String>, document: MediaObject) -> Self {
        Self::new(to, OutgoingContent::Document { document })
    }

    pub fn location(to: impl Into<String>, location: Location) -> Self {
        Self::new(to, OutgoingContent::Location { location })
    }

    /// Up to three quick reply buttons under `body`
    pub fn reply_buttons(
        to: impl Into<String>,
        body: impl Into<String>,
        buttons: Vec<ReplyButton>,
    ) -> Self {
        Self::new(
            to,
            OutgoingContent::Interactive {
                interactive: Interactive {
                    interactive_type: "button".to_string(),
                    header: None,
                    body: InteractiveBody { text: body.into() },
                    footer: None,
                    action: InteractiveAction {
                        button: None,
                        buttons: Some(buttons),
                        sections: None,
                    },
                },
            },
        )
    }

    /// Single section list opened with `button_text`
    pub fn list(
        to: impl Into<String>,
        header: impl Into<String>,
        body: impl Into<String>,
        button_text: impl Into<String>,
        rows: Vec<ListRow>,
    ) -> Self {
        Self::new(
            to,
            OutgoingContent::Interactive {
                interactive: Interactive {
                    interactive_type: "list".to_string(),
                    header: Some(InteractiveHeader {
                        header_type: "text".to_string(),
                        text: header.into(),
                    }),
                    body: InteractiveBody { text: body.into() },
                    footer: None,
                    action: InteractiveAction {
                        button: Some(button_text.into()),
                        buttons: None,
                        sections: Some(vec![ListSection { title: None, rows }]),
                    },
                },
            },
        )
    }

    pub fn template(
        to: impl Into<String>,
        name: impl Into<String>,
        language_code: impl Into<String>,
        components: Vec<Value>,
    ) -> Self {
        Self::new(
            to,
            OutgoingContent::Template {
                template: Template {
                    name: name.into(),
                    language: TemplateLanguage {
                        code: language_code.into(),
                    },
                    components,
                },
            },
        )
    }

    /// Quotes `message_id` in the chat
    pub fn reply_to(mut self, message_id: impl Into<String>) -> Self {
        self.context = Some(ReplyContext {
            message_id: message_id.into(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBody {
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub message_id: String,
    pub emoji: String,
}

/// Media referenced by uploaded ID or public link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Documents only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl MediaObject {
    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            link: None,
            caption: None,
            filename: None,
        }
    }

    pub fn from_link(link: impl Into<String>) -> Self {
        Self {
            id: None,
            link: Some(link.into()),
            caption: None,
            filename: None,
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interactive {
    /// "button" or "list"
    #[serde(rename = "type")]
    pub interactive_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<InteractiveHeader>,
    pub body: InteractiveBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<InteractiveBody>,
    pub action: InteractiveAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractiveHeader {
    #[serde(rename = "type")]
    pub header_type: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractiveBody {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractiveAction {
    /// List opener text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buttons: Option<Vec<ReplyButton>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<ListSection>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyButton {
    #[serde(rename = "type")]
    pub button_type: String,
    pub reply: ButtonReply,
}

impl ReplyButton {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            button_type: "reply".to_string(),
            reply: ButtonReply {
                id: id.into(),
                title: title.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonReply {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub rows: Vec<ListRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListRow {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ListRow {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub language: TemplateLanguage,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateLanguage {
    pub code: String,
}

/// Response of the messages endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub messaging_product: String,
    #[serde(default)]
    pub contacts: Vec<ResponseContact>,
    #[serde(default)]
    pub messages: Vec<SentMessage>,
}

impl SendMessageResponse {
    /// ID of the first accepted message
    pub fn message_id(&self) -> Option<&str> {
        self.messages.first().map(|message| message.id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseContact {
    pub input: String,
    pub wa_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentMessage {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_status: Option<String>,
}
