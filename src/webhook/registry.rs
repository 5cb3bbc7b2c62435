//! Handler registration for webhook deliveries.
//!
//! The registry is built once before the server starts and owned by the
//! dispatcher, it is read-only afterwards.

use super::{message::MessageType, message::WebhookMessage, schemas::StatusUpdate};
use crate::consts;
use async_trait::async_trait;
use serde_json::Value;
use std::{collections::HashMap, fmt, future::Future};

#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: WebhookMessage) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> MessageHandler for F
where
    F: Fn(WebhookMessage) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn handle(&self, message: WebhookMessage) -> anyhow::Result<()> {
        (self)(message).await
    }
}

/// A change whose field is not `messages`, or the statuses of a `messages` change
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEvent {
    pub field: String,
    pub value: Value,
}

impl WebhookEvent {
    pub fn new(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            value,
        }
    }

    /// Typed status updates, only for events under the `statuses` field
    pub fn statuses(&self) -> Option<serde_json::Result<Vec<StatusUpdate>>> {
        (self.field == consts::STATUSES_FIELD)
            .then(|| serde_json::from_value(self.value.clone()))
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: WebhookEvent) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> EventHandler for F
where
    F: Fn(WebhookEvent) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn handle(&self, event: WebhookEvent) -> anyhow::Result<()> {
        (self)(event).await
    }
}

/// Message and event handlers, at most one per tag
///
/// Registering a second handler for the same tag replaces the first one.
#[derive(Default)]
pub struct HandlerRegistry {
    message_handlers: HashMap<MessageType, Box<dyn MessageHandler>>,
    any_message_handler: Option<Box<dyn MessageHandler>>,
    event_handlers: HashMap<String, Box<dyn EventHandler>>,
    any_event_handler: Option<Box<dyn EventHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler for one message type
    pub fn on_message(
        mut self,
        message_type: MessageType,
        handler: impl MessageHandler + 'static,
    ) -> Self {
        self.message_handlers.insert(message_type, Box::new(handler));
        self
    }

    /// Handler for every message, runs after the type specific one
    pub fn on_any_message(mut self, handler: impl MessageHandler + 'static) -> Self {
        self.any_message_handler = Some(Box::new(handler));
        self
    }

    /// Handler for one change field (`statuses` included)
    pub fn on_event(mut self, field: impl Into<String>, handler: impl EventHandler + 'static) -> Self {
        self.event_handlers.insert(field.into(), Box::new(handler));
        self
    }

    /// Handler for every event, runs after the field specific one
    pub fn on_any_event(mut self, handler: impl EventHandler + 'static) -> Self {
        self.any_event_handler = Some(Box::new(handler));
        self
    }

    /// Handlers for `message_type` in invocation order: exact tag, then wildcard
    pub fn message_handlers<'a>(
        &'a self,
        message_type: &MessageType,
    ) -> impl Iterator<Item = &'a dyn MessageHandler> {
        self.message_handlers
            .get(message_type)
            .into_iter()
            .chain(self.any_message_handler.as_ref())
            .map(|handler| handler.as_ref())
    }

    /// Handlers for `field` in invocation order: exact field, then wildcard
    pub fn event_handlers<'a>(&'a self, field: &str) -> impl Iterator<Item = &'a dyn EventHandler> {
        self.event_handlers
            .get(field)
            .into_iter()
            .chain(self.any_event_handler.as_ref())
            .map(|handler| handler.as_ref())
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("message_types", &self.message_handlers.keys().collect::<Vec<_>>())
            .field("any_message", &self.any_message_handler.is_some())
            .field("event_fields", &self.event_handlers.keys().collect::<Vec<_>>())
            .field("any_event", &self.any_event_handler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn message(message_type: &str) -> WebhookMessage {
        WebhookMessage::normalize(
            json!({"from": "1", "id": "wamid.1", "timestamp": "1", "type": message_type}),
            "pn",
        )
        .unwrap()
    }

    fn recorder(calls: Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> impl MessageHandler {
        move |_: WebhookMessage| {
            let calls = calls.clone();
            async move {
                calls.lock().unwrap().push(name);
                anyhow::Ok(())
            }
        }
    }

    #[ntex::test]
    async fn test_last_registration_wins() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let registry = HandlerRegistry::new()
            .on_message(MessageType::Text, recorder(calls.clone(), "first"))
            .on_message(MessageType::Text, recorder(calls.clone(), "second"));

        for handler in registry.message_handlers(&MessageType::Text) {
            handler.handle(message("text")).await.unwrap();
        }

        assert_eq!(*calls.lock().unwrap(), vec!["second"]);
    }

    #[ntex::test]
    async fn test_exact_handler_runs_before_wildcard() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let registry = HandlerRegistry::new()
            .on_any_message(recorder(calls.clone(), "any"))
            .on_message(MessageType::Image, recorder(calls.clone(), "image"));

        for handler in registry.message_handlers(&MessageType::Image) {
            handler.handle(message("image")).await.unwrap();
        }
        for handler in registry.message_handlers(&MessageType::Text) {
            handler.handle(message("text")).await.unwrap();
        }

        assert_eq!(*calls.lock().unwrap(), vec!["image", "any", "any"]);
    }

    #[test]
    fn test_event_handler_lookup() {
        let registry = HandlerRegistry::new()
            .on_event("account_update", |_: WebhookEvent| async { anyhow::Ok(()) })
            .on_any_event(|_: WebhookEvent| async { anyhow::Ok(()) });

        assert_eq!(registry.event_handlers("account_update").count(), 2);
        assert_eq!(registry.event_handlers("statuses").count(), 1);
        assert_eq!(HandlerRegistry::new().event_handlers("statuses").count(), 0);
    }

    #[test]
    fn test_statuses_only_for_statuses_field() {
        let statuses = WebhookEvent::new(
            "statuses",
            json!([{"id": "wamid.1", "status": "read", "timestamp": "1", "recipient_id": "2"}]),
        );
        assert_eq!(statuses.statuses().unwrap().unwrap()[0].status, "read");

        let other = WebhookEvent::new("account_update", json!({}));
        assert!(other.statuses().is_none());
    }
}
