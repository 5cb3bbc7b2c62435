//! # WhatsApp Webhook Dispatcher
//!
//! Framework independent webhook handling: the subscription handshake (GET)
//! and event deliveries (POST). Routes translate HTTP requests into a
//! [`WebhookRequest`] and the returned [`WebhookResponse`] back into HTTP.
//!
//! A delivery is processed strictly in order. A failure inside one entry is
//! logged and stops that entry only, the delivery is still acknowledged with
//! 200 so Meta does not retry it forever.

use super::{
    message::WebhookMessage,
    registry::{HandlerRegistry, WebhookEvent},
    schemas::{Entry, MessageChangeValue, WebhookPayload},
    security,
};
use crate::{consts, metric};
use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;
use subtle::ConstantTimeEq;
use tracing::{debug, error, info, warn};

/// Status and body to send back to Meta
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookResponse {
    pub status: u16,
    pub body: String,
}

impl WebhookResponse {
    fn empty(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }

    fn challenge(challenge: String) -> Self {
        Self {
            status: 200,
            body: challenge,
        }
    }
}

/// Query parameters of the verification handshake
#[derive(Debug, Default, Clone, Deserialize)]
pub struct VerifyQuery {
    /// Should be "subscribe"
    #[serde(rename = "hub.mode", default)]
    pub mode: Option<String>,
    /// Token configured in the Meta app dashboard
    #[serde(rename = "hub.verify_token", default)]
    pub verify_token: Option<String>,
    /// Value to echo back
    #[serde(rename = "hub.challenge", default)]
    pub challenge: Option<String>,
}

/// An HTTP request reduced to what the dispatcher needs
#[derive(Debug)]
pub struct WebhookRequest<'a> {
    pub method: &'a str,
    pub query: VerifyQuery,
    pub body: &'a [u8],
    /// `X-Hub-Signature-256` header value
    pub signature: Option<&'a str>,
}

#[derive(Debug)]
pub struct WebhookDispatcher {
    verify_token: String,
    app_secret: Option<String>,
    registry: HandlerRegistry,
}

impl WebhookDispatcher {
    pub fn new(verify_token: impl Into<String>, registry: HandlerRegistry) -> Self {
        Self {
            verify_token: verify_token.into(),
            app_secret: None,
            registry,
        }
    }

    /// Rejects POST deliveries without a valid `X-Hub-Signature-256`
    pub fn with_app_secret(mut self, app_secret: impl Into<String>) -> Self {
        self.app_secret = Some(app_secret.into());
        self
    }

    pub async fn handle_request(&self, request: WebhookRequest<'_>) -> WebhookResponse {
        match request.method {
            "GET" => self.verify(&request.query),
            "POST" => self.receive(request.body, request.signature).await,
            method => {
                debug!(method, "unsupported webhook method");
                WebhookResponse::empty(405)
            }
        }
    }

    /// Subscription handshake.
    ///
    /// # Returns
    /// - 200 with the challenge when the mode is `subscribe`, the token matches
    ///   and a challenge was sent
    /// - 403 with an empty body otherwise
    pub fn verify(&self, query: &VerifyQuery) -> WebhookResponse {
        let mode_matches = query.mode.as_deref() == Some(consts::SUBSCRIBE_MODE);
        let token_matches = query.verify_token.as_deref().is_some_and(|token| {
            token.as_bytes().ct_eq(self.verify_token.as_bytes()).into()
        });

        if mode_matches && token_matches {
            if let Some(challenge) = &query.challenge {
                info!("webhook subscription verified");
                return WebhookResponse::challenge(challenge.clone());
            }
            warn!("webhook verification rejected: missing hub.challenge");
            return WebhookResponse::empty(403);
        }

        warn!(mode = ?query.mode, "webhook verification rejected");
        WebhookResponse::empty(403)
    }

    /// Event delivery: signature check, parsing, then [`Self::dispatch`]
    pub async fn receive(&self, body: &[u8], signature: Option<&str>) -> WebhookResponse {
        if let Some(app_secret) = &self.app_secret {
            if let Err(e) = security::verify_signature(signature, body, app_secret) {
                warn!(error = %e, "webhook delivery rejected");
                return WebhookResponse::empty(401);
            }
        }

        match serde_json::from_slice::<WebhookPayload>(body) {
            Ok(payload) => self.dispatch(payload).await,
            Err(e) => {
                warn!(error = %e, "webhook body is not a valid payload");
                WebhookResponse::empty(400)
            }
        }
    }

    /// Runs every entry of `payload` through the registered handlers.
    ///
    /// # Returns
    /// - 404 when the object is not a WhatsApp business account, nothing runs
    /// - 200 once all entries were processed, failed ones included
    pub async fn dispatch(&self, payload: WebhookPayload) -> WebhookResponse {
        if payload.object != consts::WHATSAPP_BUSINESS_ACCOUNT_OBJECT {
            warn!(object = %payload.object, "ignoring webhook for unexpected object");
            return WebhookResponse::empty(404);
        }

        for entry in payload.entry {
            let entry_id = match entry.get("id") {
                Some(Value::String(id)) => id.clone(),
                Some(id) => id.to_string(),
                None => String::new(),
            };
            if let Err(e) = self.process_entry(entry).await {
                error!(entry_id = %entry_id, "failed to process webhook entry: {e:#}");
                metric::incr_webhook_failed_entry_statds("handler_or_payload_error");
            }
        }

        WebhookResponse::empty(200)
    }

    async fn process_entry(&self, entry: Value) -> anyhow::Result<()> {
        let entry: Entry = serde_json::from_value(entry).context("invalid webhook entry")?;

        for change in entry.changes {
            if change.field == consts::MESSAGES_FIELD {
                self.process_messages(change.value).await?;
            } else {
                self.dispatch_event(WebhookEvent::new(change.field, change.value))
                    .await?;
            }
        }

        Ok(())
    }

    async fn process_messages(&self, value: Value) -> anyhow::Result<()> {
        let value: MessageChangeValue =
            serde_json::from_value(value).context("invalid messages change value")?;

        for raw in value.messages {
            let message = WebhookMessage::normalize(raw, &value.metadata.phone_number_id)
                .context("invalid inbound message")?;
            self.dispatch_message(message).await?;
        }

        if !value.statuses.is_empty() {
            self.dispatch_event(WebhookEvent::new(
                consts::STATUSES_FIELD,
                Value::Array(value.statuses),
            ))
            .await?;
        }

        Ok(())
    }

    /// Type handler first, then the wildcard handler, each awaited in turn
    pub async fn dispatch_message(&self, message: WebhookMessage) -> anyhow::Result<()> {
        metric::incr_webhook_message_statds(message.message_type.as_str());
        debug!(message_id = %message.id, message_type = %message.message_type, "dispatching message");

        for handler in self.registry.message_handlers(&message.message_type) {
            handler.handle(message.clone()).await?;
        }

        Ok(())
    }

    /// Field handler first, then the wildcard handler, each awaited in turn
    pub async fn dispatch_event(&self, event: WebhookEvent) -> anyhow::Result<()> {
        metric::incr_webhook_event_statds(&event.field);
        debug!(field = %event.field, "dispatching event");

        for handler in self.registry.event_handlers(&event.field) {
            handler.handle(event.clone()).await?;
        }

        Ok(())
    }
}
