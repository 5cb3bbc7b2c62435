//! WhatsApp webhook ingestion
//!
//! ## Modules
//!
//! - [`dispatcher`] - Handshake and delivery processing
//! - [`registry`] - Message and event handler registration
//! - [`message`] - Normalized inbound messages
//! - [`schemas`] - Payload structures sent by Meta
//! - [`security`] - `X-Hub-Signature-256` verification
//! - [`routes`] - ntex route configuration

pub mod dispatcher;
pub mod message;
pub mod registry;
pub mod routes;
pub mod schemas;
pub mod security;

pub use dispatcher::{VerifyQuery, WebhookDispatcher, WebhookRequest, WebhookResponse};
pub use message::{MessageContent, MessageType, WebhookMessage};
pub use registry::{EventHandler, HandlerRegistry, MessageHandler, WebhookEvent};
