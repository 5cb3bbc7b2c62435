//! # WhatsApp Cloud
//!
//! Server side building blocks for the WhatsApp Cloud API:
//!
//! - [`webhook`] - subscription handshake, signature checks and ordered
//!   dispatch of inbound messages and events to registered handlers
//! - [`flow`] - RSA key generation and the RSA-OAEP + AES-128-GCM exchange
//!   used by WhatsApp Flows data endpoints
//! - [`client`] - Graph API transport plus the messages and media APIs

pub mod client;
pub mod config;
pub mod consts;
pub mod flow;
pub mod logger;
pub mod metric;
pub mod state;
pub mod webhook;
