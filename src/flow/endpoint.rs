//! # Flow Data Endpoint
//!
//! Glue between the HTTP layer and a [`FlowProcessor`]: verify, decrypt,
//! classify, process, encrypt. Every failure comes back as a
//! [`FlowEndpointError`] carrying the status code Meta expects.

use super::{
    crypto,
    errors::FlowCryptoError,
    keys::PrivateKeyInfo,
    schemas::{
        FlowDataExchangeRequest, FlowEncryptedRequestPayload, FlowErrorNotification, FlowRequest,
        FlowResponse,
    },
};
use crate::{
    metric,
    webhook::security::{self, SignatureError},
};
use async_trait::async_trait;
use derive_more::{Display, Error};
use std::sync::Arc;
use tracing::warn;

/// Business logic behind a Flow endpoint
///
/// Only data exchanges must be implemented, pings and client error
/// notifications have sensible defaults.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FlowProcessor: Send + Sync {
    async fn on_ping(&self) -> anyhow::Result<FlowResponse> {
        Ok(FlowResponse::health_check())
    }

    async fn on_error_notification(
        &self,
        notification: FlowErrorNotification,
    ) -> anyhow::Result<FlowResponse> {
        warn!(
            screen = %notification.screen,
            error = %notification.data.error,
            "flow client reported an error: {}",
            notification.data.error_message
        );
        Ok(FlowResponse::acknowledge_error())
    }

    async fn on_data_exchange(
        &self,
        request: FlowDataExchangeRequest,
    ) -> anyhow::Result<FlowResponse>;
}

/// Returned by a processor when the flow token is no longer valid.
///
/// Meta shows the user an error and closes the flow.
#[derive(Debug, Display, Error)]
#[display("flow token has expired")]
pub struct FlowTokenExpired;

#[derive(Debug, Display, Error)]
pub enum FlowEndpointError {
    #[display("{_0}")]
    Crypto(FlowCryptoError),

    #[display("flow request signature rejected: {_0}")]
    InvalidSignature(SignatureError),

    #[display("flow request body is not valid JSON: {_0}")]
    InvalidBody(#[error(not(source))] String),

    #[display("decrypted flow body is not a ping, data exchange or error notification")]
    UnknownRequest,

    #[display("flow token has expired")]
    FlowTokenExpired,

    #[display("flow processor failed: {_0}")]
    Processing(#[error(not(source))] anyhow::Error),
}

impl FlowEndpointError {
    /// HTTP status Meta expects for this failure
    pub fn status(&self) -> u16 {
        match self {
            Self::Crypto(FlowCryptoError::Decryption) => 421,
            Self::Crypto(FlowCryptoError::MalformedPayload(_)) => 400,
            Self::Crypto(_) => 500,
            Self::InvalidSignature(_) => 432,
            Self::InvalidBody(_) | Self::UnknownRequest => 400,
            Self::FlowTokenExpired => 427,
            Self::Processing(_) => 500,
        }
    }

    /// Response body, never carries key material or crypto internals
    pub fn public_message(&self) -> &'static str {
        match self.status() {
            421 => "flow request could not be decrypted",
            427 => "flow token has expired",
            432 => "invalid request signature",
            400 => "malformed flow request",
            _ => "flow request could not be processed",
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            Self::Crypto(FlowCryptoError::Decryption) => "decryption_failed",
            Self::Crypto(FlowCryptoError::MalformedPayload(_)) | Self::InvalidBody(_) => {
                "malformed"
            }
            Self::Crypto(_) => "crypto_error",
            Self::InvalidSignature(_) => "invalid_signature",
            Self::UnknownRequest => "unknown_request",
            Self::FlowTokenExpired => "token_expired",
            Self::Processing(_) => "processing_error",
        }
    }
}

pub struct FlowEndpoint {
    private_key: PrivateKeyInfo,
    app_secret: Option<String>,
    processor: Arc<dyn FlowProcessor>,
}

impl FlowEndpoint {
    pub fn new(private_key: PrivateKeyInfo, processor: Arc<dyn FlowProcessor>) -> Self {
        Self {
            private_key,
            app_secret: None,
            processor,
        }
    }

    /// Requires a valid `X-Hub-Signature-256` on every request
    pub fn with_app_secret(mut self, app_secret: impl Into<String>) -> Self {
        self.app_secret = Some(app_secret.into());
        self
    }

    /// Runs one encrypted exchange.
    ///
    /// # Arguments
    /// * `body` - Raw request body
    /// * `signature` - `X-Hub-Signature-256` header value, if any
    ///
    /// # Returns
    /// The base64 encrypted response to send back with status 200.
    pub async fn handle(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<String, FlowEndpointError> {
        let result = self.exchange(body, signature).await;

        match &result {
            Ok(_) => metric::incr_flow_request_statds("ok"),
            Err(e) => metric::incr_flow_request_statds(e.outcome()),
        }

        result
    }

    async fn exchange(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<String, FlowEndpointError> {
        if let Some(app_secret) = &self.app_secret {
            security::verify_signature(signature, body, app_secret)
                .map_err(FlowEndpointError::InvalidSignature)?;
        }

        let payload: FlowEncryptedRequestPayload = serde_json::from_slice(body)
            .map_err(|e| FlowEndpointError::InvalidBody(e.to_string()))?;

        let exchange = crypto::decrypt_flow_request(&payload, &self.private_key)
            .map_err(FlowEndpointError::Crypto)?;
        let request = exchange.request().ok_or(FlowEndpointError::UnknownRequest)?;
        let response = self.process(request).await?;

        exchange
            .encrypt_response(&response)
            .map_err(FlowEndpointError::Crypto)
    }

    async fn process(&self, request: FlowRequest) -> Result<FlowResponse, FlowEndpointError> {
        let result = match request {
            FlowRequest::Ping(_) => self.processor.on_ping().await,
            FlowRequest::ErrorNotification(notification) => {
                self.processor.on_error_notification(notification).await
            }
            FlowRequest::DataExchange(request) => self.processor.on_data_exchange(request).await,
        };

        result.map_err(|e| {
            if e.is::<FlowTokenExpired>() {
                FlowEndpointError::FlowTokenExpired
            } else {
                FlowEndpointError::Processing(e)
            }
        })
    }
}
