//! Messages API: `POST /{phone_number_id}/messages`

use super::{
    GraphError, GraphRequest, GraphTransport,
    outgoing::{OutgoingMessage, SendMessageResponse},
};
use crate::consts;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct SuccessResponse {
    #[serde(default)]
    success: bool,
}

/// Sends messages from one business phone number
#[derive(Clone)]
pub struct MessagesApi {
    transport: Arc<dyn GraphTransport>,
    phone_number_id: String,
}

impl MessagesApi {
    pub fn new(transport: Arc<dyn GraphTransport>, phone_number_id: impl Into<String>) -> Self {
        Self {
            transport,
            phone_number_id: phone_number_id.into(),
        }
    }

    fn path(&self) -> String {
        format!("{}/messages", self.phone_number_id)
    }

    async fn post(&self, body: Value) -> Result<Value, GraphError> {
        let response = self
            .transport
            .send(GraphRequest::post_json(self.path(), body))
            .await?;
        Ok(response.body)
    }

    /// Sends any outgoing message
    pub async fn send(&self, message: &OutgoingMessage) -> Result<SendMessageResponse, GraphError> {
        let body = serde_json::to_value(message)
            .map_err(|e| GraphError::InvalidRequest(e.to_string()))?;
        serde_json::from_value(self.post(body).await?).map_err(GraphError::Decode)
    }

    pub async fn send_text(
        &self,
        to: &str,
        body: &str,
    ) -> Result<SendMessageResponse, GraphError> {
        self.send(&OutgoingMessage::text(to, body)).await
    }

    pub async fn send_reaction(
        &self,
        to: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<SendMessageResponse, GraphError> {
        self.send(&OutgoingMessage::reaction(to, message_id, emoji))
            .await
    }

    /// Marks an inbound message as read (blue ticks)
    pub async fn mark_as_read(&self, message_id: &str) -> Result<bool, GraphError> {
        let body = json!({
            "messaging_product": consts::MESSAGING_PRODUCT,
            "status": "read",
            "message_id": message_id,
        });
        let response: SuccessResponse =
            serde_json::from_value(self.post(body).await?).map_err(GraphError::Decode)?;
        Ok(response.success)
    }

    /// Marks the message as read and shows a typing indicator to the sender
    pub async fn send_typing_indicator(&self, message_id: &str) -> Result<bool, GraphError> {
        let body = json!({
            "messaging_product": consts::MESSAGING_PRODUCT,
            "status": "read",
            "message_id": message_id,
            "typing_indicator": {"type": "text"},
        });
        let response: SuccessResponse =
            serde_json::from_value(self.post(body).await?).map_err(GraphError::Decode)?;
        Ok(response.success)
    }
}
