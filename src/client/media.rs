//! Media API: upload, lookup and deletion of media objects

use super::{FormPart, GraphError, GraphRequest, GraphTransport};
use crate::consts;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SuccessResponse {
    #[serde(default)]
    success: bool,
}

/// Media metadata, `url` is valid for a few minutes and needs the access token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    /// Sent either as a number or a numeric string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<Value>,
}

impl MediaInfo {
    pub fn file_size(&self) -> Option<u64> {
        match self.file_size.as_ref()? {
            Value::Number(size) => size.as_u64(),
            Value::String(size) => size.parse().ok(),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct MediaApi {
    transport: Arc<dyn GraphTransport>,
    phone_number_id: String,
}

impl MediaApi {
    pub fn new(transport: Arc<dyn GraphTransport>, phone_number_id: impl Into<String>) -> Self {
        Self {
            transport,
            phone_number_id: phone_number_id.into(),
        }
    }

    /// Uploads file bytes and returns the media ID to use in messages
    ///
    /// # Arguments
    /// * `bytes` - The file content
    /// * `mime_type` - MIME type of the file (e.g., "application/pdf", "image/jpeg")
    /// * `filename` - Name of the file
    pub async fn upload(
        &self,
        bytes: Vec<u8>,
        mime_type: &str,
        filename: &str,
    ) -> Result<String, GraphError> {
        let parts = vec![
            FormPart::Text {
                name: "messaging_product".into(),
                value: consts::MESSAGING_PRODUCT.into(),
            },
            FormPart::Text {
                name: "type".into(),
                value: mime_type.into(),
            },
            FormPart::File {
                name: "file".into(),
                filename: filename.into(),
                mime_type: mime_type.into(),
                bytes,
            },
        ];

        let request = GraphRequest::post_form(format!("{}/media", self.phone_number_id), parts)
            .with_timeout(consts::MEDIA_UPLOAD_TIMEOUT);
        let response: UploadResponse = self.transport.send(request).await?.json()?;

        Ok(response.id)
    }

    pub async fn get(&self, media_id: &str) -> Result<MediaInfo, GraphError> {
        self.transport
            .send(GraphRequest::get(media_id))
            .await?
            .json()
    }

    pub async fn delete(&self, media_id: &str) -> Result<bool, GraphError> {
        let response: SuccessResponse = self
            .transport
            .send(GraphRequest::delete(media_id))
            .await?
            .json()?;
        Ok(response.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{GraphBody, GraphMethod, GraphResponse, MockGraphTransport};
    use serde_json::json;

    #[ntex::test]
    async fn test_upload_builds_form() {
        let mut transport = MockGraphTransport::new();
        transport
            .expect_send()
            .withf(|request| {
                let GraphBody::Form(parts) = &request.body else {
                    return false;
                };
                request.path == "pn/media"
                    && request.timeout == consts::MEDIA_UPLOAD_TIMEOUT
                    && parts.len() == 3
                    && matches!(&parts[2], FormPart::File { filename, .. } if filename == "report.pdf")
            })
            .times(1)
            .returning(|_| {
                Ok(GraphResponse {
                    status: 200,
                    body: json!({"id": "media-1"}),
                })
            });

        let api = MediaApi::new(Arc::new(transport), "pn");
        let id = api
            .upload(b"%PDF".to_vec(), "application/pdf", "report.pdf")
            .await
            .unwrap();

        assert_eq!(id, "media-1");
    }

    #[ntex::test]
    async fn test_get_and_delete() {
        let mut transport = MockGraphTransport::new();
        transport
            .expect_send()
            .withf(|request| request.method == GraphMethod::Get && request.path == "media-1")
            .returning(|_| {
                Ok(GraphResponse {
                    status: 200,
                    body: json!({
                        "messaging_product": "whatsapp",
                        "url": "https://lookaside.fbsbx.com/whatsapp_business/attachments/?mid=1",
                        "mime_type": "image/jpeg",
                        "sha256": "abc",
                        "file_size": "303833",
                        "id": "media-1"
                    }),
                })
            });
        transport
            .expect_send()
            .withf(|request| request.method == GraphMethod::Delete)
            .returning(|_| {
                Ok(GraphResponse {
                    status: 200,
                    body: json!({"success": true}),
                })
            });

        let api = MediaApi::new(Arc::new(transport), "pn");
        let info = api.get("media-1").await.unwrap();
        assert_eq!(info.file_size(), Some(303833));
        assert!(api.delete("media-1").await.unwrap());
    }
}
