//! # Graph API Client
//!
//! Thin resource wrappers over a [`GraphTransport`]. The transport knows how
//! to reach the Graph API (base URL, version, token, timeouts); the resource
//! APIs only build paths and bodies and decode the answers.

pub mod media;
pub mod messages;
pub mod outgoing;

use crate::consts;
use async_trait::async_trait;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::{fmt, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphMethod {
    Get,
    Post,
    Delete,
}

/// One part of a multipart form
#[derive(Debug, Clone, PartialEq)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        filename: String,
        mime_type: String,
        bytes: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum GraphBody {
    Empty,
    Json(Value),
    Form(Vec<FormPart>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphRequest {
    pub method: GraphMethod,
    /// Path below the API version, e.g. `106540352242922/messages`
    pub path: String,
    pub body: GraphBody,
    pub timeout: Duration,
}

impl GraphRequest {
    fn new(method: GraphMethod, path: impl Into<String>, body: GraphBody) -> Self {
        Self {
            method,
            path: path.into(),
            body,
            timeout: consts::GRAPH_REQUEST_TIMEOUT,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(GraphMethod::Get, path, GraphBody::Empty)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(GraphMethod::Delete, path, GraphBody::Empty)
    }

    pub fn post_json(path: impl Into<String>, body: Value) -> Self {
        Self::new(GraphMethod::Post, path, GraphBody::Json(body))
    }

    pub fn post_form(path: impl Into<String>, parts: Vec<FormPart>) -> Self {
        Self::new(GraphMethod::Post, path, GraphBody::Form(parts))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Successful Graph API answer
#[derive(Debug, Clone, PartialEq)]
pub struct GraphResponse {
    pub status: u16,
    /// Parsed JSON body, `Null` when the body was empty
    pub body: Value,
}

impl GraphResponse {
    pub fn json<T: DeserializeOwned>(self) -> Result<T, GraphError> {
        serde_json::from_value(self.body).map_err(GraphError::Decode)
    }
}

/// The `error` object of a failed Graph API call
#[derive(Debug, Clone, PartialEq, Display, Deserialize, Serialize)]
#[display("{message} (type: {error_type}, code: {code})")]
pub struct ApiError {
    pub message: String,
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default)]
    pub code: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_subcode: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fbtrace_id: Option<String>,
}

#[derive(Debug, Display, Error)]
pub enum GraphError {
    #[display("graph api returned {status}: {error}")]
    Api {
        status: u16,
        #[error(not(source))]
        error: ApiError,
    },

    #[display("graph api returned {status}: {body}")]
    UnexpectedStatus {
        status: u16,
        #[error(not(source))]
        body: String,
    },

    #[display("graph request failed: {_0}")]
    Transport(reqwest::Error),

    #[display("graph response could not be decoded: {_0}")]
    Decode(serde_json::Error),

    #[display("invalid graph request: {_0}")]
    InvalidRequest(#[error(not(source))] String),
}

impl GraphError {
    /// Graph error code, when Meta returned a structured error
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Api { error, .. } => Some(error.code),
            _ => None,
        }
    }
}

/// Sends requests to the Graph API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GraphTransport: Send + Sync {
    async fn send(&self, request: GraphRequest) -> Result<GraphResponse, GraphError>;
}

/// [`GraphTransport`] backed by `reqwest`
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_version: String,
    access_token: String,
}

impl HttpTransport {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: consts::GRAPH_API_BASE_URL.to_string(),
            api_version: consts::DEFAULT_GRAPH_API_VERSION.to_string(),
            access_token: access_token.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{base}/{version}/{path}",
            base = self.base_url.trim_end_matches('/'),
            version = self.api_version,
            path = path.trim_start_matches('/')
        )
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

fn multipart_form(parts: Vec<FormPart>) -> Result<reqwest::multipart::Form, GraphError> {
    let mut form = reqwest::multipart::Form::new();

    for part in parts {
        form = match part {
            FormPart::Text { name, value } => form.text(name, value),
            FormPart::File {
                name,
                filename,
                mime_type,
                bytes,
            } => {
                let file_part = reqwest::multipart::Part::bytes(bytes)
                    .file_name(filename)
                    .mime_str(&mime_type)
                    .map_err(|e| GraphError::InvalidRequest(format!("invalid mime type: {e}")))?;
                form.part(name, file_part)
            }
        };
    }

    Ok(form)
}

/// Turns a raw HTTP answer into a [`GraphResponse`] or a typed error
fn parse_response(status: u16, text: &str) -> Result<GraphResponse, GraphError> {
    let body = if text.trim().is_empty() {
        Ok(Value::Null)
    } else {
        serde_json::from_str::<Value>(text)
    };

    if !(200..300).contains(&status) {
        let api_error = body
            .ok()
            .and_then(|body| body.get("error").cloned())
            .and_then(|error| serde_json::from_value::<ApiError>(error).ok());

        return Err(match api_error {
            Some(error) => GraphError::Api { status, error },
            None => GraphError::UnexpectedStatus {
                status,
                body: text.to_string(),
            },
        });
    }

    Ok(GraphResponse {
        status,
        body: body.map_err(GraphError::Decode)?,
    })
}

#[async_trait]
impl GraphTransport for HttpTransport {
    async fn send(&self, request: GraphRequest) -> Result<GraphResponse, GraphError> {
        let url = self.url(&request.path);
        let builder = match request.method {
            GraphMethod::Get => self.client.get(&url),
            GraphMethod::Post => self.client.post(&url),
            GraphMethod::Delete => self.client.delete(&url),
        }
        .bearer_auth(&self.access_token)
        .timeout(request.timeout);

        let builder = match request.body {
            GraphBody::Empty => builder,
            GraphBody::Json(body) => builder.json(&body),
            GraphBody::Form(parts) => builder.multipart(multipart_form(parts)?),
        };

        let response = builder.send().await.map_err(GraphError::Transport)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(GraphError::Transport)?;

        let result = parse_response(status, &text);
        if let Err(e) = &result {
            tracing::warn!(path = %request.path, "graph api call failed: {e}");
        }
        result
    }
}
