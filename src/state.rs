use crate::{flow::FlowEndpoint, webhook::WebhookDispatcher};
use std::sync::Arc;

/// Shared by every ntex worker
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<WebhookDispatcher>,
    /// `None` when no flow private key is configured
    pub flow_endpoint: Option<Arc<FlowEndpoint>>,
}
