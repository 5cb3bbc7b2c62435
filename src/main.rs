//! # WhatsApp Cloud Webhook Server
//!
//! Serves the WhatsApp webhook and, when a key is configured, the Flow data
//! endpoint. Text messages are echoed back when Graph API credentials exist.
//!
//! `whatsapp-cloud generate-flow-keys` prints a fresh Flow key pair instead,
//! using `WHATSAPP_FLOW_PASSPHRASE` as the passphrase.

use async_trait::async_trait;
use logfire::config::MetricsOptions;
use ntex::web;
use std::sync::Arc;
use whatsapp_cloud::{
    client::{HttpTransport, messages::MessagesApi},
    config::{self, AppConfig},
    consts,
    flow::{self, FlowEndpoint, FlowProcessor, FlowResponse, schemas::FlowDataExchangeRequest},
    logger,
    state::AppState,
    webhook::{self, HandlerRegistry, MessageType, WebhookDispatcher, WebhookEvent, WebhookMessage},
};

#[ntex::main]
async fn main() -> anyhow::Result<()> {
    if std::env::args().nth(1).as_deref() == Some("generate-flow-keys") {
        return print_flow_keys();
    }

    let app_config = config::init_config()?;

    // Initialize logging and metrics
    let shutdown_handler = match app_config.logfire_token.as_deref() {
        Some(token) => Some(
            logfire::configure()
                .install_panic_handler()
                .with_metrics(Some(MetricsOptions::default()))
                .send_to_logfire(logfire::config::SendToLogfire::Yes)
                .with_token(token)
                .finish()?,
        ),
        None => {
            logger::setup_simple_logger()?;
            None
        }
    };

    let result = run_server(app_config, create_app_state(app_config)).await;

    if let Some(shutdown_handler) = shutdown_handler {
        shutdown_handler.shutdown()?;
    }

    result
}

fn print_flow_keys() -> anyhow::Result<()> {
    let key_pair = flow::generate_key_pair(None)?;
    println!("{}", key_pair.public_key);
    println!("{}", key_pair.private_key);
    Ok(())
}

/// Completes the flow, sending the submitted screen data back to the chat
struct SubmitFlowProcessor;

#[async_trait]
impl FlowProcessor for SubmitFlowProcessor {
    async fn on_data_exchange(
        &self,
        request: FlowDataExchangeRequest,
    ) -> anyhow::Result<FlowResponse> {
        Ok(FlowResponse::close_flow(
            &request.flow_token,
            request.data.unwrap_or_default(),
        ))
    }
}

fn build_registry(messages_api: Option<MessagesApi>) -> HandlerRegistry {
    let registry = HandlerRegistry::new()
        .on_event(consts::STATUSES_FIELD, |event: WebhookEvent| async move {
            for status in event.statuses().unwrap_or(Ok(Vec::new()))? {
                tracing::info!(message_id = %status.id, status = %status.status, "message status update");
            }
            anyhow::Ok(())
        })
        .on_any_message(|message: WebhookMessage| async move {
            tracing::info!(
                message_id = %message.id,
                message_type = %message.message_type,
                "message received"
            );
            anyhow::Ok(())
        });

    let Some(messages_api) = messages_api else {
        return registry;
    };

    registry.on_message(MessageType::Text, move |message: WebhookMessage| {
        let messages_api = messages_api.clone();
        async move {
            messages_api.mark_as_read(&message.id).await?;
            if let Some(body) = message.text_body() {
                messages_api.send_text(&message.from, body).await?;
            }
            anyhow::Ok(())
        }
    })
}

/// Creates application state from the configuration
fn create_app_state(app_config: &AppConfig) -> AppState {
    let messages_api = app_config
        .graph_credentials()
        .map(|(access_token, phone_number_id)| {
            let transport =
                HttpTransport::new(access_token).with_api_version(app_config.graph_api_version());
            MessagesApi::new(Arc::new(transport), phone_number_id)
        });

    let mut dispatcher =
        WebhookDispatcher::new(&app_config.whatsapp_verify_token, build_registry(messages_api));
    if let Some(app_secret) = app_config.app_secret() {
        dispatcher = dispatcher.with_app_secret(app_secret);
    }

    let flow_endpoint = app_config.flow_private_key().map(|private_key| {
        let endpoint = FlowEndpoint::new(private_key, Arc::new(SubmitFlowProcessor));
        match app_config.app_secret() {
            Some(app_secret) => Arc::new(endpoint.with_app_secret(app_secret)),
            None => Arc::new(endpoint),
        }
    });

    AppState {
        dispatcher: Arc::new(dispatcher),
        flow_endpoint,
    }
}

/// Configures and starts the web server
async fn run_server(app_config: &AppConfig, app_state: AppState) -> anyhow::Result<()> {
    if app_state.flow_endpoint.is_none() {
        tracing::warn!("flow private key not configured, the flow endpoint answers 404");
    }

    web::server(move || {
        web::App::new()
            .wrap(web::middleware::Logger::default())
            .state(app_state.clone())
            .configure(webhook::routes::whatsapp)
            .configure(flow::routes::flow_endpoint)
    })
    .bind(app_config.server_addr())?
    .run()
    .await
    .map_err(|e| anyhow::anyhow!("Server error: {}", e))
}
