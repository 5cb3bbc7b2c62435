use super::dispatcher::{VerifyQuery, WebhookRequest};
use crate::{consts, state::AppState};
use ntex::{http, util::Bytes, web};
use tracing::Instrument;

/// Configures the WhatsApp webhook route.
///
/// Every method reaches the dispatcher so that unsupported ones get a 405.
///
/// # Routes
/// - `GET /webhook/whatsapp` - Subscription handshake
/// - `POST /webhook/whatsapp` - Event delivery
pub fn whatsapp(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource(consts::WEBHOOK_PATH).to(handle));
}

pub async fn handle(
    req: web::HttpRequest,
    query: web::types::Query<VerifyQuery>,
    body: Bytes,
    app_state: web::types::State<AppState>,
) -> web::HttpResponse {
    let method = req.method().as_str();
    let signature = req
        .headers()
        .get(consts::SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let response = app_state
        .dispatcher
        .handle_request(WebhookRequest {
            method,
            query: query.into_inner(),
            body: &body,
            signature,
        })
        .instrument(tracing::info_span!("whatsapp_webhook", method))
        .await;

    let status =
        http::StatusCode::from_u16(response.status).unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR);
    if response.body.is_empty() {
        return web::HttpResponse::build(status).finish();
    }

    web::HttpResponse::build(status)
        .set_header("content-type", "text/plain; charset=utf-8")
        .body(response.body)
}
