//! Flow data endpoint route
//!
//! Meta posts the encrypted payload and expects the encrypted response as a
//! plain base64 body. Error statuses follow the Flows endpoint contract
//! (421 asks the client to re-fetch the public key).

use super::endpoint::FlowEndpointError;
use crate::{consts, state::AppState};
use ntex::{http, util::Bytes, web};

impl web::error::WebResponseError for FlowEndpointError {
    fn error_response(&self, _: &web::HttpRequest) -> web::HttpResponse {
        if self.status() >= 500 {
            logfire::error!("flow endpoint error: {error}", error = self.to_string());
        } else {
            logfire::warn!("flow endpoint rejected request: {error}", error = self.to_string());
        }

        web::HttpResponse::build(self.status_code())
            .set_header("content-type", "text/plain; charset=utf-8")
            .body(self.public_message())
    }

    fn status_code(&self) -> http::StatusCode {
        http::StatusCode::from_u16(self.status())
            .unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// Configures the Flow data endpoint.
///
/// # Routes
/// - `POST /flow/whatsapp` - Encrypted data exchange
pub fn flow_endpoint(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope(consts::FLOW_ENDPOINT_PATH).service((exchange,)));
}

/// Flow data exchange (POST)
///
/// # Returns
/// - 200 with the encrypted response (base64)
/// - 404 when no flow key is configured
/// - the status of [`FlowEndpointError::status`] otherwise
#[web::post("")]
pub async fn exchange(
    req: web::HttpRequest,
    body: Bytes,
    app_state: web::types::State<AppState>,
) -> Result<impl web::Responder, web::Error> {
    let Some(endpoint) = app_state.flow_endpoint.as_ref() else {
        return Ok(web::HttpResponse::NotFound().finish());
    };

    let signature = req
        .headers()
        .get(consts::SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let encrypted = endpoint.handle(&body, signature).await?;

    Ok(web::HttpResponse::Ok()
        .set_header("content-type", "text/plain; charset=utf-8")
        .body(encrypted))
}
