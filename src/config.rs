//! Application configuration loaded from the environment.
//!
//! # Security Notes
//! - Sensitive fields are marked and must never be logged
//! - The flow private key is read as a PEM string; literal `\n` sequences are
//!   accepted so the key fits in a single environment variable

use crate::{consts, flow::PrivateKeyInfo};
use anyhow::Context;
use envconfig::Envconfig;
use std::sync::OnceLock;

#[derive(Envconfig, Clone)]
pub struct AppConfig {
    /// Environment name (NON-SENSITIVE)
    /// Values: "local", "dev", "staging", "prod"
    #[envconfig(default = "local")]
    pub env: String,

    /// Host address for web server binding (NON-SENSITIVE)
    #[envconfig(default = "0.0.0.0")]
    pub web_server_host: String,

    /// Port for web server binding (NON-SENSITIVE)
    #[envconfig(default = "8080")]
    pub web_server_port: u16,

    /// 🔒 SENSITIVE: Token echoed during the webhook subscription handshake
    pub whatsapp_verify_token: String,

    /// 🔒 SENSITIVE: Meta app secret, enables `X-Hub-Signature-256` checks
    pub whatsapp_app_secret: Option<String>,

    /// 🔒 SENSITIVE: Encrypted PKCS#8 PEM for the Flow endpoint
    pub whatsapp_flow_private_key: Option<String>,

    /// 🔒 SENSITIVE: Passphrase of `whatsapp_flow_private_key`
    pub whatsapp_flow_passphrase: Option<String>,

    /// 🔒 SENSITIVE: Graph API access token
    pub whatsapp_access_token: Option<String>,

    /// WhatsApp Business phone number ID (SEMI-SENSITIVE)
    pub whatsapp_phone_number_id: Option<String>,

    /// Graph API version (NON-SENSITIVE)
    #[envconfig(default = "v22.0")]
    pub graph_api_version: String,

    /// 🔒 SENSITIVE: Logfire write token, console logging when absent
    pub logfire_token: Option<String>,
}

impl AppConfig {
    /// Checks if running in production environment
    pub fn is_prod(&self) -> bool {
        self.env.to_lowercase() == "prod"
    }

    /// Address the web server binds to
    pub fn server_addr(&self) -> (String, u16) {
        (self.web_server_host.clone(), self.web_server_port)
    }

    /// Flow endpoint key, `None` when the endpoint is disabled
    pub fn flow_private_key(&self) -> Option<PrivateKeyInfo> {
        let pem = non_blank(self.whatsapp_flow_private_key.as_deref())?;
        let passphrase = non_blank(self.whatsapp_flow_passphrase.as_deref())?;
        Some(PrivateKeyInfo::new(pem, passphrase))
    }

    pub fn app_secret(&self) -> Option<&str> {
        non_blank(self.whatsapp_app_secret.as_deref())
    }

    /// Graph API credentials, `None` when sending is disabled
    pub fn graph_credentials(&self) -> Option<(&str, &str)> {
        Some((
            non_blank(self.whatsapp_access_token.as_deref())?,
            non_blank(self.whatsapp_phone_number_id.as_deref())?,
        ))
    }

    pub fn graph_api_version(&self) -> &str {
        non_blank(Some(self.graph_api_version.as_str())).unwrap_or(consts::DEFAULT_GRAPH_API_VERSION)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

pub static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Loads [`AppConfig`] from the environment into [`APP_CONFIG`]
pub fn init_config() -> anyhow::Result<&'static AppConfig> {
    if let Some(config) = APP_CONFIG.get() {
        return Ok(config);
    }

    let config = AppConfig::init_from_env().context("failed to load configuration from env")?;
    Ok(APP_CONFIG.get_or_init(|| config))
}
