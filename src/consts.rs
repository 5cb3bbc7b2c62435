use std::time::Duration;

pub const WHATSAPP_BUSINESS_ACCOUNT_OBJECT: &str = "whatsapp_business_account";
pub const MESSAGES_FIELD: &str = "messages";
pub const STATUSES_FIELD: &str = "statuses";
pub const SUBSCRIBE_MODE: &str = "subscribe";

pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";
pub const SIGNATURE_PREFIX: &str = "sha256=";

pub const WEBHOOK_PATH: &str = "/webhook/whatsapp";
pub const FLOW_ENDPOINT_PATH: &str = "/flow/whatsapp";

/// Env var consulted when no passphrase is given to key generation
pub const FLOW_PASSPHRASE_ENV: &str = "WHATSAPP_FLOW_PASSPHRASE";
pub const FLOW_RSA_KEY_BITS: u32 = 2048;
pub const MIN_PASSPHRASE_LEN: usize = 8;
pub const FLOW_AES_KEY_LEN: usize = 16;
pub const FLOW_IV_LEN: usize = 16;
pub const AES_GCM_TAG_LEN: usize = 16;
pub const FLOW_DATA_API_VERSION: &str = "3.0";
pub const FLOW_SUCCESS_SCREEN: &str = "SUCCESS";

/// OpenSSL 1.1.1, first release with reliable OAEP digest selection
pub const MIN_OPENSSL_VERSION: i64 = 0x1010_100f;

pub const GRAPH_API_BASE_URL: &str = "https://graph.facebook.com";
pub const DEFAULT_GRAPH_API_VERSION: &str = "v22.0";
pub const MESSAGING_PRODUCT: &str = "whatsapp";
pub const GRAPH_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const MEDIA_UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);
