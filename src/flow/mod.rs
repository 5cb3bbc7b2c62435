//! # WhatsApp Flows Endpoint
//!
//! Key management, the encrypted request/response exchange Meta performs with
//! a Flow data endpoint, and the ntex route that serves it.

pub mod crypto;
pub mod endpoint;
pub mod errors;
pub mod keys;
pub mod routes;
pub mod schemas;

pub use crypto::{
    DecryptedFlowExchange, decrypt_flow_request, encrypt_flow_response, flip_iv,
};
pub use endpoint::{FlowEndpoint, FlowEndpointError, FlowProcessor, FlowTokenExpired};
pub use errors::FlowCryptoError;
pub use keys::{EncryptionKeyPair, PrivateKeyInfo, generate_key_pair};
pub use schemas::{
    FlowEncryptedRequestPayload, FlowRequest, FlowRequestKind, FlowResponse,
    classify_flow_request, is_flow_data_exchange_request, is_flow_error_request,
    is_flow_ping_request,
};
