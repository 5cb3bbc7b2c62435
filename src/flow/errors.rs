//! Error taxonomy for the Flow endpoint crypto helpers.
//!
//! Every failure is returned to the caller untouched so the HTTP layer can pick
//! the status Meta expects (421 for [`FlowCryptoError::Decryption`]).

use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum FlowCryptoError {
    /// Missing or blank credentials, detected before any crypto runs
    #[display("flow crypto configuration error: {_0}")]
    Configuration(#[error(not(source))] String),

    /// The input does not follow the documented wire contract
    #[display("malformed flow payload: {_0}")]
    MalformedPayload(#[error(not(source))] String),

    /// The private key could not be parsed or unlocked; carries a hint for the operator
    #[display("flow private key could not be loaded: {_0}")]
    KeyLoad(#[error(not(source))] String),

    #[display("flow key pair generation failed: {_0}")]
    KeyGeneration(openssl::error::ErrorStack),

    /// RSA or AES-GCM failure. Carries no detail on purpose.
    #[display("flow request could not be decrypted")]
    Decryption,

    #[display("flow response could not be encrypted: {_0}")]
    Encryption(#[error(not(source))] String),

    /// The runtime cannot provide the required primitives
    #[display("unsupported environment for flow crypto: {_0}")]
    Environment(#[error(not(source))] String),
}
