//! Signature verification for requests sent by Meta
//!
//! Meta signs webhook deliveries (and Flow endpoint calls) with HMAC-SHA256
//! using the app secret. The signature travels in `X-Hub-Signature-256` as
//! `sha256=<hex>` and must be computed over the raw body bytes, never over
//! re-serialized JSON.

use crate::consts;
use derive_more::{Display, Error};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[display("missing X-Hub-Signature-256 header")]
    MissingHeader,
    #[display("signature header must start with 'sha256='")]
    InvalidFormat,
    #[display("signature is not valid hex")]
    InvalidHex,
    #[display("app secret cannot be used as an HMAC key")]
    InvalidSecret,
    #[display("signature does not match the payload")]
    Mismatch,
}

fn mac_for(payload: &[u8], app_secret: &str) -> Result<HmacSha256, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes())
        .map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(payload);
    Ok(mac)
}

/// Computes the `X-Hub-Signature-256` header value for `payload`
pub fn sign(payload: &[u8], app_secret: &str) -> Result<String, SignatureError> {
    let digest = mac_for(payload, app_secret)?.finalize().into_bytes();
    Ok(format!("{}{}", consts::SIGNATURE_PREFIX, hex::encode(digest)))
}

/// Verifies the `X-Hub-Signature-256` header against the raw request body
///
/// # Arguments
///
/// * `signature_header` - Header value, `None` when the header is absent
/// * `payload` - The raw request body bytes
/// * `app_secret` - The Meta app secret
///
/// # Errors
///
/// Returns the reason the request must be rejected. The digest comparison is
/// constant-time. Nothing is logged here, callers log the rejection.
pub fn verify_signature(
    signature_header: Option<&str>,
    payload: &[u8],
    app_secret: &str,
) -> Result<(), SignatureError> {
    let signature_header = signature_header.ok_or(SignatureError::MissingHeader)?;
    let signature_hex = signature_header
        .trim()
        .strip_prefix(consts::SIGNATURE_PREFIX)
        .ok_or(SignatureError::InvalidFormat)?;
    let expected_signature = hex::decode(signature_hex).map_err(|_| SignatureError::InvalidHex)?;

    let computed_signature = mac_for(payload, app_secret)?.finalize().into_bytes();
    let is_valid: bool = computed_signature.ct_eq(&expected_signature[..]).into();

    if !is_valid {
        return Err(SignatureError::Mismatch);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &[u8] = b"{\"test\":\"data\"}";
    const SECRET: &str = "test_secret";

    #[test]
    fn test_verify_signature_valid() {
        let header = sign(PAYLOAD, SECRET).unwrap();
        assert!(header.starts_with("sha256="));
        assert_eq!(verify_signature(Some(&header), PAYLOAD, SECRET), Ok(()));
    }

    #[test]
    fn test_verify_signature_invalid() {
        let wrong_signature =
            "sha256=0000000000000000000000000000000000000000000000000000000000000000";
        assert_eq!(
            verify_signature(Some(wrong_signature), PAYLOAD, SECRET),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_verify_signature_wrong_secret() {
        let header = sign(PAYLOAD, "wrong_secret").unwrap();
        assert_eq!(
            verify_signature(Some(&header), PAYLOAD, SECRET),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_verify_signature_missing_header() {
        assert_eq!(
            verify_signature(None, PAYLOAD, SECRET),
            Err(SignatureError::MissingHeader)
        );
    }

    #[test]
    fn test_verify_signature_invalid_header_format() {
        assert_eq!(
            verify_signature(Some("abc123"), PAYLOAD, SECRET),
            Err(SignatureError::InvalidFormat)
        );
        assert_eq!(
            verify_signature(Some("sha1=abc123"), PAYLOAD, SECRET),
            Err(SignatureError::InvalidFormat)
        );
        assert_eq!(
            verify_signature(Some("sha256=zzzzz"), PAYLOAD, SECRET),
            Err(SignatureError::InvalidHex)
        );
    }

    #[test]
    fn test_verify_signature_truncated_digest() {
        let header = sign(PAYLOAD, SECRET).unwrap();
        let truncated = &header[..header.len() - 2];
        assert_eq!(
            verify_signature(Some(truncated), PAYLOAD, SECRET),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_verify_signature_tampered_payload() {
        let header = sign(PAYLOAD, SECRET).unwrap();
        assert_eq!(
            verify_signature(Some(&header), b"{\"test\":\"hacked\"}", SECRET),
            Err(SignatureError::Mismatch)
        );
    }
}
