//! # Flow Endpoint Encryption
//!
//! Hybrid encryption used by Meta for Flow data endpoints:
//!
//! 1. Meta generates a fresh AES-128 key and IV per request
//! 2. The key is encrypted with the business public key (RSA-OAEP, SHA-256)
//! 3. The JSON body is encrypted with AES-128-GCM; the 16 byte tag is appended
//! 4. The response is encrypted with the same key and the bitwise NOT of the IV
//!
//! All functions are synchronous and allocate fresh buffers per call.

use super::{
    errors::FlowCryptoError,
    keys::{self, PrivateKeyInfo},
    schemas::{FlowEncryptedRequestPayload, FlowRequest},
};
use crate::consts;
use base64::{Engine, prelude::BASE64_STANDARD};
use openssl::{
    encrypt::{Decrypter, Encrypter},
    error::ErrorStack,
    hash::MessageDigest,
    pkey::{HasPrivate, HasPublic, PKey, PKeyRef},
    rsa::Padding,
    symm::{self, Cipher},
};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// Result of decrypting one Flow request.
///
/// Keep it only until the matching response has been encrypted.
#[derive(Clone)]
pub struct DecryptedFlowExchange {
    pub decrypted_body: Value,
    /// AES-128 key recovered with the private key
    pub aes_key: Vec<u8>,
    /// IV exactly as received
    pub initial_vector: Vec<u8>,
}

impl DecryptedFlowExchange {
    /// Classifies the decrypted body, `None` when it is not a Flow request
    pub fn request(&self) -> Option<FlowRequest> {
        FlowRequest::from_value(self.decrypted_body.clone())
    }

    /// Encrypts the response for this exchange
    pub fn encrypt_response<T: Serialize + ?Sized>(
        &self,
        response: &T,
    ) -> Result<String, FlowCryptoError> {
        encrypt_flow_response(response, &self.aes_key, &self.initial_vector)
    }
}

impl fmt::Debug for DecryptedFlowExchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptedFlowExchange")
            .field("decrypted_body", &self.decrypted_body)
            .field("aes_key", &"<redacted>")
            .field("initial_vector", &"<redacted>")
            .finish()
    }
}

/// Bitwise NOT of every byte, the IV Meta mandates for responses
pub fn flip_iv(iv: &[u8]) -> Vec<u8> {
    iv.iter().map(|byte| !byte).collect()
}

fn required_field<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, FlowCryptoError> {
    value
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| FlowCryptoError::MalformedPayload(format!("missing field `{name}`")))
}

fn decode_base64(value: &str, name: &str) -> Result<Vec<u8>, FlowCryptoError> {
    BASE64_STANDARD
        .decode(value.trim())
        .map_err(|e| FlowCryptoError::MalformedPayload(format!("`{name}` is not valid base64: {e}")))
}

fn rsa_oaep_decrypt<T: HasPrivate>(key: &PKeyRef<T>, data: &[u8]) -> Result<Vec<u8>, ErrorStack> {
    let mut decrypter = Decrypter::new(key)?;
    decrypter.set_rsa_padding(Padding::PKCS1_OAEP)?;
    decrypter.set_rsa_oaep_md(MessageDigest::sha256())?;
    decrypter.set_rsa_mgf1_md(MessageDigest::sha256())?;

    let mut buffer = vec![0; decrypter.decrypt_len(data)?];
    let len = decrypter.decrypt(data, &mut buffer)?;
    buffer.truncate(len);
    Ok(buffer)
}

fn rsa_oaep_encrypt<T: HasPublic>(key: &PKeyRef<T>, data: &[u8]) -> Result<Vec<u8>, ErrorStack> {
    let mut encrypter = Encrypter::new(key)?;
    encrypter.set_rsa_padding(Padding::PKCS1_OAEP)?;
    encrypter.set_rsa_oaep_md(MessageDigest::sha256())?;
    encrypter.set_rsa_mgf1_md(MessageDigest::sha256())?;

    let mut buffer = vec![0; encrypter.encrypt_len(data)?];
    let len = encrypter.encrypt(data, &mut buffer)?;
    buffer.truncate(len);
    Ok(buffer)
}

/// Splits `ciphertext || tag`, returns `None` when shorter than a tag
fn split_tag(data: &[u8]) -> Option<(&[u8], &[u8])> {
    data.len()
        .checked_sub(consts::AES_GCM_TAG_LEN)
        .map(|body_len| data.split_at(body_len))
}

fn aes_gcm_encrypt(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, ErrorStack> {
    let mut tag = [0u8; consts::AES_GCM_TAG_LEN];
    let mut sealed = symm::encrypt_aead(Cipher::aes_128_gcm(), key, Some(iv), &[], plaintext, &mut tag)?;
    sealed.extend_from_slice(&tag);
    Ok(sealed)
}

/// Serializes `response` the way the wire expects, `null` becomes `{}`
fn response_json<T: Serialize + ?Sized>(response: &T) -> Result<Vec<u8>, serde_json::Error> {
    let json = serde_json::to_vec(response)?;
    if json == b"null" {
        return Ok(b"{}".to_vec());
    }
    Ok(json)
}

/// Decrypts a Flow endpoint request.
///
/// # Arguments
/// * `payload` - Encrypted body posted by Meta
/// * `private_key` - PKCS#8 PEM and passphrase of the endpoint key
///
/// # Returns
/// The decrypted JSON together with the AES key and IV needed to encrypt the
/// response.
///
/// # Errors
/// * [`FlowCryptoError::Configuration`] when the key or passphrase is blank
/// * [`FlowCryptoError::MalformedPayload`] for missing fields, bad base64,
///   truncated data or a body that is not JSON
/// * [`FlowCryptoError::KeyLoad`] when the private key cannot be used
/// * [`FlowCryptoError::Decryption`] when RSA or AES-GCM fails, including a
///   tag that does not verify
pub fn decrypt_flow_request(
    payload: &FlowEncryptedRequestPayload,
    private_key: &PrivateKeyInfo,
) -> Result<DecryptedFlowExchange, FlowCryptoError> {
    private_key.validate()?;

    let encrypted_aes_key = required_field(&payload.encrypted_aes_key, "encrypted_aes_key")?;
    let encrypted_flow_data = required_field(&payload.encrypted_flow_data, "encrypted_flow_data")?;
    let initial_vector = required_field(&payload.initial_vector, "initial_vector")?;

    let pkey = keys::load_private_key(private_key)?;

    let wrapped_key = decode_base64(encrypted_aes_key, "encrypted_aes_key")?;
    let aes_key = rsa_oaep_decrypt(&pkey, &wrapped_key).map_err(|e| {
        debug!(error = %e, "rsa-oaep unwrap of the flow aes key failed");
        FlowCryptoError::Decryption
    })?;
    if aes_key.len() != consts::FLOW_AES_KEY_LEN {
        debug!(len = aes_key.len(), "unwrapped flow aes key has the wrong length");
        return Err(FlowCryptoError::Decryption);
    }

    let flow_data = decode_base64(encrypted_flow_data, "encrypted_flow_data")?;
    let (ciphertext, tag) = split_tag(&flow_data).ok_or_else(|| {
        FlowCryptoError::MalformedPayload(
            "`encrypted_flow_data` is shorter than the authentication tag".into(),
        )
    })?;

    let iv = decode_base64(initial_vector, "initial_vector")?;
    if iv.len() != consts::FLOW_IV_LEN {
        return Err(FlowCryptoError::MalformedPayload(format!(
            "`initial_vector` must be {} bytes, got {}",
            consts::FLOW_IV_LEN,
            iv.len()
        )));
    }

    let plaintext = symm::decrypt_aead(
        Cipher::aes_128_gcm(),
        &aes_key,
        Some(iv.as_slice()),
        &[],
        ciphertext,
        tag,
    )
    .map_err(|e| {
        debug!(error = %e, "aes-gcm decryption of the flow data failed");
        FlowCryptoError::Decryption
    })?;

    let decrypted_body = serde_json::from_slice(&plaintext).map_err(|e| {
        FlowCryptoError::MalformedPayload(format!("decrypted flow data is not valid JSON: {e}"))
    })?;

    Ok(DecryptedFlowExchange {
        decrypted_body,
        aes_key,
        initial_vector: iv,
    })
}

/// Encrypts a Flow endpoint response.
///
/// The response is AES-128-GCM encrypted with the request key under the
/// flipped request IV and returned as `base64(ciphertext || tag)`.
pub fn encrypt_flow_response<T: Serialize + ?Sized>(
    response: &T,
    aes_key: &[u8],
    initial_vector: &[u8],
) -> Result<String, FlowCryptoError> {
    if aes_key.len() != consts::FLOW_AES_KEY_LEN {
        return Err(FlowCryptoError::Encryption(format!(
            "aes key must be {} bytes, got {}",
            consts::FLOW_AES_KEY_LEN,
            aes_key.len()
        )));
    }
    if initial_vector.is_empty() {
        return Err(FlowCryptoError::Encryption("initial vector is empty".into()));
    }

    let plaintext = response_json(response).map_err(|e| FlowCryptoError::Encryption(e.to_string()))?;
    let sealed = aes_gcm_encrypt(aes_key, &flip_iv(initial_vector), &plaintext)
        .map_err(|e| FlowCryptoError::Encryption(e.to_string()))?;

    Ok(BASE64_STANDARD.encode(sealed))
}

/// Builds an encrypted request the way Meta does.
///
/// Counterpart of [`decrypt_flow_request`], used to exercise an endpoint
/// without Meta in the loop.
pub fn encrypt_flow_request<T: Serialize + ?Sized>(
    body: &T,
    public_key_pem: &str,
    aes_key: &[u8],
    initial_vector: &[u8],
) -> Result<FlowEncryptedRequestPayload, FlowCryptoError> {
    if aes_key.len() != consts::FLOW_AES_KEY_LEN {
        return Err(FlowCryptoError::Encryption(format!(
            "aes key must be {} bytes, got {}",
            consts::FLOW_AES_KEY_LEN,
            aes_key.len()
        )));
    }
    if initial_vector.is_empty() {
        return Err(FlowCryptoError::Encryption("initial vector is empty".into()));
    }

    let public_key = PKey::public_key_from_pem(keys::normalize_pem(public_key_pem).as_bytes())
        .map_err(|e| FlowCryptoError::Encryption(format!("invalid public key: {e}")))?;
    let wrapped_key = rsa_oaep_encrypt(&public_key, aes_key)
        .map_err(|e| FlowCryptoError::Encryption(e.to_string()))?;

    let plaintext = serde_json::to_vec(body).map_err(|e| FlowCryptoError::Encryption(e.to_string()))?;
    let sealed = aes_gcm_encrypt(aes_key, initial_vector, &plaintext)
        .map_err(|e| FlowCryptoError::Encryption(e.to_string()))?;

    Ok(FlowEncryptedRequestPayload {
        encrypted_aes_key: Some(BASE64_STANDARD.encode(wrapped_key)),
        encrypted_flow_data: Some(BASE64_STANDARD.encode(sealed)),
        initial_vector: Some(BASE64_STANDARD.encode(initial_vector)),
    })
}

/// Decrypts an endpoint response the way Meta does, using the request IV
pub fn decrypt_flow_response(
    encrypted_response: &str,
    aes_key: &[u8],
    request_initial_vector: &[u8],
) -> Result<Value, FlowCryptoError> {
    if aes_key.len() != consts::FLOW_AES_KEY_LEN {
        return Err(FlowCryptoError::Decryption);
    }

    let sealed = decode_base64(encrypted_response, "response")?;
    let (ciphertext, tag) = split_tag(&sealed).ok_or_else(|| {
        FlowCryptoError::MalformedPayload("response is shorter than the authentication tag".into())
    })?;

    let plaintext = symm::decrypt_aead(
        Cipher::aes_128_gcm(),
        aes_key,
        Some(flip_iv(request_initial_vector).as_slice()),
        &[],
        ciphertext,
        tag,
    )
    .map_err(|_| FlowCryptoError::Decryption)?;

    serde_json::from_slice(&plaintext)
        .map_err(|e| FlowCryptoError::MalformedPayload(format!("response is not valid JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::keys::{EncryptionKeyPair, generate_key_pair};
    use openssl::rand::rand_bytes;
    use serde_json::json;
    use std::sync::LazyLock;

    static KEY_PAIR: LazyLock<EncryptionKeyPair> =
        LazyLock::new(|| generate_key_pair(Some("flow-test-passphrase")).unwrap());

    fn private_key() -> PrivateKeyInfo {
        PrivateKeyInfo::new(&KEY_PAIR.private_key, &KEY_PAIR.passphrase)
    }

    fn random_bytes(len: usize) -> Vec<u8> {
        let mut buffer = vec![0; len];
        rand_bytes(&mut buffer).unwrap();
        buffer
    }

    fn encrypted_request(body: &Value) -> (FlowEncryptedRequestPayload, Vec<u8>, Vec<u8>) {
        let aes_key = random_bytes(16);
        let iv = random_bytes(16);
        let payload = encrypt_flow_request(body, &KEY_PAIR.public_key, &aes_key, &iv).unwrap();
        (payload, aes_key, iv)
    }

    #[test]
    fn test_round_trip_recovers_body_key_and_iv() {
        let body = json!({
            "version": "3.0",
            "action": "data_exchange",
            "flow_token": "tok1",
            "screen": "DETAILS",
            "data": {"name": "Ada", "items": [1, 2, 3], "nested": {"ok": true}}
        });
        let (payload, aes_key, iv) = encrypted_request(&body);

        let exchange = decrypt_flow_request(&payload, &private_key()).unwrap();

        assert_eq!(exchange.decrypted_body, body);
        assert_eq!(exchange.aes_key, aes_key);
        assert_eq!(exchange.initial_vector, iv);
        assert!(exchange.request().is_some());
    }

    #[test]
    fn test_private_key_with_escaped_newlines() {
        let (payload, _, _) = encrypted_request(&json!({"action": "ping"}));
        let escaped = PrivateKeyInfo::new(KEY_PAIR.private_key.replace('\n', "\\n"), &KEY_PAIR.passphrase);

        let exchange = decrypt_flow_request(&payload, &escaped).unwrap();
        assert_eq!(exchange.decrypted_body, json!({"action": "ping"}));
    }

    #[test]
    fn test_tampered_tag_fails_with_decryption_error() {
        let (payload, _, _) = encrypted_request(&json!({"action": "ping"}));
        let mut flow_data = BASE64_STANDARD
            .decode(payload.encrypted_flow_data.as_ref().unwrap())
            .unwrap();

        for bit in [0, 7, 64, 127] {
            let mut tampered_data = flow_data.clone();
            let tag_start = tampered_data.len() - consts::AES_GCM_TAG_LEN;
            tampered_data[tag_start + bit / 8] ^= 1 << (bit % 8);

            let tampered = FlowEncryptedRequestPayload {
                encrypted_flow_data: Some(BASE64_STANDARD.encode(&tampered_data)),
                ..payload.clone()
            };
            assert!(matches!(
                decrypt_flow_request(&tampered, &private_key()),
                Err(FlowCryptoError::Decryption)
            ));
        }

        // a flipped ciphertext bit must fail the same way
        flow_data[0] ^= 0x80;
        let tampered = FlowEncryptedRequestPayload {
            encrypted_flow_data: Some(BASE64_STANDARD.encode(&flow_data)),
            ..payload
        };
        assert!(matches!(
            decrypt_flow_request(&tampered, &private_key()),
            Err(FlowCryptoError::Decryption)
        ));
    }

    #[test]
    fn test_key_encrypted_for_another_key_pair_fails() {
        let other = generate_key_pair(Some("another-passphrase")).unwrap();
        let payload = encrypt_flow_request(
            &json!({"action": "ping"}),
            &other.public_key,
            &random_bytes(16),
            &random_bytes(16),
        )
        .unwrap();

        assert!(matches!(
            decrypt_flow_request(&payload, &private_key()),
            Err(FlowCryptoError::Decryption)
        ));
    }

    #[test]
    fn test_missing_fields_are_malformed() {
        let (payload, _, _) = encrypted_request(&json!({"action": "ping"}));

        let without_iv = FlowEncryptedRequestPayload {
            initial_vector: None,
            ..payload.clone()
        };
        let blank_key = FlowEncryptedRequestPayload {
            encrypted_aes_key: Some("  ".into()),
            ..payload.clone()
        };
        let without_data = FlowEncryptedRequestPayload {
            encrypted_flow_data: None,
            ..payload
        };

        for payload in [without_iv, blank_key, without_data] {
            assert!(matches!(
                decrypt_flow_request(&payload, &private_key()),
                Err(FlowCryptoError::MalformedPayload(_))
            ));
        }
    }

    #[test]
    fn test_credentials_checked_before_payload() {
        let result = decrypt_flow_request(
            &FlowEncryptedRequestPayload::default(),
            &PrivateKeyInfo::new(&KEY_PAIR.private_key, ""),
        );
        assert!(matches!(result, Err(FlowCryptoError::Configuration(_))));
    }

    #[test]
    fn test_short_flow_data_and_bad_iv_are_malformed() {
        let (payload, _, _) = encrypted_request(&json!({"action": "ping"}));

        let short_data = FlowEncryptedRequestPayload {
            encrypted_flow_data: Some(BASE64_STANDARD.encode([1u8; 8])),
            ..payload.clone()
        };
        let short_iv = FlowEncryptedRequestPayload {
            initial_vector: Some(BASE64_STANDARD.encode([1u8; 12])),
            ..payload.clone()
        };
        let not_base64 = FlowEncryptedRequestPayload {
            initial_vector: Some("%%%".into()),
            ..payload
        };

        for payload in [short_data, short_iv, not_base64] {
            assert!(matches!(
                decrypt_flow_request(&payload, &private_key()),
                Err(FlowCryptoError::MalformedPayload(_))
            ));
        }
    }

    #[test]
    fn test_non_json_plaintext_is_malformed() {
        let aes_key = random_bytes(16);
        let iv = random_bytes(16);
        let mut payload = encrypt_flow_request(&json!({}), &KEY_PAIR.public_key, &aes_key, &iv).unwrap();
        let sealed = aes_gcm_encrypt(&aes_key, &iv, b"definitely not json").unwrap();
        payload.encrypted_flow_data = Some(BASE64_STANDARD.encode(sealed));

        assert!(matches!(
            decrypt_flow_request(&payload, &private_key()),
            Err(FlowCryptoError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_response_uses_flipped_iv() {
        let aes_key = random_bytes(16);
        let iv = random_bytes(16);
        let response = json!({"screen": "SUCCESS", "data": {"status": "done", "count": 3}});

        let encrypted = encrypt_flow_response(&response, &aes_key, &iv).unwrap();
        let sealed = BASE64_STANDARD.decode(&encrypted).unwrap();
        let (ciphertext, tag) = split_tag(&sealed).unwrap();

        let flipped = flip_iv(&iv);
        let plaintext =
            symm::decrypt_aead(Cipher::aes_128_gcm(), &aes_key, Some(flipped.as_slice()), &[], ciphertext, tag)
                .unwrap();
        assert_eq!(serde_json::from_slice::<Value>(&plaintext).unwrap(), response);

        assert!(
            symm::decrypt_aead(Cipher::aes_128_gcm(), &aes_key, Some(iv.as_slice()), &[], ciphertext, tag)
                .is_err()
        );
        assert_eq!(decrypt_flow_response(&encrypted, &aes_key, &iv).unwrap(), response);
    }

    #[test]
    fn test_flip_iv_is_bitwise_not() {
        assert_eq!(flip_iv(&[0x00, 0xff, 0x0f, 0xa5]), vec![0xff, 0x00, 0xf0, 0x5a]);
        let iv = random_bytes(16);
        assert_eq!(flip_iv(&flip_iv(&iv)), iv);
    }

    #[test]
    fn test_null_response_encrypts_empty_object() {
        let aes_key = random_bytes(16);
        let iv = random_bytes(16);

        let encrypted = encrypt_flow_response(&Value::Null, &aes_key, &iv).unwrap();
        assert_eq!(decrypt_flow_response(&encrypted, &aes_key, &iv).unwrap(), json!({}));
    }

    #[test]
    fn test_encrypt_response_rejects_wrong_key_length() {
        let result = encrypt_flow_response(&json!({}), &random_bytes(32), &random_bytes(16));
        assert!(matches!(result, Err(FlowCryptoError::Encryption(_))));
    }

    #[test]
    fn test_exchange_encrypts_matching_response() {
        let (payload, aes_key, iv) = encrypted_request(&json!({"action": "ping"}));
        let exchange = decrypt_flow_request(&payload, &private_key()).unwrap();

        let encrypted = exchange.encrypt_response(&json!({"data": {"status": "active"}})).unwrap();
        assert_eq!(
            decrypt_flow_response(&encrypted, &aes_key, &iv).unwrap(),
            json!({"data": {"status": "active"}})
        );
    }
}
