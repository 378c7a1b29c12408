//! Unpadded base64url framing.
//!
//! Every binary value on the SQRL wire is base64url without `=` padding.
//! The decoder is forgiving and accepts padded input; the encoder never
//! emits padding.

use crate::error::WireError;
use base64::{prelude::BASE64_URL_SAFE_NO_PAD, Engine};
use ed25519_dalek::{Signature, VerifyingKey};

/// Encode bytes as unpadded base64url.
pub fn encode(data: impl AsRef<[u8]>) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(data.as_ref())
}

/// Decode base64url input, with or without `=` padding.
pub fn decode(input: &str) -> Result<Vec<u8>, WireError> {
    BASE64_URL_SAFE_NO_PAD
        .decode(input.trim_end_matches('='))
        .map_err(|_| WireError::InvalidBase64)
}

/// Decode base64url input into a UTF-8 string.
pub fn decode_str(input: &str) -> Result<String, WireError> {
    String::from_utf8(decode(input)?).map_err(|_| WireError::InvalidUtf8)
}

/// Decode a base64url-encoded 32-byte Ed25519 public key.
pub fn decode_public_key(encoded: &str) -> Result<VerifyingKey, WireError> {
    let bytes = decode(encoded)?;
    let bytes: [u8; 32] = bytes.try_into().map_err(|_| WireError::InvalidPublicKey)?;
    VerifyingKey::from_bytes(&bytes).map_err(|_| WireError::InvalidPublicKey)
}

/// Decode a base64url-encoded 64-byte Ed25519 signature.
pub fn decode_signature(encoded: &str) -> Result<Signature, WireError> {
    let bytes = decode(encoded)?;
    let bytes: [u8; 64] = bytes.try_into().map_err(|_| WireError::InvalidSignature)?;
    Ok(Signature::from_bytes(&bytes))
}
