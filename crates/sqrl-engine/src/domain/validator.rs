//! Request validation: from raw POST fields to a verified [`ClientRequest`].
//!
//! The signature covers the UTF-8 concatenation of the *still-encoded*
//! `client` and `server` strings, so verification happens before either
//! block is decoded any further than field extraction requires.

use super::entities::ClientRequest;
use super::errors::ProtocolError;
use ed25519_dalek::Verifier;
use sqrl_wire::base64url;
use sqrl_wire::envelope::{self, ClientParameters, OptFlag, ServerData};
use sqrl_wire::WireError;
use std::collections::HashMap;

/// Decode and cryptographically verify one POST body.
pub fn validate(fields: &HashMap<String, String>) -> Result<ClientRequest, ProtocolError> {
    let client_b64 = fields
        .get(envelope::CLIENT_FIELD)
        .ok_or_else(|| ProtocolError::MalformedEnvelope("no client field".into()))?;
    let server_b64 = fields
        .get(envelope::SERVER_FIELD)
        .ok_or_else(|| ProtocolError::MalformedEnvelope("no server field".into()))?;

    let params = ClientParameters::from_base64(client_b64).map_err(map_client_error)?;

    let ids_b64 = fields
        .get(envelope::IDS_FIELD)
        .ok_or(ProtocolError::MissingSignature("ids"))?;
    let ids = base64url::decode_signature(ids_b64)
        .map_err(|_| ProtocolError::BadSignature("ids"))?;

    // The signed bytes: encoded client block followed by encoded server echo.
    let signed = [client_b64.as_bytes(), server_b64.as_bytes()].concat();
    params
        .identity_key
        .verify(&signed, &ids)
        .map_err(|_| ProtocolError::BadSignature("ids"))?;

    if let Some(pidk) = &params.previous_identity_key {
        let pids_b64 = fields
            .get(envelope::PIDS_FIELD)
            .ok_or(ProtocolError::MissingSignature("pids"))?;
        let pids = base64url::decode_signature(pids_b64)
            .map_err(|_| ProtocolError::BadSignature("pids"))?;
        pidk.verify(&signed, &pids)
            .map_err(|_| ProtocolError::BadSignature("pids"))?;
    }

    let server = ServerData::from_base64(server_b64)
        .map_err(|e| ProtocolError::MalformedServerField(e.to_string()))?;
    let nut = server
        .nut()
        .ok_or_else(|| ProtocolError::MalformedServerField("no nut".into()))?
        .to_string();

    Ok(ClientRequest {
        protocol_version: params.protocol_version,
        command: params.command,
        nut,
        primary_identity_public_key: params.identity_key,
        previous_identity_public_key: params.previous_identity_key,
        server_unlock_public_key: params.server_unlock_key,
        server_verify_unlock_public_key: params.verify_unlock_key,
        index_secret: params.index_secret,
        previous_index_secret: params.previous_index_secret,
        sqrl_only: params.options.contains(&OptFlag::SqrlOnly),
        hard_lock: params.options.contains(&OptFlag::HardLock),
        client_provided_session: params.options.contains(&OptFlag::Cps),
        return_session_unlock_key: params.options.contains(&OptFlag::Suk),
        server_ask_response_selection: params.button,
        unlock_request_signature: fields.get(envelope::URS_FIELD).cloned(),
    })
}

/// Map a wire-level decode failure of the client block onto the protocol
/// failure vocabulary.
fn map_client_error(err: WireError) -> ProtocolError {
    match err {
        WireError::MissingField("idk") | WireError::InvalidPublicKey => {
            ProtocolError::MissingIdentityKey
        }
        WireError::MissingField("ver") => ProtocolError::UnsupportedVersion("none".into()),
        WireError::InvalidFieldValue { field: "ver", value } => {
            ProtocolError::UnsupportedVersion(value)
        }
        WireError::MissingField("cmd") => ProtocolError::UnknownCommand("none".into()),
        WireError::UnknownCommand(cmd) => ProtocolError::UnknownCommand(cmd),
        WireError::UnknownOption(opt) => ProtocolError::UnknownOption(opt),
        other => ProtocolError::MalformedEnvelope(other.to_string()),
    }
}
