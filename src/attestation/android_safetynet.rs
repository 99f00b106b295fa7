//! The `android-safetynet` attestation format: a JWS from the SafetyNet
//! service whose payload nonce commits to the ceremony.

use base64::Engine as _;
use serde::Deserialize;
use serde_bytes::ByteBuf;
use sha2::{Digest, Sha256};

use super::{x5c, AttestationType};
use crate::codec::{self, base64url};
use crate::cose::Alg;
use crate::error::{Error, Result};
use crate::signature;

#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct AndroidSafetynetAttestationStatement {
    pub ver: String,
    pub response: ByteBuf,
}

#[derive(Deserialize)]
struct JwsHeader {
    alg: String,
    /// Certificates in a JWS header are standard base64, unlike everything
    /// else in WebAuthn.
    x5c: Vec<String>,
}

#[derive(Deserialize)]
struct JwsPayload {
    nonce: String,
}

pub(super) fn verify(att_stmt: &[u8], message: &[u8]) -> Result<AttestationType> {
    let statement: AndroidSafetynetAttestationStatement = codec::cbor_from_slice(att_stmt)?;

    let response = core::str::from_utf8(&statement.response)
        .map_err(|_| Error::AttestationVerificationFailed)?;
    let mut parts = response.split('.');
    let (Some(header), Some(payload), Some(jws_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(Error::AttestationVerificationFailed);
    };

    let header_json =
        base64url::decode(header).map_err(|_| Error::AttestationVerificationFailed)?;
    let header: JwsHeader = serde_json::from_slice(&header_json)
        .map_err(|_| Error::AttestationVerificationFailed)?;
    if header.alg != "RS256" {
        return Err(Error::AttestationVerificationFailed);
    }
    let leaf_der = base64::engine::general_purpose::STANDARD
        .decode(header.x5c.first().ok_or(Error::AttestationVerificationFailed)?)
        .map_err(|_| Error::AttestationVerificationFailed)?;
    let leaf_key = x5c::leaf_public_key(Alg::Rs256, &leaf_der)?;

    let payload_json =
        base64url::decode(payload).map_err(|_| Error::AttestationVerificationFailed)?;
    let parsed_payload: JwsPayload = serde_json::from_slice(&payload_json)
        .map_err(|_| Error::AttestationVerificationFailed)?;
    let expected_nonce =
        base64::engine::general_purpose::STANDARD.encode(Sha256::digest(message));
    if parsed_payload.nonce != expected_nonce {
        return Err(Error::AttestationVerificationFailed);
    }

    // RS256 over the ASCII "header.payload"
    let signed_length = response
        .rfind('.')
        .ok_or(Error::AttestationVerificationFailed)?;
    let signed_message = &response.as_bytes()[..signed_length];
    let jws_signature =
        base64url::decode(jws_signature).map_err(|_| Error::AttestationVerificationFailed)?;
    signature::verify(Alg::Rs256, &leaf_key, signed_message, &jws_signature)
        .map_err(|_| Error::AttestationVerificationFailed)?;
    Ok(AttestationType::Basic)
}
