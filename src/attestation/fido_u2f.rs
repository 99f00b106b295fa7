//! The `fido-u2f` attestation format: a U2F registration signature carried
//! over into WebAuthn.

use serde::Deserialize;
use serde_bytes::ByteBuf;

use super::{x5c, AttestationType};
use crate::authenticator_data::{AttestedCredentialData, AuthenticatorData};
use crate::codec;
use crate::cose::{Alg, PublicKey};
use crate::error::{Error, Result};
use crate::signature;

#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct FidoU2fAttestationStatement {
    pub x5c: Vec<ByteBuf>,
    pub sig: ByteBuf,
}

pub(super) fn verify(
    att_stmt: &[u8],
    auth_data: &AuthenticatorData,
    attested: &AttestedCredentialData,
    client_data_hash: &[u8; 32],
) -> Result<AttestationType> {
    let statement: FidoU2fAttestationStatement = codec::cbor_from_slice(att_stmt)?;

    // U2F knows only P-256
    let PublicKey::P256(credential_key) = &attested.credential_public_key else {
        return Err(Error::AttestationVerificationFailed);
    };
    let leaf = statement
        .x5c
        .first()
        .ok_or(Error::AttestationVerificationFailed)?;
    let leaf_key = x5c::leaf_public_key(Alg::Es256, leaf)?;

    // reconstruct the U2F registration message:
    // 0x00 || rpIdHash || clientDataHash || credentialId || publicKeyU2F
    let mut message =
        Vec::with_capacity(1 + 32 + 32 + attested.credential_id.len() + 65);
    message.push(0x00);
    message.extend_from_slice(&auth_data.rp_id_hash);
    message.extend_from_slice(client_data_hash);
    message.extend_from_slice(&attested.credential_id);
    message.push(0x04);
    message.extend_from_slice(&credential_key.x);
    message.extend_from_slice(&credential_key.y);

    signature::verify(Alg::Es256, &leaf_key, &message, &statement.sig)
        .map_err(|_| Error::AttestationVerificationFailed)?;
    Ok(AttestationType::Basic)
}
