//! The `android-key` attestation format.

use serde::Deserialize;
use serde_bytes::ByteBuf;

use super::{x5c, AttestationType};
use crate::codec;
use crate::cose::PublicKey;
use crate::error::{Error, Result};
use crate::signature;

#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct AndroidKeyAttestationStatement {
    pub alg: crate::cose::Alg,
    pub sig: ByteBuf,
    pub x5c: Vec<ByteBuf>,
}

pub(super) fn verify(
    att_stmt: &[u8],
    message: &[u8],
    credential_key: &PublicKey,
) -> Result<AttestationType> {
    let statement: AndroidKeyAttestationStatement = codec::cbor_from_slice(att_stmt)?;

    let leaf = statement
        .x5c
        .first()
        .ok_or(Error::AttestationVerificationFailed)?;
    let leaf_key = x5c::leaf_public_key(statement.alg, leaf)?;

    // the certified key must be the credential key itself
    if leaf_key != *credential_key {
        return Err(Error::AttestationVerificationFailed);
    }

    signature::verify(statement.alg, &leaf_key, message, &statement.sig)
        .map_err(|_| Error::AttestationVerificationFailed)?;
    Ok(AttestationType::Basic)
}
