//! The `packed` attestation format.

use serde::Deserialize;
use serde_bytes::ByteBuf;

use super::{x5c, AttestationType};
use crate::codec;
use crate::cose::{Alg, PublicKey};
use crate::error::{Error, Result};
use crate::signature;

#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct PackedAttestationStatement {
    pub alg: Alg,
    pub sig: ByteBuf,
    pub x5c: Option<Vec<ByteBuf>>,
}

pub(super) fn verify(
    att_stmt: &[u8],
    message: &[u8],
    credential_key: &PublicKey,
) -> Result<AttestationType> {
    let statement: PackedAttestationStatement = codec::cbor_from_slice(att_stmt)?;

    match statement.x5c.as_deref() {
        Some([leaf, ..]) => {
            let leaf_key = x5c::leaf_public_key(statement.alg, leaf)?;
            signature::verify(statement.alg, &leaf_key, message, &statement.sig)
                .map_err(|_| Error::AttestationVerificationFailed)?;
            Ok(AttestationType::Basic)
        }
        _ => {
            // self attestation: the statement algorithm must be the
            // credential key's own
            if statement.alg != credential_key.alg() {
                return Err(Error::AttestationVerificationFailed);
            }
            signature::verify(statement.alg, credential_key, message, &statement.sig)
                .map_err(|_| Error::AttestationVerificationFailed)?;
            Ok(AttestationType::SelfAttestation)
        }
    }
}
