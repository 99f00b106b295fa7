//! The `apple` anonymous attestation format.
//!
//! There is no statement signature: the leaf certificate itself certifies
//! the credential key, and a nonce extension commits the certificate to this
//! ceremony.

use serde::Deserialize;
use serde_bytes::ByteBuf;
use sha2::{Digest, Sha256};

use super::{x5c, AttestationType};
use crate::codec;
use crate::cose::PublicKey;
use crate::error::{Error, Result};

const NONCE_EXTENSION_OID: &str = "1.2.840.113635.100.8.2";

#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct AppleAttestationStatement {
    pub x5c: Vec<ByteBuf>,
}

pub(super) fn verify(
    att_stmt: &[u8],
    message: &[u8],
    credential_key: &PublicKey,
) -> Result<AttestationType> {
    let statement: AppleAttestationStatement = codec::cbor_from_slice(att_stmt)?;
    let leaf = statement
        .x5c
        .first()
        .ok_or(Error::AttestationVerificationFailed)?;
    let certificate = x5c::parse_certificate(leaf)?;

    let nonce = Sha256::digest(message);
    if !x5c::nonce_extension_matches(&certificate, NONCE_EXTENSION_OID, &nonce) {
        return Err(Error::AttestationVerificationFailed);
    }

    let spki = certificate.public_key().subject_public_key.data.as_ref();
    let leaf_key = x5c::public_key_from_spki(credential_key.alg(), spki)?;
    if leaf_key != *credential_key {
        return Err(Error::AttestationVerificationFailed);
    }

    Ok(AttestationType::AnonCa)
}
