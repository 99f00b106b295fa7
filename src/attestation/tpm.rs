//! The `tpm` attestation format.
//!
//! The statement signs the TPM's `certInfo` (a TPMS_ATTEST structure), which
//! in turn binds the ceremony through its `extraData` hash. Only that
//! binding and the leaf signature are checked here; pubArea/credential-key
//! binding belongs to the trust path, which is out of scope.

use serde::Deserialize;
use serde_bytes::ByteBuf;

use super::{x5c, AttestationType};
use crate::codec;
use crate::cose::Alg;
use crate::error::{Error, Result};
use crate::signature;

/// TPM_GENERATED_VALUE, the magic every TPMS_ATTEST starts with.
const TPM_GENERATED: u32 = 0xff54_4347;
/// TPM_ST_ATTEST_CERTIFY.
const TPM_ST_ATTEST_CERTIFY: u16 = 0x8017;

#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct TpmAttestationStatement {
    pub ver: String,
    pub alg: Alg,
    pub x5c: Vec<ByteBuf>,
    pub sig: ByteBuf,
    #[serde(rename = "certInfo")]
    pub cert_info: ByteBuf,
    #[serde(rename = "pubArea")]
    pub pub_area: ByteBuf,
}

/// Reads a TPM2B field (u16 length prefix) off the front of `data`.
fn take_sized<'a>(data: &'a [u8]) -> Result<(&'a [u8], &'a [u8])> {
    let length_bytes: [u8; 2] = data
        .get(..2)
        .ok_or(Error::AttestationVerificationFailed)?
        .try_into()
        .map_err(|_| Error::AttestationVerificationFailed)?;
    let length = usize::from(u16::from_be_bytes(length_bytes));
    let rest = &data[2..];
    if rest.len() < length {
        return Err(Error::AttestationVerificationFailed);
    }
    Ok((&rest[..length], &rest[length..]))
}

pub(super) fn verify(att_stmt: &[u8], message: &[u8]) -> Result<AttestationType> {
    let statement: TpmAttestationStatement = codec::cbor_from_slice(att_stmt)?;

    if statement.ver != "2.0" {
        return Err(Error::AttestationVerificationFailed);
    }

    let cert_info = statement.cert_info.as_slice();
    let magic_bytes: [u8; 4] = cert_info
        .get(..4)
        .ok_or(Error::AttestationVerificationFailed)?
        .try_into()
        .map_err(|_| Error::AttestationVerificationFailed)?;
    if u32::from_be_bytes(magic_bytes) != TPM_GENERATED {
        return Err(Error::AttestationVerificationFailed);
    }
    let type_bytes: [u8; 2] = cert_info
        .get(4..6)
        .ok_or(Error::AttestationVerificationFailed)?
        .try_into()
        .map_err(|_| Error::AttestationVerificationFailed)?;
    if u16::from_be_bytes(type_bytes) != TPM_ST_ATTEST_CERTIFY {
        return Err(Error::AttestationVerificationFailed);
    }

    let (_qualified_signer, rest) = take_sized(&cert_info[6..])?;
    let (extra_data, _) = take_sized(rest)?;

    // extraData binds the ceremony: the alg-appropriate hash of
    // authData || clientDataHash
    let expected = signature::digest_for(statement.alg, message)
        .map_err(|_| Error::AttestationVerificationFailed)?;
    if extra_data != expected.as_slice() {
        return Err(Error::AttestationVerificationFailed);
    }

    let leaf = statement
        .x5c
        .first()
        .ok_or(Error::AttestationVerificationFailed)?;
    let leaf_key = x5c::leaf_public_key(statement.alg, leaf)?;
    signature::verify(statement.alg, &leaf_key, cert_info, &statement.sig)
        .map_err(|_| Error::AttestationVerificationFailed)?;
    Ok(AttestationType::AttCa)
}
