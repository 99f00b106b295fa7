//! The attestation object and its format verifiers.
//!
//! An attestation object is a CBOR map `{"fmt": tstr, "authData": bstr,
//! "attStmt": map}`. The statement map's shape depends on `fmt`, so the
//! object is walked by hand and each format deserializes its own statement.
//!
//! Verification here is signature-level only: statements carrying a
//! certificate chain are checked against the leaf certificate's key, and
//! trust-chain validation against authenticator metadata stays out of scope.

mod android_key;
mod android_safetynet;
mod apple;
mod fido_u2f;
mod packed;
mod tpm;
mod x5c;

pub use android_key::AndroidKeyAttestationStatement;
pub use android_safetynet::AndroidSafetynetAttestationStatement;
pub use apple::AppleAttestationStatement;
pub use fido_u2f::FidoU2fAttestationStatement;
pub use packed::PackedAttestationStatement;
pub use tpm::TpmAttestationStatement;

use crate::authenticator_data::{AttestedCredentialData, AuthenticatorData};
use crate::codec;
use crate::error::{Error, Result};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Format {
    None,
    Packed,
    FidoU2f,
    Tpm,
    AndroidKey,
    AndroidSafetynet,
    Apple,
}

impl Format {
    const NONE: &'static str = "none";
    const PACKED: &'static str = "packed";
    const FIDO_U2F: &'static str = "fido-u2f";
    const TPM: &'static str = "tpm";
    const ANDROID_KEY: &'static str = "android-key";
    const ANDROID_SAFETYNET: &'static str = "android-safetynet";
    const APPLE: &'static str = "apple";
}

impl From<Format> for &str {
    fn from(format: Format) -> Self {
        match format {
            Format::None => Format::NONE,
            Format::Packed => Format::PACKED,
            Format::FidoU2f => Format::FIDO_U2F,
            Format::Tpm => Format::TPM,
            Format::AndroidKey => Format::ANDROID_KEY,
            Format::AndroidSafetynet => Format::ANDROID_SAFETYNET,
            Format::Apple => Format::APPLE,
        }
    }
}

impl TryFrom<&str> for Format {
    type Error = Error;

    fn try_from(s: &str) -> core::result::Result<Self, Self::Error> {
        match s {
            Self::NONE => Ok(Self::None),
            Self::PACKED => Ok(Self::Packed),
            Self::FIDO_U2F => Ok(Self::FidoU2f),
            Self::TPM => Ok(Self::Tpm),
            Self::ANDROID_KEY => Ok(Self::AndroidKey),
            Self::ANDROID_SAFETYNET => Ok(Self::AndroidSafetynet),
            Self::APPLE => Ok(Self::Apple),
            _ => Err(Error::UnsupportedAttestationFormat),
        }
    }
}

/// How the authenticator vouches for the new credential.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AttestationType {
    None,
    SelfAttestation,
    Basic,
    AttCa,
    AnonCa,
}

/// A decoded attestation object: recognized format, raw authenticator data,
/// raw statement map.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AttestationObject {
    pub fmt: Format,
    pub auth_data: Vec<u8>,
    pub att_stmt: Vec<u8>,
}

impl AttestationObject {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if codec::cbor_item_length(data)? != data.len() {
            return Err(Error::MalformedInput);
        }
        let (major, entries, mut offset) = codec::cbor_header(data, 0)?;
        if major != 5 {
            return Err(Error::MalformedInput);
        }

        let mut fmt = None;
        let mut auth_data = None;
        let mut att_stmt = None;

        for _ in 0..entries {
            let (key_major, key_length, key_offset) = codec::cbor_header(data, offset)?;
            if key_major != 3 {
                return Err(Error::MalformedInput);
            }
            let key_length = usize::try_from(key_length).map_err(|_| Error::MalformedInput)?;
            let key_end = key_offset
                .checked_add(key_length)
                .ok_or(Error::MalformedInput)?;
            let key = data
                .get(key_offset..key_end)
                .ok_or(Error::MalformedInput)
                .and_then(|bytes| core::str::from_utf8(bytes).map_err(|_| Error::MalformedInput))?;

            let value_end = codec::cbor_item_end(data, key_end)?;
            let value = &data[key_end..value_end];
            match key {
                "fmt" => fmt = Some(codec::cbor_from_slice::<String>(value)?),
                "authData" => {
                    auth_data =
                        Some(codec::cbor_from_slice::<serde_bytes::ByteBuf>(value)?.into_vec())
                }
                "attStmt" => {
                    if value.first().map(|initial| initial >> 5) != Some(5) {
                        return Err(Error::MalformedInput);
                    }
                    att_stmt = Some(value.to_vec());
                }
                // tolerated, the same way unknown clientDataJSON members are
                _ => {}
            }
            offset = value_end;
        }

        let fmt = fmt.ok_or(Error::MalformedInput)?;
        let fmt = Format::try_from(fmt.as_str())?;
        Ok(Self {
            fmt,
            auth_data: auth_data.ok_or(Error::MalformedInput)?,
            att_stmt: att_stmt.ok_or(Error::MalformedInput)?,
        })
    }
}

/// The empty CBOR map, the only statement `fmt: none` allows.
const EMPTY_MAP: &[u8] = &[0xa0];

/// Runs the statement verifier for the object's format. `attested` must be
/// the attested credential data carried in `object.auth_data`.
pub fn verify(
    object: &AttestationObject,
    auth_data: &AuthenticatorData,
    attested: &AttestedCredentialData,
    client_data_hash: &[u8; 32],
) -> Result<AttestationType> {
    // every format but fido-u2f signs over authData || clientDataHash
    let message = [object.auth_data.as_slice(), client_data_hash].concat();

    match object.fmt {
        Format::None => {
            if object.att_stmt != EMPTY_MAP {
                return Err(Error::AttestationVerificationFailed);
            }
            Ok(AttestationType::None)
        }
        Format::Packed => packed::verify(
            &object.att_stmt,
            &message,
            &attested.credential_public_key,
        ),
        Format::FidoU2f => fido_u2f::verify(&object.att_stmt, auth_data, attested, client_data_hash),
        Format::Tpm => tpm::verify(&object.att_stmt, &message),
        Format::AndroidKey => android_key::verify(
            &object.att_stmt,
            &message,
            &attested.credential_public_key,
        ),
        Format::AndroidSafetynet => android_safetynet::verify(&object.att_stmt, &message),
        Format::Apple => apple::verify(&object.att_stmt, &message, &attested.credential_public_key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn object(fmt: &str, att_stmt: &[u8]) -> Vec<u8> {
        let mut data = vec![0xa3];
        data.extend_from_slice(&[0x63]);
        data.extend_from_slice(b"fmt");
        data.push(0x60 + u8::try_from(fmt.len()).unwrap());
        data.extend_from_slice(fmt.as_bytes());
        data.extend_from_slice(&[0x67]);
        data.extend_from_slice(b"attStmt");
        data.extend_from_slice(att_stmt);
        data.extend_from_slice(&[0x68]);
        data.extend_from_slice(b"authData");
        data.extend_from_slice(&hex!("43 010203"));
        data
    }

    #[test]
    fn parses_the_three_members() {
        let parsed = AttestationObject::parse(&object("none", &[0xa0])).unwrap();
        assert_eq!(parsed.fmt, Format::None);
        assert_eq!(parsed.auth_data, hex!("010203"));
        assert_eq!(parsed.att_stmt, [0xa0]);
    }

    #[test]
    fn unknown_format_is_unsupported() {
        assert_eq!(
            AttestationObject::parse(&object("android-saftynet", &[0xa0])),
            Err(Error::UnsupportedAttestationFormat)
        );
    }

    #[test]
    fn missing_members_are_malformed() {
        // {"fmt": "none"}
        let data = hex!("a1 63 666d74 64 6e6f6e65");
        assert_eq!(
            AttestationObject::parse(&data),
            Err(Error::MalformedInput)
        );
    }

    #[test]
    fn trailing_garbage_is_malformed() {
        let mut data = object("none", &[0xa0]);
        data.push(0x00);
        assert_eq!(
            AttestationObject::parse(&data),
            Err(Error::MalformedInput)
        );
    }
}
