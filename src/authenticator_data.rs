//! The authenticator data envelope:
//! `rpIdHash ‖ flags ‖ signCount ‖ [attestedCredentialData] ‖ [extensions]`.
//!
//! This layout is not CBOR (it predates it, for compatibility with FIDO U2F
//! signatures), so it is read and written by hand; only the credential
//! public key and the extension map embedded in it are CBOR items.

use bitflags::bitflags;

use crate::codec::{self, Bytes};
use crate::cose;
use crate::error::{Error, Result};

bitflags! {
    pub struct AuthenticatorDataFlags: u8 {
        const USER_PRESENCE = 1 << 0;
        const USER_VERIFIED = 1 << 2;
        const BACKUP_ELIGIBLE = 1 << 3;
        const BACKUP_STATE = 1 << 4;
        const ATTESTED_CREDENTIAL_DATA = 1 << 6;
        const EXTENSION_DATA = 1 << 7;
    }
}

/// Authenticators choose credential ids; WebAuthn caps them at 1023 bytes.
pub const MAX_CREDENTIAL_ID_LENGTH: usize = 1023;

/// Length of the fixed prefix: rpIdHash(32) + flags(1) + signCount(4).
const FIXED_PREFIX_LENGTH: usize = 37;

#[derive(Clone, Debug, PartialEq)]
pub struct AttestedCredentialData {
    pub aaguid: [u8; 16],
    pub credential_id: Bytes,
    pub credential_public_key: cose::PublicKey,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AuthenticatorData {
    pub rp_id_hash: [u8; 32],
    pub flags: AuthenticatorDataFlags,
    pub sign_count: u32,
    pub attested_credential_data: Option<AttestedCredentialData>,
    /// The raw extension map, exactly the bytes that followed the rest of
    /// the structure. Kept opaque; extension semantics are host policy.
    pub extensions: Option<Vec<u8>>,
}

impl AuthenticatorData {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < FIXED_PREFIX_LENGTH {
            return Err(Error::MalformedAuthenticatorData);
        }
        let rp_id_hash: [u8; 32] = data[..32]
            .try_into()
            .map_err(|_| Error::MalformedAuthenticatorData)?;
        let flags = AuthenticatorDataFlags::from_bits_truncate(data[32]);
        let sign_count = u32::from_be_bytes(
            data[33..FIXED_PREFIX_LENGTH]
                .try_into()
                .map_err(|_| Error::MalformedAuthenticatorData)?,
        );
        let mut rest = &data[FIXED_PREFIX_LENGTH..];

        let attested_credential_data =
            if flags.contains(AuthenticatorDataFlags::ATTESTED_CREDENTIAL_DATA) {
                if rest.len() < 18 {
                    return Err(Error::MalformedAuthenticatorData);
                }
                let aaguid: [u8; 16] = rest[..16]
                    .try_into()
                    .map_err(|_| Error::MalformedAuthenticatorData)?;
                let id_length = usize::from(u16::from_be_bytes(
                    rest[16..18]
                        .try_into()
                        .map_err(|_| Error::MalformedAuthenticatorData)?,
                ));
                if id_length > MAX_CREDENTIAL_ID_LENGTH {
                    return Err(Error::MalformedAuthenticatorData);
                }
                rest = &rest[18..];
                if rest.len() < id_length {
                    return Err(Error::MalformedAuthenticatorData);
                }
                let credential_id = Bytes::from_slice(&rest[..id_length]);
                rest = &rest[id_length..];
                let (credential_public_key, after_key) =
                    codec::cbor_take_from_slice::<cose::PublicKey>(rest)
                        .map_err(|_| Error::MalformedAuthenticatorData)?;
                rest = after_key;
                Some(AttestedCredentialData {
                    aaguid,
                    credential_id,
                    credential_public_key,
                })
            } else {
                None
            };

        let extensions = if flags.contains(AuthenticatorDataFlags::EXTENSION_DATA) {
            // a definite-length map consuming exactly the remaining bytes
            let first = *rest.first().ok_or(Error::MalformedAuthenticatorData)?;
            if first >> 5 != 5 {
                return Err(Error::MalformedAuthenticatorData);
            }
            let length = codec::cbor_item_length(rest)
                .map_err(|_| Error::MalformedAuthenticatorData)?;
            if length != rest.len() {
                return Err(Error::MalformedAuthenticatorData);
            }
            Some(rest.to_vec())
        } else {
            if !rest.is_empty() {
                return Err(Error::MalformedAuthenticatorData);
            }
            None
        };

        Ok(Self {
            rp_id_hash,
            flags,
            sign_count,
            attested_credential_data,
            extensions,
        })
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(FIXED_PREFIX_LENGTH);
        bytes.extend_from_slice(&self.rp_id_hash);
        bytes.push(self.flags.bits());
        bytes.extend_from_slice(&self.sign_count.to_be_bytes());

        if let Some(attested_credential_data) = &self.attested_credential_data {
            bytes.extend_from_slice(&attested_credential_data.aaguid);
            if attested_credential_data.credential_id.len() > MAX_CREDENTIAL_ID_LENGTH {
                return Err(Error::MalformedAuthenticatorData);
            }
            let id_length = u16::try_from(attested_credential_data.credential_id.len())
                .map_err(|_| Error::MalformedAuthenticatorData)?;
            bytes.extend_from_slice(&id_length.to_be_bytes());
            bytes.extend_from_slice(&attested_credential_data.credential_id);
            bytes.extend_from_slice(
                &attested_credential_data
                    .credential_public_key
                    .to_cose_bytes()?,
            );
        }

        if let Some(extensions) = &self.extensions {
            bytes.extend_from_slice(extensions);
        }

        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn sample_key() -> cose::PublicKey {
        cose::PublicKey::P256(cose::P256PublicKey {
            x: [0xe0; 32],
            y: [0xab; 32],
        })
    }

    fn sample(flags: AuthenticatorDataFlags, credential_id_length: usize) -> AuthenticatorData {
        AuthenticatorData {
            rp_id_hash: [0x11; 32],
            flags,
            sign_count: 42,
            attested_credential_data: flags
                .contains(AuthenticatorDataFlags::ATTESTED_CREDENTIAL_DATA)
                .then(|| AttestedCredentialData {
                    aaguid: [0; 16],
                    credential_id: Bytes::new(vec![0x77; credential_id_length]),
                    credential_public_key: sample_key(),
                }),
            extensions: None,
        }
    }

    #[test]
    fn parse_inverts_serialize() {
        let flags = AuthenticatorDataFlags::USER_PRESENCE
            | AuthenticatorDataFlags::USER_VERIFIED
            | AuthenticatorDataFlags::ATTESTED_CREDENTIAL_DATA;
        let data = sample(flags, 32);
        let parsed = AuthenticatorData::parse(&data.serialize().unwrap()).unwrap();
        assert_eq!(parsed, data);
    }

    #[test]
    fn assertion_form_has_no_attested_data() {
        let data = sample(AuthenticatorDataFlags::USER_PRESENCE, 0);
        let encoded = data.serialize().unwrap();
        assert_eq!(encoded.len(), 37);
        let parsed = AuthenticatorData::parse(&encoded).unwrap();
        assert!(parsed.attested_credential_data.is_none());
        assert_eq!(parsed.sign_count, 42);
    }

    #[test]
    fn credential_id_boundary() {
        let flags = AuthenticatorDataFlags::USER_PRESENCE
            | AuthenticatorDataFlags::ATTESTED_CREDENTIAL_DATA;
        let max = sample(flags, MAX_CREDENTIAL_ID_LENGTH);
        let parsed = AuthenticatorData::parse(&max.serialize().unwrap()).unwrap();
        assert_eq!(
            parsed
                .attested_credential_data
                .unwrap()
                .credential_id
                .len(),
            MAX_CREDENTIAL_ID_LENGTH
        );

        // 1024 has to be hand-assembled; serialize refuses to emit it
        let mut oversized = Vec::new();
        oversized.extend_from_slice(&[0x11; 32]);
        oversized.push(flags.bits());
        oversized.extend_from_slice(&42u32.to_be_bytes());
        oversized.extend_from_slice(&[0; 16]);
        oversized.extend_from_slice(&1024u16.to_be_bytes());
        oversized.extend_from_slice(&vec![0x77; 1024]);
        oversized.extend_from_slice(&sample_key().to_cose_bytes().unwrap());
        assert_eq!(
            AuthenticatorData::parse(&oversized),
            Err(Error::MalformedAuthenticatorData)
        );
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let data = sample(AuthenticatorDataFlags::USER_PRESENCE, 0);
        let mut encoded = data.serialize().unwrap();
        encoded.push(0x00);
        assert_eq!(
            AuthenticatorData::parse(&encoded),
            Err(Error::MalformedAuthenticatorData)
        );
    }

    #[test]
    fn truncated_prefix_is_rejected() {
        assert_eq!(
            AuthenticatorData::parse(&hex!("0011223344")),
            Err(Error::MalformedAuthenticatorData)
        );
    }

    #[test]
    fn extension_map_must_consume_the_remainder() {
        let mut data = sample(
            AuthenticatorDataFlags::USER_PRESENCE | AuthenticatorDataFlags::EXTENSION_DATA,
            0,
        );
        // {1: true}
        data.extensions = Some(hex!("a101f5").to_vec());
        let parsed = AuthenticatorData::parse(&data.serialize().unwrap()).unwrap();
        assert_eq!(parsed.extensions.as_deref(), Some(&hex!("a101f5")[..]));

        // a trailing byte after the map, and a non-map item, are both rejected
        data.extensions = Some(hex!("a101f5 00").to_vec());
        assert!(AuthenticatorData::parse(&data.serialize().unwrap()).is_err());
        data.extensions = Some(hex!("01").to_vec());
        assert!(AuthenticatorData::parse(&data.serialize().unwrap()).is_err());
    }
}
