//! Byte buffers and the two codecs everything else leans on: URL-safe
//! base64 without padding for the JSON wire, and CBOR (via `cbor-smol`) for
//! attestation objects and COSE keys.
//!
//! `cbor-smol` cannot skip arbitrary values, so the helpers here pair it
//! with a small item-length scanner. That is what lets the authenticator
//! data parser find the end of a COSE key embedded in a binary stream, and
//! what lets every top-level decode insist that its input is consumed
//! exactly.

use core::fmt;
use core::ops::Deref;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde::{de, Deserialize, Serialize};

use crate::error::{Error, Result};

/// Unpadded URL-safe base64; padding is tolerated on decode.
const B64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub mod base64url {
    use base64::Engine as _;

    use super::B64;
    use crate::error::{Error, Result};

    pub fn encode(data: impl AsRef<[u8]>) -> String {
        B64.encode(data)
    }

    pub fn decode(text: impl AsRef<[u8]>) -> Result<Vec<u8>> {
        B64.decode(text).map_err(|_| Error::MalformedInput)
    }
}

/// An opaque byte sequence with a canonical base64url rendering.
///
/// Equality and hashing are defined on the byte content; on the JSON wire the
/// value travels as an unpadded URL-safe base64 string. Challenges,
/// credential ids, user handles and signatures are all `Bytes`.
#[derive(Clone, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Bytes(Vec<u8>);

impl Bytes {
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    pub fn from_slice(data: &[u8]) -> Self {
        Self(data.to_vec())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl Deref for Bytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(data: Vec<u8>) -> Self {
        Self(data)
    }
}

impl From<&[u8]> for Bytes {
    fn from(data: &[u8]) -> Self {
        Self::from_slice(data)
    }
}

impl<const N: usize> From<[u8; N]> for Bytes {
    fn from(data: [u8; N]) -> Self {
        Self(data.to_vec())
    }
}

impl fmt::Display for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&base64url::encode(&self.0))
    }
}

impl fmt::Debug for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for Bytes {
    fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&base64url::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Bytes {
    fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct Base64Visitor;

        impl de::Visitor<'_> for Base64Visitor {
            type Value = Bytes;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an unpadded base64url string")
            }

            fn visit_str<E>(self, v: &str) -> core::result::Result<Bytes, E>
            where
                E: de::Error,
            {
                base64url::decode(v)
                    .map(Bytes)
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_str(Base64Visitor)
    }
}

/// Nesting cap for the scanner. Authenticator extension maps and attestation
/// statements are shallow; anything deeper is hostile.
const MAX_NESTING: u8 = 16;

/// Reads one CBOR item header: `(major type, argument, offset of the value)`.
/// Indefinite lengths and reserved additional-information values are
/// rejected.
pub(crate) fn cbor_header(data: &[u8], offset: usize) -> Result<(u8, u64, usize)> {
    let initial = *data.get(offset).ok_or(Error::MalformedInput)?;
    let major = initial >> 5;
    let additional = initial & 0x1f;
    let mut value_offset = offset.checked_add(1).ok_or(Error::MalformedInput)?;

    let argument = match additional {
        n @ 0..=23 => u64::from(n),
        24 => {
            let byte = *data.get(value_offset).ok_or(Error::MalformedInput)?;
            value_offset += 1;
            u64::from(byte)
        }
        25 => {
            let bytes: [u8; 2] = data
                .get(value_offset..value_offset + 2)
                .ok_or(Error::MalformedInput)?
                .try_into()
                .map_err(|_| Error::MalformedInput)?;
            value_offset += 2;
            u64::from(u16::from_be_bytes(bytes))
        }
        26 => {
            let bytes: [u8; 4] = data
                .get(value_offset..value_offset + 4)
                .ok_or(Error::MalformedInput)?
                .try_into()
                .map_err(|_| Error::MalformedInput)?;
            value_offset += 4;
            u64::from(u32::from_be_bytes(bytes))
        }
        27 => {
            let bytes: [u8; 8] = data
                .get(value_offset..value_offset + 8)
                .ok_or(Error::MalformedInput)?
                .try_into()
                .map_err(|_| Error::MalformedInput)?;
            value_offset += 8;
            u64::from_be_bytes(bytes)
        }
        _ => return Err(Error::MalformedInput),
    };

    Ok((major, argument, value_offset))
}

fn item_end(data: &[u8], offset: usize, depth: u8) -> Result<usize> {
    if depth == 0 {
        return Err(Error::MalformedInput);
    }
    let (major, argument, value_offset) = cbor_header(data, offset)?;
    match major {
        // integers and simple values / floats carry no payload beyond the
        // header argument
        0 | 1 | 7 => Ok(value_offset),
        2 | 3 => {
            let length = usize::try_from(argument).map_err(|_| Error::MalformedInput)?;
            let end = value_offset.checked_add(length).ok_or(Error::MalformedInput)?;
            if end > data.len() {
                return Err(Error::MalformedInput);
            }
            Ok(end)
        }
        4 => {
            let mut end = value_offset;
            for _ in 0..argument {
                end = item_end(data, end, depth - 1)?;
            }
            Ok(end)
        }
        5 => {
            let mut end = value_offset;
            for _ in 0..argument {
                end = item_end(data, end, depth - 1)?;
                end = item_end(data, end, depth - 1)?;
            }
            Ok(end)
        }
        6 => item_end(data, value_offset, depth - 1),
        _ => Err(Error::MalformedInput),
    }
}

/// Length in bytes of the single CBOR item starting at `data[0]`.
pub(crate) fn cbor_item_length(data: &[u8]) -> Result<usize> {
    item_end(data, 0, MAX_NESTING)
}

/// End offset of the CBOR item starting at `data[offset]`.
pub(crate) fn cbor_item_end(data: &[u8], offset: usize) -> Result<usize> {
    item_end(data, offset, MAX_NESTING)
}

/// Decodes one CBOR item that must consume `data` exactly.
pub fn cbor_from_slice<T: de::DeserializeOwned>(data: &[u8]) -> Result<T> {
    if cbor_item_length(data)? != data.len() {
        return Err(Error::MalformedInput);
    }
    cbor_smol::cbor_deserialize(data).map_err(|_err| {
        debug!("cbor decode failed: {:?}", _err);
        Error::MalformedInput
    })
}

/// Decodes one CBOR item off the front of `data`, returning the remainder.
pub(crate) fn cbor_take_from_slice<T: de::DeserializeOwned>(data: &[u8]) -> Result<(T, &[u8])> {
    let end = cbor_item_length(data)?;
    let value = cbor_smol::cbor_deserialize(&data[..end]).map_err(|_err| {
        debug!("cbor decode failed: {:?}", _err);
        Error::MalformedInput
    })?;
    Ok((value, &data[end..]))
}

/// Encodes a value as CBOR, growing the scratch buffer as needed.
pub fn cbor_to_vec<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut scratch = vec![0u8; 4096];
    loop {
        let scratch_len = scratch.len();
        match cbor_smol::cbor_serialize(value, &mut scratch) {
            Ok(encoded) => return Ok(encoded.to_vec()),
            // assume buffer exhaustion until the scratch is implausibly big
            Err(_) if scratch_len < (1 << 20) => {
                let doubled = scratch_len * 2;
                scratch = vec![0u8; doubled];
            }
            Err(_err) => {
                debug!("cbor encode failed: {:?}", _err);
                return Err(Error::MalformedInput);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn base64url_is_unpadded() {
        assert_eq!(base64url::encode([0xfb, 0xff]), "-_8");
        assert_eq!(base64url::encode(b"f"), "Zg");
    }

    #[test]
    fn base64url_tolerates_padding_on_decode() {
        assert_eq!(base64url::decode("Zg").unwrap(), b"f");
        assert_eq!(base64url::decode("Zg==").unwrap(), b"f");
    }

    #[test]
    fn base64url_rejects_standard_alphabet() {
        assert_eq!(base64url::decode("+/8"), Err(Error::MalformedInput));
    }

    #[test]
    fn bytes_serde_roundtrip() {
        let bytes = Bytes::from_slice(&hex!("00ff10"));
        let json = serde_json::to_string(&bytes).unwrap();
        assert_eq!(json, "\"AP8Q\"");
        let back: Bytes = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bytes);
    }

    #[test]
    fn scanner_handles_nesting() {
        // {1: [h'00', "a"], 2: 500}
        let data = hex!("a2018241006161021901f4");
        assert_eq!(cbor_item_length(&data).unwrap(), data.len());
    }

    #[test]
    fn scanner_reports_embedded_item_length() {
        // a 2-byte item followed by trailing bytes
        let data = hex!("4101ffff");
        assert_eq!(cbor_item_length(&data).unwrap(), 2);
    }

    #[test]
    fn scanner_rejects_indefinite_lengths() {
        let data = hex!("9f0102ff");
        assert_eq!(cbor_item_length(&data), Err(Error::MalformedInput));
    }

    #[test]
    fn scanner_rejects_truncated_items() {
        let data = hex!("5861 00");
        assert_eq!(cbor_item_length(&data), Err(Error::MalformedInput));
    }

    #[test]
    fn from_slice_rejects_trailing_bytes() {
        let data = hex!("0100");
        assert_eq!(cbor_from_slice::<u8>(&data), Err(Error::MalformedInput));
    }

    #[test]
    fn to_vec_roundtrips() {
        let encoded = cbor_to_vec(&42u32).unwrap();
        assert_eq!(encoded, hex!("182a"));
        assert_eq!(cbor_from_slice::<u32>(&encoded).unwrap(), 42);
    }
}
