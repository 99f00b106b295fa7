//! Data types and serde for public COSE_Keys.
//!
//! <https://tools.ietf.org/html/rfc8152#section-7>
//!
//! A COSE Key structure is built on a CBOR map keyed by small integers.
//! Common parameters: 1 = kty, 3 = alg. Key-type specific parameters reuse
//! the negative label space:
//!
//! Key Type 1 (OKP):  -1: crv, -2: x
//! Key Type 2 (EC2):  -1: crv, -2: x, -3: y
//! Key Type 3 (RSA):  -1: n,   -2: e
//!
//! Authenticators emit keys in canonical CTAP2 order (1, 3, -1, -2, -3), and
//! only that order is accepted; `kty` therefore always arrives before the
//! ambiguous negative labels, which is what makes the RSA reuse of -1/-2
//! decodable in a single pass.

use core::fmt::{self, Formatter};

use serde::{
    de::{Error as _, Expected, MapAccess, Unexpected},
    Deserialize, Serialize,
};
use serde_bytes::ByteBuf;
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::codec;
use crate::error::Result;

#[repr(i8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize_repr, Deserialize_repr)]
enum Label {
    Kty = 1,
    Alg = 3,
    // n for RSA keys
    Crv = -1,
    // e for RSA keys
    X = -2,
    Y = -3,
}

struct TryFromIntError;

impl TryFrom<i8> for Label {
    type Error = TryFromIntError;

    fn try_from(label: i8) -> core::result::Result<Self, Self::Error> {
        Ok(match label {
            1 => Self::Kty,
            3 => Self::Alg,
            -1 => Self::Crv,
            -2 => Self::X,
            -3 => Self::Y,
            _ => {
                return Err(TryFromIntError);
            }
        })
    }
}

#[repr(i8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize_repr, Deserialize_repr)]
enum Kty {
    Okp = 1,
    Ec2 = 2,
    Rsa = 3,
}

impl Expected for Kty {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as i8)
    }
}

/// COSE algorithm identifiers accepted on the wire.
///
/// RS1 is recognized so that callers can name it in `pubKeyCredParams`, but
/// the signature verifier rejects it.
#[repr(i32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize_repr, Deserialize_repr)]
pub enum Alg {
    Es256 = -7,
    EdDsa = -8,
    Es384 = -35,
    Es512 = -36,
    Ps256 = -37,
    Rs256 = -257,
    Rs384 = -258,
    Rs512 = -259,
    Rs1 = -65535,
}

impl Expected for Alg {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as i32)
    }
}

#[repr(i8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize_repr, Deserialize_repr)]
enum Crv {
    P256 = 1,
    P384 = 2,
    P521 = 3,
    Ed25519 = 6,
}

impl Expected for Crv {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as i8)
    }
}

/// The label/value soup as it appears on the wire, before key-type specific
/// validation. `crv`/`x`/`y` double as `n`/`e` storage for RSA keys.
#[derive(Clone, Debug, Default)]
struct RawPublicKey {
    kty: Option<Kty>,
    alg: Option<Alg>,
    crv: Option<Crv>,
    x: Option<ByteBuf>,
    y: Option<ByteBuf>,
    n: Option<ByteBuf>,
    e: Option<ByteBuf>,
}

impl<'de> Deserialize<'de> for RawPublicKey {
    fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct IndexedVisitor;
        impl<'de> serde::de::Visitor<'de> for IndexedVisitor {
            type Value = RawPublicKey;

            fn expecting(&self, formatter: &mut core::fmt::Formatter) -> core::fmt::Result {
                formatter.write_str("RawPublicKey")
            }

            fn visit_map<V>(self, mut map: V) -> core::result::Result<RawPublicKey, V::Error>
            where
                V: MapAccess<'de>,
            {
                #[derive(PartialEq)]
                enum Key {
                    Label(Label),
                    Unknown(i8),
                    None,
                }

                fn next_key<'a, V: MapAccess<'a>>(map: &mut V) -> core::result::Result<Key, V::Error> {
                    let key: Option<i8> = map.next_key()?;
                    let key = match key {
                        Some(key) => match Label::try_from(key) {
                            Ok(label) => Key::Label(label),
                            Err(_) => Key::Unknown(key),
                        },
                        None => Key::None,
                    };
                    Ok(key)
                }

                let mut public_key = RawPublicKey::default();

                // As we cannot deserialize arbitrary values with cbor-smol,
                // we do not support unknown keys before a known key. If there
                // are unknown keys, they must be at the end.

                // only deserialize in canonical order

                let mut key = next_key(&mut map)?;

                if key == Key::Label(Label::Kty) {
                    public_key.kty = Some(map.next_value()?);
                    key = next_key(&mut map)?;
                }

                if key == Key::Label(Label::Alg) {
                    public_key.alg = Some(map.next_value()?);
                    key = next_key(&mut map)?;
                }

                if public_key.kty == Some(Kty::Rsa) {
                    // -1 and -2 carry the modulus and exponent
                    if key == Key::Label(Label::Crv) {
                        public_key.n = Some(map.next_value()?);
                        key = next_key(&mut map)?;
                    }

                    if key == Key::Label(Label::X) {
                        public_key.e = Some(map.next_value()?);
                        key = next_key(&mut map)?;
                    }
                } else {
                    if key == Key::Label(Label::Crv) {
                        public_key.crv = Some(map.next_value()?);
                        key = next_key(&mut map)?;
                    }

                    if key == Key::Label(Label::X) {
                        public_key.x = Some(map.next_value()?);
                        key = next_key(&mut map)?;
                    }

                    if key == Key::Label(Label::Y) {
                        public_key.y = Some(map.next_value()?);
                        key = next_key(&mut map)?;
                    }
                }

                // if there is another key, it should be an unknown one
                if matches!(key, Key::Label(_)) {
                    Err(serde::de::Error::custom(
                        "public key data in wrong order or with duplicates",
                    ))
                } else {
                    Ok(public_key)
                }
            }
        }
        deserializer.deserialize_map(IndexedVisitor {})
    }
}

impl Serialize for RawPublicKey {
    fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let is_set = [
            self.kty.is_some(),
            self.alg.is_some(),
            self.crv.is_some() || self.n.is_some(),
            self.x.is_some() || self.e.is_some(),
            self.y.is_some(),
        ];
        let fields = is_set.into_iter().map(usize::from).sum();
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(fields))?;

        //  1: kty
        if let Some(kty) = &self.kty {
            map.serialize_entry(&(Label::Kty as i8), &(*kty as i8))?;
        }
        //  3: alg
        if let Some(alg) = &self.alg {
            map.serialize_entry(&(Label::Alg as i8), &(*alg as i32))?;
        }
        // -1: crv (n for RSA)
        if let Some(crv) = &self.crv {
            map.serialize_entry(&(Label::Crv as i8), &(*crv as i8))?;
        } else if let Some(n) = &self.n {
            map.serialize_entry(&(Label::Crv as i8), n)?;
        }
        // -2: x (e for RSA)
        if let Some(x) = &self.x {
            map.serialize_entry(&(Label::X as i8), x)?;
        } else if let Some(e) = &self.e {
            map.serialize_entry(&(Label::X as i8), e)?;
        }
        // -3: y
        if let Some(y) = &self.y {
            map.serialize_entry(&(Label::Y as i8), y)?;
        }

        map.end()
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(into = "RawPublicKey")]
pub struct P256PublicKey {
    pub x: [u8; 32],
    pub y: [u8; 32],
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(into = "RawPublicKey")]
pub struct P384PublicKey {
    pub x: [u8; 48],
    pub y: [u8; 48],
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(into = "RawPublicKey")]
pub struct P521PublicKey {
    pub x: [u8; 66],
    pub y: [u8; 66],
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(into = "RawPublicKey")]
pub struct Ed25519PublicKey {
    pub x: [u8; 32],
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(into = "RawPublicKey")]
pub struct RsaPublicKey {
    pub alg: Alg,
    /// Modulus, unsigned big-endian.
    pub n: Vec<u8>,
    /// Public exponent, unsigned big-endian.
    pub e: Vec<u8>,
}

impl From<P256PublicKey> for RawPublicKey {
    fn from(key: P256PublicKey) -> Self {
        Self {
            kty: Some(Kty::Ec2),
            alg: Some(Alg::Es256),
            crv: Some(Crv::P256),
            x: Some(ByteBuf::from(key.x.to_vec())),
            y: Some(ByteBuf::from(key.y.to_vec())),
            ..Self::default()
        }
    }
}

impl From<P384PublicKey> for RawPublicKey {
    fn from(key: P384PublicKey) -> Self {
        Self {
            kty: Some(Kty::Ec2),
            alg: Some(Alg::Es384),
            crv: Some(Crv::P384),
            x: Some(ByteBuf::from(key.x.to_vec())),
            y: Some(ByteBuf::from(key.y.to_vec())),
            ..Self::default()
        }
    }
}

impl From<P521PublicKey> for RawPublicKey {
    fn from(key: P521PublicKey) -> Self {
        Self {
            kty: Some(Kty::Ec2),
            alg: Some(Alg::Es512),
            crv: Some(Crv::P521),
            x: Some(ByteBuf::from(key.x.to_vec())),
            y: Some(ByteBuf::from(key.y.to_vec())),
            ..Self::default()
        }
    }
}

impl From<Ed25519PublicKey> for RawPublicKey {
    fn from(key: Ed25519PublicKey) -> Self {
        Self {
            kty: Some(Kty::Okp),
            alg: Some(Alg::EdDsa),
            crv: Some(Crv::Ed25519),
            x: Some(ByteBuf::from(key.x.to_vec())),
            ..Self::default()
        }
    }
}

impl From<RsaPublicKey> for RawPublicKey {
    fn from(key: RsaPublicKey) -> Self {
        Self {
            kty: Some(Kty::Rsa),
            alg: Some(key.alg),
            n: Some(ByteBuf::from(key.n)),
            e: Some(ByteBuf::from(key.e)),
            ..Self::default()
        }
    }
}

/// A credential public key in its canonical shape.
///
/// Opaque to everything but the signature verifier; `to_cose_bytes` re-emits
/// the canonical CBOR encoding for storage and comparison.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PublicKey {
    P256(P256PublicKey),
    P384(P384PublicKey),
    P521(P521PublicKey),
    Ed25519(Ed25519PublicKey),
    Rsa(RsaPublicKey),
}

impl PublicKey {
    pub fn alg(&self) -> Alg {
        match self {
            Self::P256(_) => Alg::Es256,
            Self::P384(_) => Alg::Es384,
            Self::P521(_) => Alg::Es512,
            Self::Ed25519(_) => Alg::EdDsa,
            Self::Rsa(key) => key.alg,
        }
    }

    pub fn to_cose_bytes(&self) -> Result<Vec<u8>> {
        codec::cbor_to_vec(self)
    }
}

impl From<P256PublicKey> for PublicKey {
    fn from(key: P256PublicKey) -> Self {
        PublicKey::P256(key)
    }
}

impl From<P384PublicKey> for PublicKey {
    fn from(key: P384PublicKey) -> Self {
        PublicKey::P384(key)
    }
}

impl From<P521PublicKey> for PublicKey {
    fn from(key: P521PublicKey) -> Self {
        PublicKey::P521(key)
    }
}

impl From<Ed25519PublicKey> for PublicKey {
    fn from(key: Ed25519PublicKey) -> Self {
        PublicKey::Ed25519(key)
    }
}

impl From<RsaPublicKey> for PublicKey {
    fn from(key: RsaPublicKey) -> Self {
        PublicKey::Rsa(key)
    }
}

fn coordinate<const N: usize, E: serde::de::Error>(
    field: &'static str,
    value: Option<ByteBuf>,
) -> core::result::Result<[u8; N], E> {
    let bytes = value.ok_or_else(|| E::missing_field(field))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| E::invalid_length(bytes.len(), &"a curve coordinate"))
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawPublicKey::deserialize(deserializer)?;
        let kty = raw.kty.ok_or_else(|| D::Error::missing_field("kty"))?;
        let alg = raw.alg.ok_or_else(|| D::Error::missing_field("alg"))?;

        fn check_alg<E: serde::de::Error>(alg: Alg, expected: Alg) -> core::result::Result<(), E> {
            if alg != expected {
                return Err(E::invalid_value(Unexpected::Signed(alg as i64), &expected));
            }
            Ok(())
        }

        match kty {
            Kty::Ec2 => {
                let crv = raw.crv.ok_or_else(|| D::Error::missing_field("crv"))?;
                match crv {
                    Crv::P256 => {
                        check_alg::<D::Error>(alg, Alg::Es256)?;
                        Ok(Self::P256(P256PublicKey {
                            x: coordinate("x", raw.x)?,
                            y: coordinate("y", raw.y)?,
                        }))
                    }
                    Crv::P384 => {
                        check_alg::<D::Error>(alg, Alg::Es384)?;
                        Ok(Self::P384(P384PublicKey {
                            x: coordinate("x", raw.x)?,
                            y: coordinate("y", raw.y)?,
                        }))
                    }
                    Crv::P521 => {
                        check_alg::<D::Error>(alg, Alg::Es512)?;
                        Ok(Self::P521(P521PublicKey {
                            x: coordinate("x", raw.x)?,
                            y: coordinate("y", raw.y)?,
                        }))
                    }
                    Crv::Ed25519 => Err(D::Error::invalid_value(
                        Unexpected::Signed(crv as i64),
                        &"an EC2 curve",
                    )),
                }
            }
            Kty::Okp => {
                let crv = raw.crv.ok_or_else(|| D::Error::missing_field("crv"))?;
                if crv != Crv::Ed25519 {
                    return Err(D::Error::invalid_value(
                        Unexpected::Signed(crv as i64),
                        &Crv::Ed25519,
                    ));
                }
                check_alg::<D::Error>(alg, Alg::EdDsa)?;
                Ok(Self::Ed25519(Ed25519PublicKey {
                    x: coordinate("x", raw.x)?,
                }))
            }
            Kty::Rsa => {
                if !matches!(alg, Alg::Rs256 | Alg::Rs384 | Alg::Rs512 | Alg::Ps256 | Alg::Rs1) {
                    return Err(D::Error::invalid_value(
                        Unexpected::Signed(alg as i64),
                        &"an RSA signature algorithm",
                    ));
                }
                let n = raw.n.ok_or_else(|| D::Error::missing_field("n"))?;
                let e = raw.e.ok_or_else(|| D::Error::missing_field("e"))?;
                Ok(Self::Rsa(RsaPublicKey {
                    alg,
                    n: n.into_vec(),
                    e: e.into_vec(),
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{base64url, cbor_from_slice};
    use hex_literal::hex;

    // ES256 key: {1: 2, 3: -7, -1: 1, -2: x, -3: y}
    const ES256_KEY: &str =
        "pQECAyYgASFYIOB5K59pGxpqWU3aA2VDa6aaPdzqoEFezjc1b6ORiwhXIlggq3-siEIIKtgX2Z7WsMUbAQW1hvxVpGAKFPMj4qUvuYY";

    #[test]
    fn es256_key_roundtrips_canonically() {
        let encoded = base64url::decode(ES256_KEY).unwrap();
        let key: PublicKey = cbor_from_slice(&encoded).unwrap();
        assert_eq!(key.alg(), Alg::Es256);
        assert!(matches!(key, PublicKey::P256(_)));
        assert_eq!(key.to_cose_bytes().unwrap(), encoded);
    }

    #[test]
    fn non_canonical_order_is_rejected() {
        // {3: -7, 1: 2, -1: 1, -2: x, -3: y} -- alg before kty
        let mut swapped = base64url::decode(ES256_KEY).unwrap();
        swapped[1..5].copy_from_slice(&hex!("03 26 01 02"));
        assert!(cbor_from_slice::<PublicKey>(&swapped).is_err());
    }

    #[test]
    fn ed25519_key_decodes() {
        // {1: 1, 3: -8, -1: 6, -2: 32 bytes}
        let mut encoded = hex!("a4 0101 0327 2006 2158 20").to_vec();
        encoded.extend_from_slice(&[7u8; 32]);
        let key: PublicKey = cbor_from_slice(&encoded).unwrap();
        assert_eq!(key.alg(), Alg::EdDsa);
        assert_eq!(key.to_cose_bytes().unwrap(), encoded);
    }

    #[test]
    fn rsa_key_decodes() {
        // {1: 3, 3: -257, -1: 256-byte n, -2: 010001}
        let mut encoded = hex!("a4 0103 0339 0100 2059 0100").to_vec();
        encoded.extend_from_slice(&[0xabu8; 256]);
        encoded.extend_from_slice(&hex!("2143 010001"));
        let key: PublicKey = cbor_from_slice(&encoded).unwrap();
        assert_eq!(key.alg(), Alg::Rs256);
        let PublicKey::Rsa(rsa) = &key else {
            panic!("expected an RSA key");
        };
        assert_eq!(rsa.n.len(), 256);
        assert_eq!(rsa.e, hex!("010001"));
        assert_eq!(key.to_cose_bytes().unwrap(), encoded);
    }

    #[test]
    fn wrong_coordinate_length_is_rejected() {
        // P-256 with 31-byte x
        let mut encoded = hex!("a5 0102 0326 2001 2158 1f").to_vec();
        encoded.extend_from_slice(&[0u8; 31]);
        encoded.extend_from_slice(&hex!("2258 20"));
        encoded.extend_from_slice(&[0u8; 32]);
        assert!(cbor_from_slice::<PublicKey>(&encoded).is_err());
    }
}
