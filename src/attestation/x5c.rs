//! Leaf-certificate helpers shared by the certificate-bearing formats.
//!
//! Only the leaf of an `x5c` chain is consulted; walking the chain up to a
//! trusted root is metadata-service territory and out of scope.

use rsa::pkcs1::DecodeRsaPublicKey as _;
use rsa::traits::PublicKeyParts as _;
use x509_parser::prelude::*;

use crate::cose::{
    Alg, Ed25519PublicKey, P256PublicKey, P384PublicKey, P521PublicKey, PublicKey, RsaPublicKey,
};
use crate::error::{Error, Result};

pub(super) fn parse_certificate(der: &[u8]) -> Result<X509Certificate<'_>> {
    let (_, certificate) =
        X509Certificate::from_der(der).map_err(|_| Error::AttestationVerificationFailed)?;
    Ok(certificate)
}

/// The certified public key of the leaf certificate, in COSE shape.
pub(super) fn leaf_public_key(alg: Alg, leaf_der: &[u8]) -> Result<PublicKey> {
    let certificate = parse_certificate(leaf_der)?;
    let spki = certificate.public_key().subject_public_key.data.as_ref();
    public_key_from_spki(alg, spki)
}

pub(super) fn public_key_from_spki(alg: Alg, spki: &[u8]) -> Result<PublicKey> {
    fn ec_coordinates<const N: usize>(spki: &[u8]) -> Result<([u8; N], [u8; N])> {
        // uncompressed SEC1 point: 0x04 || x || y
        let Some((&0x04, coordinates)) = spki.split_first() else {
            return Err(Error::AttestationVerificationFailed);
        };
        if coordinates.len() != 2 * N {
            return Err(Error::AttestationVerificationFailed);
        }
        let x = coordinates[..N]
            .try_into()
            .map_err(|_| Error::AttestationVerificationFailed)?;
        let y = coordinates[N..]
            .try_into()
            .map_err(|_| Error::AttestationVerificationFailed)?;
        Ok((x, y))
    }

    match alg {
        Alg::Es256 => {
            let (x, y) = ec_coordinates::<32>(spki)?;
            Ok(PublicKey::P256(P256PublicKey { x, y }))
        }
        Alg::Es384 => {
            let (x, y) = ec_coordinates::<48>(spki)?;
            Ok(PublicKey::P384(P384PublicKey { x, y }))
        }
        Alg::Es512 => {
            let (x, y) = ec_coordinates::<66>(spki)?;
            Ok(PublicKey::P521(P521PublicKey { x, y }))
        }
        Alg::EdDsa => {
            let x = spki
                .try_into()
                .map_err(|_| Error::AttestationVerificationFailed)?;
            Ok(PublicKey::Ed25519(Ed25519PublicKey { x }))
        }
        Alg::Rs256 | Alg::Rs384 | Alg::Rs512 | Alg::Ps256 => {
            let key = rsa::RsaPublicKey::from_pkcs1_der(spki)
                .map_err(|_| Error::AttestationVerificationFailed)?;
            Ok(PublicKey::Rsa(RsaPublicKey {
                alg,
                n: key.n().to_bytes_be(),
                e: key.e().to_bytes_be(),
            }))
        }
        Alg::Rs1 => Err(Error::UnsupportedAlgorithm),
    }
}

/// Apple's anonymous attestation binds the ceremony via a nonce carried in a
/// certificate extension; the nonce is the trailing octets of the extension
/// value.
pub(super) fn nonce_extension_matches(
    certificate: &X509Certificate<'_>,
    oid: &str,
    nonce: &[u8],
) -> bool {
    certificate.extensions().iter().any(|extension| {
        extension.oid.to_id_string() == oid && extension.value.ends_with(nonce)
    })
}
