//! Signature verification for the COSE algorithms the ceremonies accept.
//!
//! ECDSA signatures arrive ASN.1 DER-encoded and are normalized to low-S
//! before verification to close the malleability hole; EdDSA signatures are
//! 64 raw bytes; RSA covers PKCS#1 v1.5 and PSS (MGF1-SHA-256, 32-byte
//! salt). RS1 is recognized on the wire but never verified.

use p256::ecdsa::signature::Verifier as _;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::cose::{Alg, PublicKey};
use crate::error::{Error, Result};

/// Verifies `signature` over `message` with `public_key`, interpreted under
/// `alg`. The algorithm must agree with the key's shape; a mismatch is
/// `UnsupportedAlgorithm`, a failed check is `BadSignature`.
pub fn verify(alg: Alg, public_key: &PublicKey, message: &[u8], signature: &[u8]) -> Result<()> {
    match (alg, public_key) {
        (Alg::Es256, PublicKey::P256(key)) => {
            use p256::elliptic_curve::generic_array::GenericArray;
            let point = p256::EncodedPoint::from_affine_coordinates(
                GenericArray::from_slice(&key.x),
                GenericArray::from_slice(&key.y),
                false,
            );
            let verifying_key = p256::ecdsa::VerifyingKey::from_encoded_point(&point)
                .map_err(|_| Error::BadSignature)?;
            let signature =
                p256::ecdsa::Signature::from_der(signature).map_err(|_| Error::BadSignature)?;
            let signature = signature.normalize_s().unwrap_or(signature);
            verifying_key
                .verify(message, &signature)
                .map_err(|_| Error::BadSignature)
        }
        (Alg::Es384, PublicKey::P384(key)) => {
            use p384::elliptic_curve::generic_array::GenericArray;
            let point = p384::EncodedPoint::from_affine_coordinates(
                GenericArray::from_slice(&key.x),
                GenericArray::from_slice(&key.y),
                false,
            );
            let verifying_key = p384::ecdsa::VerifyingKey::from_encoded_point(&point)
                .map_err(|_| Error::BadSignature)?;
            let signature =
                p384::ecdsa::Signature::from_der(signature).map_err(|_| Error::BadSignature)?;
            let signature = signature.normalize_s().unwrap_or(signature);
            verifying_key
                .verify(message, &signature)
                .map_err(|_| Error::BadSignature)
        }
        (Alg::Es512, PublicKey::P521(key)) => {
            use p521::elliptic_curve::generic_array::GenericArray;
            let point = p521::EncodedPoint::from_affine_coordinates(
                GenericArray::from_slice(&key.x),
                GenericArray::from_slice(&key.y),
                false,
            );
            let verifying_key = p521::ecdsa::VerifyingKey::from_encoded_point(&point)
                .map_err(|_| Error::BadSignature)?;
            let signature =
                p521::ecdsa::Signature::from_der(signature).map_err(|_| Error::BadSignature)?;
            let signature = signature.normalize_s().unwrap_or(signature);
            verifying_key
                .verify(message, &signature)
                .map_err(|_| Error::BadSignature)
        }
        (Alg::EdDsa, PublicKey::Ed25519(key)) => {
            let verifying_key =
                ed25519_dalek::VerifyingKey::from_bytes(&key.x).map_err(|_| Error::BadSignature)?;
            let signature = ed25519_dalek::Signature::from_slice(signature)
                .map_err(|_| Error::BadSignature)?;
            // verify_strict also rejects the small-order keys plain
            // verification tolerates
            verifying_key
                .verify_strict(message, &signature)
                .map_err(|_| Error::BadSignature)
        }
        (Alg::Rs256, PublicKey::Rsa(key)) => rsa_verify(
            key,
            rsa::Pkcs1v15Sign::new::<Sha256>(),
            &Sha256::digest(message),
            signature,
        ),
        (Alg::Rs384, PublicKey::Rsa(key)) => rsa_verify(
            key,
            rsa::Pkcs1v15Sign::new::<Sha384>(),
            &Sha384::digest(message),
            signature,
        ),
        (Alg::Rs512, PublicKey::Rsa(key)) => rsa_verify(
            key,
            rsa::Pkcs1v15Sign::new::<Sha512>(),
            &Sha512::digest(message),
            signature,
        ),
        (Alg::Ps256, PublicKey::Rsa(key)) => rsa_verify(
            key,
            rsa::Pss::new_with_salt::<Sha256>(32),
            &Sha256::digest(message),
            signature,
        ),
        _ => Err(Error::UnsupportedAlgorithm),
    }
}

fn rsa_verify(
    key: &crate::cose::RsaPublicKey,
    scheme: impl rsa::traits::SignatureScheme,
    hashed: &[u8],
    signature: &[u8],
) -> Result<()> {
    let public_key = rsa::RsaPublicKey::new(
        rsa::BigUint::from_bytes_be(&key.n),
        rsa::BigUint::from_bytes_be(&key.e),
    )
    .map_err(|_| Error::BadSignature)?;
    public_key
        .verify(scheme, hashed, signature)
        .map_err(|_| Error::BadSignature)
}

/// The digest matching an algorithm's hash, used where attestation formats
/// bind data via "the hash of the signing algorithm".
pub(crate) fn digest_for(alg: Alg, data: &[u8]) -> Result<Vec<u8>> {
    Ok(match alg {
        Alg::Es256 | Alg::Rs256 | Alg::Ps256 => Sha256::digest(data).to_vec(),
        Alg::Es384 | Alg::Rs384 => Sha384::digest(data).to_vec(),
        Alg::Es512 | Alg::Rs512 => Sha512::digest(data).to_vec(),
        Alg::EdDsa | Alg::Rs1 => return Err(Error::UnsupportedAlgorithm),
    })
}
