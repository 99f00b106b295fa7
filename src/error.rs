//! Verification failure taxonomy.
//!
//! One flat enum; no kind is recovered inside the verifier. Hosts map every
//! kind to a generic client-facing failure (the kind must not become an
//! attacker oracle) while the crate logs it together with the credential id
//! and session key.

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("malformed input")]
    MalformedInput,
    #[error("malformed authenticator data")]
    MalformedAuthenticatorData,
    #[error("unsupported attestation format")]
    UnsupportedAttestationFormat,
    #[error("unexpected client data type")]
    InvalidClientDataType,
    #[error("challenge mismatch")]
    ChallengeMismatch,
    #[error("origin not allowed")]
    OriginMismatch,
    #[error("cross-origin request disallowed")]
    CrossOriginDisallowed,
    #[error("relying party id hash mismatch")]
    RpIdHashMismatch,
    #[error("user presence flag not set")]
    UserPresenceMissing,
    #[error("user verification required but flag not set")]
    UserVerificationRequired,
    #[error("backup state set without backup eligibility")]
    InvalidFlagCombination,
    #[error("attested credential data missing")]
    AttestedCredentialDataMissing,
    #[error("credential algorithm was not requested")]
    UnrequestedAlgorithm,
    #[error("credential id already registered")]
    CredentialAlreadyRegistered,
    #[error("unknown credential")]
    UnknownCredential,
    #[error("credential not in the allowed list")]
    CredentialNotAllowed,
    #[error("user handle mismatch")]
    UserHandleMismatch,
    #[error("bad signature")]
    BadSignature,
    #[error("signature counter regression")]
    SignCountRegression,
    #[error("unsupported algorithm")]
    UnsupportedAlgorithm,
    #[error("attestation verification failed")]
    AttestationVerificationFailed,
}

/// Fatal configuration conditions. The verifier refuses to start on these;
/// they are surfaced once, at construction, never per ceremony.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("no allowed origins configured")]
    NoOrigins,
    #[error("relying party id is empty")]
    NoRpId,
}
