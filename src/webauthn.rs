//! WebAuthn protocol data types as they travel between the relying party and
//! the client.
//!
//! Everything here is an immutable record constructed directly; invariants
//! (user handles at most 64 bytes, challenges at least 16) are enforced at
//! the constructor boundary rather than left to builders. Byte-shaped fields
//! use [`Bytes`] and therefore travel as unpadded base64url strings.

use serde::{Deserialize, Serialize};

use crate::codec::{base64url, Bytes};
use crate::cose::Alg;
use crate::error::{Error, Result};

/// The only credential type WebAuthn defines. Kept in one place so the
/// literal has a single audit point.
pub const PUBLIC_KEY: &str = "public-key";

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PublicKeyCredentialRpEntity {
    /// Effective domain of the relying party.
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyCredentialUserEntity {
    /// The user handle: opaque, stable per account, never displayed, and
    /// never derived from PII.
    pub id: Bytes,
    pub name: String,
    pub display_name: String,
}

impl PublicKeyCredentialUserEntity {
    pub const MAX_HANDLE_LENGTH: usize = 64;

    pub fn new(id: Bytes, name: impl Into<String>, display_name: impl Into<String>) -> Result<Self> {
        if id.is_empty() || id.len() > Self::MAX_HANDLE_LENGTH {
            return Err(Error::MalformedInput);
        }
        Ok(Self {
            id,
            name: name.into(),
            display_name: display_name.into(),
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PublicKeyCredentialParameters {
    pub alg: Alg,
    #[serde(rename = "type")]
    pub key_type: String,
}

impl PublicKeyCredentialParameters {
    pub fn public_key_with_alg(alg: Alg) -> Self {
        Self {
            alg,
            key_type: String::from(PUBLIC_KEY),
        }
    }

    /// The default parameter list, in preference order.
    pub fn default_algorithms() -> Vec<Self> {
        [Alg::Es256, Alg::EdDsa, Alg::Rs256]
            .into_iter()
            .map(Self::public_key_with_alg)
            .collect()
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyCredentialDescriptor {
    pub id: Bytes,
    #[serde(rename = "type")]
    pub key_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transports: Option<Vec<String>>,
}

impl PublicKeyCredentialDescriptor {
    pub fn public_key(id: Bytes) -> Self {
        Self {
            id,
            key_type: String::from(PUBLIC_KEY),
            transports: None,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthenticatorAttachment {
    Platform,
    CrossPlatform,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVerificationRequirement {
    Required,
    Preferred,
    Discouraged,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResidentKeyRequirement {
    Required,
    Preferred,
    Discouraged,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttestationConveyancePreference {
    None,
    Indirect,
    Direct,
    Enterprise,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelectionCriteria {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authenticator_attachment: Option<AuthenticatorAttachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resident_key: Option<ResidentKeyRequirement>,
    #[serde(default)]
    pub require_resident_key: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_verification: Option<UserVerificationRequirement>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyCredentialCreationOptions {
    pub rp: PublicKeyCredentialRpEntity,
    pub user: PublicKeyCredentialUserEntity,
    pub challenge: Bytes,
    pub pub_key_cred_params: Vec<PublicKeyCredentialParameters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_credentials: Vec<PublicKeyCredentialDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authenticator_selection: Option<AuthenticatorSelectionCriteria>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attestation: Option<AttestationConveyancePreference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}

impl PublicKeyCredentialCreationOptions {
    pub const MIN_CHALLENGE_LENGTH: usize = 16;

    pub fn new(
        rp: PublicKeyCredentialRpEntity,
        user: PublicKeyCredentialUserEntity,
        challenge: Bytes,
        pub_key_cred_params: Vec<PublicKeyCredentialParameters>,
    ) -> Result<Self> {
        if challenge.len() < Self::MIN_CHALLENGE_LENGTH {
            return Err(Error::MalformedInput);
        }
        Ok(Self {
            rp,
            user,
            challenge,
            pub_key_cred_params,
            timeout: None,
            exclude_credentials: Vec::new(),
            authenticator_selection: None,
            attestation: None,
            extensions: None,
        })
    }

    pub(crate) fn requires_user_verification(&self) -> bool {
        matches!(
            self.authenticator_selection
                .as_ref()
                .and_then(|selection| selection.user_verification),
            Some(UserVerificationRequirement::Required)
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyCredentialRequestOptions {
    pub challenge: Bytes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rp_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow_credentials: Vec<PublicKeyCredentialDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_verification: Option<UserVerificationRequirement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}

impl PublicKeyCredentialRequestOptions {
    pub fn new(challenge: Bytes) -> Result<Self> {
        if challenge.len() < PublicKeyCredentialCreationOptions::MIN_CHALLENGE_LENGTH {
            return Err(Error::MalformedInput);
        }
        Ok(Self {
            challenge,
            timeout: None,
            rp_id: None,
            allow_credentials: Vec::new(),
            user_verification: None,
            extensions: None,
        })
    }

    pub(crate) fn requires_user_verification(&self) -> bool {
        matches!(
            self.user_verification,
            Some(UserVerificationRequirement::Required)
        )
    }
}

/// The client's response to a registration ceremony.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub id: String,
    pub raw_id: Bytes,
    #[serde(rename = "type")]
    pub key_type: String,
    pub response: AuthenticatorAttestationResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_extension_results: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_attachment: Option<AuthenticatorAttachment>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorAttestationResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: Bytes,
    pub attestation_object: Bytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transports: Option<Vec<String>>,
}

/// The client's response to an authentication ceremony.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResponse {
    pub id: String,
    pub raw_id: Bytes,
    #[serde(rename = "type")]
    pub key_type: String,
    pub response: AuthenticatorAssertionResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_extension_results: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_attachment: Option<AuthenticatorAttachment>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorAssertionResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: Bytes,
    pub authenticator_data: Bytes,
    pub signature: Bytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<Bytes>,
}

/// Shared shape checks for both credential DTOs: the type literal and the
/// `id`/`rawId` agreement.
pub(crate) fn check_credential_shape(key_type: &str, id: &str, raw_id: &Bytes) -> Result<()> {
    if key_type != PUBLIC_KEY {
        return Err(Error::MalformedInput);
    }
    if id != base64url::encode(raw_id) {
        return Err(Error::MalformedInput);
    }
    Ok(())
}
