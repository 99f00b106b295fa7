//! Shared fixtures: a scripted software authenticator plus ceremony
//! builders, so every scenario starts from a valid exchange and applies one
//! failure-producing mutation.
#![allow(dead_code)]

use std::sync::Arc;

use ciborium::Value;
use p256::ecdsa::signature::Signer as _;
use sha2::{Digest, Sha256};

use webauthn_rp::authenticator_data::{
    AttestedCredentialData, AuthenticatorData, AuthenticatorDataFlags,
};
use webauthn_rp::codec::base64url;
use webauthn_rp::cose;
use webauthn_rp::store::{MemoryChallengeStore, MemoryCredentialStore, MemoryUserStore};
use webauthn_rp::webauthn::{
    AssertionResponse, AuthenticatorAssertionResponse, AuthenticatorAttestationResponse,
    PublicKeyCredentialCreationOptions, PublicKeyCredentialParameters,
    PublicKeyCredentialRequestOptions, PublicKeyCredentialUserEntity, RegistrationResponse,
};
use webauthn_rp::{Bytes, RelyingParty, RpConfig};

pub const RP_ID: &str = "example.localhost";
pub const ORIGIN: &str = "https://example.localhost:8443";
pub const CHALLENGE: &str = "IBQnuY1Z0K1HqBoFWCp2xlJl8-oq_aFIXzyT_F0-0GU";
pub const REFERENCE_COSE_KEY: &str =
    "pQECAyYgASFYIOB5K59pGxpqWU3aA2VDa6aaPdzqoEFezjc1b6ORiwhXIlggq3-siEIIKtgX2Z7WsMUbAQW1hvxVpGAKFPMj4qUvuYY";

pub fn config() -> RpConfig {
    RpConfig::new(RP_ID, "Example", vec![ORIGIN.into()]).unwrap()
}

pub fn fixture_challenge() -> Bytes {
    Bytes::new(base64url::decode(CHALLENGE).unwrap())
}

pub fn fixture_user() -> PublicKeyCredentialUserEntity {
    PublicKeyCredentialUserEntity::new(Bytes::new(vec![0x0a; 32]), "ada", "Ada").unwrap()
}

pub fn creation_options(challenge: Bytes) -> PublicKeyCredentialCreationOptions {
    PublicKeyCredentialCreationOptions::new(
        config().rp,
        fixture_user(),
        challenge,
        PublicKeyCredentialParameters::default_algorithms(),
    )
    .unwrap()
}

pub fn request_options(challenge: Bytes) -> PublicKeyCredentialRequestOptions {
    PublicKeyCredentialRequestOptions::new(challenge).unwrap()
}

pub fn client_data_json(ty: &str, challenge: &Bytes, origin: &str) -> Bytes {
    Bytes::new(
        format!(
            r#"{{"type":"{ty}","challenge":"{}","origin":"{origin}","crossOrigin":false}}"#,
            base64url::encode(challenge)
        )
        .into_bytes(),
    )
}

pub fn registration_flags() -> AuthenticatorDataFlags {
    AuthenticatorDataFlags::USER_PRESENCE
        | AuthenticatorDataFlags::USER_VERIFIED
        | AuthenticatorDataFlags::ATTESTED_CREDENTIAL_DATA
}

pub fn assertion_flags() -> AuthenticatorDataFlags {
    AuthenticatorDataFlags::USER_PRESENCE | AuthenticatorDataFlags::USER_VERIFIED
}

pub fn rp_id_hash(rp_id: &str) -> [u8; 32] {
    Sha256::digest(rp_id.as_bytes()).into()
}

pub fn attested_auth_data(
    public_key: cose::PublicKey,
    credential_id: &Bytes,
    flags: AuthenticatorDataFlags,
    sign_count: u32,
) -> AuthenticatorData {
    AuthenticatorData {
        rp_id_hash: rp_id_hash(RP_ID),
        flags,
        sign_count,
        attested_credential_data: Some(AttestedCredentialData {
            aaguid: [0; 16],
            credential_id: credential_id.clone(),
            credential_public_key: public_key,
        }),
        extensions: None,
    }
}

pub fn attestation_object(fmt: &str, att_stmt: Value, auth_data: &AuthenticatorData) -> Bytes {
    let value = Value::Map(vec![
        (Value::Text("fmt".into()), Value::Text(fmt.into())),
        (Value::Text("attStmt".into()), att_stmt),
        (
            Value::Text("authData".into()),
            Value::Bytes(auth_data.serialize().unwrap()),
        ),
    ]);
    let mut bytes = Vec::new();
    ciborium::into_writer(&value, &mut bytes).unwrap();
    Bytes::new(bytes)
}

pub fn attestation_object_none(auth_data: &AuthenticatorData) -> Bytes {
    attestation_object("none", Value::Map(Vec::new()), auth_data)
}

pub fn registration_response(
    credential_id: &Bytes,
    client_data: Bytes,
    attestation_object: Bytes,
) -> RegistrationResponse {
    RegistrationResponse {
        id: credential_id.to_string(),
        raw_id: credential_id.clone(),
        key_type: "public-key".into(),
        response: AuthenticatorAttestationResponse {
            client_data_json: client_data,
            attestation_object,
            transports: Some(vec!["usb".into()]),
        },
        client_extension_results: None,
        authenticator_attachment: None,
    }
}

/// A deterministic ES256 software authenticator.
pub struct TestAuthenticator {
    signing_key: p256::ecdsa::SigningKey,
    pub credential_id: Bytes,
    pub sign_count: u32,
}

impl TestAuthenticator {
    pub fn new(seed: u8) -> Self {
        Self {
            signing_key: p256::ecdsa::SigningKey::from_bytes(&[seed; 32].into()).unwrap(),
            credential_id: Bytes::new(vec![seed; 16]),
            sign_count: 0,
        }
    }

    pub fn public_key(&self) -> cose::PublicKey {
        let point = self.signing_key.verifying_key().to_encoded_point(false);
        cose::PublicKey::P256(cose::P256PublicKey {
            x: point.x().unwrap().as_slice().try_into().unwrap(),
            y: point.y().unwrap().as_slice().try_into().unwrap(),
        })
    }

    pub fn register(&self, options: &PublicKeyCredentialCreationOptions) -> RegistrationResponse {
        let client_data = client_data_json("webauthn.create", &options.challenge, ORIGIN);
        let auth_data = attested_auth_data(
            self.public_key(),
            &self.credential_id,
            registration_flags(),
            0,
        );
        registration_response(
            &self.credential_id,
            client_data,
            attestation_object_none(&auth_data),
        )
    }

    /// A fresh assertion with an advancing counter.
    pub fn assert(&mut self, options: &PublicKeyCredentialRequestOptions) -> AssertionResponse {
        self.sign_count += 1;
        self.assert_with(options, self.sign_count, assertion_flags(), None)
    }

    pub fn assert_with(
        &self,
        options: &PublicKeyCredentialRequestOptions,
        sign_count: u32,
        flags: AuthenticatorDataFlags,
        user_handle: Option<Bytes>,
    ) -> AssertionResponse {
        let client_data = client_data_json("webauthn.get", &options.challenge, ORIGIN);
        let auth_data = AuthenticatorData {
            rp_id_hash: rp_id_hash(RP_ID),
            flags,
            sign_count,
            attested_credential_data: None,
            extensions: None,
        };
        let auth_data_bytes = auth_data.serialize().unwrap();
        let message = [
            auth_data_bytes.as_slice(),
            &Sha256::digest(&client_data)[..],
        ]
        .concat();
        let signature: p256::ecdsa::DerSignature = self.signing_key.sign(&message);

        AssertionResponse {
            id: self.credential_id.to_string(),
            raw_id: self.credential_id.clone(),
            key_type: "public-key".into(),
            response: AuthenticatorAssertionResponse {
                client_data_json: client_data,
                authenticator_data: Bytes::new(auth_data_bytes),
                signature: Bytes::from_slice(signature.as_bytes()),
                user_handle,
            },
            client_extension_results: None,
            authenticator_attachment: None,
        }
    }
}

pub struct TestRp {
    pub rp: RelyingParty,
    pub users: Arc<MemoryUserStore>,
    pub credentials: Arc<MemoryCredentialStore>,
}

pub fn test_rp() -> TestRp {
    test_rp_with_config(config())
}

pub fn test_rp_with_config(config: RpConfig) -> TestRp {
    let users = Arc::new(MemoryUserStore::new());
    let credentials = Arc::new(MemoryCredentialStore::new());
    let rp = RelyingParty::new(
        config,
        users.clone(),
        credentials.clone(),
        Arc::new(MemoryChallengeStore::new()),
        Arc::new(MemoryChallengeStore::new()),
    );
    TestRp {
        rp,
        users,
        credentials,
    }
}
