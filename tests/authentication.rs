//! End-to-end assertion scenarios.

mod common;

use ed25519_dalek::Signer as _;
use sha2::{Digest, Sha256};

use common::*;
use webauthn_rp::authenticator_data::{AuthenticatorData, AuthenticatorDataFlags};
use webauthn_rp::ceremony::{verify_authentication, verify_registration};
use webauthn_rp::cose;
use webauthn_rp::store::{CredentialRecord, CredentialStore};
use webauthn_rp::webauthn::{
    AuthenticatorAssertionResponse, PublicKeyCredentialDescriptor, UserVerificationRequirement,
};
use webauthn_rp::{Bytes, Error};

/// Registers the authenticator through the pure verifier and returns the
/// stored record, so assertion tests start from a real registration.
fn registered_record(authenticator: &TestAuthenticator, sign_count: u32) -> CredentialRecord {
    let options = creation_options(fixture_challenge());
    let client_data = client_data_json("webauthn.create", &options.challenge, ORIGIN);
    let auth_data = attested_auth_data(
        authenticator.public_key(),
        &authenticator.credential_id,
        registration_flags(),
        0,
    );
    let response = registration_response(
        &authenticator.credential_id,
        client_data,
        attestation_object_none(&auth_data),
    );
    let mut record = verify_registration(
        &config(),
        &options,
        &response,
        "laptop key",
        std::time::SystemTime::UNIX_EPOCH,
    )
    .unwrap();
    record.sign_count = sign_count;
    record
}

#[test]
fn happy_path_authenticates() {
    let authenticator = TestAuthenticator::new(3);
    let record = registered_record(&authenticator, 5);
    let options = request_options(Bytes::new(vec![0x31; 32]));
    let assertion = authenticator.assert_with(&options, 6, assertion_flags(), None);

    let authentication =
        verify_authentication(&config(), &options, &assertion, &record).unwrap();
    assert_eq!(authentication.user_handle, record.user_handle);
    assert_eq!(authentication.sign_count, 6);
    assert!(authentication.user_verified);
    assert!(!authentication.backup_state);
}

#[test]
fn wrong_challenge_is_rejected() {
    let authenticator = TestAuthenticator::new(3);
    let record = registered_record(&authenticator, 5);
    let options = request_options(Bytes::new(vec![0x31; 32]));
    let stale = request_options(Bytes::new(vec![0x32; 32]));
    let assertion = authenticator.assert_with(&stale, 6, assertion_flags(), None);
    assert_eq!(
        verify_authentication(&config(), &options, &assertion, &record),
        Err(Error::ChallengeMismatch)
    );
}

#[test]
fn tampered_signature_is_rejected() {
    let authenticator = TestAuthenticator::new(3);
    let record = registered_record(&authenticator, 5);
    let options = request_options(Bytes::new(vec![0x31; 32]));
    let mut assertion = authenticator.assert_with(&options, 6, assertion_flags(), None);
    let mut signature = assertion.response.signature.to_vec();
    let last = signature.len() - 1;
    signature[last] ^= 0x01;
    assertion.response.signature = Bytes::new(signature);
    assert_eq!(
        verify_authentication(&config(), &options, &assertion, &record),
        Err(Error::BadSignature)
    );
}

#[test]
fn sign_count_must_advance() {
    let authenticator = TestAuthenticator::new(3);
    let record = registered_record(&authenticator, 5);
    let options = request_options(Bytes::new(vec![0x31; 32]));

    // stored 5, asserted 3: the authenticator is suspected cloned
    let assertion = authenticator.assert_with(&options, 3, assertion_flags(), None);
    assert_eq!(
        verify_authentication(&config(), &options, &assertion, &record),
        Err(Error::SignCountRegression)
    );

    // stored 5, asserted 5: still a regression
    let assertion = authenticator.assert_with(&options, 5, assertion_flags(), None);
    assert_eq!(
        verify_authentication(&config(), &options, &assertion, &record),
        Err(Error::SignCountRegression)
    );
}

#[test]
fn counterless_authenticators_stay_at_zero() {
    let authenticator = TestAuthenticator::new(3);
    let record = registered_record(&authenticator, 0);
    let options = request_options(Bytes::new(vec![0x31; 32]));
    let assertion = authenticator.assert_with(&options, 0, assertion_flags(), None);
    let authentication =
        verify_authentication(&config(), &options, &assertion, &record).unwrap();
    assert_eq!(authentication.sign_count, 0);
}

#[test]
fn allow_list_is_enforced() {
    let authenticator = TestAuthenticator::new(3);
    let record = registered_record(&authenticator, 5);
    let mut options = request_options(Bytes::new(vec![0x31; 32]));
    options.allow_credentials = vec![PublicKeyCredentialDescriptor::public_key(Bytes::new(
        vec![0xee; 16],
    ))];
    let assertion = authenticator.assert_with(&options, 6, assertion_flags(), None);
    assert_eq!(
        verify_authentication(&config(), &options, &assertion, &record),
        Err(Error::CredentialNotAllowed)
    );
}

#[test]
fn user_handle_must_match_the_record() {
    let authenticator = TestAuthenticator::new(3);
    let record = registered_record(&authenticator, 5);
    let options = request_options(Bytes::new(vec![0x31; 32]));

    let assertion = authenticator.assert_with(
        &options,
        6,
        assertion_flags(),
        Some(Bytes::new(vec![0xbb; 32])),
    );
    assert_eq!(
        verify_authentication(&config(), &options, &assertion, &record),
        Err(Error::UserHandleMismatch)
    );

    let assertion = authenticator.assert_with(
        &options,
        6,
        assertion_flags(),
        Some(record.user_handle.clone()),
    );
    assert!(verify_authentication(&config(), &options, &assertion, &record).is_ok());
}

#[test]
fn user_verification_is_enforced_when_required() {
    let authenticator = TestAuthenticator::new(3);
    let record = registered_record(&authenticator, 5);
    let mut options = request_options(Bytes::new(vec![0x31; 32]));
    options.user_verification = Some(UserVerificationRequirement::Required);
    let assertion = authenticator.assert_with(
        &options,
        6,
        AuthenticatorDataFlags::USER_PRESENCE,
        None,
    );
    assert_eq!(
        verify_authentication(&config(), &options, &assertion, &record),
        Err(Error::UserVerificationRequired)
    );
}

#[test]
fn backup_state_without_eligibility_is_rejected() {
    let authenticator = TestAuthenticator::new(3);
    let record = registered_record(&authenticator, 5);
    let options = request_options(Bytes::new(vec![0x31; 32]));
    let assertion = authenticator.assert_with(
        &options,
        6,
        assertion_flags() | AuthenticatorDataFlags::BACKUP_STATE,
        None,
    );
    assert_eq!(
        verify_authentication(&config(), &options, &assertion, &record),
        Err(Error::InvalidFlagCombination)
    );
}

#[test]
fn ed25519_assertions_verify() {
    let signing_key = ed25519_dalek::SigningKey::from_bytes(&[11u8; 32]);
    let credential_id = Bytes::new(vec![0x0b; 16]);
    let mut record = registered_record(&TestAuthenticator::new(3), 5);
    record.credential_id = credential_id.clone();
    record.public_key = cose::PublicKey::Ed25519(cose::Ed25519PublicKey {
        x: signing_key.verifying_key().to_bytes(),
    });

    let options = request_options(Bytes::new(vec![0x31; 32]));
    let client_data = client_data_json("webauthn.get", &options.challenge, ORIGIN);
    let auth_data = AuthenticatorData {
        rp_id_hash: rp_id_hash(RP_ID),
        flags: assertion_flags(),
        sign_count: 6,
        attested_credential_data: None,
        extensions: None,
    };
    let auth_data_bytes = auth_data.serialize().unwrap();
    let message = [
        auth_data_bytes.as_slice(),
        &Sha256::digest(&client_data)[..],
    ]
    .concat();
    let signature = signing_key.sign(&message);

    let assertion = webauthn_rp::webauthn::AssertionResponse {
        id: credential_id.to_string(),
        raw_id: credential_id,
        key_type: "public-key".into(),
        response: AuthenticatorAssertionResponse {
            client_data_json: client_data,
            authenticator_data: Bytes::new(auth_data_bytes),
            signature: Bytes::new(signature.to_bytes().to_vec()),
            user_handle: None,
        },
        client_extension_results: None,
        authenticator_attachment: None,
    };

    let authentication =
        verify_authentication(&config(), &options, &assertion, &record).unwrap();
    assert_eq!(authentication.sign_count, 6);
}

#[test]
fn relying_party_flow_round_trips() {
    let TestRp {
        rp, credentials, ..
    } = test_rp();
    let mut authenticator = TestAuthenticator::new(17);

    let options = rp.start_registration("reg-session", "ada").unwrap();
    let response = authenticator.register(&options);
    let record = rp.finish_registration("reg-session", &response, "laptop key").unwrap();

    let options = rp.start_authentication("auth-session", Some("ada")).unwrap();
    assert!(options
        .allow_credentials
        .iter()
        .any(|descriptor| descriptor.id == record.credential_id));
    let assertion = authenticator.assert(&options);
    let authenticated = rp.finish_authentication("auth-session", &assertion).unwrap();
    assert_eq!(authenticated.user_handle, record.user_handle);
    assert_eq!(authenticated.sign_count, 1);
    assert_eq!(
        authenticated.user.as_ref().map(|user| user.name.as_str()),
        Some("ada")
    );

    // the stored counter advanced
    assert_eq!(
        credentials.find_by_id(&record.credential_id).unwrap().sign_count,
        1
    );

    // an authentication challenge is single-use
    assert_eq!(
        rp.finish_authentication("auth-session", &assertion),
        Err(Error::ChallengeMismatch)
    );
}

#[test]
fn unknown_credentials_are_rejected_by_the_relying_party() {
    let TestRp { rp, .. } = test_rp();
    let mut authenticator = TestAuthenticator::new(17);

    // never registered
    let options = rp.start_authentication("auth-session", None).unwrap();
    let assertion = authenticator.assert(&options);
    assert_eq!(
        rp.finish_authentication("auth-session", &assertion),
        Err(Error::UnknownCredential)
    );
}
