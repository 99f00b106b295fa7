//! Registering a new credential.
//!
//! <https://w3c.github.io/webauthn/#sctn-registering-a-new-credential>

use std::time::SystemTime;

use sha2::{Digest, Sha256};

use super::check_extension_outputs;
use crate::attestation::{self, AttestationObject};
use crate::authenticator_data::{AuthenticatorData, AuthenticatorDataFlags};
use crate::client_data::{self, ClientDataType};
use crate::error::{Error, Result};
use crate::rp::RpConfig;
use crate::store::CredentialRecord;
use crate::webauthn::{
    check_credential_shape, PublicKeyCredentialCreationOptions, RegistrationResponse, PUBLIC_KEY,
};

/// Verifies a registration response against the options issued for this
/// ceremony and returns the credential record to persist.
///
/// The caller is responsible for the persistence-side step: rejecting a
/// credential id that is already registered to any user.
pub fn verify_registration(
    config: &RpConfig,
    options: &PublicKeyCredentialCreationOptions,
    response: &RegistrationResponse,
    label: &str,
    now: SystemTime,
) -> Result<CredentialRecord> {
    check_credential_shape(&response.key_type, &response.id, &response.raw_id)?;

    // 1.-2. decode the payloads, hash the client data
    let client_data_json = &response.response.client_data_json;
    let client_data_hash: [u8; 32] = Sha256::digest(client_data_json).into();

    // 3. verify that C.type is webauthn.create, the challenge matches, and
    // the origin is one of ours
    client_data::verify(
        client_data_json,
        ClientDataType::Create,
        &options.challenge,
        config,
    )?;

    // 4. decode the attestation object
    let object = AttestationObject::parse(&response.response.attestation_object)?;
    let auth_data = AuthenticatorData::parse(&object.auth_data)?;

    // 5. the authenticator operated on our RP id
    let expected_rp_id_hash: [u8; 32] = Sha256::digest(config.rp.id.as_bytes()).into();
    if auth_data.rp_id_hash != expected_rp_id_hash {
        return Err(Error::RpIdHashMismatch);
    }

    // 6. the user was present
    if !auth_data
        .flags
        .contains(AuthenticatorDataFlags::USER_PRESENCE)
    {
        return Err(Error::UserPresenceMissing);
    }

    // 7. if user verification was required, it must have happened
    if options.requires_user_verification()
        && !auth_data
            .flags
            .contains(AuthenticatorDataFlags::USER_VERIFIED)
    {
        return Err(Error::UserVerificationRequired);
    }

    // 8. a credential that is not backup-eligible cannot be backed up
    if auth_data.flags.contains(AuthenticatorDataFlags::BACKUP_STATE)
        && !auth_data
            .flags
            .contains(AuthenticatorDataFlags::BACKUP_ELIGIBLE)
    {
        return Err(Error::InvalidFlagCombination);
    }

    // 9. a registration must attest a credential
    let attested = auth_data
        .attested_credential_data
        .as_ref()
        .ok_or(Error::AttestedCredentialDataMissing)?;
    if attested.credential_id != response.raw_id {
        return Err(Error::MalformedInput);
    }

    // 10. the credential's algorithm must be one we asked for
    let alg = attested.credential_public_key.alg();
    if !options
        .pub_key_cred_params
        .iter()
        .any(|parameters| parameters.alg == alg)
    {
        return Err(Error::UnrequestedAlgorithm);
    }

    // 11. client extension outputs, per policy
    check_extension_outputs(
        config,
        options.extensions.as_ref(),
        response.client_extension_results.as_ref(),
    )?;

    // 12. the attestation statement
    let _attestation_type = attestation::verify(&object, &auth_data, attested, &client_data_hash)?;
    info!(
        "attestation for credential {} verified as {:?}",
        attested.credential_id, _attestation_type
    );

    // 13. is the store's step (unique credential id); 14. assemble the record
    Ok(CredentialRecord {
        credential_id: attested.credential_id.clone(),
        credential_type: String::from(PUBLIC_KEY),
        public_key: attested.credential_public_key.clone(),
        sign_count: auth_data.sign_count,
        uv_initialized: auth_data
            .flags
            .contains(AuthenticatorDataFlags::USER_VERIFIED),
        backup_eligible: auth_data
            .flags
            .contains(AuthenticatorDataFlags::BACKUP_ELIGIBLE),
        backup_state: auth_data.flags.contains(AuthenticatorDataFlags::BACKUP_STATE),
        transports: response
            .response
            .transports
            .iter()
            .flatten()
            .cloned()
            .collect(),
        attestation_object: response.response.attestation_object.clone(),
        attestation_client_data_json: client_data_json.clone(),
        user_handle: options.user.id.clone(),
        label: label.to_owned(),
        created: now,
        last_used: now,
    })
}
