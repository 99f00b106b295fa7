//! Verifying an authentication assertion.
//!
//! <https://w3c.github.io/webauthn/#sctn-verifying-assertion>

use sha2::{Digest, Sha256};

use super::check_extension_outputs;
use crate::authenticator_data::{AuthenticatorData, AuthenticatorDataFlags};
use crate::client_data::{self, ClientDataType};
use crate::codec::Bytes;
use crate::error::{Error, Result};
use crate::rp::RpConfig;
use crate::signature;
use crate::store::CredentialRecord;
use crate::webauthn::{
    check_credential_shape, AssertionResponse, PublicKeyCredentialRequestOptions,
};

/// The verified outcome of an assertion: the authenticated principal plus
/// the state the stored record must advance to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Authentication {
    pub user_handle: Bytes,
    pub sign_count: u32,
    pub backup_state: bool,
    pub user_verified: bool,
}

/// Verifies an assertion against the options issued for this ceremony and
/// the stored credential record the caller looked up by `rawId`.
///
/// The sign-count advance returned here must be applied with a
/// compare-and-swap on the previous value; see
/// [`crate::store::CredentialStore::update_assertion`].
pub fn verify_authentication(
    config: &RpConfig,
    options: &PublicKeyCredentialRequestOptions,
    assertion: &AssertionResponse,
    record: &CredentialRecord,
) -> Result<Authentication> {
    // 1. the response shape
    check_credential_shape(&assertion.key_type, &assertion.id, &assertion.raw_id)?;

    // 2. if credentials were allow-listed, this must be one of them
    if !options.allow_credentials.is_empty()
        && !options
            .allow_credentials
            .iter()
            .any(|descriptor| descriptor.id == assertion.raw_id)
    {
        return Err(Error::CredentialNotAllowed);
    }

    // 3. the caller looked the record up; it must be the asserted one
    if record.credential_id != assertion.raw_id {
        return Err(Error::UnknownCredential);
    }

    // 4. a client-supplied user handle must match the record's owner; when
    // absent (discoverable flow), the owner is resolved from the record
    if let Some(user_handle) = &assertion.response.user_handle {
        if *user_handle != record.user_handle {
            return Err(Error::UserHandleMismatch);
        }
    }

    // 5. decode the authenticator data, hash the client data
    let auth_data = AuthenticatorData::parse(&assertion.response.authenticator_data)?;
    let client_data_json = &assertion.response.client_data_json;
    let client_data_hash: [u8; 32] = Sha256::digest(client_data_json).into();

    // 6. verify that C.type is webauthn.get, the challenge matches, and the
    // origin is one of ours
    client_data::verify(
        client_data_json,
        ClientDataType::Get,
        &options.challenge,
        config,
    )?;

    // 7. the authenticator operated on our RP id
    let expected_rp_id_hash: [u8; 32] = Sha256::digest(config.rp.id.as_bytes()).into();
    if auth_data.rp_id_hash != expected_rp_id_hash {
        return Err(Error::RpIdHashMismatch);
    }

    // 8. user presence, and user verification when required
    if !auth_data
        .flags
        .contains(AuthenticatorDataFlags::USER_PRESENCE)
    {
        return Err(Error::UserPresenceMissing);
    }
    if options.requires_user_verification()
        && !auth_data
            .flags
            .contains(AuthenticatorDataFlags::USER_VERIFIED)
    {
        return Err(Error::UserVerificationRequired);
    }

    // 9. a credential that is not backup-eligible cannot be backed up
    if auth_data.flags.contains(AuthenticatorDataFlags::BACKUP_STATE)
        && !auth_data
            .flags
            .contains(AuthenticatorDataFlags::BACKUP_ELIGIBLE)
    {
        return Err(Error::InvalidFlagCombination);
    }

    // 10. client extension outputs, per policy
    check_extension_outputs(
        config,
        options.extensions.as_ref(),
        assertion.client_extension_results.as_ref(),
    )?;

    // 11. the signature covers authData || SHA-256(clientDataJSON)
    let message = [
        assertion.response.authenticator_data.as_slice(),
        &client_data_hash,
    ]
    .concat();
    signature::verify(
        record.public_key.alg(),
        &record.public_key,
        &message,
        &assertion.response.signature,
    )?;

    // 12. the signature counter must move forward; a regression means the
    // authenticator may have been cloned
    let previous = record.sign_count;
    let current = auth_data.sign_count;
    let counter_ok = current > previous || (current == 0 && previous == 0);
    if !counter_ok {
        info!(
            "sign count went from {} to {} for credential {}",
            previous, current, record.credential_id
        );
        return Err(Error::SignCountRegression);
    }

    // 13.-14. the state to persist and the principal
    Ok(Authentication {
        user_handle: record.user_handle.clone(),
        sign_count: current,
        backup_state: auth_data.flags.contains(AuthenticatorDataFlags::BACKUP_STATE),
        user_verified: auth_data
            .flags
            .contains(AuthenticatorDataFlags::USER_VERIFIED),
    })
}
