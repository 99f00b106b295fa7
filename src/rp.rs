//! Relying-party configuration and the service facade.
//!
//! [`RelyingParty`] wires the pure ceremony verifiers to the collaborator
//! traits and exposes the four operations the host's HTTP layer forwards to:
//! issue registration options, finish a registration, issue authentication
//! options, finish an authentication. Randomness and time are injected so
//! tests can drive determinism.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

use crate::ceremony;
use crate::codec::Bytes;
use crate::error::{ConfigError, Error, Result};
use crate::store::{
    AssertionUpdate, ChallengeStore, CredentialRecord, CredentialStore, PendingCeremony, UserStore,
};
use crate::webauthn::{
    AssertionResponse, AttestationConveyancePreference, AuthenticatorSelectionCriteria,
    PublicKeyCredentialCreationOptions, PublicKeyCredentialDescriptor,
    PublicKeyCredentialParameters, PublicKeyCredentialRequestOptions, PublicKeyCredentialRpEntity,
    PublicKeyCredentialUserEntity, RegistrationResponse, UserVerificationRequirement,
};

/// Injected time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Static relying-party configuration, validated once at startup.
#[derive(Clone, Debug)]
pub struct RpConfig {
    pub rp: PublicKeyCredentialRpEntity,
    /// Origins accepted in `clientDataJSON`, compared verbatim.
    pub origins: Vec<String>,
    pub allow_cross_origin: bool,
    pub reject_unsolicited_extensions: bool,
    pub user_verification: UserVerificationRequirement,
    pub attestation: AttestationConveyancePreference,
    /// Ceremony lifetime: advisory to the client, enforced server-side via
    /// challenge expiry.
    pub timeout: Duration,
}

impl RpConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

    pub fn new(
        rp_id: impl Into<String>,
        rp_name: impl Into<String>,
        origins: Vec<String>,
    ) -> core::result::Result<Self, ConfigError> {
        let id = rp_id.into();
        if id.is_empty() {
            return Err(ConfigError::NoRpId);
        }
        if origins.is_empty() || origins.iter().any(String::is_empty) {
            return Err(ConfigError::NoOrigins);
        }
        Ok(Self {
            rp: PublicKeyCredentialRpEntity {
                id,
                name: rp_name.into(),
            },
            origins,
            allow_cross_origin: false,
            reject_unsolicited_extensions: false,
            user_verification: UserVerificationRequirement::Preferred,
            attestation: AttestationConveyancePreference::None,
            timeout: Self::DEFAULT_TIMEOUT,
        })
    }

    fn timeout_millis(&self) -> u32 {
        u32::try_from(self.timeout.as_millis()).unwrap_or(u32::MAX)
    }
}

/// The authenticated principal produced by a successful assertion.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthenticatedUser {
    /// The user entity, when the user repository still knows the handle.
    pub user: Option<PublicKeyCredentialUserEntity>,
    pub user_handle: Bytes,
    pub credential_id: Bytes,
    pub sign_count: u32,
}

const CHALLENGE_LENGTH: usize = 32;
const USER_HANDLE_LENGTH: usize = 32;

pub struct RelyingParty<R = OsRng, C = SystemClock> {
    config: RpConfig,
    rng: Mutex<R>,
    clock: C,
    users: Arc<dyn UserStore>,
    credentials: Arc<dyn CredentialStore>,
    registrations: Arc<dyn ChallengeStore<PublicKeyCredentialCreationOptions>>,
    authentications: Arc<dyn ChallengeStore<PublicKeyCredentialRequestOptions>>,
}

impl RelyingParty<OsRng, SystemClock> {
    pub fn new(
        config: RpConfig,
        users: Arc<dyn UserStore>,
        credentials: Arc<dyn CredentialStore>,
        registrations: Arc<dyn ChallengeStore<PublicKeyCredentialCreationOptions>>,
        authentications: Arc<dyn ChallengeStore<PublicKeyCredentialRequestOptions>>,
    ) -> Self {
        Self::with_rng_and_clock(
            config,
            OsRng,
            SystemClock,
            users,
            credentials,
            registrations,
            authentications,
        )
    }
}

impl<R: RngCore + CryptoRng, C: Clock> RelyingParty<R, C> {
    #[allow(clippy::too_many_arguments)]
    pub fn with_rng_and_clock(
        config: RpConfig,
        rng: R,
        clock: C,
        users: Arc<dyn UserStore>,
        credentials: Arc<dyn CredentialStore>,
        registrations: Arc<dyn ChallengeStore<PublicKeyCredentialCreationOptions>>,
        authentications: Arc<dyn ChallengeStore<PublicKeyCredentialRequestOptions>>,
    ) -> Self {
        Self {
            config,
            rng: Mutex::new(rng),
            clock,
            users,
            credentials,
            registrations,
            authentications,
        }
    }

    pub fn config(&self) -> &RpConfig {
        &self.config
    }

    fn random_bytes(&self, length: usize) -> Bytes {
        let mut buffer = vec![0u8; length];
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .fill_bytes(&mut buffer);
        Bytes::new(buffer)
    }

    fn descriptor_for(record: &CredentialRecord) -> PublicKeyCredentialDescriptor {
        let mut descriptor = PublicKeyCredentialDescriptor::public_key(record.credential_id.clone());
        if !record.transports.is_empty() {
            descriptor.transports = Some(record.transports.iter().cloned().collect());
        }
        descriptor
    }

    /// Issues creation options with a fresh challenge, resolving (or
    /// allocating) the user entity and excluding already-registered
    /// credentials so an authenticator is not registered twice.
    pub fn start_registration(
        &self,
        session_key: &str,
        username: &str,
    ) -> Result<PublicKeyCredentialCreationOptions> {
        let user = match self.users.find_by_username(username) {
            Some(user) => user,
            None => {
                let user = PublicKeyCredentialUserEntity::new(
                    self.random_bytes(USER_HANDLE_LENGTH),
                    username,
                    username,
                )?;
                self.users.save(user.clone());
                user
            }
        };

        let mut options = PublicKeyCredentialCreationOptions::new(
            self.config.rp.clone(),
            user.clone(),
            self.random_bytes(CHALLENGE_LENGTH),
            PublicKeyCredentialParameters::default_algorithms(),
        )?;
        options.timeout = Some(self.config.timeout_millis());
        options.exclude_credentials = self
            .credentials
            .find_by_user(&user.id)
            .iter()
            .map(Self::descriptor_for)
            .collect();
        options.authenticator_selection = Some(AuthenticatorSelectionCriteria {
            user_verification: Some(self.config.user_verification),
            ..AuthenticatorSelectionCriteria::default()
        });
        options.attestation = Some(self.config.attestation);

        self.registrations.save(
            session_key,
            PendingCeremony {
                options: options.clone(),
                expires_at: self.clock.now() + self.config.timeout,
            },
        );
        Ok(options)
    }

    /// Verifies a registration response and persists the new credential.
    pub fn finish_registration(
        &self,
        session_key: &str,
        response: &RegistrationResponse,
        label: &str,
    ) -> Result<CredentialRecord> {
        let now = self.clock.now();
        let options = self
            .registrations
            .load_and_consume(session_key, now)
            .ok_or_else(|| {
                info!("no pending registration for session {}", session_key);
                Error::ChallengeMismatch
            })?;

        let record = ceremony::verify_registration(&self.config, &options, response, label, now)
            .map_err(|err| {
                info!(
                    "registration rejected: {} (session {}, credential {})",
                    err, session_key, response.raw_id
                );
                err
            })?;

        self.credentials.create(record.clone()).map_err(|err| {
            info!(
                "registration rejected: {} (session {}, credential {})",
                err, session_key, record.credential_id
            );
            err
        })?;
        info!(
            "registered credential {} for user handle {}",
            record.credential_id, record.user_handle
        );
        Ok(record)
    }

    /// Issues request options with a fresh challenge. With a username the
    /// allow list is populated from the user's credentials; without one the
    /// list stays empty for the discoverable-credential flow.
    pub fn start_authentication(
        &self,
        session_key: &str,
        username: Option<&str>,
    ) -> Result<PublicKeyCredentialRequestOptions> {
        let mut options =
            PublicKeyCredentialRequestOptions::new(self.random_bytes(CHALLENGE_LENGTH))?;
        options.rp_id = Some(self.config.rp.id.clone());
        options.timeout = Some(self.config.timeout_millis());
        options.user_verification = Some(self.config.user_verification);

        if let Some(username) = username {
            let user = self
                .users
                .find_by_username(username)
                .ok_or(Error::UnknownCredential)?;
            options.allow_credentials = self
                .credentials
                .find_by_user(&user.id)
                .iter()
                .map(Self::descriptor_for)
                .collect();
            if options.allow_credentials.is_empty() {
                return Err(Error::UnknownCredential);
            }
        }

        self.authentications.save(
            session_key,
            PendingCeremony {
                options: options.clone(),
                expires_at: self.clock.now() + self.config.timeout,
            },
        );
        Ok(options)
    }

    /// Verifies an assertion, advances the stored record under the counter
    /// compare-and-swap, and returns the authenticated principal.
    pub fn finish_authentication(
        &self,
        session_key: &str,
        assertion: &AssertionResponse,
    ) -> Result<AuthenticatedUser> {
        let now = self.clock.now();
        let options = self
            .authentications
            .load_and_consume(session_key, now)
            .ok_or_else(|| {
                info!("no pending authentication for session {}", session_key);
                Error::ChallengeMismatch
            })?;

        let record = self
            .credentials
            .find_by_id(&assertion.raw_id)
            .ok_or_else(|| {
                info!(
                    "assertion for unknown credential {} (session {})",
                    assertion.raw_id, session_key
                );
                Error::UnknownCredential
            })?;

        let authentication =
            ceremony::verify_authentication(&self.config, &options, assertion, &record).map_err(
                |err| {
                    info!(
                        "authentication rejected: {} (session {}, credential {})",
                        err, session_key, record.credential_id
                    );
                    err
                },
            )?;

        self.credentials.update_assertion(
            &record.credential_id,
            record.sign_count,
            AssertionUpdate {
                sign_count: authentication.sign_count,
                backup_state: authentication.backup_state,
                last_used: now,
            },
        )?;

        info!(
            "authenticated user handle {} via credential {}",
            authentication.user_handle, record.credential_id
        );
        Ok(AuthenticatedUser {
            user: self.users.find_by_handle(&record.user_handle),
            user_handle: authentication.user_handle,
            credential_id: record.credential_id,
            sign_count: authentication.sign_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_requires_an_rp_id_and_origins() {
        assert_eq!(
            RpConfig::new("", "Example", vec!["https://example.localhost:8443".into()])
                .unwrap_err(),
            ConfigError::NoRpId
        );
        assert_eq!(
            RpConfig::new("example.localhost", "Example", Vec::new()).unwrap_err(),
            ConfigError::NoOrigins
        );
        assert_eq!(
            RpConfig::new("example.localhost", "Example", vec![String::new()]).unwrap_err(),
            ConfigError::NoOrigins
        );
        assert!(RpConfig::new(
            "example.localhost",
            "Example",
            vec!["https://example.localhost:8443".into()]
        )
        .is_ok());
    }
}
