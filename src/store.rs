//! Persistence contracts for credentials, users and pending challenges,
//! with in-memory reference implementations.
//!
//! The traits carry the two disciplines the ceremonies depend on:
//! challenge consumption is single-use, and the sign-count advance is a
//! compare-and-swap. The in-memory forms back both with a `Mutex` and exist
//! for tests and hosts without a database; production hosts implement the
//! traits over their own storage (a unique index on the credential id, a row
//! lock or CAS for the counter).

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use crate::codec::Bytes;
use crate::cose;
use crate::error::{Error, Result};
use crate::webauthn::PublicKeyCredentialUserEntity;

/// Everything the relying party remembers about one credential.
#[derive(Clone, Debug, PartialEq)]
pub struct CredentialRecord {
    pub credential_id: Bytes,
    pub credential_type: String,
    pub public_key: cose::PublicKey,
    pub sign_count: u32,
    pub uv_initialized: bool,
    pub backup_eligible: bool,
    pub backup_state: bool,
    pub transports: BTreeSet<String>,
    /// The registration-time attestation object, kept verbatim so richer
    /// attestation policy can be applied after the fact.
    pub attestation_object: Bytes,
    pub attestation_client_data_json: Bytes,
    pub user_handle: Bytes,
    pub label: String,
    pub created: SystemTime,
    pub last_used: SystemTime,
}

/// A ceremony's saved options together with their expiry.
#[derive(Clone, Debug)]
pub struct PendingCeremony<T> {
    pub options: T,
    pub expires_at: SystemTime,
}

pub trait ChallengeStore<T>: Send + Sync {
    /// Idempotent overwrite per session.
    fn save(&self, session_key: &str, pending: PendingCeremony<T>);

    /// Atomic load-and-remove. The entry is removed whether or not it is
    /// still fresh, so a challenge is usable at most once regardless of the
    /// verifier's outcome; an expired entry is reported as absent.
    fn load_and_consume(&self, session_key: &str, now: SystemTime) -> Option<T>;
}

#[derive(Debug)]
pub struct MemoryChallengeStore<T> {
    entries: Mutex<HashMap<String, PendingCeremony<T>>>,
}

impl<T> MemoryChallengeStore<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> Default for MemoryChallengeStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> ChallengeStore<T> for MemoryChallengeStore<T> {
    fn save(&self, session_key: &str, pending: PendingCeremony<T>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session_key.to_owned(), pending);
    }

    fn load_and_consume(&self, session_key: &str, now: SystemTime) -> Option<T> {
        let pending = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_key)?;
        (now < pending.expires_at).then_some(pending.options)
    }
}

/// Maps usernames to user entities; the sole source of user-handle
/// allocation.
pub trait UserStore: Send + Sync {
    fn find_by_username(&self, username: &str) -> Option<PublicKeyCredentialUserEntity>;
    fn find_by_handle(&self, user_handle: &Bytes) -> Option<PublicKeyCredentialUserEntity>;
    fn save(&self, user: PublicKeyCredentialUserEntity);
}

#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, PublicKeyCredentialUserEntity>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserStore for MemoryUserStore {
    fn find_by_username(&self, username: &str) -> Option<PublicKeyCredentialUserEntity> {
        self.users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(username)
            .cloned()
    }

    fn find_by_handle(&self, user_handle: &Bytes) -> Option<PublicKeyCredentialUserEntity> {
        self.users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|user| user.id == *user_handle)
            .cloned()
    }

    fn save(&self, user: PublicKeyCredentialUserEntity) {
        self.users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user.name.clone(), user);
    }
}

/// The per-assertion mutation applied under the counter compare-and-swap.
#[derive(Clone, Copy, Debug)]
pub struct AssertionUpdate {
    pub sign_count: u32,
    pub backup_state: bool,
    pub last_used: SystemTime,
}

pub trait CredentialStore: Send + Sync {
    fn find_by_id(&self, credential_id: &Bytes) -> Option<CredentialRecord>;
    fn find_by_user(&self, user_handle: &Bytes) -> Vec<CredentialRecord>;

    /// Fails with [`Error::CredentialAlreadyRegistered`] when the id exists;
    /// implementations rely on a unique index so concurrent registrations
    /// cannot both win.
    fn create(&self, record: CredentialRecord) -> Result<()>;

    /// Compare-and-swap on `(credential_id, previous_sign_count)`. A lost
    /// update that would accept a counter below the stored value breaks the
    /// anti-clone guarantee, so a moved counter surfaces as
    /// [`Error::SignCountRegression`].
    fn update_assertion(
        &self,
        credential_id: &Bytes,
        previous_sign_count: u32,
        update: AssertionUpdate,
    ) -> Result<()>;

    fn delete(&self, credential_id: &Bytes) -> bool;
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    records: Mutex<HashMap<Bytes, CredentialRecord>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn find_by_id(&self, credential_id: &Bytes) -> Option<CredentialRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(credential_id)
            .cloned()
    }

    fn find_by_user(&self, user_handle: &Bytes) -> Vec<CredentialRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|record| record.user_handle == *user_handle)
            .cloned()
            .collect()
    }

    fn create(&self, record: CredentialRecord) -> Result<()> {
        match self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(record.credential_id.clone())
        {
            Entry::Occupied(_) => Err(Error::CredentialAlreadyRegistered),
            Entry::Vacant(vacant) => {
                vacant.insert(record);
                Ok(())
            }
        }
    }

    fn update_assertion(
        &self,
        credential_id: &Bytes,
        previous_sign_count: u32,
        update: AssertionUpdate,
    ) -> Result<()> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let record = records
            .get_mut(credential_id)
            .ok_or(Error::UnknownCredential)?;
        if record.sign_count != previous_sign_count {
            return Err(Error::SignCountRegression);
        }
        record.sign_count = update.sign_count;
        record.backup_state = update.backup_state;
        record.last_used = update.last_used;
        Ok(())
    }

    fn delete(&self, credential_id: &Bytes) -> bool {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(credential_id)
            .is_some()
    }
}
