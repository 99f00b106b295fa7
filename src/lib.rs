//! `webauthn-rp` implements the server-side ("relying party") half of the
//! W3C Web Authentication ceremonies: issuing registration and authentication
//! challenges, verifying attested credentials, and verifying assertion
//! signatures against stored credential records.
//!
//! The verification core is pure: [`ceremony::verify_registration`] and
//! [`ceremony::verify_authentication`] take already-parsed DTOs plus the
//! expected options and return either a validated result or a typed
//! [`Error`]. Persistence, randomness and time live behind the collaborator
//! traits in [`store`] and [`rp`], so hosts can plug in their own
//! repositories and tests can drive determinism.
//!
//! Nothing request/response-shaped is imported here; the HTTP layer that
//! routes `/webauthn/*` is expected to live in the host process and call the
//! equivalent operations on [`rp::RelyingParty`].

#[macro_use]
extern crate delog;
generate_macros!();

pub mod attestation;
pub mod authenticator_data;
pub mod ceremony;
pub mod client_data;
pub mod codec;
pub mod cose;
pub mod error;
pub mod rp;
pub mod signature;
pub mod store;
pub mod webauthn;

pub use codec::Bytes;
pub use error::{ConfigError, Error, Result};
pub use rp::{RelyingParty, RpConfig};
pub use store::CredentialRecord;
