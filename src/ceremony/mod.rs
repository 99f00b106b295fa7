//! The two relying-party ceremonies, as pure functions.
//!
//! Each verifier takes the already-parsed client DTO plus the options that
//! were issued for the session and either returns its result or fails with
//! the first violated check. Persistence-side steps (credential-id
//! uniqueness, the sign-count compare-and-swap) live with the stores; see
//! [`crate::rp::RelyingParty`] for the wiring.

mod authentication;
mod registration;

pub use authentication::{verify_authentication, Authentication};
pub use registration::verify_registration;

use crate::error::{Error, Result};
use crate::rp::RpConfig;

/// Client extension outputs are tolerated by default; under
/// `reject_unsolicited_extensions` every output key must have been requested.
pub(crate) fn check_extension_outputs(
    config: &RpConfig,
    requested: Option<&serde_json::Value>,
    outputs: Option<&serde_json::Value>,
) -> Result<()> {
    if !config.reject_unsolicited_extensions {
        return Ok(());
    }
    let Some(outputs) = outputs.and_then(serde_json::Value::as_object) else {
        return Ok(());
    };
    for key in outputs.keys() {
        let was_requested = requested
            .and_then(serde_json::Value::as_object)
            .map(|extensions| extensions.contains_key(key))
            .unwrap_or(false);
        if !was_requested {
            info!("unsolicited client extension output: {}", key);
            return Err(Error::MalformedInput);
        }
    }
    Ok(())
}
