//! Validation of the client-supplied `clientDataJSON`.

use serde::Deserialize;

use crate::codec::Bytes;
use crate::error::{Error, Result};
use crate::rp::RpConfig;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ClientDataType {
    Create,
    Get,
}

impl ClientDataType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "webauthn.create",
            Self::Get => "webauthn.get",
        }
    }
}

/// The parsed form of `clientDataJSON`. Unknown members are ignored; clients
/// are explicitly allowed to add them.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedClientData {
    #[serde(rename = "type")]
    pub ty: String,
    pub challenge: Bytes,
    pub origin: String,
    #[serde(default)]
    pub cross_origin: Option<bool>,
    /// Parsed for tolerance, never evaluated; Level 3 retired token binding.
    #[serde(default)]
    pub token_binding: Option<serde_json::Value>,
}

/// Enforces type, challenge, origin and crossOrigin against the expectations
/// for the current ceremony.
pub fn verify(
    raw: &[u8],
    expected_type: ClientDataType,
    expected_challenge: &Bytes,
    config: &RpConfig,
) -> Result<CollectedClientData> {
    let client_data: CollectedClientData = serde_json::from_slice(raw).map_err(|_err| {
        debug!("client data is not valid JSON: {}", _err);
        Error::MalformedInput
    })?;

    if client_data.ty != expected_type.as_str() {
        return Err(Error::InvalidClientDataType);
    }

    if client_data.challenge != *expected_challenge {
        return Err(Error::ChallengeMismatch);
    }

    if !config.origins.iter().any(|origin| *origin == client_data.origin) {
        return Err(Error::OriginMismatch);
    }

    if client_data.cross_origin == Some(true) && !config.allow_cross_origin {
        return Err(Error::CrossOriginDisallowed);
    }

    Ok(client_data)
}
