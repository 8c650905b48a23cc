//! Auth header composition.
//!
//! Authenticated desktop calls carry an `Authorization` header built from the
//! locally stored client ID and public key. The header format belongs to the
//! desktop protocol; this side only mirrors stored values into it. Missing
//! credentials fail here, before any request is issued.

use crate::error::{DesktopError, Result};
use crate::keystore::Keystore;

#[cfg(test)]
use crate::keystore::KeyData;

const AUTH_SCHEME: &str = "Bcup";

/// Build the `Authorization` header value for an authenticated call.
///
/// Fails with [`DesktopError::MissingPublicKey`] or
/// [`DesktopError::MissingClientId`] when the local handshake state is
/// incomplete. No network activity occurs on failure.
pub fn generate_auth_header(keystore: &Keystore) -> Result<String> {
    let public_key = keystore
        .public_key()
        .ok_or(DesktopError::MissingPublicKey)?;
    let client_id = keystore.client_id().ok_or(DesktopError::MissingClientId)?;
    Ok(format!("{AUTH_SCHEME} {client_id}:{public_key}"))
}
