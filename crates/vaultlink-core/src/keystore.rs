//! Local credential storage.
//!
//! The desktop companion hands this client an ID and key material during the
//! authentication handshake. They are persisted as TOML under
//! `~/.config/vaultlink/keys.toml` and read back for every authenticated
//! request.

use crate::error::{DesktopError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Stored credential state for the desktop API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyData {
    /// Client ID issued by the desktop process.
    #[serde(default)]
    pub client_id: Option<String>,
    /// This client's public key, sent during the handshake.
    #[serde(default)]
    pub public_key: Option<String>,
    /// This client's private key. Never leaves the machine.
    #[serde(default)]
    pub private_key: Option<String>,
    /// The desktop's public key, received when the handshake completes.
    #[serde(default)]
    pub server_public_key: Option<String>,
}

/// File-backed credential store.
#[derive(Debug, Clone, Default)]
pub struct Keystore {
    path: Option<PathBuf>,
    data: KeyData,
}

impl Keystore {
    /// Load the keystore from the given path, or the default location.
    ///
    /// A missing file is not an error: it yields an empty store which will
    /// be written on first save.
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self> {
        let path = match custom_path {
            Some(path) => path,
            None => Self::default_path()?,
        };

        if !path.exists() {
            tracing::debug!("No keystore at {}, starting empty", path.display());
            return Ok(Self {
                path: Some(path),
                data: KeyData::default(),
            });
        }

        let contents = std::fs::read_to_string(&path)?;
        let data: KeyData = toml::from_str(&contents).map_err(|e| {
            DesktopError::Keystore(format!("Failed to parse {}: {e}", path.display()))
        })?;
        Ok(Self {
            path: Some(path),
            data,
        })
    }

    /// An unsaved, empty store. Used in tests and for dry runs.
    pub fn ephemeral() -> Self {
        Self::default()
    }

    /// An unsaved store over the given data.
    pub fn with_data(data: KeyData) -> Self {
        Self { path: None, data }
    }

    /// Persist the store to its path.
    pub fn save(&self) -> Result<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(&self.data)
            .map_err(|e| DesktopError::Keystore(format!("Failed to serialize keystore: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn client_id(&self) -> Option<&str> {
        self.data.client_id.as_deref()
    }

    pub fn public_key(&self) -> Option<&str> {
        self.data.public_key.as_deref()
    }

    pub fn server_public_key(&self) -> Option<&str> {
        self.data.server_public_key.as_deref()
    }

    pub fn set_client_keys(&mut self, client_id: String, public_key: String, private_key: String) {
        self.data.client_id = Some(client_id);
        self.data.public_key = Some(public_key);
        self.data.private_key = Some(private_key);
    }

    pub fn set_server_public_key(&mut self, key: String) {
        self.data.server_public_key = Some(key);
    }

    /// Seed a client identity for first pairing if none exists. The tokens
    /// are opaque to this client; the desktop binds them during the
    /// handshake.
    pub fn ensure_identity(&mut self) {
        if self.data.client_id.is_some() && self.data.public_key.is_some() {
            return;
        }
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        std::process::id().hash(&mut hasher);
        chrono::Utc::now().timestamp_nanos_opt().hash(&mut hasher);
        let seed = hasher.finish();
        self.data.client_id = Some(format!("vaultlink-{seed:016x}"));
        self.data.public_key = Some(format!("vlpk-{seed:016x}"));
        self.data.private_key = Some(format!("vlsk-{seed:016x}"));
    }

    /// Whether a completed handshake is on record.
    ///
    /// This is a purely local check: the desktop may still reject the stored
    /// credentials, which `test_auth` discovers.
    pub fn has_connection(&self) -> bool {
        self.data.server_public_key.is_some()
    }

    fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            DesktopError::Keystore("Could not determine config directory".into())
        })?;
        Ok(config_dir.join("vaultlink").join("keys.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_has_no_connection() {
        let store = Keystore::ephemeral();
        assert!(!store.has_connection());
        assert!(store.client_id().is_none());
        assert!(store.public_key().is_none());
    }

    #[test]
    fn connection_follows_server_key() {
        let mut store = Keystore::ephemeral();
        store.set_client_keys("c1".into(), "pub".into(), "priv".into());
        assert!(!store.has_connection());
        store.set_server_public_key("server-pub".into());
        assert!(store.has_connection());
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.toml");

        let mut store = Keystore::load(Some(path.clone())).unwrap();
        store.set_client_keys("c1".into(), "pub".into(), "priv".into());
        store.set_server_public_key("server-pub".into());
        store.save().unwrap();

        let reloaded = Keystore::load(Some(path)).unwrap();
        assert_eq!(reloaded.client_id(), Some("c1"));
        assert_eq!(reloaded.server_public_key(), Some("server-pub"));
        assert!(reloaded.has_connection());
    }

    #[test]
    fn ensure_identity_is_stable_once_set() {
        let mut store = Keystore::ephemeral();
        store.ensure_identity();
        let id = store.client_id().unwrap().to_string();
        store.ensure_identity();
        assert_eq!(store.client_id(), Some(id.as_str()));
        assert!(!store.has_connection());
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = Keystore::load(Some(dir.path().join("absent.toml"))).unwrap();
        assert!(!store.has_connection());
    }
}
