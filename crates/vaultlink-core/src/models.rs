//! Transfer records for the desktop companion API.
//!
//! These mirror the JSON shapes the desktop process sends and receives.
//! They are display/transfer records only: all mutation happens behind the
//! companion's API, and the UI just mirrors what it is given.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lock state of a vault source, as reported by the desktop process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultSourceStatus {
    Unlocked,
    Locked,
    /// Any state this client does not recognize.
    #[serde(other)]
    Unknown,
}

/// A named, lockable credential store managed by the desktop process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultSourceDescription {
    pub id: String,
    pub name: String,
    pub state: VaultSourceStatus,
}

/// Credential record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Login,
    Note,
    Website,
    CreditCard,
    SshKey,
}

/// A single entry as returned from desktop-side search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    #[serde(rename = "groupID")]
    pub group_id: String,
    #[serde(rename = "sourceID")]
    pub source_id: String,
    #[serde(rename = "entryType", default = "EntryType::login")]
    pub entry_type: EntryType,
    #[serde(default)]
    pub properties: HashMap<String, String>,
    #[serde(default)]
    pub urls: Vec<String>,
}

impl EntryType {
    fn login() -> Self {
        EntryType::Login
    }
}

impl SearchResult {
    /// Display title, falling back to the username property.
    pub fn title(&self) -> &str {
        self.properties
            .get("title")
            .or_else(|| self.properties.get("username"))
            .map(String::as_str)
            .unwrap_or("(untitled)")
    }

    pub fn username(&self) -> Option<&str> {
        self.properties.get("username").map(String::as_str)
    }

    /// Best URL for opening the entry's page, if any.
    pub fn login_url(&self) -> Option<&str> {
        self.urls
            .first()
            .map(String::as_str)
            .or_else(|| self.properties.get("url").map(String::as_str))
    }
}

/// One-time-password code associated with an entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Otp {
    #[serde(rename = "sourceID")]
    pub source_id: String,
    #[serde(rename = "entryID")]
    pub entry_id: String,
    #[serde(rename = "entryTitle")]
    pub entry_title: String,
    #[serde(rename = "entryProperty")]
    pub entry_property: String,
    #[serde(rename = "loginURL", default)]
    pub login_url: Option<String>,
    #[serde(rename = "otpURL")]
    pub otp_url: String,
}

/// Reference to a specific entry within a source, for batched lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryRef {
    #[serde(rename = "entryID")]
    pub entry_id: String,
    #[serde(rename = "sourceID")]
    pub source_id: String,
}

/// Group facade within a vaults-tree snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupFacade {
    pub id: String,
    pub title: String,
    #[serde(rename = "parentID", default)]
    pub parent_id: Option<String>,
}

/// One source's slice of the vaults tree, with its resolved display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultTreeSource {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub groups: Vec<GroupFacade>,
}

/// The full vaults tree: source ID to named facade.
pub type VaultsTree = HashMap<String, VaultTreeSource>;

/// A file within a remote directory snapshot. Identity is the path string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub path: String,
    pub name: String,
}

/// An immutable directory snapshot, re-fetched on expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDirectory {
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub directories: Vec<RemoteDirectory>,
    #[serde(default)]
    pub files: Vec<RemoteFile>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_result_deserializes_wire_shape() {
        let raw = r#"{
            "id": "e1",
            "groupID": "g1",
            "sourceID": "s1",
            "entryType": "login",
            "properties": { "title": "Example", "username": "user@site" },
            "urls": ["https://example.com/login"]
        }"#;
        let result: SearchResult = serde_json::from_str(raw).unwrap();
        assert_eq!(result.title(), "Example");
        assert_eq!(result.login_url(), Some("https://example.com/login"));
        assert_eq!(result.entry_type, EntryType::Login);
    }

    #[test]
    fn search_result_title_falls_back_to_username() {
        let raw = r#"{
            "id": "e2",
            "groupID": "g1",
            "sourceID": "s1",
            "properties": { "username": "someone" }
        }"#;
        let result: SearchResult = serde_json::from_str(raw).unwrap();
        assert_eq!(result.title(), "someone");
        assert_eq!(result.login_url(), None);
    }

    #[test]
    fn unknown_source_state_is_tolerated() {
        let raw = r#"{ "id": "s1", "name": "Main", "state": "migrating" }"#;
        let source: VaultSourceDescription = serde_json::from_str(raw).unwrap();
        assert_eq!(source.state, VaultSourceStatus::Unknown);
    }
}
