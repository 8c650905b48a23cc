//! Desktop companion API client and shared models for vaultlink.
//!
//! This crate holds everything below the terminal UI: wire models, the
//! local credential store, auth header composition, the request bridge to
//! the desktop process, and recent-use tracking.

pub mod auth;
pub mod client;
pub mod error;
pub mod keystore;
pub mod models;
pub mod recents;

pub use client::{DesktopClient, DEFAULT_ORIGIN, UNTITLED_VAULT};
pub use error::DesktopError;
pub use keystore::Keystore;
pub use models::{
    EntryRef, EntryType, GroupFacade, Otp, RemoteDirectory, RemoteFile, SearchResult,
    VaultSourceDescription, VaultSourceStatus, VaultTreeSource, VaultsTree,
};
pub use recents::RecentsStore;
