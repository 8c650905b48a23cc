//! Background request execution.
//!
//! Every desktop call runs on its own detached thread and reports back
//! through an mpsc channel. Calls are independent request/response pairs:
//! they may settle out of order, and each result is applied on its own.
//! There is no cancellation and no cross-call coordination.

use std::sync::mpsc::Sender;
use std::thread;
use vaultlink_core::models::{
    Otp, RemoteDirectory, SearchResult, VaultSourceDescription, VaultsTree,
};

/// Outcome of a background call, reported to the UI loop.
#[derive(Debug)]
pub enum WorkerEvent {
    ConnectionTested(Result<(), String>),
    HandshakeStarted(Result<(), String>),
    HandshakeCompleted(Result<String, String>),
    Sources(Result<Vec<VaultSourceDescription>, String>),
    SearchedEntries {
        term: String,
        result: Result<Vec<SearchResult>, String>,
    },
    UrlEntries(Result<Vec<SearchResult>, String>),
    RecentEntries(Result<Vec<SearchResult>, String>),
    Otps(Result<Vec<Otp>, String>),
    Tree(Result<VaultsTree, String>),
    SourceLockToggled {
        source_id: String,
        locked: bool,
        result: Result<(), String>,
    },
    DirectoryListed {
        path: String,
        result: Result<RemoteDirectory, String>,
    },
}

/// Run a job off the UI thread and deliver its event. Send failures mean
/// the UI is gone, which is fine to ignore.
pub fn spawn(tx: Sender<WorkerEvent>, job: impl FnOnce() -> WorkerEvent + Send + 'static) {
    thread::spawn(move || {
        let event = job();
        if tx.send(event).is_err() {
            tracing::debug!("UI receiver dropped before worker completion");
        }
    });
}
