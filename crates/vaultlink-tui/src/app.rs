//! Application state management.

use crate::config::Config;
use crate::tree::{DirectoryProvider, TreeRowKind, TreeState, ROOT_PATH};
use crate::worker::{self, WorkerEvent};
use anyhow::Context;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};
use vaultlink_core::{
    DesktopClient, Keystore, RecentsStore, SearchResult, VaultSourceDescription,
    VaultSourceStatus, VaultsTree,
};

/// The popup's belief about reachability of the desktop process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    NotConnected,
    Pending,
    Connected,
    Error,
}

/// Where this instance was launched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Standalone popup: entries open their pages.
    Popup,
    /// Invoked from a page: entries fill the identified form.
    Page,
}

/// Launch parameters passed by the invoker.
#[derive(Debug, Clone)]
pub struct LaunchContext {
    pub mode: LaunchMode,
    pub form_id: Option<String>,
    pub url: Option<String>,
}

/// Top-level view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Entries,
    Setup,
}

/// Input mode for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Search,
    PairingCode,
}

/// Overlay panel over the entries view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    None,
    Otps,
    Vaults,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastIntent {
    Notice,
    Danger,
}

/// A transient notification with an expiry deadline.
#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub intent: ToastIntent,
    pub deadline: Instant,
}

const NOTICE_TOAST: Duration = Duration::from_secs(3);
const ERROR_TOAST: Duration = Duration::from_secs(10);

/// Which list body the entries page shows. The branches are mutually
/// exclusive and ordered: all-locked wins over search results, which win
/// over the empty panel, which wins over the sectioned fallback.
#[derive(Debug, PartialEq)]
pub enum EntriesView<'a> {
    AllLocked,
    Searched(&'a [SearchResult]),
    NoEntries,
    Sections {
        url_entries: &'a [SearchResult],
        recents: &'a [SearchResult],
    },
}

/// What activating an entry should do, given the launch context.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryRoute {
    /// Post the entry result to the form-bearing tab.
    FillForm { form_id: String },
    /// Open the entry's page.
    OpenPage { url: String, auto_login: bool },
    /// Popup context but the entry has no URL.
    NoUrl,
}

/// Entry result held for the invoking page, emitted on exit.
#[derive(Debug, Clone)]
pub struct FormFill {
    pub form_id: String,
    pub entry: SearchResult,
}

/// Decide the click route. Page context never opens a page; popup context
/// never posts to a tab. Page context without a form ID does nothing.
pub fn route_entry_click(
    context: &LaunchContext,
    entry: &SearchResult,
    auto_login: bool,
) -> Option<EntryRoute> {
    match context.mode {
        LaunchMode::Page => context
            .form_id
            .as_ref()
            .map(|form_id| EntryRoute::FillForm {
                form_id: form_id.clone(),
            }),
        LaunchMode::Popup => Some(match entry.login_url() {
            Some(url) => EntryRoute::OpenPage {
                url: url.to_string(),
                auto_login,
            },
            None => EntryRoute::NoUrl,
        }),
    }
}

/// Main application model.
pub struct App {
    pub view: View,
    pub input_mode: InputMode,
    pub connection_state: ConnectionState,
    pub launch: LaunchContext,
    pub should_quit: bool,

    config: Config,
    keystore: Keystore,
    client: Arc<DesktopClient>,
    pub recents: RecentsStore,
    tx: Sender<WorkerEvent>,
    rx: Receiver<WorkerEvent>,

    // Entries page state
    pub search_term: String,
    pub searched_entries: Vec<SearchResult>,
    pub url_entries: Vec<SearchResult>,
    pub recent_entries: Vec<SearchResult>,
    pub sources: Vec<VaultSourceDescription>,
    pub entries_cursor: usize,

    // Overlays
    pub overlay: Overlay,
    pub otps: Vec<vaultlink_core::Otp>,
    pub vault_tree: VaultsTree,
    pub overlay_cursor: usize,

    // Pairing state
    pub pairing_code: String,

    // Setup (file tree) state
    pub tree: TreeState,
    provider: Option<Arc<dyn DirectoryProvider>>,
    pub chosen_vault_path: Option<String>,

    /// Pending form result, written to stdout after terminal teardown.
    pub form_fill: Option<FormFill>,

    pub toasts: Vec<Toast>,
}

impl App {
    pub fn new(
        config: Config,
        keystore: Keystore,
        recents: RecentsStore,
        launch: LaunchContext,
        view: View,
        provider: Option<Arc<dyn DirectoryProvider>>,
    ) -> Self {
        let client = Arc::new(DesktopClient::new(
            config.desktop_origin.clone(),
            keystore.clone(),
        ));
        let (tx, rx) = channel();
        Self {
            view,
            input_mode: InputMode::Normal,
            connection_state: ConnectionState::NotConnected,
            launch,
            should_quit: false,
            config,
            keystore,
            client,
            recents,
            tx,
            rx,
            search_term: String::new(),
            searched_entries: Vec::new(),
            url_entries: Vec::new(),
            recent_entries: Vec::new(),
            sources: Vec::new(),
            entries_cursor: 0,
            overlay: Overlay::None,
            otps: Vec::new(),
            vault_tree: VaultsTree::new(),
            overlay_cursor: 0,
            pairing_code: String::new(),
            tree: TreeState::new(),
            provider,
            chosen_vault_path: None,
            form_fill: None,
            toasts: Vec::new(),
        }
    }

    /// Kick off the initial work for the chosen view.
    pub fn startup(&mut self) {
        match self.view {
            View::Entries => {
                if self.keystore.has_connection() {
                    self.connection_state = ConnectionState::Pending;
                    self.spawn_test_auth();
                } else {
                    self.connection_state = ConnectionState::NotConnected;
                }
            }
            View::Setup => self.open_directory(ROOT_PATH),
        }
    }

    // ----- connection lifecycle -----

    /// Start the pairing handshake from the connect prompt.
    pub fn connect(&mut self) {
        self.keystore.ensure_identity();
        if let Err(err) = self.keystore.save() {
            self.toast_error(format!("Failed to store client identity: {err}"));
            return;
        }
        self.rebuild_client();
        self.connection_state = ConnectionState::Pending;
        let client = self.client.clone();
        worker::spawn(self.tx.clone(), move || {
            WorkerEvent::HandshakeStarted(
                client.initiate_connection().map_err(|e| e.to_string()),
            )
        });
    }

    /// Re-test the stored credentials from the error prompt.
    pub fn reconnect(&mut self) {
        self.connection_state = ConnectionState::Pending;
        self.spawn_test_auth();
    }

    /// Submit the pairing code read off the desktop.
    pub fn submit_pairing_code(&mut self) {
        let code = self.pairing_code.trim().to_string();
        if code.is_empty() {
            return;
        }
        self.input_mode = InputMode::Normal;
        let client = self.client.clone();
        worker::spawn(self.tx.clone(), move || {
            WorkerEvent::HandshakeCompleted(
                client.authenticate_access(&code).map_err(|e| e.to_string()),
            )
        });
    }

    fn spawn_test_auth(&self) {
        let client = self.client.clone();
        worker::spawn(self.tx.clone(), move || {
            WorkerEvent::ConnectionTested(client.test_auth().map_err(|e| e.to_string()))
        });
    }

    fn rebuild_client(&mut self) {
        self.client = Arc::new(DesktopClient::new(
            self.config.desktop_origin.clone(),
            self.keystore.clone(),
        ));
    }

    // ----- entries page data -----

    /// Refresh everything the list view composes. Each call settles on its
    /// own; arrival order does not matter.
    pub fn refresh_entries_data(&mut self) {
        let client = self.client.clone();
        worker::spawn(self.tx.clone(), move || {
            WorkerEvent::Sources(client.get_vault_sources().map_err(|e| e.to_string()))
        });

        if let Some(url) = self.launch.url.clone() {
            let client = self.client.clone();
            worker::spawn(self.tx.clone(), move || {
                WorkerEvent::UrlEntries(
                    client.search_entries_by_url(&url).map_err(|e| e.to_string()),
                )
            });
        }

        let refs = self.recents.refs();
        if !refs.is_empty() {
            let client = self.client.clone();
            worker::spawn(self.tx.clone(), move || {
                WorkerEvent::RecentEntries(
                    client
                        .get_entry_search_results(&refs)
                        .map_err(|e| e.to_string()),
                )
            });
        }
    }

    /// React to an edited search term: clear results for a blank term,
    /// otherwise round-trip to the desktop.
    pub fn search_changed(&mut self) {
        if self.connection_state != ConnectionState::Connected {
            return;
        }
        let term = self.search_term.trim().to_string();
        if term.is_empty() {
            self.searched_entries.clear();
            self.entries_cursor = 0;
            return;
        }
        let client = self.client.clone();
        let sent = term.clone();
        worker::spawn(self.tx.clone(), move || WorkerEvent::SearchedEntries {
            term: sent,
            result: client.search_entries_by_term(&term).map_err(|e| e.to_string()),
        });
    }

    /// The list body to show, reproducing the original popup's chained-OR
    /// branch precedence exactly.
    pub fn entries_view(&self) -> EntriesView<'_> {
        if self.unlocked_count() == 0 {
            EntriesView::AllLocked
        } else if !self.searched_entries.is_empty() {
            EntriesView::Searched(&self.searched_entries)
        } else if self.url_entries.is_empty() && self.recent_entries.is_empty() {
            EntriesView::NoEntries
        } else {
            EntriesView::Sections {
                url_entries: &self.url_entries,
                recents: &self.recent_entries,
            }
        }
    }

    pub fn unlocked_count(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| s.state == VaultSourceStatus::Unlocked)
            .count()
    }

    /// The entries navigable by the cursor, in display order.
    pub fn visible_entries(&self) -> Vec<&SearchResult> {
        match self.entries_view() {
            EntriesView::Searched(entries) => entries.iter().collect(),
            EntriesView::Sections {
                url_entries,
                recents,
            } => url_entries.iter().chain(recents.iter()).collect(),
            _ => Vec::new(),
        }
    }

    pub fn move_cursor_up(&mut self) {
        if self.entries_cursor > 0 {
            self.entries_cursor -= 1;
        }
    }

    pub fn move_cursor_down(&mut self) {
        let count = self.visible_entries().len();
        if self.entries_cursor + 1 < count {
            self.entries_cursor += 1;
        }
    }

    /// Activate the entry under the cursor. Routing and recent-use tracking
    /// are independent side effects with their own failure toasts.
    pub fn activate_selected_entry(&mut self, auto_login: bool) {
        let Some(entry) = self
            .visible_entries()
            .get(self.entries_cursor)
            .map(|e| (*e).clone())
        else {
            return;
        };

        match route_entry_click(&self.launch, &entry, auto_login) {
            Some(EntryRoute::FillForm { form_id }) => {
                self.form_fill = Some(FormFill {
                    form_id,
                    entry: entry.clone(),
                });
                self.should_quit = true;
            }
            Some(EntryRoute::OpenPage { url, auto_login }) => {
                if let Err(err) = open_page(&url, auto_login) {
                    tracing::error!("Failed to open page: {err:#}");
                    self.toast_error(format!("Failed to open page: {err}"));
                }
            }
            Some(EntryRoute::NoUrl) => {
                self.toast_notice("No URL available for this entry".to_string());
            }
            None => {}
        }

        if let Err(err) = self.recents.track(&entry.id, &entry.source_id) {
            tracing::error!("Failed to record recent use: {err}");
            self.toast_error(format!("Failed to record recent use: {err}"));
        }
    }

    // ----- overlays -----

    pub fn toggle_otps_overlay(&mut self) {
        if self.overlay == Overlay::Otps {
            self.overlay = Overlay::None;
            return;
        }
        self.overlay = Overlay::Otps;
        self.overlay_cursor = 0;
        let client = self.client.clone();
        worker::spawn(self.tx.clone(), move || {
            WorkerEvent::Otps(client.get_otps().map_err(|e| e.to_string()))
        });
    }

    pub fn toggle_vaults_overlay(&mut self) {
        if self.overlay == Overlay::Vaults {
            self.overlay = Overlay::None;
            return;
        }
        self.overlay = Overlay::Vaults;
        self.overlay_cursor = 0;
        let client = self.client.clone();
        worker::spawn(self.tx.clone(), move || {
            WorkerEvent::Sources(client.get_vault_sources().map_err(|e| e.to_string()))
        });
        let client = self.client.clone();
        worker::spawn(self.tx.clone(), move || {
            WorkerEvent::Tree(client.get_vaults_tree().map_err(|e| e.to_string()))
        });
    }

    /// Lock or unlock the source under the overlay cursor.
    pub fn toggle_selected_source_lock(&mut self) {
        let Some(source) = self.sources.get(self.overlay_cursor).cloned() else {
            return;
        };
        let client = self.client.clone();
        let source_id = source.id.clone();
        match source.state {
            VaultSourceStatus::Unlocked => {
                worker::spawn(self.tx.clone(), move || {
                    let result = match client.prompt_source_lock(&source_id) {
                        Ok(true) => Ok(()),
                        Ok(false) => Err("Desktop declined to lock the source".to_string()),
                        Err(err) => Err(err.to_string()),
                    };
                    WorkerEvent::SourceLockToggled {
                        source_id: source.id,
                        locked: true,
                        result,
                    }
                });
            }
            VaultSourceStatus::Locked | VaultSourceStatus::Unknown => {
                worker::spawn(self.tx.clone(), move || {
                    WorkerEvent::SourceLockToggled {
                        source_id: source.id,
                        locked: false,
                        result: client
                            .prompt_source_unlock(&source_id)
                            .map_err(|e| e.to_string()),
                    }
                });
            }
        }
    }

    // ----- setup (file tree) -----

    /// Activate the tree row under the cursor: directories toggle (opening
    /// triggers a listing fetch), files select, a second activation on the
    /// selected file confirms it.
    pub fn activate_tree_row(&mut self) {
        let Some(row) = self.tree.row_under_cursor().cloned() else {
            return;
        };
        match row.kind {
            TreeRowKind::Directory { .. } => {
                if self.tree.toggle_open(&row.path) {
                    self.open_directory(&row.path);
                }
            }
            TreeRowKind::File { .. } => {
                if self.tree.selected_path.as_deref() == Some(row.path.as_str()) {
                    self.chosen_vault_path = Some(row.path);
                    self.should_quit = true;
                } else {
                    self.tree.select_path(&row.path);
                }
            }
            TreeRowKind::Loader => {}
        }
    }

    fn open_directory(&mut self, path: &str) {
        let Some(provider) = self.provider.clone() else {
            return;
        };
        self.tree.mark_loading(path);
        let path = path.to_string();
        worker::spawn(self.tx.clone(), move || {
            let result = provider
                .list_directory(&path)
                .map_err(|e| format!("{e:#}"));
            WorkerEvent::DirectoryListed { path, result }
        });
    }

    // ----- event application -----

    /// Drain settled background calls. Each result applies independently.
    pub fn drain_events(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            self.apply_event(event);
        }
    }

    pub(crate) fn apply_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::ConnectionTested(Ok(())) => {
                self.connection_state = ConnectionState::Connected;
                self.refresh_entries_data();
            }
            WorkerEvent::ConnectionTested(Err(err)) => {
                self.connection_state = ConnectionState::Error;
                self.toast_error(err);
            }
            WorkerEvent::HandshakeStarted(Ok(())) => {
                self.pairing_code.clear();
                self.input_mode = InputMode::PairingCode;
            }
            WorkerEvent::HandshakeStarted(Err(err)) => {
                self.connection_state = ConnectionState::NotConnected;
                self.toast_error(err);
            }
            WorkerEvent::HandshakeCompleted(Ok(server_key)) => {
                self.keystore.set_server_public_key(server_key);
                if let Err(err) = self.keystore.save() {
                    self.toast_error(format!("Failed to store server key: {err}"));
                }
                self.rebuild_client();
                self.spawn_test_auth();
            }
            WorkerEvent::HandshakeCompleted(Err(err)) => {
                self.connection_state = ConnectionState::NotConnected;
                self.toast_error(err);
            }
            WorkerEvent::Sources(Ok(sources)) => {
                self.sources = sources;
            }
            WorkerEvent::Sources(Err(err)) => self.toast_error(err),
            WorkerEvent::SearchedEntries { term, result } => {
                // A result for an outdated term is stale; drop it.
                if term != self.search_term.trim() {
                    return;
                }
                match result {
                    Ok(entries) => {
                        self.searched_entries = entries;
                        self.entries_cursor = 0;
                    }
                    Err(err) => self.toast_error(err),
                }
            }
            WorkerEvent::UrlEntries(Ok(entries)) => self.url_entries = entries,
            WorkerEvent::UrlEntries(Err(err)) => self.toast_error(err),
            WorkerEvent::RecentEntries(Ok(entries)) => self.recent_entries = entries,
            WorkerEvent::RecentEntries(Err(err)) => self.toast_error(err),
            WorkerEvent::Otps(Ok(otps)) => self.otps = otps,
            WorkerEvent::Otps(Err(err)) => self.toast_error(err),
            WorkerEvent::Tree(Ok(tree)) => self.vault_tree = tree,
            WorkerEvent::Tree(Err(err)) => self.toast_error(err),
            WorkerEvent::SourceLockToggled {
                source_id,
                locked,
                result,
            } => match result {
                Ok(()) => {
                    let action = if locked { "locked" } else { "unlock requested" };
                    self.toast_notice(format!("Source {source_id}: {action}"));
                    let client = self.client.clone();
                    worker::spawn(self.tx.clone(), move || {
                        WorkerEvent::Sources(
                            client.get_vault_sources().map_err(|e| e.to_string()),
                        )
                    });
                }
                Err(err) => self.toast_error(err),
            },
            WorkerEvent::DirectoryListed { path, result } => match result {
                Ok(listing) => self.tree.apply_listing(&path, listing),
                Err(err) => {
                    self.tree.clear_loading(&path);
                    self.toast_error(err);
                }
            },
        }
    }

    // ----- toasts -----

    pub fn toast_notice(&mut self, message: String) {
        self.toasts.push(Toast {
            message,
            intent: ToastIntent::Notice,
            deadline: Instant::now() + NOTICE_TOAST,
        });
    }

    pub fn toast_error(&mut self, message: String) {
        self.toasts.push(Toast {
            message,
            intent: ToastIntent::Danger,
            deadline: Instant::now() + ERROR_TOAST,
        });
    }

    /// Drop expired toasts. Called once per loop iteration.
    pub fn tick(&mut self) {
        let now = Instant::now();
        self.toasts.retain(|t| t.deadline > now);
    }
}

/// Open a page in the system browser, optionally flagged for auto-login.
fn open_page(raw: &str, auto_login: bool) -> anyhow::Result<()> {
    let mut target = url::Url::parse(raw)
        .or_else(|_| url::Url::parse(&format!("https://{raw}")))
        .with_context(|| format!("Invalid entry URL: {raw}"))?;
    if auto_login {
        target.query_pairs_mut().append_pair("vl-autologin", "1");
    }
    let opener = if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };
    std::process::Command::new(opener)
        .arg(target.as_str())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .with_context(|| format!("Failed to launch {opener}"))?;
    Ok(())
}
