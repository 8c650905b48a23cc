//! Remote file tree state for the setup flow.
//!
//! The tree itself is an immutable snapshot owned by whoever lists
//! directories (the [`DirectoryProvider`]); this module only tracks which
//! paths are open or loading and flattens the snapshot into rows for
//! rendering. A node's identity is its path string.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use vaultlink_core::{RemoteDirectory, RemoteFile};

/// File extension that marks a vault archive.
pub const VAULT_EXTENSION: &str = ".bcup";

/// Root path of every remote tree.
pub const ROOT_PATH: &str = "/";

/// Supplies directory snapshots for the tree. Listings are fetched on
/// expansion; the tree never caches beyond the current snapshot.
pub trait DirectoryProvider: Send + Sync {
    fn list_directory(&self, path: &str) -> anyhow::Result<RemoteDirectory>;
}

/// What a flattened row represents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeRowKind {
    Directory { open: bool },
    File { is_vault: bool },
    Loader,
}

/// A single renderable row of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub depth: usize,
    pub path: String,
    pub name: String,
    pub kind: TreeRowKind,
}

/// Expand/collapse and loading state over a directory snapshot.
pub struct TreeState {
    pub root: Option<RemoteDirectory>,
    pub open_paths: HashSet<String>,
    pub loading_paths: HashSet<String>,
    pub selected_path: Option<String>,
    /// Cursor position within the flattened rows.
    pub cursor: usize,
    rows: Vec<TreeRow>,
}

impl TreeState {
    pub fn new() -> Self {
        let mut open_paths = HashSet::new();
        open_paths.insert(ROOT_PATH.to_string());
        Self {
            root: None,
            open_paths,
            loading_paths: HashSet::new(),
            selected_path: None,
            cursor: 0,
            rows: Vec::new(),
        }
    }

    /// Toggle a directory open or closed. Returns true when the directory
    /// just opened, which is the caller's cue to fetch its listing.
    /// Toggling twice restores the open set exactly.
    pub fn toggle_open(&mut self, path: &str) -> bool {
        let opened = if self.open_paths.contains(path) {
            self.open_paths.remove(path);
            false
        } else {
            self.open_paths.insert(path.to_string());
            true
        };
        self.rebuild_rows();
        opened
    }

    pub fn mark_loading(&mut self, path: &str) {
        self.loading_paths.insert(path.to_string());
        self.rebuild_rows();
    }

    /// Install a freshly fetched listing at its path and clear its loading
    /// marker. The root listing replaces the whole snapshot.
    pub fn apply_listing(&mut self, path: &str, listing: RemoteDirectory) {
        self.loading_paths.remove(path);
        if path == ROOT_PATH || self.root.is_none() {
            self.root = Some(listing);
        } else if let Some(ref mut root) = self.root {
            graft_listing(root, path, listing);
        }
        self.rebuild_rows();
    }

    /// Drop the loading marker without applying anything (failed fetch).
    pub fn clear_loading(&mut self, path: &str) {
        self.loading_paths.remove(path);
        self.rebuild_rows();
    }

    pub fn select_path(&mut self, path: &str) {
        self.selected_path = Some(path.to_string());
    }

    pub fn rows(&self) -> &[TreeRow] {
        &self.rows
    }

    pub fn move_up(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
        }
    }

    pub fn move_down(&mut self) {
        if self.cursor + 1 < self.rows.len() {
            self.cursor += 1;
        }
    }

    pub fn row_under_cursor(&self) -> Option<&TreeRow> {
        self.rows.get(self.cursor)
    }

    fn rebuild_rows(&mut self) {
        self.rows = flatten_rows(self.root.as_ref(), &self.open_paths, &self.loading_paths);
        if self.cursor >= self.rows.len() {
            self.cursor = self.rows.len().saturating_sub(1);
        }
    }
}

impl Default for TreeState {
    fn default() -> Self {
        Self::new()
    }
}

/// Flatten a snapshot into rows: each open directory renders itself, then
/// its child directories, then its files, then one loader row if its path
/// is still loading. With no root loaded, a loading "/" yields exactly one
/// loader row.
pub fn flatten_rows(
    root: Option<&RemoteDirectory>,
    open: &HashSet<String>,
    loading: &HashSet<String>,
) -> Vec<TreeRow> {
    let mut rows = Vec::new();
    match root {
        Some(dir) => flatten_directory(dir, 0, open, loading, &mut rows),
        None => {
            if loading.contains(ROOT_PATH) {
                rows.push(loader_row(ROOT_PATH, 0));
            }
        }
    }
    rows
}

fn flatten_directory(
    dir: &RemoteDirectory,
    depth: usize,
    open: &HashSet<String>,
    loading: &HashSet<String>,
    rows: &mut Vec<TreeRow>,
) {
    let is_open = open.contains(&dir.path);
    let name = if dir.name.is_empty() {
        ROOT_PATH.to_string()
    } else {
        dir.name.clone()
    };
    rows.push(TreeRow {
        depth,
        path: dir.path.clone(),
        name,
        kind: TreeRowKind::Directory { open: is_open },
    });
    if !is_open {
        return;
    }
    for child in &dir.directories {
        flatten_directory(child, depth + 1, open, loading, rows);
    }
    for file in &dir.files {
        rows.push(file_row(file, depth + 1));
    }
    if loading.contains(&dir.path) {
        rows.push(loader_row(&dir.path, depth + 1));
    }
}

fn file_row(file: &RemoteFile, depth: usize) -> TreeRow {
    TreeRow {
        depth,
        path: file.path.clone(),
        name: file.name.clone(),
        kind: TreeRowKind::File {
            is_vault: is_vault_file(&file.name),
        },
    }
}

fn loader_row(parent_path: &str, depth: usize) -> TreeRow {
    TreeRow {
        depth,
        path: format!("loader:{parent_path}"),
        name: String::new(),
        kind: TreeRowKind::Loader,
    }
}

/// Files carrying the reserved vault extension get a distinguished icon.
pub fn is_vault_file(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(VAULT_EXTENSION)
}

/// Replace the children of the node identified by `path` with the fetched
/// listing, keeping the node itself in place.
fn graft_listing(node: &mut RemoteDirectory, path: &str, listing: RemoteDirectory) -> bool {
    if node.path == path {
        node.directories = listing.directories;
        node.files = listing.files;
        return true;
    }
    for child in &mut node.directories {
        if graft_listing(child, path, listing.clone()) {
            return true;
        }
    }
    false
}

/// Lists directories from the local filesystem, presenting them under
/// virtual "/" rooted paths. Stands in for a remote lister during setup.
pub struct LocalDirectoryProvider {
    base: PathBuf,
}

impl LocalDirectoryProvider {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let trimmed = path.trim_start_matches('/');
        if trimmed.is_empty() {
            self.base.clone()
        } else {
            self.base.join(trimmed)
        }
    }
}

impl DirectoryProvider for LocalDirectoryProvider {
    fn list_directory(&self, path: &str) -> anyhow::Result<RemoteDirectory> {
        use anyhow::Context;

        let real = self.resolve(path);
        let mut directories = Vec::new();
        let mut files = Vec::new();
        let entries = std::fs::read_dir(&real)
            .with_context(|| format!("Failed to list directory: {}", real.display()))?;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let child_path = join_virtual(path, &name);
            if entry.file_type()?.is_dir() {
                directories.push(RemoteDirectory {
                    path: child_path,
                    name,
                    directories: Vec::new(),
                    files: Vec::new(),
                });
            } else {
                files.push(RemoteFile {
                    path: child_path,
                    name,
                });
            }
        }
        directories.sort_by(|a, b| a.name.cmp(&b.name));
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(RemoteDirectory {
            path: path.to_string(),
            name: dir_display_name(path),
            directories,
            files,
        })
    }
}

fn join_virtual(parent: &str, name: &str) -> String {
    if parent == ROOT_PATH {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

fn dir_display_name(path: &str) -> String {
    if path == ROOT_PATH {
        ROOT_PATH.to_string()
    } else {
        Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir(path: &str, dirs: Vec<RemoteDirectory>, files: Vec<RemoteFile>) -> RemoteDirectory {
        RemoteDirectory {
            path: path.to_string(),
            name: dir_display_name(path),
            directories: dirs,
            files,
        }
    }

    fn file(path: &str, name: &str) -> RemoteFile {
        RemoteFile {
            path: path.to_string(),
            name: name.to_string(),
        }
    }

    fn loader_count(rows: &[TreeRow]) -> usize {
        rows.iter()
            .filter(|r| r.kind == TreeRowKind::Loader)
            .count()
    }

    #[test]
    fn toggle_twice_restores_open_set() {
        let mut state = TreeState::new();
        let before = state.open_paths.clone();
        assert!(state.toggle_open("/docs"));
        assert!(!state.toggle_open("/docs"));
        assert_eq!(state.open_paths, before);
    }

    #[test]
    fn closing_a_directory_needs_no_fetch() {
        let mut state = TreeState::new();
        // "/" starts open, so the first toggle closes it.
        assert!(!state.toggle_open(ROOT_PATH));
    }

    #[test]
    fn rows_follow_directory_children_files_loader_order() {
        let root = dir(
            "/",
            vec![dir("/sub", vec![], vec![file("/sub/a.txt", "a.txt")])],
            vec![file("/notes.txt", "notes.txt")],
        );
        let mut open = HashSet::new();
        open.insert("/".to_string());
        open.insert("/sub".to_string());
        let mut loading = HashSet::new();
        loading.insert("/sub".to_string());

        let rows = flatten_rows(Some(&root), &open, &loading);
        let kinds: Vec<_> = rows.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(
            kinds,
            vec!["/", "/sub", "/sub/a.txt", "loader:/sub", "/notes.txt"]
        );
        assert_eq!(rows[1].depth, 1);
        assert_eq!(rows[2].depth, 2);
    }

    #[test]
    fn closed_directory_hides_children() {
        let root = dir(
            "/",
            vec![dir("/sub", vec![], vec![file("/sub/a.txt", "a.txt")])],
            vec![],
        );
        let mut open = HashSet::new();
        open.insert("/".to_string());

        let rows = flatten_rows(Some(&root), &open, &HashSet::new());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].kind, TreeRowKind::Directory { open: false });
    }

    #[test]
    fn loading_open_directory_renders_exactly_one_loader_row() {
        let root = dir("/", vec![], vec![]);
        let mut open = HashSet::new();
        open.insert("/".to_string());
        let mut loading = HashSet::new();
        loading.insert("/".to_string());

        let rows = flatten_rows(Some(&root), &open, &loading);
        assert_eq!(loader_count(&rows), 1);
    }

    #[test]
    fn loading_closed_directory_renders_no_loader_row() {
        let root = dir("/", vec![dir("/sub", vec![], vec![])], vec![]);
        let mut open = HashSet::new();
        open.insert("/".to_string());
        let mut loading = HashSet::new();
        loading.insert("/sub".to_string());

        let rows = flatten_rows(Some(&root), &open, &loading);
        assert_eq!(loader_count(&rows), 0);
    }

    #[test]
    fn missing_root_while_loading_renders_single_loader() {
        let mut loading = HashSet::new();
        loading.insert("/".to_string());
        let rows = flatten_rows(None, &HashSet::new(), &loading);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kind, TreeRowKind::Loader);
    }

    #[test]
    fn missing_root_not_loading_renders_nothing() {
        let rows = flatten_rows(None, &HashSet::new(), &HashSet::new());
        assert!(rows.is_empty());
    }

    #[test]
    fn vault_extension_is_case_insensitive() {
        assert!(is_vault_file("passwords.bcup"));
        assert!(is_vault_file("OLD.BCUP"));
        assert!(!is_vault_file("notes.txt"));
        assert!(!is_vault_file("bcup"));
    }

    #[test]
    fn vault_files_get_the_vault_row_kind() {
        let root = dir("/", vec![], vec![file("/main.bcup", "main.bcup")]);
        let mut open = HashSet::new();
        open.insert("/".to_string());
        let rows = flatten_rows(Some(&root), &open, &HashSet::new());
        assert_eq!(rows[1].kind, TreeRowKind::File { is_vault: true });
    }

    #[test]
    fn listing_grafts_into_existing_node() {
        let mut state = TreeState::new();
        state.apply_listing(
            "/",
            dir("/", vec![dir("/sub", vec![], vec![])], vec![]),
        );
        state.toggle_open("/sub");
        state.mark_loading("/sub");
        state.apply_listing("/sub", dir("/sub", vec![], vec![file("/sub/v.bcup", "v.bcup")]));

        assert!(!state.loading_paths.contains("/sub"));
        let rows = state.rows();
        assert!(rows.iter().any(|r| r.path == "/sub/v.bcup"));
        assert_eq!(loader_count(rows), 0);
    }

    #[test]
    fn local_provider_lists_and_joins_virtual_paths() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("inner")).unwrap();
        std::fs::write(tmp.path().join("store.bcup"), b"").unwrap();

        let provider = LocalDirectoryProvider::new(tmp.path());
        let listing = provider.list_directory("/").unwrap();
        assert_eq!(listing.directories.len(), 1);
        assert_eq!(listing.directories[0].path, "/inner");
        assert_eq!(listing.files.len(), 1);
        assert_eq!(listing.files[0].path, "/store.bcup");

        let inner = provider.list_directory("/inner").unwrap();
        assert!(inner.directories.is_empty());
        assert!(inner.files.is_empty());
    }
}
