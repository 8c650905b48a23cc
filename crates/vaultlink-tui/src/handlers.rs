//! Keyboard event handling.

use crate::app::{App, ConnectionState, InputMode, Overlay, View};
use crate::tree::TreeRowKind;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Handle a key event. Returns true if the app should quit.
pub fn handle_key(app: &mut App, key: KeyEvent) -> bool {
    match app.input_mode {
        InputMode::Normal => handle_normal_key(app, key),
        InputMode::Search => handle_search_key(app, key),
        InputMode::PairingCode => handle_pairing_key(app, key),
    }
}

fn handle_normal_key(app: &mut App, key: KeyEvent) -> bool {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return true;
    }

    if app.overlay != Overlay::None {
        return handle_overlay_key(app, key);
    }

    match app.view {
        View::Entries => handle_entries_key(app, key),
        View::Setup => handle_setup_key(app, key),
    }
}

fn handle_entries_key(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') => {
            app.should_quit = true;
            true
        }
        KeyCode::Char('c') => {
            if app.connection_state == ConnectionState::NotConnected {
                app.connect();
            }
            false
        }
        KeyCode::Char('r') => {
            if app.connection_state == ConnectionState::Error {
                app.reconnect();
            }
            false
        }
        KeyCode::Char('/') => {
            if app.connection_state == ConnectionState::Connected {
                app.input_mode = InputMode::Search;
            }
            false
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.move_cursor_down();
            false
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.move_cursor_up();
            false
        }
        KeyCode::Enter => {
            app.activate_selected_entry(false);
            app.should_quit
        }
        KeyCode::Char('a') => {
            // Auto-login variant of the entry click.
            app.activate_selected_entry(true);
            app.should_quit
        }
        KeyCode::Char('o') => {
            if app.connection_state == ConnectionState::Connected {
                app.toggle_otps_overlay();
            }
            false
        }
        KeyCode::Char('v') => {
            if app.connection_state == ConnectionState::Connected {
                app.toggle_vaults_overlay();
            }
            false
        }
        _ => false,
    }
}

fn handle_overlay_key(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => {
            app.overlay = Overlay::None;
            false
        }
        KeyCode::Char('j') | KeyCode::Down => {
            let count = match app.overlay {
                Overlay::Otps => app.otps.len(),
                Overlay::Vaults => app.sources.len(),
                Overlay::None => 0,
            };
            if app.overlay_cursor + 1 < count {
                app.overlay_cursor += 1;
            }
            false
        }
        KeyCode::Char('k') | KeyCode::Up => {
            if app.overlay_cursor > 0 {
                app.overlay_cursor -= 1;
            }
            false
        }
        KeyCode::Enter => {
            if app.overlay == Overlay::Vaults {
                app.toggle_selected_source_lock();
            }
            false
        }
        _ => false,
    }
}

fn handle_setup_key(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            app.should_quit = true;
            true
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.tree.move_down();
            false
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.tree.move_up();
            false
        }
        KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right => {
            app.activate_tree_row();
            app.should_quit
        }
        KeyCode::Char('h') | KeyCode::Left => {
            // Collapse the directory under the cursor if it is open.
            if let Some(row) = app.tree.row_under_cursor().cloned() {
                if matches!(row.kind, TreeRowKind::Directory { open: true }) {
                    app.tree.toggle_open(&row.path);
                }
            }
            false
        }
        _ => false,
    }
}

fn handle_search_key(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Esc | KeyCode::Enter => {
            app.input_mode = InputMode::Normal;
            false
        }
        KeyCode::Up => {
            app.move_cursor_up();
            false
        }
        KeyCode::Down => {
            app.move_cursor_down();
            false
        }
        KeyCode::Char(c) => {
            app.search_term.push(c);
            app.search_changed();
            false
        }
        KeyCode::Backspace => {
            app.search_term.pop();
            app.search_changed();
            false
        }
        _ => false,
    }
}

fn handle_pairing_key(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
            app.connection_state = ConnectionState::NotConnected;
            false
        }
        KeyCode::Enter => {
            app.submit_pairing_code();
            false
        }
        KeyCode::Char(c) => {
            app.pairing_code.push(c);
            false
        }
        KeyCode::Backspace => {
            app.pairing_code.pop();
            false
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{LaunchContext, LaunchMode, View};
    use crate::config::Config;
    use crossterm::event::KeyEvent;
    use vaultlink_core::{Keystore, RecentsStore};

    fn app(view: View) -> App {
        App::new(
            Config::default(),
            Keystore::ephemeral(),
            RecentsStore::ephemeral(5),
            LaunchContext {
                mode: LaunchMode::Page,
                form_id: Some("f".to_string()),
                url: None,
            },
            view,
            None,
        )
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::from(code)
    }

    #[test]
    fn q_quits_from_normal_mode() {
        let mut app = app(View::Entries);
        assert!(handle_key(&mut app, key(KeyCode::Char('q'))));
        assert!(app.should_quit);
    }

    #[test]
    fn search_mode_requires_a_connection() {
        let mut app = app(View::Entries);
        handle_key(&mut app, key(KeyCode::Char('/')));
        assert_eq!(app.input_mode, InputMode::Normal);

        app.connection_state = ConnectionState::Connected;
        handle_key(&mut app, key(KeyCode::Char('/')));
        assert_eq!(app.input_mode, InputMode::Search);
    }

    #[test]
    fn escape_leaves_search_mode() {
        let mut app = app(View::Entries);
        app.connection_state = ConnectionState::Connected;
        app.input_mode = InputMode::Search;
        handle_key(&mut app, key(KeyCode::Esc));
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[test]
    fn pairing_code_collects_typed_characters() {
        let mut app = app(View::Entries);
        app.input_mode = InputMode::PairingCode;
        for c in ['1', '2', '3'] {
            handle_key(&mut app, key(KeyCode::Char(c)));
        }
        handle_key(&mut app, key(KeyCode::Backspace));
        assert_eq!(app.pairing_code, "12");
    }

    #[test]
    fn escape_cancels_pairing() {
        let mut app = app(View::Entries);
        app.input_mode = InputMode::PairingCode;
        app.connection_state = ConnectionState::Pending;
        handle_key(&mut app, key(KeyCode::Esc));
        assert_eq!(app.connection_state, ConnectionState::NotConnected);
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[test]
    fn overlay_swallows_navigation_keys() {
        let mut app = app(View::Entries);
        app.overlay = Overlay::Otps;
        handle_key(&mut app, key(KeyCode::Char('q')));
        assert!(!app.should_quit);
        assert_eq!(app.overlay, Overlay::None);
    }
}
