//! UI rendering with Ratatui.

use crate::app::{App, ConnectionState, EntriesView, InputMode, Overlay, ToastIntent, View};
use crate::tree::TreeRowKind;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    prelude::*,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

/// Main render function.
pub fn render(frame: &mut Frame, app: &App) {
    match app.view {
        View::Entries => render_entries_page(frame, app),
        View::Setup => render_setup(frame, app),
    }

    if app.input_mode == InputMode::PairingCode {
        render_pairing_dialog(frame, app);
    }
    match app.overlay {
        Overlay::Otps => render_otps_overlay(frame, app),
        Overlay::Vaults => render_vaults_overlay(frame, app),
        Overlay::None => {}
    }
    render_toasts(frame, app);
}

/// Render the entries page: search bar plus a body switched on the
/// connection state.
fn render_entries_page(frame: &mut Frame, app: &App) {
    let area = frame.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1)])
        .split(area);

    render_search_bar(frame, app, chunks[0]);

    match app.connection_state {
        ConnectionState::NotConnected => render_invalid_state(
            frame,
            chunks[1],
            "Not connected",
            "The desktop application is not paired with this client.",
            "[c] Connect",
            Color::Yellow,
        ),
        ConnectionState::Pending => {
            let spinner = Paragraph::new("⟳ Connecting…")
                .style(Style::default().fg(Color::Cyan))
                .alignment(Alignment::Center);
            frame.render_widget(spinner, centered_rect(30, 3, chunks[1]));
        }
        ConnectionState::Connected => render_entries_list(frame, app, chunks[1]),
        ConnectionState::Error => render_invalid_state(
            frame,
            chunks[1],
            "Connection check failed",
            "The desktop application could not be reached or rejected this client.",
            "[r] Reconnect",
            Color::Red,
        ),
    }
}

fn render_search_bar(frame: &mut Frame, app: &App, area: Rect) {
    let connected = app.connection_state == ConnectionState::Connected;
    let searching = app.input_mode == InputMode::Search;
    let border_color = if searching {
        Color::Cyan
    } else if connected {
        Color::DarkGray
    } else {
        Color::Black
    };

    let block = Block::default()
        .title(" 🔍 Search ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let line = if connected {
        Line::from(vec![
            Span::styled(app.search_term.as_str(), Style::default().fg(Color::White)),
            Span::styled(
                if searching { "_" } else { "" },
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::SLOW_BLINK),
            ),
        ])
    } else {
        Line::from(Span::styled(
            "search unavailable",
            Style::default().fg(Color::DarkGray),
        ))
    };
    frame.render_widget(Paragraph::new(line), inner);
}

/// Non-ideal-state panel with a single keyboard action hint.
fn render_invalid_state(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    description: &str,
    action: &str,
    color: Color,
) {
    let lines = vec![
        Line::from(Span::styled(
            title.to_string(),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            description.to_string(),
            Style::default().fg(Color::Gray),
        )),
        Line::from(""),
        Line::from(Span::styled(
            action.to_string(),
            Style::default().fg(Color::Cyan),
        )),
    ];
    let panel = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    frame.render_widget(panel, centered_rect(50, 7, area));
}

/// The connected list body, one of the four mutually exclusive branches.
fn render_entries_list(frame: &mut Frame, app: &App, area: Rect) {
    match app.entries_view() {
        EntriesView::AllLocked => render_invalid_state(
            frame,
            area,
            "All vaults locked",
            "Unlock a vault in the desktop application to see entries.",
            "[v] Vaults",
            Color::Yellow,
        ),
        EntriesView::NoEntries => render_invalid_state(
            frame,
            area,
            "No entries",
            "Search for entries, or use some to fill this space with recents.",
            "[/] Search",
            Color::Gray,
        ),
        EntriesView::Searched(entries) => {
            let items = entry_items(entries, app.entries_cursor, 0);
            frame.render_widget(List::new(items), area);
        }
        EntriesView::Sections {
            url_entries,
            recents,
        } => {
            let mut items: Vec<ListItem> = Vec::new();
            if !url_entries.is_empty() {
                items.push(section_header("URL Entries"));
                items.extend(entry_items(url_entries, app.entries_cursor, 0));
            }
            if !recents.is_empty() {
                items.push(section_header("Recents"));
                items.extend(entry_items(recents, app.entries_cursor, url_entries.len()));
            }
            frame.render_widget(List::new(items), area);
        }
    }
}

fn section_header(title: &str) -> ListItem<'static> {
    ListItem::new(Line::from(Span::styled(
        format!("── {title} ──"),
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )))
}

/// Rows for one run of entries; `offset` is their position within the
/// cursor's flattened ordering.
fn entry_items(
    entries: &[vaultlink_core::SearchResult],
    cursor: usize,
    offset: usize,
) -> Vec<ListItem<'static>> {
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let selected = offset + i == cursor;
            let style = if selected {
                Style::default()
                    .bg(Color::Rgb(60, 60, 80))
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            let mut spans = vec![
                Span::styled("🔑 ", Style::default()),
                Span::styled(entry.title().to_string(), style),
            ];
            if let Some(username) = entry.username() {
                spans.push(Span::styled(
                    format!("  {username}"),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            ListItem::new(Line::from(spans)).style(style)
        })
        .collect()
}

/// Render the setup file tree.
fn render_setup(frame: &mut Frame, app: &App) {
    let area = frame.area();
    let block = Block::default()
        .title(" 📁 Choose a vault file ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let items: Vec<ListItem> = app
        .tree
        .rows()
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let indent = "  ".repeat(row.depth);
            let selected_file = app.tree.selected_path.as_deref() == Some(row.path.as_str());
            let (icon, color) = match row.kind {
                TreeRowKind::Directory { open: true } => ("▾ 📂", Color::Yellow),
                TreeRowKind::Directory { open: false } => ("▸ 📁", Color::Yellow),
                TreeRowKind::File { is_vault: true } => ("  🔐", Color::Green),
                TreeRowKind::File { is_vault: false } => ("  📄", Color::Gray),
                TreeRowKind::Loader => ("  ⟳", Color::DarkGray),
            };
            let label = if row.kind == TreeRowKind::Loader {
                "loading…".to_string()
            } else {
                row.name.clone()
            };
            let mut style = if i == app.tree.cursor {
                Style::default()
                    .bg(Color::Rgb(60, 60, 80))
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(color)
            };
            if selected_file {
                style = style.add_modifier(Modifier::ITALIC);
            }
            ListItem::new(Line::from(format!("{indent}{icon} {label}"))).style(style)
        })
        .collect();
    frame.render_widget(List::new(items), inner);
}

/// Centered dialog for typing the desktop's pairing code.
fn render_pairing_dialog(frame: &mut Frame, app: &App) {
    let area = frame.area();
    let dialog_area = centered_rect(44, 5, area);
    frame.render_widget(Clear, dialog_area);

    let block = Block::default()
        .title(" 🔗 Pairing code ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta));
    let inner = block.inner(dialog_area);
    frame.render_widget(block, dialog_area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([Constraint::Length(1)])
        .split(inner);
    let input = Paragraph::new(format!("▸ {}_", app.pairing_code))
        .style(Style::default().fg(Color::Yellow));
    frame.render_widget(input, chunks[0]);
}

fn render_otps_overlay(frame: &mut Frame, app: &App) {
    let area = frame.area();
    let dialog_area = centered_rect(
        54.min(area.width.saturating_sub(4)),
        14.min(area.height.saturating_sub(4)),
        area,
    );
    frame.render_widget(Clear, dialog_area);

    let block = Block::default()
        .title(" 🕐 One-time passwords ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta));
    let inner = block.inner(dialog_area);
    frame.render_widget(block, dialog_area);

    if app.otps.is_empty() {
        let empty = Paragraph::new("No OTPs configured")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center);
        frame.render_widget(empty, inner);
        return;
    }

    let items: Vec<ListItem> = app
        .otps
        .iter()
        .enumerate()
        .map(|(i, otp)| {
            let style = if i == app.overlay_cursor {
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(Line::from(vec![
                Span::styled(otp.entry_title.clone(), style),
                Span::styled(
                    format!("  {}", otp.entry_property),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();
    frame.render_widget(List::new(items), inner);
}

fn render_vaults_overlay(frame: &mut Frame, app: &App) {
    let area = frame.area();
    let dialog_area = centered_rect(
        54.min(area.width.saturating_sub(4)),
        14.min(area.height.saturating_sub(4)),
        area,
    );
    frame.render_widget(Clear, dialog_area);

    let block = Block::default()
        .title(" 🗄 Vaults — Enter locks/unlocks ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta));
    let inner = block.inner(dialog_area);
    frame.render_widget(block, dialog_area);

    let items: Vec<ListItem> = app
        .sources
        .iter()
        .enumerate()
        .map(|(i, source)| {
            use vaultlink_core::VaultSourceStatus;
            let (icon, color) = match source.state {
                VaultSourceStatus::Unlocked => ("🔓", Color::Green),
                VaultSourceStatus::Locked => ("🔒", Color::Yellow),
                VaultSourceStatus::Unknown => ("❓", Color::DarkGray),
            };
            // Prefer the vaults-tree label, which falls back to "Untitled
            // vault" for unnamed sources.
            let name = app
                .vault_tree
                .get(&source.id)
                .map(|s| s.name.clone())
                .unwrap_or_else(|| source.name.clone());
            let style = if i == app.overlay_cursor {
                Style::default()
                    .bg(Color::Rgb(60, 60, 80))
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(color)
            };
            ListItem::new(Line::from(format!("{icon} {name}"))).style(style)
        })
        .collect();
    frame.render_widget(List::new(items), inner);
}

/// Stack active toasts along the bottom edge.
fn render_toasts(frame: &mut Frame, app: &App) {
    if app.toasts.is_empty() {
        return;
    }
    let area = frame.area();
    let count = app.toasts.len().min(4) as u16;
    let toast_area = Rect::new(
        area.x,
        area.y + area.height.saturating_sub(count),
        area.width,
        count.min(area.height),
    );
    frame.render_widget(Clear, toast_area);
    let lines: Vec<Line> = app
        .toasts
        .iter()
        .rev()
        .take(count as usize)
        .map(|toast| {
            let color = match toast.intent {
                ToastIntent::Notice => Color::Cyan,
                ToastIntent::Danger => Color::Red,
            };
            Line::from(Span::styled(
                format!(" {} ", toast.message),
                Style::default().fg(Color::Black).bg(color),
            ))
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), toast_area);
}

/// Helper to create a centered rectangle.
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}
