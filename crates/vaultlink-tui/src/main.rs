//! Vaultlink TUI - terminal client for the desktop vault companion.
//!
//! Built with Ratatui and crossterm.

mod app;
mod boundary;
mod config;
mod handlers;
mod tree;
mod ui;
mod worker;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use vaultlink_core::{Keystore, RecentsStore};

use app::{App, LaunchContext, LaunchMode, View};
use boundary::RenderBoundary;
use config::Config;
use tree::LocalDirectoryProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LaunchModeArg {
    /// Standalone popup: entries open their pages.
    Popup,
    /// Invoked from a page: entries fill the identified form.
    Page,
}

/// Vaultlink - terminal client for the desktop vault companion
#[derive(Parser, Debug)]
#[command(name = "vaultlink")]
#[command(about = "Browse and use vault entries via the desktop companion")]
struct Args {
    /// Origin of the desktop companion API (overrides config)
    #[arg(long)]
    origin: Option<String>,

    /// Path to an alternate config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Launch context
    #[arg(long, value_enum, default_value_t = LaunchModeArg::Popup)]
    launch: LaunchModeArg,

    /// Form identifier for page launches; the selected entry is emitted
    /// for this form on exit
    #[arg(long)]
    form_id: Option<String>,

    /// URL of the invoking page, used to fetch matching entries
    #[arg(long)]
    url: Option<String>,

    /// Run the setup file picker instead of the entries popup
    #[arg(long)]
    setup: bool,

    /// Directory the setup picker starts from
    #[arg(long, default_value = ".")]
    setup_root: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("vaultlink_tui=info".parse()?)
                .add_directive("vaultlink_core=info".parse()?),
        )
        .with_writer(std::io::stderr) // Write logs to stderr to not interfere with TUI
        .init();

    let args = Args::parse();
    let mut config = Config::load(args.config.clone())?;
    if let Some(origin) = args.origin.clone() {
        config.desktop_origin = origin;
    }
    tracing::info!("Starting vaultlink against {}", config.desktop_origin);

    let keystore = Keystore::load(None)?;
    let recents = RecentsStore::load(None, config.recents_cap)?;

    let (view, provider) = if args.setup {
        let provider = Arc::new(LocalDirectoryProvider::new(args.setup_root.clone()));
        (View::Setup, Some(provider as Arc<dyn tree::DirectoryProvider>))
    } else {
        (View::Entries, None)
    };
    let launch = LaunchContext {
        mode: match args.launch {
            LaunchModeArg::Popup => LaunchMode::Popup,
            LaunchModeArg::Page => LaunchMode::Page,
        },
        form_id: args.form_id,
        url: args.url,
    };

    let mut app = App::new(config, keystore, recents, launch, view, provider);
    app.startup();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {e}");
    }

    emit_results(&app)?;

    Ok(())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    let mut boundary = RenderBoundary::new();
    loop {
        terminal.draw(|frame| boundary.draw(frame, |f| ui::render(f, app)))?;

        // Poll for events with timeout so worker results apply promptly
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if handlers::handle_key(app, key) {
                    break;
                }
            }
        }

        app.drain_events();
        app.tick();

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

/// After terminal teardown, hand results to the invoker on stdout: the
/// entry selected for a form, or the vault path picked during setup.
fn emit_results(app: &App) -> Result<()> {
    if let Some(ref fill) = app.form_fill {
        let payload = serde_json::json!({
            "formID": fill.form_id,
            "entry": fill.entry,
        });
        println!("{payload}");
    }
    if let Some(ref path) = app.chosen_vault_path {
        println!("{path}");
    }
    Ok(())
}
