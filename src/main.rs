//! Terminal viewer for liquid-handling deck layouts.
//!
//! Loads a serialized resource tree, follows a stream of state updates and
//! can export the layout, the state, a PNG snapshot or a GIF of the run.
//! `--headless` does all of that without a terminal UI.

use std::io::{self, stderr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Terminal,
};
use tokio::sync::mpsc;

use labdeck::app::{
    event::{spawn_event_reader, spawn_update_reader, AppEvent, UpdateEvent, UpdateSource},
    handler,
    session::Session,
    state::{AppState, GifProgress, OutputPaths},
};
use labdeck::config::ViewerConfig;
use labdeck::core::kind::ViewMode;
use labdeck::render::recorder::{start_finalize, FinalizeUpdate};
use labdeck::ui::{
    layout::AppLayout,
    preview::{detail_lines, PreviewWidget},
    theme::Theme,
    tree_widget::{visible_rows, ResourceTreeWidget},
};

// ───────────────────────────────────────── CLI ───────────────

#[derive(Parser, Debug)]
#[command(name = env!("CARGO_PKG_NAME"), about = "Deck layout viewer and recorder")]
struct Cli {
    /// Serialized resource tree (JSON) to open.
    layout: PathBuf,

    /// JSON-lines file of state-update batches, or `-` for stdin.
    #[arg(long, value_name = "FILE")]
    updates: Option<String>,

    /// Write the full layout here (on exit in headless mode, on `e` otherwise).
    #[arg(long, value_name = "FILE")]
    export_layout: Option<PathBuf>,

    /// Write the state-only export here.
    #[arg(long, value_name = "FILE")]
    export_state: Option<PathBuf>,

    /// Record the run into this GIF.
    #[arg(long, value_name = "FILE")]
    gif: Option<PathBuf>,

    /// Write a PNG snapshot of the deck here.
    #[arg(long, value_name = "FILE")]
    png: Option<PathBuf>,

    /// Capture a GIF frame every N updates (rounded to a multiple of 8).
    #[arg(long, value_name = "N")]
    frame_interval: Option<u32>,

    /// Start in GUI mode (resources can be dragged and deleted).
    #[arg(long)]
    gui: bool,

    /// Disable snapping and guide lines.
    #[arg(long)]
    no_snapping: bool,

    /// Process updates and write outputs without a terminal UI.
    #[arg(long)]
    headless: bool,
}

impl Cli {
    fn viewer_config(&self) -> ViewerConfig {
        let mut config = ViewerConfig::load();
        if self.gui {
            config.mode = ViewMode::Gui;
        }
        if self.no_snapping {
            config.snapping = false;
        }
        if let Some(n) = self.frame_interval {
            config.frame_interval = n;
        }
        config
    }
}

fn default_gif_path() -> PathBuf {
    PathBuf::from(chrono::Local::now().format("protocol-%Y%m%d-%H%M%S.gif").to_string())
}

fn write_json(path: &Path, value: &impl serde::Serialize) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

// ───────────────────────────────────────── headless ──────────

async fn run_headless(cli: &Cli, mut session: Session, config: &ViewerConfig) -> Result<()> {
    if cli.gif.is_some() {
        session.start_recording();
    }

    if let Some(arg) = &cli.updates {
        let mut updates = spawn_update_reader(UpdateSource::from_arg(arg));
        while let Some(event) = updates.recv().await {
            match event {
                UpdateEvent::Batch(batch) => {
                    let report = session.apply_state(&batch);
                    for err in &report.rejected {
                        tracing::warn!("update rejected: {err}");
                    }
                }
                UpdateEvent::Malformed { line, error } => {
                    tracing::warn!("update line {line} ignored: {error}");
                }
                UpdateEvent::Closed => break,
            }
        }
    }

    if let Some(path) = &cli.gif {
        let frames = session.stop_recording();
        let (tx, mut rx) = mpsc::unbounded_channel();
        start_finalize(frames, config.frame_delay_ms, path.clone(), tx);
        while let Some(update) = rx.recv().await {
            if let FinalizeUpdate::Done(outcome) = update {
                outcome.with_context(|| format!("encoding {}", path.display()))?;
                break;
            }
        }
    }

    if let Some(path) = &cli.export_layout {
        let layout = session.export_layout().context("layout is empty")?;
        write_json(path, &layout)?;
    }
    if let Some(path) = &cli.export_state {
        write_json(path, &session.export_state())?;
    }
    if let Some(path) = &cli.png {
        session
            .save_png(path)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

// ───────────────────────────────────────── terminal UI ───────

fn status_line(state: &AppState) -> Line<'static> {
    let mut spans = Vec::new();
    let recorder = state.session.recorder();
    if recorder.is_recording() {
        spans.push(Span::styled(
            format!(" ● REC {} ", recorder.frame_count()),
            Theme::recording_style(),
        ));
    }
    if let Some(gif) = &state.gif {
        spans.push(Span::styled(
            format!(" GIF {:.0}% ", gif.fraction * 100.0),
            Theme::recording_style(),
        ));
    }
    let text = match &state.status_message {
        Some(msg) => msg.clone(),
        None => state.config.status_bar_hint(),
    };
    spans.push(Span::raw(format!(" {text}")));
    Line::from(spans)
}

async fn run_tui(cli: &Cli, session: Session, config: ViewerConfig) -> Result<()> {
    let outputs = OutputPaths {
        layout: cli.export_layout.clone().unwrap_or_else(|| PathBuf::from("layout.json")),
        state: cli.export_state.clone().unwrap_or_else(|| PathBuf::from("state.json")),
        png: cli.png.clone().unwrap_or_else(|| PathBuf::from("deck.png")),
        gif: cli.gif.clone().unwrap_or_else(default_gif_path),
    };
    let mut state = AppState::new(session, config, outputs);
    if cli.gif.is_some() {
        state.session.start_recording();
    }

    // ── terminal setup ────────────────────────────────────────
    enable_raw_mode()?;
    execute!(stderr(), EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stderr());
    let mut terminal = Terminal::new(backend)?;

    // ── async channels ────────────────────────────────────────
    let mut events = spawn_event_reader(Duration::from_millis(100));
    let mut updates = match &cli.updates {
        Some(arg) => {
            state.updates_open = true;
            spawn_update_reader(UpdateSource::from_arg(arg))
        }
        None => mpsc::unbounded_channel().1,
    };
    let (gif_tx, mut gif_rx) = mpsc::unbounded_channel::<FinalizeUpdate>();

    // ── event loop ────────────────────────────────────────────
    loop {
        if let Some(frames) = state.pending_gif.take() {
            let path = cli.gif.clone().unwrap_or_else(default_gif_path);
            state.outputs.gif = path.clone();
            let job = start_finalize(frames, state.config.frame_delay_ms, path, gif_tx.clone());
            state.gif = Some(GifProgress { job, fraction: 0.0 });
        }
        if state.preview.is_none() {
            state.preview = Some(state.session.render_frame());
        }

        terminal.draw(|frame| {
            let layout = AppLayout::from_area(frame.area());
            let tree = state.session.tree();
            let root_name = tree.root().map(|r| tree.name_of(r).to_string()).unwrap_or_default();

            let tree_block = Block::default()
                .title(format!(" {root_name} · {} ", state.session.mode().label()))
                .title_style(Theme::title_style())
                .borders(Borders::ALL)
                .border_style(Theme::border_style());
            let tree_widget = ResourceTreeWidget::new(tree, &state.expanded)
                .dragging(state.drag.as_ref().map(|d| d.node))
                .block(tree_block);
            frame.render_stateful_widget(tree_widget, layout.tree_area, &mut state.tree_state);

            let details = visible_rows(tree, &state.expanded)
                .get(state.tree_state.selected)
                .map(|row| detail_lines(tree, row.node))
                .unwrap_or_default();
            let snapping = if state.session.snapping() { "snap on" } else { "snap off" };
            let preview_block = Block::default()
                .title(format!(" preview · {snapping} "))
                .title_style(Theme::title_style())
                .borders(Borders::ALL)
                .border_style(Theme::border_style());
            let preview = PreviewWidget::new(state.preview.as_ref())
                .details(details)
                .block(preview_block);
            frame.render_widget(preview, layout.preview_area);

            let status = Paragraph::new(status_line(&state)).style(Theme::status_bar_style());
            frame.render_widget(status, layout.status_area);
        })?;

        tokio::select! {
            biased;

            Some(event) = events.recv() => {
                match event {
                    AppEvent::Key(k) => handler::handle_key(&mut state, k),
                    AppEvent::Resize(_, _) | AppEvent::Tick => {}
                }
            }

            Some(update) = gif_rx.recv() => handler::handle_finalize(&mut state, update),

            Some(event) = updates.recv() => {
                handler::handle_update(&mut state, event);
                // Apply everything already queued before the next redraw.
                while let Ok(event) = updates.try_recv() {
                    handler::handle_update(&mut state, event);
                }
            }
        }

        if state.should_quit {
            break;
        }
    }

    // ── teardown ──────────────────────────────────────────────
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if state.config_dirty {
        if let Err(e) = state.config.save_preferences() {
            tracing::warn!("could not save preferences: {e:#}");
        }
    }

    // A recording still running on exit is written out before returning.
    if state.session.recorder().is_recording() {
        let frames = state.session.stop_recording();
        let path = state.outputs.gif.clone();
        let (tx, mut rx) = mpsc::unbounded_channel();
        start_finalize(frames, state.config.frame_delay_ms, path.clone(), tx);
        while let Some(update) = rx.recv().await {
            if let FinalizeUpdate::Done(outcome) = update {
                outcome.with_context(|| format!("encoding {}", path.display()))?;
                eprintln!("GIF written to {}", path.display());
                break;
            }
        }
    }

    Ok(())
}

// ───────────────────────────────────────── main ─────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr) // stdout may carry exports
        .init();

    let cli = Cli::parse();
    if cli.updates.as_deref() == Some("-") && !cli.headless {
        bail!("reading updates from stdin requires --headless (the terminal UI owns stdin)");
    }

    let config = cli.viewer_config();
    let json = std::fs::read_to_string(&cli.layout)
        .with_context(|| format!("reading {}", cli.layout.display()))?;
    let mut session = Session::new(&config);
    session
        .load_json(&json)
        .with_context(|| format!("loading {}", cli.layout.display()))?;
    tracing::info!("loaded {} resources from {}", session.tree().len(), cli.layout.display());

    if cli.headless {
        run_headless(&cli, session, &config).await
    } else {
        run_tui(&cli, session, config).await
    }
}
