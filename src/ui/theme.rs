//! Colour palette and text styles used across the UI.

use ratatui::style::{Color, Modifier, Style};

/// Central theme; change colours here and they propagate everywhere.
pub struct Theme;

impl Theme {
    // ── tree view ──────────────────────────────────────────────
    pub fn deck_style() -> Style {
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD)
    }

    pub fn parent_style() -> Style {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    }

    pub fn leaf_style() -> Style {
        Style::default().fg(Color::White)
    }

    pub fn type_style() -> Style {
        Style::default().fg(Color::DarkGray)
    }

    pub fn state_style() -> Style {
        Style::default().fg(Color::Yellow)
    }

    pub fn drag_style() -> Style {
        Style::default()
            .fg(Color::Magenta)
            .add_modifier(Modifier::ITALIC)
    }

    pub fn selected_style() -> Style {
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    }

    // ── details ────────────────────────────────────────────────
    pub fn label_style() -> Style {
        Style::default().fg(Color::Gray)
    }

    pub fn value_style() -> Style {
        Style::default().fg(Color::White)
    }

    pub fn recording_style() -> Style {
        Style::default()
            .fg(Color::Red)
            .add_modifier(Modifier::BOLD)
    }

    // ── chrome ─────────────────────────────────────────────────
    pub fn border_style() -> Style {
        Style::default().fg(Color::Gray)
    }

    pub fn title_style() -> Style {
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD)
    }

    pub fn status_bar_style() -> Style {
        Style::default().bg(Color::DarkGray).fg(Color::White)
    }
}
