//! Viewer configuration: interaction mode, snapping, recording and key
//! bindings.
//!
//! Stored as a simple key-value text file at
//! `$XDG_CONFIG_HOME/labdeck/config.toml` (default `~/.config/labdeck/config.toml`).
//! Unknown keys and unparsable values are ignored and leave the default.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::core::kind::ViewMode;
use crate::core::snapping::SNAP_MARGIN;
use crate::render::raster::DEFAULT_PIXELS_PER_MM;
use crate::render::recorder::{normalize_frame_interval, DEFAULT_FRAME_DELAY_MS, DEFAULT_FRAME_INTERVAL};

// ───────────────────────────────────────── actions ───────────

/// Everything a key can be bound to in the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    MoveUp,
    MoveDown,
    Expand,
    Collapse,
    JumpSiblingUp,
    JumpSiblingDown,
    DragLeft,
    DragRight,
    DragUp,
    DragDown,
    Drop,
    CancelDrag,
    Delete,
    ToggleSnapping,
    ToggleMode,
    ToggleRecording,
    IntervalUp,
    IntervalDown,
    ExportLayout,
    ExportState,
    Snapshot,
    Quit,
}

impl Action {
    /// Ordered list of all actions (used for the help line and the file).
    pub const ALL: &[Action] = &[
        Action::MoveUp,
        Action::MoveDown,
        Action::Expand,
        Action::Collapse,
        Action::JumpSiblingUp,
        Action::JumpSiblingDown,
        Action::DragLeft,
        Action::DragRight,
        Action::DragUp,
        Action::DragDown,
        Action::Drop,
        Action::CancelDrag,
        Action::Delete,
        Action::ToggleSnapping,
        Action::ToggleMode,
        Action::ToggleRecording,
        Action::IntervalUp,
        Action::IntervalDown,
        Action::ExportLayout,
        Action::ExportState,
        Action::Snapshot,
        Action::Quit,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Action::MoveUp => "Move Up",
            Action::MoveDown => "Move Down",
            Action::Expand => "Expand",
            Action::Collapse => "Collapse / Parent",
            Action::JumpSiblingUp => "Prev Sibling",
            Action::JumpSiblingDown => "Next Sibling",
            Action::DragLeft => "Drag Left",
            Action::DragRight => "Drag Right",
            Action::DragUp => "Drag Back",
            Action::DragDown => "Drag Front",
            Action::Drop => "Drop",
            Action::CancelDrag => "Cancel Drag",
            Action::Delete => "Delete",
            Action::ToggleSnapping => "Snapping",
            Action::ToggleMode => "Mode",
            Action::ToggleRecording => "Record",
            Action::IntervalUp => "Interval +",
            Action::IntervalDown => "Interval -",
            Action::ExportLayout => "Export Layout",
            Action::ExportState => "Export State",
            Action::Snapshot => "Snapshot",
            Action::Quit => "Quit",
        }
    }

    /// Key used in the config file, after the `bind.` prefix.
    fn config_key(self) -> &'static str {
        match self {
            Action::MoveUp => "move_up",
            Action::MoveDown => "move_down",
            Action::Expand => "expand",
            Action::Collapse => "collapse",
            Action::JumpSiblingUp => "jump_sibling_up",
            Action::JumpSiblingDown => "jump_sibling_down",
            Action::DragLeft => "drag_left",
            Action::DragRight => "drag_right",
            Action::DragUp => "drag_up",
            Action::DragDown => "drag_down",
            Action::Drop => "drop",
            Action::CancelDrag => "cancel_drag",
            Action::Delete => "delete",
            Action::ToggleSnapping => "toggle_snapping",
            Action::ToggleMode => "toggle_mode",
            Action::ToggleRecording => "toggle_recording",
            Action::IntervalUp => "interval_up",
            Action::IntervalDown => "interval_down",
            Action::ExportLayout => "export_layout",
            Action::ExportState => "export_state",
            Action::Snapshot => "snapshot",
            Action::Quit => "quit",
        }
    }

    fn from_config_key(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| a.config_key() == s)
    }
}

// ───────────────────────────────────────── key bind ──────────

/// A single key binding: key code plus modifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyBind {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyBind {
    pub fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }

    /// Only CTRL/ALT/SHIFT are compared; platform modifiers are ignored.
    pub fn matches(&self, event: KeyEvent) -> bool {
        let mask = KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SHIFT;
        self.code == event.code && (self.modifiers & mask) == (event.modifiers & mask)
    }

    /// Status-bar form (`"Shift+←"`, `"q"`).
    pub fn display(&self) -> String {
        self.render(true)
    }

    /// Config-file form (`"Shift+Left"`, `"q"`).
    fn to_config_string(&self) -> String {
        self.render(false)
    }

    fn render(&self, pretty: bool) -> String {
        let mut s = String::new();
        for (flag, prefix) in [
            (KeyModifiers::CONTROL, "Ctrl+"),
            (KeyModifiers::ALT, "Alt+"),
            (KeyModifiers::SHIFT, "Shift+"),
        ] {
            if self.modifiers.contains(flag) {
                s.push_str(prefix);
            }
        }
        let key = match (self.code, pretty) {
            (KeyCode::Char(' '), _) => "Space".to_string(),
            (KeyCode::Char('+'), false) => "Plus".to_string(),
            (KeyCode::Char(c), _) => c.to_string(),
            (KeyCode::Up, true) => "↑".into(),
            (KeyCode::Down, true) => "↓".into(),
            (KeyCode::Left, true) => "←".into(),
            (KeyCode::Right, true) => "→".into(),
            (KeyCode::Up, false) => "Up".into(),
            (KeyCode::Down, false) => "Down".into(),
            (KeyCode::Left, false) => "Left".into(),
            (KeyCode::Right, false) => "Right".into(),
            (KeyCode::Enter, _) => "Enter".into(),
            (KeyCode::Esc, _) => "Esc".into(),
            (KeyCode::Tab, _) => "Tab".into(),
            (KeyCode::Backspace, _) => "Backspace".into(),
            (KeyCode::Delete, true) => "Del".into(),
            (KeyCode::Delete, false) => "Delete".into(),
            (KeyCode::Home, _) => "Home".into(),
            (KeyCode::End, _) => "End".into(),
            (KeyCode::PageUp, _) => "PageUp".into(),
            (KeyCode::PageDown, _) => "PageDown".into(),
            (KeyCode::F(n), _) => format!("F{n}"),
            (other, _) => format!("{other:?}"),
        };
        s.push_str(&key);
        s
    }

    /// Parse a key string like `"Ctrl+c"`, `"Shift+Up"`, `"q"`, `"Plus"`.
    fn parse(s: &str) -> Option<Self> {
        let mut modifiers = KeyModifiers::NONE;
        let parts: Vec<&str> = s.split('+').collect();
        let (key_part, mods) = parts.split_last()?;

        for part in mods {
            match part.to_lowercase().as_str() {
                "ctrl" => modifiers |= KeyModifiers::CONTROL,
                "alt" => modifiers |= KeyModifiers::ALT,
                "shift" => modifiers |= KeyModifiers::SHIFT,
                _ => return None,
            }
        }

        let code = match key_part.to_lowercase().as_str() {
            "up" => KeyCode::Up,
            "down" => KeyCode::Down,
            "left" => KeyCode::Left,
            "right" => KeyCode::Right,
            "enter" | "return" => KeyCode::Enter,
            "esc" | "escape" => KeyCode::Esc,
            "tab" => KeyCode::Tab,
            "backspace" | "bksp" => KeyCode::Backspace,
            "delete" | "del" => KeyCode::Delete,
            "home" => KeyCode::Home,
            "end" => KeyCode::End,
            "pageup" | "pgup" => KeyCode::PageUp,
            "pagedown" | "pgdn" => KeyCode::PageDown,
            "space" => KeyCode::Char(' '),
            "plus" => KeyCode::Char('+'),
            k if k.starts_with('f') && k.len() > 1 => KeyCode::F(k[1..].parse().ok()?),
            _ if key_part.chars().count() == 1 => KeyCode::Char(key_part.chars().next()?),
            _ => return None,
        };

        Some(KeyBind { code, modifiers })
    }
}

// ───────────────────────────────────────── config ────────────

#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub mode: ViewMode,
    pub snapping: bool,
    /// Guide-line tolerance in deck millimetres.
    pub snap_margin: f64,
    /// Capture a frame every this many updates while recording.
    pub frame_interval: u32,
    pub frame_delay_ms: u32,
    /// Raster scale for snapshots and GIF frames.
    pub pixels_per_mm: f64,
    pub bindings: HashMap<Action, Vec<KeyBind>>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            mode: ViewMode::Visualizer,
            snapping: true,
            snap_margin: SNAP_MARGIN,
            frame_interval: DEFAULT_FRAME_INTERVAL,
            frame_delay_ms: DEFAULT_FRAME_DELAY_MS,
            pixels_per_mm: DEFAULT_PIXELS_PER_MM,
            bindings: Self::default_bindings(),
        }
    }
}

impl ViewerConfig {
    pub fn default_bindings() -> HashMap<Action, Vec<KeyBind>> {
        use Action::*;
        use KeyCode::*;
        let n = KeyModifiers::NONE;
        let alt = KeyModifiers::ALT;
        let shift = KeyModifiers::SHIFT;
        let mut m = HashMap::new();

        m.insert(MoveUp, vec![KeyBind::new(Up, n), KeyBind::new(Char('k'), n)]);
        m.insert(MoveDown, vec![KeyBind::new(Down, n), KeyBind::new(Char('j'), n)]);
        m.insert(Expand, vec![KeyBind::new(Right, n), KeyBind::new(Char('l'), n)]);
        m.insert(Collapse, vec![KeyBind::new(Left, n), KeyBind::new(Char('h'), n)]);
        m.insert(JumpSiblingUp, vec![KeyBind::new(Up, alt)]);
        m.insert(JumpSiblingDown, vec![KeyBind::new(Down, alt)]);
        m.insert(DragLeft, vec![KeyBind::new(Left, shift), KeyBind::new(Char('H'), shift)]);
        m.insert(DragRight, vec![KeyBind::new(Right, shift), KeyBind::new(Char('L'), shift)]);
        m.insert(DragUp, vec![KeyBind::new(Up, shift), KeyBind::new(Char('K'), shift)]);
        m.insert(DragDown, vec![KeyBind::new(Down, shift), KeyBind::new(Char('J'), shift)]);
        m.insert(Action::Drop, vec![KeyBind::new(Enter, n)]);
        m.insert(CancelDrag, vec![KeyBind::new(Esc, n)]);
        m.insert(Action::Delete, vec![KeyBind::new(KeyCode::Delete, n), KeyBind::new(Char('d'), n)]);
        m.insert(ToggleSnapping, vec![KeyBind::new(Char('s'), n)]);
        m.insert(ToggleMode, vec![KeyBind::new(Char('m'), n)]);
        m.insert(ToggleRecording, vec![KeyBind::new(Char('r'), n)]);
        m.insert(IntervalUp, vec![KeyBind::new(Char('+'), n), KeyBind::new(Char('='), n)]);
        m.insert(IntervalDown, vec![KeyBind::new(Char('-'), n)]);
        m.insert(ExportLayout, vec![KeyBind::new(Char('e'), n)]);
        m.insert(ExportState, vec![KeyBind::new(Char('E'), shift)]);
        m.insert(Snapshot, vec![KeyBind::new(Char('p'), n)]);
        m.insert(Quit, vec![KeyBind::new(Char('q'), n), KeyBind::new(Char('c'), KeyModifiers::CONTROL)]);

        m
    }

    /// Action bound to a key event.  When several bindings match, the one
    /// with the most modifiers wins.
    pub fn match_key(&self, event: KeyEvent) -> Option<Action> {
        let mut best: Option<(Action, u32)> = None;
        for (&action, binds) in &self.bindings {
            for bind in binds.iter().filter(|b| b.matches(event)) {
                let mc = bind.modifiers.bits().count_ones();
                if best.map_or(true, |(_, m)| mc > m) {
                    best = Some((action, mc));
                }
            }
        }
        best.map(|(a, _)| a)
    }

    fn short_binding(&self, action: Action) -> String {
        match self.bindings.get(&action) {
            Some(binds) if !binds.is_empty() => binds[0].display(),
            _ => "?".into(),
        }
    }

    /// Status-bar hint built from the current bindings.
    pub fn status_bar_hint(&self) -> String {
        [
            Action::MoveUp,
            Action::DragLeft,
            Action::Drop,
            Action::Delete,
            Action::ToggleSnapping,
            Action::ToggleMode,
            Action::ToggleRecording,
            Action::ExportLayout,
            Action::Quit,
        ]
        .iter()
        .map(|&a| format!("{}: {}", self.short_binding(a), a.label().to_lowercase()))
        .collect::<Vec<_>>()
        .join(" | ")
    }

    // ── persistence ─────────────────────────────────────────────

    /// Load config from the default location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents),
            Err(_) => Self::default(),
        }
    }

    /// Persist the toggles changed from the viewer (snapping, frame
    /// interval) into the default config file.
    pub fn save_preferences(&self) -> anyhow::Result<()> {
        self.save_preferences_to(&config_path())
    }

    /// Merge the viewer toggles into whatever is stored at `path`, leaving
    /// every other entry as the file had it.
    pub fn save_preferences_to(&self, path: &Path) -> anyhow::Result<()> {
        let mut stored = Self::load_from(path);
        stored.snapping = self.snapping;
        stored.frame_interval = self.frame_interval;
        stored.save_to(path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.serialise())?;
        tracing::debug!("saved config to {}", path.display());
        Ok(())
    }

    pub fn parse(s: &str) -> Self {
        let mut cfg = Self::default();

        for line in s.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('[') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim().trim_matches('"');

            match key {
                "mode" => {
                    if let Some(mode) = ViewMode::parse(value) {
                        cfg.mode = mode;
                    }
                }
                "snapping" => cfg.snapping = value == "true",
                "snap_margin" => {
                    if let Ok(v) = value.parse::<f64>() {
                        if v.is_finite() && v >= 0.0 {
                            cfg.snap_margin = v;
                        }
                    }
                }
                "frame_interval" => {
                    if let Ok(v) = value.parse::<u32>() {
                        cfg.frame_interval = normalize_frame_interval(v);
                    }
                }
                "frame_delay_ms" => {
                    if let Ok(v) = value.parse::<u32>() {
                        cfg.frame_delay_ms = v.clamp(1, 10_000);
                    }
                }
                "pixels_per_mm" => {
                    if let Ok(v) = value.parse::<f64>() {
                        if v.is_finite() && v > 0.0 {
                            cfg.pixels_per_mm = v;
                        }
                    }
                }
                _ => {
                    let Some(action) = key.strip_prefix("bind.").and_then(Action::from_config_key) else {
                        continue;
                    };
                    let parsed: Vec<KeyBind> = value
                        .split(',')
                        .filter_map(|part| KeyBind::parse(part.trim().trim_matches('"')))
                        .collect();
                    if !parsed.is_empty() {
                        cfg.bindings.insert(action, parsed);
                    }
                }
            }
        }

        cfg
    }

    fn serialise(&self) -> String {
        let mut lines = vec![
            "# labdeck configuration".to_string(),
            String::new(),
            format!("mode = {}", self.mode.label()),
            format!("snapping = {}", self.snapping),
            format!("snap_margin = {}", self.snap_margin),
            format!("frame_interval = {}", self.frame_interval),
            format!("frame_delay_ms = {}", self.frame_delay_ms),
            format!("pixels_per_mm = {}", self.pixels_per_mm),
            String::new(),
            "# Key bindings".to_string(),
            "# Format: bind.action = Key1, Key2, ...".to_string(),
            "# Modifiers: Ctrl+, Alt+, Shift+ (prefix)".to_string(),
            String::new(),
        ];

        for &action in Action::ALL {
            if let Some(binds) = self.bindings.get(&action) {
                let keys: Vec<String> = binds.iter().map(|b| b.to_config_string()).collect();
                lines.push(format!("bind.{} = {}", action.config_key(), keys.join(", ")));
            }
        }
        lines.push(String::new());
        lines.join("\n")
    }
}

/// `$XDG_CONFIG_HOME/labdeck/config.toml`.
fn config_path() -> PathBuf {
    let config_dir = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
            PathBuf::from(home).join(".config")
        });
    config_dir.join("labdeck").join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_values_fall_back_to_defaults() {
        let cfg = ViewerConfig::parse(
            "mode = gui\nsnapping = false\nsnap_margin = -2\nframe_interval = 13\n\
             pixels_per_mm = abc\nunknown = 1\nbind.quit = x, Ctrl+q\nbind.nope = z\n",
        );
        assert_eq!(cfg.mode, ViewMode::Gui);
        assert!(!cfg.snapping);
        assert_eq!(cfg.snap_margin, SNAP_MARGIN);
        assert_eq!(cfg.frame_interval, 16);
        assert_eq!(cfg.pixels_per_mm, DEFAULT_PIXELS_PER_MM);
        let quit = &cfg.bindings[&Action::Quit];
        assert_eq!(quit[0], KeyBind::new(KeyCode::Char('x'), KeyModifiers::NONE));
        assert_eq!(quit[1], KeyBind::new(KeyCode::Char('q'), KeyModifiers::CONTROL));
    }

    #[test]
    fn save_then_load_keeps_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = ViewerConfig {
            mode: ViewMode::Gui,
            snap_margin: 7.5,
            frame_interval: 24,
            ..ViewerConfig::default()
        };
        cfg.bindings
            .insert(Action::Drop, vec![KeyBind::new(KeyCode::Char(' '), KeyModifiers::NONE)]);
        cfg.save_to(&path).unwrap();

        let back = ViewerConfig::load_from(&path);
        assert_eq!(back.mode, ViewMode::Gui);
        assert_eq!(back.snap_margin, 7.5);
        assert_eq!(back.frame_interval, 24);
        assert_eq!(back.bindings, cfg.bindings);
    }

    #[test]
    fn preferences_merge_into_stored_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "mode = gui\nsnap_margin = 9\n").unwrap();

        // Session overrides such as the mode are not written back.
        let live = ViewerConfig {
            mode: ViewMode::Visualizer,
            snapping: false,
            frame_interval: 40,
            ..ViewerConfig::default()
        };
        live.save_preferences_to(&path).unwrap();

        let back = ViewerConfig::load_from(&path);
        assert_eq!(back.mode, ViewMode::Gui);
        assert_eq!(back.snap_margin, 9.0);
        assert!(!back.snapping);
        assert_eq!(back.frame_interval, 40);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let cfg = ViewerConfig::load_from(Path::new("/definitely/not/here.toml"));
        assert!(cfg.snapping);
        assert_eq!(cfg.frame_interval, DEFAULT_FRAME_INTERVAL);
    }

    #[test]
    fn modifier_count_breaks_ties() {
        let cfg = ViewerConfig::default();
        let plain = KeyEvent::new(KeyCode::Left, KeyModifiers::NONE);
        let shifted = KeyEvent::new(KeyCode::Left, KeyModifiers::SHIFT);
        assert_eq!(cfg.match_key(plain), Some(Action::Collapse));
        assert_eq!(cfg.match_key(shifted), Some(Action::DragLeft));
        assert_eq!(cfg.match_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)), Some(Action::Quit));
    }
}
