//! Central application state for the terminal viewer.
//!
//! All mutable state lives here so that the rest of the app can be pure
//! functions over `&AppState` (rendering) or `&mut AppState` (event handling).

use std::collections::HashSet;
use std::path::PathBuf;

use image::RgbaImage;

use crate::config::ViewerConfig;
use crate::core::geometry::Coordinate;
use crate::core::tree::NodeId;
use crate::render::recorder::FinalizeJob;
use crate::ui::tree_widget::TreeWidgetState;

use super::session::Session;

/// Where the export actions write to.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub layout: PathBuf,
    pub state: PathBuf,
    pub png: PathBuf,
    pub gif: PathBuf,
}

/// A keyboard drag in progress.  `origin` is the absolute position the
/// resource's lower-left corner has been moved to.
#[derive(Debug, Clone)]
pub struct DragState {
    pub node: NodeId,
    pub name: String,
    pub origin: Coordinate,
}

/// A GIF being assembled in the background.
#[derive(Debug)]
pub struct GifProgress {
    pub job: FinalizeJob,
    pub fraction: f32,
}

pub struct AppState {
    pub session: Session,
    /// Widget-level state (selection, scroll).
    pub tree_state: TreeWidgetState,
    /// Nodes whose children are shown in the tree pane.
    pub expanded: HashSet<NodeId>,
    pub config: ViewerConfig,
    /// Set when a viewer toggle changed a persisted preference.
    pub config_dirty: bool,
    pub outputs: OutputPaths,
    pub drag: Option<DragState>,
    /// Frames handed over by a stopped recording, waiting to be encoded.
    pub pending_gif: Option<Vec<RgbaImage>>,
    pub gif: Option<GifProgress>,
    /// Cached raster of the scene; `None` when it must be re-rendered.
    pub preview: Option<RgbaImage>,
    /// Controls the main event loop.
    pub should_quit: bool,
    /// An optional status message shown in the bottom bar.
    pub status_message: Option<String>,
    /// `false` once the update stream has ended.
    pub updates_open: bool,
}

impl AppState {
    pub fn new(session: Session, config: ViewerConfig, outputs: OutputPaths) -> Self {
        // Start with the root and its direct children visible.
        let expanded = session.tree().root().into_iter().collect();
        Self {
            session,
            tree_state: TreeWidgetState::default(),
            expanded,
            config,
            config_dirty: false,
            outputs,
            drag: None,
            pending_gif: None,
            gif: None,
            preview: None,
            should_quit: false,
            status_message: None,
            updates_open: false,
        }
    }

    /// Drop the cached preview so the next frame re-renders it.
    pub fn invalidate_preview(&mut self) {
        self.preview = None;
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
    }
}
