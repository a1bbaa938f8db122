//! UI layer: everything that touches Ratatui widgets.
//!
//! Takes the session's tree and rasterized scene and turns them into cells
//! on the terminal.  No file I/O happens here.

pub mod layout;
pub mod preview;
pub mod theme;
pub mod tree_widget;
