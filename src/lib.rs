//! Resource-tree model and viewer for liquid-handling deck layouts.
//!
//! [`core`] holds the typed resource tree, its JSON form, snapping and the
//! state-update protocol.  [`render`] turns the tree into draw intents,
//! rasters and GIF recordings.  [`app`] and [`ui`] drive the terminal viewer.

pub mod app;
pub mod config;
pub mod core;
pub mod render;
pub mod ui;
