//! Core model: the resource tree, its JSON form, snapping and state updates.
//!
//! Nothing in this module depends on any TUI or rendering crate.

pub mod container;
pub mod deck;
pub mod error;
pub mod geometry;
pub mod kind;
pub mod serialize;
pub mod snapping;
pub mod tree;
pub mod update;
