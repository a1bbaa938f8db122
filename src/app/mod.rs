//! Application orchestration: the viewing session, terminal state, event
//! sources and input handling.

pub mod event;
pub mod handler;
pub mod session;
pub mod state;
