//! Error types for the resource tree and its operations.
//!
//! Every operation that returns one of these errors has left the tree exactly
//! as it found it.

use thiserror::Error;

/// Structural tree errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TreeError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("invalid reparent: cannot assign {child} to {parent}")]
    InvalidReparent { child: String, parent: String },

    #[error("duplicate resource name: {0}")]
    DuplicateName(String),

    #[error("{name} cannot be {action} in the current mode")]
    NotPermitted { name: String, action: &'static str },
}

/// Liquid bookkeeping errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VolumeError {
    #[error("insufficient volume: requested {requested}uL, {available}uL available")]
    InsufficientVolume { requested: f64, available: f64 },

    #[error("capacity exceeded: {requested}uL would exceed {capacity}uL")]
    CapacityExceeded { requested: f64, capacity: f64 },

    #[error("invalid volume: {0}")]
    InvalidVolume(f64),

    #[error("{0} does not hold liquid")]
    NotAContainer(String),
}

/// Errors raised while materializing a hardware description.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid field `{field}` on {resource}: {source}")]
    Field {
        resource: String,
        field: &'static str,
        source: serde_json::Error,
    },

    #[error("invalid liquids on {resource}: {source}")]
    Volume {
        resource: String,
        source: VolumeError,
    },

    #[error("duplicate resource name: {0}")]
    DuplicateName(String),

    #[error("parent not found: {0}")]
    ParentNotFound(String),

    #[error("tree already has a root ({0}); a parentless resource cannot be added")]
    RootExists(String),

    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Rejection of a single state-update entry.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UpdateError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("{0} carries no updatable state")]
    NotStateful(String),

    #[error("malformed state for {name}: {reason}")]
    Malformed { name: String, reason: String },

    #[error("{name}: {source}")]
    Volume { name: String, source: VolumeError },
}
