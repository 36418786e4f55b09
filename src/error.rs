//! Error taxonomy for rendering sessions.

use std::time::Duration;

use crate::session::SessionState;

/// Everything that can end a playback session.
///
/// None of these are recovered locally. A missed real-time deadline cannot be
/// corrected after the fact, so every variant is terminal for the session that
/// produced it.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// The device offered no format or buffer layout the renderer can drive.
    #[error("format negotiation failed: {0}")]
    Negotiation(String),

    /// A device call failed (start, stop, capacity query, window request or commit).
    #[error("audio backend error: {0}")]
    Backend(String),

    /// Buffer memory could not be reserved.
    #[error("buffer allocation failed: {0}")]
    Allocation(String),

    /// The device stopped signalling capacity within the bounded wait.
    #[error("audio device did not signal capacity within {0:?}")]
    Timeout(Duration),

    /// Session parameters were rejected before any device call.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An operation was attempted in a lifecycle state that does not allow it.
    #[error("operation not allowed in session state {0:?}")]
    InvalidState(SessionState),
}

impl From<std::collections::TryReserveError> for RenderError {
    fn from(err: std::collections::TryReserveError) -> Self {
        RenderError::Allocation(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RenderError>;
