//! Error handling for tgam-link
//!
//! This module defines the crate-level error type and a Result alias.
//! Recoverable protocol errors live in [`crate::protocol::error`] and are
//! wrapped here only when they need to cross an API boundary.

use crate::protocol::{DroppedFrame, FrameError, PayloadError};
use std::time::Duration;
use thiserror::Error;

/// Main error type for tgam-link operations
#[derive(Error, Debug)]
pub enum TgamError {
    /// A framing attempt failed
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// A validated payload could not be decoded
    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),

    /// Reading from the byte source failed; fatal to the session
    #[error("Link read failure: {0}")]
    LinkRead(#[source] std::io::Error),

    /// A sink could not store a sample
    #[error("Sink '{sink}' write failure: {message}")]
    SinkWrite { sink: String, message: String },

    /// A sink's queue stayed full longer than the allowed wait
    #[error("Sink '{sink}' backpressure: queue full after {waited:?}")]
    Backpressure { sink: String, waited: Duration },

    /// A sink's consumer has gone away
    #[error("Sink '{0}' closed")]
    SinkClosed(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<TgamError>,
    },
}

impl TgamError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        TgamError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a sink write error
    pub fn sink_write(sink: impl Into<String>, message: impl std::fmt::Display) -> Self {
        TgamError::SinkWrite {
            sink: sink.into(),
            message: message.to_string(),
        }
    }

    /// Name of the sink this error came from, if any.
    pub fn sink_name(&self) -> Option<&str> {
        match self {
            TgamError::SinkWrite { sink, .. } | TgamError::Backpressure { sink, .. } => Some(sink),
            TgamError::SinkClosed(sink) => Some(sink),
            TgamError::WithContext { source, .. } => source.sink_name(),
            _ => None,
        }
    }
}

impl From<DroppedFrame> for TgamError {
    fn from(drop: DroppedFrame) -> Self {
        match drop {
            DroppedFrame::Frame(e) => TgamError::Frame(e),
            DroppedFrame::Payload(e) => TgamError::Payload(e),
        }
    }
}

/// Result type alias for tgam-link operations
pub type Result<T> = std::result::Result<T, TgamError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| TgamError::Io(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| TgamError::Io(e).with_context(f()))
    }
}
