//! Station error taxonomy.
//!
//! Three error classes cover the whole run lifecycle:
//! - `Connection` - a link is unreachable or a command failed in transit;
//!   carries the failing link name(s) and the configuration values in effect.
//! - `Operation` - a command executed but the result is out of tolerance
//!   (e.g. temperature verification exhausted its retries).
//! - `Validation` - a configuration constraint was violated at construction.
//!
//! `Cancelled` is the cooperative-cancellation signal: cleanup paths swallow
//! every other error but always let `Cancelled` propagate. Safety violations
//! are modeled as data ([`crate::safety::SafetyAlert`]), never as errors.

use std::fmt;
use thiserror::Error;

use crate::links::LinkName;

/// Ordered key/value pairs attached to an error for diagnostics.
///
/// Keeps insertion order so log lines read in the order the
/// sequence recorded them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorContext(Vec<(&'static str, String)>);

impl ErrorContext {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a key/value entry, builder style.
    pub fn with(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.0.push((key, value.to_string()));
        self
    }

    pub fn entries(&self) -> &[(&'static str, String)] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge another context after this one's entries.
    pub fn merged(mut self, other: &ErrorContext) -> Self {
        self.0.extend(other.0.iter().cloned());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (key, value)) in self.0.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

/// Error type for station orchestration and safety operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StationError {
    /// Link unreachable, boot timeout, or communication failure mid-sequence.
    #[error("connection failure: {message} (links: {links:?}; {context})")]
    Connection {
        message: String,
        /// Links involved in the failure (empty when not link-specific).
        links: Vec<LinkName>,
        /// Configuration values in effect when the failure occurred.
        context: ErrorContext,
    },

    /// Command executed but the result is out of tolerance.
    #[error("operation failure: {message} ({context})")]
    Operation {
        message: String,
        context: ErrorContext,
    },

    /// A configuration constraint was violated at construction.
    #[error("validation failure: {field} = {value}: {constraint}")]
    Validation {
        field: &'static str,
        value: String,
        constraint: String,
    },

    /// Cooperative cancellation — propagates even through cleanup paths.
    #[error("operation cancelled")]
    Cancelled,
}

impl StationError {
    /// Connection-class error for a single link.
    pub fn link(link: LinkName, message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            links: vec![link],
            context: ErrorContext::new(),
        }
    }

    /// Connection-class error for several links at once.
    pub fn links(links: Vec<LinkName>, message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            links,
            context: ErrorContext::new(),
        }
    }

    /// Operation-class error with context.
    pub fn operation(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Operation {
            message: message.into(),
            context,
        }
    }

    /// Validation-class error naming the offending field.
    pub fn validation(
        field: &'static str,
        value: impl fmt::Display,
        constraint: impl Into<String>,
    ) -> Self {
        Self::Validation {
            field,
            value: value.to_string(),
            constraint: constraint.into(),
        }
    }

    /// Append context entries to `Connection`/`Operation` variants.
    ///
    /// `Validation` and `Cancelled` pass through unchanged — sequence
    /// wrappers use this to tag errors with the values in effect without
    /// reclassifying them.
    pub fn with_context(self, extra: ErrorContext) -> Self {
        match self {
            Self::Connection {
                message,
                links,
                context,
            } => Self::Connection {
                message,
                links,
                context: context.merged(&extra),
            },
            Self::Operation { message, context } => Self::Operation {
                message,
                context: context.merged(&extra),
            },
            other => other,
        }
    }

    /// Returns true for the cooperative-cancellation signal.
    #[inline]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
