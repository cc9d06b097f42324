// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Error types for BrickFlow
//!
//! The runtime distinguishes three failure classes and never blurs them:
//!
//! - **Configuration errors** signal a corrupt or incompatible mod
//!   definition (malformed expression, unsupported sync policy, unknown
//!   API version). Fatal, never retried.
//! - **Business errors** are expected, user-facing failure conditions
//!   (a root-aware brick placed where no target element exists). Safe to
//!   surface as a message rather than a crash.
//! - **Brick failures** are whatever a brick's own logic raised. They are
//!   propagated unmodified up through the reducer, wrapped only with
//!   identifying context (brick id, instance id, step index).
//!
//! Use [`Error::category()`] to pick a handling strategy programmatically.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for BrickFlow operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error category for systematic handling and reporting.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Corrupt or incompatible mod definition. Fatal, never retried.
    Configuration,

    /// Expected, user-facing failure. Surface as a message, not a crash.
    Business,

    /// A brick's own logic failed. Context attached, cause untouched.
    BrickFault,

    /// Reading/writing synchronized variable state failed. Local
    /// (non-synchronized) state is unaffected.
    Storage,

    /// Caller violated an API contract (programming error, not user error).
    Validation,
}

impl ErrorCategory {
    /// Human-readable description of the category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCategory::Configuration => "Configuration Error (corrupt mod definition)",
            ErrorCategory::Business => "Business Error (user-facing, expected)",
            ErrorCategory::BrickFault => "Brick Failure",
            ErrorCategory::Storage => "Storage Error",
            ErrorCategory::Validation => "Contract Violation (caller bug)",
        }
    }

    /// Whether the error is safe to show to an end user as-is.
    #[must_use]
    pub fn is_user_facing(&self) -> bool {
        matches!(self, ErrorCategory::Business)
    }

    /// Whether retrying the same operation can ever succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::Storage)
    }
}

/// Core error type for BrickFlow operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed expression, unsupported strategy or policy value, unknown
    /// API version tag. Signals a corrupt mod definition.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Expected user-facing failure (e.g. root-awareness violated).
    #[error("{0}")]
    Business(String),

    /// A template failed to render. The engine name is included because
    /// the three engines have different failure behavior.
    #[error("Template error ({engine}): {message}")]
    Template {
        /// Which template engine rejected the input
        engine: &'static str,
        /// Engine-reported failure
        message: String,
    },

    /// Brick id not present in the registry.
    #[error("Brick not found: {0}")]
    BrickNotFound(String),

    /// A brick invocation failed. The underlying error is preserved via
    /// `source`; the wrapper only adds identifying context for traces.
    #[error("Brick '{brick_id}' failed at step {step_index} (instance {instance_id})")]
    BrickFailed {
        /// Registry id of the failing brick
        brick_id: String,
        /// Mod-component instance that ran the step
        instance_id: Uuid,
        /// Zero-based position in the pipeline
        step_index: usize,
        /// The brick's own error, unmodified
        #[source]
        source: Box<Error>,
    },

    /// Failure reading or writing synchronized variable state.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Caller violated an API contract (e.g. PRIVATE namespace without a
    /// component id).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Get the category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Configuration(_) | Error::Template { .. } | Error::BrickNotFound(_) => {
                ErrorCategory::Configuration
            }
            Error::Business(_) => ErrorCategory::Business,
            // The wrapper classifies by its cause so a business error thrown
            // inside a brick stays user-facing after propagation.
            Error::BrickFailed { source, .. } => match source.category() {
                ErrorCategory::Business => ErrorCategory::Business,
                _ => ErrorCategory::BrickFault,
            },
            Error::Storage(_) => ErrorCategory::Storage,
            Error::InvalidInput(_) | Error::Serialization(_) => ErrorCategory::Validation,
        }
    }

    /// Whether this error is safe to show to an end user as-is.
    #[must_use]
    pub fn is_user_facing(&self) -> bool {
        self.category().is_user_facing()
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a business error
    pub fn business<S: Into<String>>(msg: S) -> Self {
        Self::Business(msg.into())
    }

    /// Create a storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }
}
