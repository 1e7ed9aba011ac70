// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Error types for the rendering pipeline.
//!
//! [`SsrError`] is the crate-wide error enum. Two variants deserve a note:
//!
//! - **Usage errors** ([`UsageError`]): the hook contract was misused (wrong
//!   return shape, missing `render()` hook, malformed URL). They carry an
//!   actionable message and are never retried.
//! - **Hook errors** ([`HookError`]): user code failed inside a hook or a
//!   route function. The error keeps the hook name and the file that defines
//!   it so diagnostics can point at the culprit.
//!
//! Both carry a shared "already logged" marker. Cloning the error clones the
//! marker, so an error travelling through the error-page path is printed
//! only once no matter how many places try to log it.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Boxed error thrown by user code (hooks, route functions, loaders, streams).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, SsrError>;

/// Marker recording whether an error value was already logged.
#[derive(Debug, Clone, Default)]
pub(crate) struct LoggedMarker(Arc<AtomicBool>);

impl LoggedMarker {
    /// Marks as logged. Returns `true` the first time only.
    pub(crate) fn mark(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn is_marked(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Misuse of the hook contract or of the entry point.
#[derive(Debug, Clone)]
pub struct UsageError {
    message: String,
    marker: LoggedMarker,
}

impl UsageError {
    /// Creates a usage error with an actionable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            marker: LoggedMarker::default(),
        }
    }

    /// The message without the `[Wrong Usage]` prefix.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ssrkit][Wrong Usage] {}", self.message)
    }
}

impl std::error::Error for UsageError {}

/// An error thrown by a user hook, captured together with its origin.
#[derive(Debug, Clone)]
pub struct HookError {
    inner: Arc<HookErrorInner>,
    marker: LoggedMarker,
}

#[derive(Debug)]
struct HookErrorInner {
    error: BoxError,
    hook_name: String,
    hook_file_path: String,
}

impl HookError {
    /// Wraps an error thrown by the hook `hook_name` defined in `hook_file_path`.
    pub fn new(error: BoxError, hook_name: impl Into<String>, hook_file_path: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(HookErrorInner {
                error,
                hook_name: hook_name.into(),
                hook_file_path: hook_file_path.into(),
            }),
            marker: LoggedMarker::default(),
        }
    }

    /// Name of the hook that failed, e.g. `render`.
    pub fn hook_name(&self) -> &str {
        &self.inner.hook_name
    }

    /// File defining the hook.
    pub fn hook_file_path(&self) -> &str {
        &self.inner.hook_file_path
    }

    /// The error thrown by user code.
    pub fn error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.inner.error.as_ref()
    }
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "The `{}()` hook exported by {} threw an error: {}",
            self.inner.hook_name, self.inner.hook_file_path, self.inner.error
        )
    }
}

impl std::error::Error for HookError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.inner.error.as_ref())
    }
}

/// The main error type for pipeline operations.
#[derive(Error, Debug)]
pub enum SsrError {
    /// The hook contract or the entry point was misused.
    #[error(transparent)]
    Usage(#[from] UsageError),

    /// A user hook or route function threw.
    #[error(transparent)]
    Hook(#[from] HookError),

    /// Pre-rendering a page failed.
    #[error("Pre-rendering failed: {0}")]
    Prerender(String),

    /// A body accessor was used on a stream after it failed mid-flight.
    #[error("Stream error: {0}")]
    Stream(String),

    /// The page file discovery service failed.
    #[error("Page file discovery failed: {0}")]
    Discovery(String),

    /// Serializing or parsing the client-side page context failed.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SsrError {
    /// Shorthand for a [`SsrError::Usage`] error.
    pub fn usage(message: impl Into<String>) -> Self {
        SsrError::Usage(UsageError::new(message))
    }

    /// Returns `true` for usage errors.
    pub fn is_usage(&self) -> bool {
        matches!(self, SsrError::Usage(_))
    }

    /// Returns the hook error, if any.
    pub fn as_hook_error(&self) -> Option<&HookError> {
        match self {
            SsrError::Hook(err) => Some(err),
            _ => None,
        }
    }

    /// Marks the error as logged. Returns `true` if it had not been logged yet.
    ///
    /// Errors without a marker always report `true`.
    pub(crate) fn mark_logged(&self) -> bool {
        match self {
            SsrError::Usage(err) => err.marker.mark(),
            SsrError::Hook(err) => err.marker.mark(),
            _ => true,
        }
    }

    /// Whether the error was already logged.
    pub fn was_logged(&self) -> bool {
        match self {
            SsrError::Usage(err) => err.marker.is_marked(),
            SsrError::Hook(err) => err.marker.is_marked(),
            _ => false,
        }
    }
}
