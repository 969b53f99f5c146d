#![forbid(unsafe_code)]

//! Host runtime error types.

use thiserror::Error;

/// Failure reported by [`Root`](crate::host::Root).
///
/// `E` is the component's own error type. Stream errors escalated by a
/// subscription binder arrive here as `Render` carrying the exact error
/// value the stream produced.
#[derive(Debug, Error)]
pub enum HostError<E> {
    /// The render pass failed and no error boundary was installed.
    #[error("render failed: {0}")]
    Render(E),

    /// The root was already unmounted.
    #[error("component is not mounted")]
    NotMounted,

    /// A flush kept requesting re-renders past the configured bound.
    #[error("re-render limit of {limit} exceeded in a single flush")]
    RerenderLimit { limit: usize },

    /// A flush kept finding queued tasks past the configured bound.
    #[error("task limit of {limit} exceeded in a single flush")]
    TaskLimit { limit: usize },
}

impl<E> HostError<E> {
    /// The component error, if this is a render failure.
    #[must_use]
    pub fn render_error(&self) -> Option<&E> {
        match self {
            Self::Render(error) => Some(error),
            _ => None,
        }
    }
}

/// Failure while installing the global log subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter {directives:?}: {reason}")]
    Filter { directives: String, reason: String },

    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled,
}
