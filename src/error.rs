//! Error types for the runtime core.
//!
//! [`Error`] is the failure value carried by futures. Errors raised inside
//! a coroutine body resolve the coroutine's future instead of unwinding
//! through the scheduler; consumers observe them at `get` or `.await`.

use crate::codec::FrameError;
use std::fmt;

/// The failure value a [`Future`](crate::future::Future) can resolve with.
#[derive(Debug)]
pub enum Error {
    /// The producing promise was destroyed before setting an outcome.
    BrokenPromise,
    /// A panic escaped a coroutine body and was captured at the resume
    /// boundary. Carries the panic message when one was available.
    TaskPanicked(String),
    /// An allocation failed while servicing the operation.
    OutOfMemory,
    /// A codec frame error crossed into the future layer.
    Frame(FrameError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BrokenPromise => write!(f, "broken promise"),
            Self::TaskPanicked(msg) => write!(f, "task panicked: {msg}"),
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::Frame(err) => write!(f, "frame error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Frame(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FrameError> for Error {
    fn from(err: FrameError) -> Self {
        Self::Frame(err)
    }
}

impl Error {
    /// Builds a [`Error::TaskPanicked`] from a captured panic payload.
    ///
    /// String payloads (the overwhelmingly common case from `panic!` and
    /// `assert!`) are preserved; anything else is reported opaquely.
    #[must_use]
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let msg = payload
            .downcast_ref::<&'static str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "opaque panic payload".to_owned());
        Self::TaskPanicked(msg)
    }
}

/// Convenience alias for results carrying [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
