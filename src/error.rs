use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure taxonomy of the timed queue operations.
///
/// The three kinds never convert into one another: a hard failure is never
/// downgraded to a timeout, and neither timeout nor invalid-argument is
/// retried internally.
#[derive(Debug, Error)]
pub enum Error {
    /// The deadline failed structural validation (negative seconds or an
    /// out-of-range sub-second component). Detected before any queue
    /// access.
    #[error("invalid absolute deadline")]
    InvalidDeadline,

    /// The deadline was reached with no message available (receive) or no
    /// free slot (send). Recoverable by retrying with a new deadline.
    #[error("timed out waiting on the message queue")]
    TimedOut,

    /// The queue primitive itself failed (bad descriptor, undersized
    /// buffer, permission denied, ...).
    #[error("message queue operation failed")]
    Queue(#[source] io::Error),

    /// The monotonic clock could not be read.
    #[error("monotonic clock read failed")]
    Clock(#[source] io::Error),

    /// The readiness wait failed for a reason other than interruption.
    #[error("readiness wait on the queue descriptor failed")]
    Wait(#[source] io::Error),
}

impl Error {
    /// The POSIX error code this failure maps to, for callers that keep
    /// the original `-1` + `errno` convention.
    pub fn errno(&self) -> libc::c_int {
        match self {
            Error::InvalidDeadline => libc::EINVAL,
            Error::TimedOut => libc::ETIMEDOUT,
            Error::Queue(cause) | Error::Clock(cause) | Error::Wait(cause) => {
                cause.raw_os_error().unwrap_or(libc::EIO)
            }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::TimedOut)
    }
}
