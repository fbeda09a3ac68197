//! Monotonic-deadline timed operations for POSIX message queues.
//!
//! `mq_timedreceive(2)` and `mq_timedsend(2)` measure their absolute
//! deadline against `CLOCK_REALTIME`. When the wall clock is stepped while
//! a caller is blocked, the wait can end far earlier or far later than
//! intended. This crate re-implements both calls against
//! `CLOCK_MONOTONIC`: a non-blocking zero-timeout probe of the queue is
//! combined with a `poll(2)` readiness wait bounded by the time left until
//! the deadline, retried until the message is transferred, the deadline
//! passes, or a hard error occurs.
//!
//! The safe entry points are [`MessageQueue::timed_receive`] and
//! [`MessageQueue::timed_send`]; C callers get the original signatures
//! through [`ffi`]. Linux only: the implementation relies on a
//! message-queue descriptor being pollable as a file descriptor.

mod error;
pub mod ffi;
mod queue;
mod time;
mod timed;
mod wait;

pub use error::{Error, Result};
pub use queue::{MessageQueue, OpenOptions, QueueAttributes};
pub use time::{monotonic_now, Deadline, NANOS_PER_SEC};
pub use timed::Received;
