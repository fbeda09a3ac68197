use std::io;

use crate::error::{Error, Result};
use crate::queue::MessageQueue;
use crate::time::{monotonic_now, Deadline};
use crate::wait::{self, Interest, Wait};

/// Outcome of a successful timed receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Received {
    /// Number of bytes written into the caller's buffer.
    pub bytes: usize,
    /// Priority the message was sent with.
    pub priority: u32,
}

impl MessageQueue {
    /// Receive one message, blocking until `deadline` on the monotonic
    /// clock.
    ///
    /// # Arguments
    /// * `buf` - Destination buffer. The kernel rejects buffers smaller
    ///   than the queue's configured message size with `EMSGSIZE`.
    /// * `deadline` - Absolute `CLOCK_MONOTONIC` deadline.
    ///
    /// # Returns
    /// * `Ok(Received)` with the byte count and message priority
    /// * `Err(Error::TimedOut)` if the deadline passes with the queue empty
    /// * `Err(Error::InvalidDeadline)` for a malformed deadline, before any
    ///   queue access
    /// * any other `Err` for a hard queue/clock/poll failure, with the OS
    ///   cause preserved
    pub fn timed_receive(&self, buf: &mut [u8], deadline: Deadline) -> Result<Received> {
        let mqd = self.as_raw_mqd();
        block_until(mqd, deadline, Interest::Readable, || {
            let zero = zero_timespec();
            let mut priority: libc::c_uint = 0;
            // SAFETY: buf is valid for buf.len() writes; the zero timespec
            // makes the call return immediately instead of blocking.
            let n = unsafe {
                libc::mq_timedreceive(
                    mqd,
                    buf.as_mut_ptr() as *mut libc::c_char,
                    buf.len(),
                    &mut priority,
                    &zero,
                )
            };
            if n >= 0 {
                return Ok(Some(Received {
                    bytes: n as usize,
                    priority: priority as u32,
                }));
            }
            let err = io::Error::last_os_error();
            if is_would_block(&err) {
                Ok(None)
            } else {
                Err(err)
            }
        })
    }

    /// Send one message, blocking until `deadline` on the monotonic clock.
    ///
    /// # Arguments
    /// * `msg` - Message payload; at most the queue's configured message
    ///   size, or the kernel rejects the call with `EMSGSIZE`.
    /// * `priority` - Message priority, ordering is delegated to the kernel.
    /// * `deadline` - Absolute `CLOCK_MONOTONIC` deadline.
    ///
    /// # Returns
    /// * `Ok(())` once the message is queued
    /// * `Err(Error::TimedOut)` if the deadline passes with the queue full
    /// * `Err(Error::InvalidDeadline)` / hard `Err` as for
    ///   [`MessageQueue::timed_receive`]
    pub fn timed_send(&self, msg: &[u8], priority: u32, deadline: Deadline) -> Result<()> {
        let mqd = self.as_raw_mqd();
        block_until(mqd, deadline, Interest::Writable, || {
            let zero = zero_timespec();
            // SAFETY: msg is valid for msg.len() reads; the zero timespec
            // makes the call return immediately instead of blocking.
            let rc = unsafe {
                libc::mq_timedsend(
                    mqd,
                    msg.as_ptr() as *const libc::c_char,
                    msg.len(),
                    priority as libc::c_uint,
                    &zero,
                )
            };
            if rc == 0 {
                return Ok(Some(()));
            }
            let err = io::Error::last_os_error();
            if is_would_block(&err) {
                Ok(None)
            } else {
                Err(err)
            }
        })
    }
}

/// Drive one queue operation to completion against a monotonic deadline.
///
/// One loop serves both directions; the probe and the readiness interest
/// are the only per-direction pieces. The probe must attempt the operation
/// without blocking and report `Ok(Some(_))` on completion, `Ok(None)`
/// when the queue side would block, and `Err` on any hard failure.
///
/// A `Ready` poll result is advisory (another waiter may win the race for
/// the message or the free slot), so the probe is always re-attempted and
/// the loop never assumes readiness implies success.
pub(crate) fn block_until<T>(
    mqd: libc::mqd_t,
    deadline: Deadline,
    interest: Interest,
    mut probe: impl FnMut() -> io::Result<Option<T>>,
) -> Result<T> {
    if !deadline.is_valid() {
        return Err(Error::InvalidDeadline);
    }

    loop {
        match probe() {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(err) => return Err(Error::Queue(err)),
        }

        let now = monotonic_now().map_err(Error::Clock)?;
        let budget_ms = deadline.remaining_ms(now);
        if budget_ms == 0 {
            return Err(Error::TimedOut);
        }

        match wait::wait_ready(mqd, interest, budget_ms).map_err(Error::Wait)? {
            Wait::Ready => continue,
            Wait::Expired => return Err(Error::TimedOut),
        }
    }
}

/// `ETIMEDOUT` from a zero-timeout probe and `EAGAIN` from an `O_NONBLOCK`
/// descriptor both mean "queue side not ready"; everything else is a hard
/// failure.
pub(crate) fn is_would_block(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(code) if code == libc::ETIMEDOUT || code == libc::EAGAIN
    )
}

pub(crate) fn zero_timespec() -> libc::timespec {
    // SAFETY: all-zero bytes are a valid timespec ({0, 0}).
    unsafe { std::mem::zeroed() }
}
