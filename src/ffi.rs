//! C ABI drop-in replacements for `mq_timedreceive(2)` and
//! `mq_timedsend(2)` with the deadline measured against `CLOCK_MONOTONIC`.
//!
//! Signatures, return values, and the `-1` + `errno` convention match the
//! standard calls, so existing C callers only swap the function name and
//! the clock their deadline is built on. Buffer and priority pointers are
//! forwarded to the kernel untouched; kernel-side validation (`EBADF`,
//! `EMSGSIZE`, ...) behaves exactly as with the standard calls.

use std::io;

use crate::time::Deadline;
use crate::timed::{block_until, is_would_block, zero_timespec};
use crate::wait::Interest;

fn set_errno(code: libc::c_int) {
    // SAFETY: __errno_location returns the calling thread's errno slot.
    unsafe {
        *libc::__errno_location() = code;
    }
}

/// Reject the absent (null) sentinel here; structural validation of the
/// pointed-to value happens in the driver.
fn deadline_from(abs_timeout: *const libc::timespec) -> Option<Deadline> {
    if abs_timeout.is_null() {
        return None;
    }
    // SAFETY: non-null abs_timeout points at a readable timespec per the
    // call contract.
    let ts = unsafe { *abs_timeout };
    Some(Deadline::from(ts))
}

/// Like `mq_timedreceive(2)`, but `abs_timeout` is a `CLOCK_MONOTONIC`
/// deadline.
///
/// # Safety
/// Same contract as `mq_timedreceive(2)`: `msg_ptr` must be valid for
/// `msg_len` writes, `msg_prio` must be null or valid for one write, and
/// `abs_timeout` must be null or point at a readable `timespec`.
#[no_mangle]
pub unsafe extern "C" fn mq_timedreceive_monotonic(
    mqdes: libc::mqd_t,
    msg_ptr: *mut libc::c_char,
    msg_len: libc::size_t,
    msg_prio: *mut libc::c_uint,
    abs_timeout: *const libc::timespec,
) -> libc::ssize_t {
    let deadline = match deadline_from(abs_timeout) {
        Some(deadline) => deadline,
        None => {
            set_errno(libc::EINVAL);
            return -1;
        }
    };

    let result = block_until(mqdes, deadline, Interest::Readable, || {
        let zero = zero_timespec();
        // SAFETY: pointers are forwarded untouched under the caller's
        // contract; the zero timespec makes the probe non-blocking.
        let n = unsafe { libc::mq_timedreceive(mqdes, msg_ptr, msg_len, msg_prio, &zero) };
        if n >= 0 {
            return Ok(Some(n));
        }
        let err = io::Error::last_os_error();
        if is_would_block(&err) {
            Ok(None)
        } else {
            Err(err)
        }
    });

    match result {
        Ok(n) => n,
        Err(err) => {
            set_errno(err.errno());
            -1
        }
    }
}

/// Like `mq_timedsend(2)`, but `abs_timeout` is a `CLOCK_MONOTONIC`
/// deadline.
///
/// # Safety
/// Same contract as `mq_timedsend(2)`: `msg_ptr` must be valid for
/// `msg_len` reads and `abs_timeout` must be null or point at a readable
/// `timespec`.
#[no_mangle]
pub unsafe extern "C" fn mq_timedsend_monotonic(
    mqdes: libc::mqd_t,
    msg_ptr: *const libc::c_char,
    msg_len: libc::size_t,
    msg_prio: libc::c_uint,
    abs_timeout: *const libc::timespec,
) -> libc::c_int {
    let deadline = match deadline_from(abs_timeout) {
        Some(deadline) => deadline,
        None => {
            set_errno(libc::EINVAL);
            return -1;
        }
    };

    let result = block_until(mqdes, deadline, Interest::Writable, || {
        let zero = zero_timespec();
        // SAFETY: pointers are forwarded untouched under the caller's
        // contract; the zero timespec makes the probe non-blocking.
        let rc = unsafe { libc::mq_timedsend(mqdes, msg_ptr, msg_len, msg_prio, &zero) };
        if rc == 0 {
            return Ok(Some(()));
        }
        let err = io::Error::last_os_error();
        if is_would_block(&err) {
            Ok(None)
        } else {
            Err(err)
        }
    });

    match result {
        Ok(()) => 0,
        Err(err) => {
            set_errno(err.errno());
            -1
        }
    }
}
