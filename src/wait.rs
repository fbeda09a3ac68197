use std::io;

/// Readiness direction watched on the queue descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interest {
    Readable,
    Writable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wait {
    Ready,
    Expired,
}

/// Block on `poll(2)` until the descriptor reports `interest` or
/// `timeout_ms` elapses. Interruption by a signal restarts the wait with
/// the same budget; the caller resamples the clock on the next iteration.
pub(crate) fn wait_ready(
    mqd: libc::mqd_t,
    interest: Interest,
    timeout_ms: libc::c_int,
) -> io::Result<Wait> {
    let events = match interest {
        Interest::Readable => libc::POLLIN,
        Interest::Writable => libc::POLLOUT,
    };

    // On Linux a message-queue descriptor is a file descriptor and can be
    // watched directly.
    let mut fds = [libc::pollfd {
        fd: mqd as libc::c_int,
        events,
        revents: 0,
    }];

    loop {
        // SAFETY: fds holds one initialized pollfd and stays alive for the call.
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), 1, timeout_ms) };

        if rc > 0 {
            return Ok(Wait::Ready);
        }
        if rc == 0 {
            return Ok(Wait::Expired);
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}
