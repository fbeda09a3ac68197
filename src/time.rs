use std::io;
use std::time::Duration;

/// Nanoseconds in one second; the exclusive upper bound for a well-formed
/// sub-second component.
pub const NANOS_PER_SEC: i64 = 1_000_000_000;

const MILLIS_PER_SEC: i64 = 1_000;
const NANOS_PER_MILLI: i64 = 1_000_000;

/// An absolute point in time on the `CLOCK_MONOTONIC` epoch.
///
/// This is the `timespec` shape (whole seconds plus nanoseconds within the
/// second), kept as plain signed fields so that malformed values coming from
/// a C caller can be represented and rejected by [`Deadline::is_valid`]
/// instead of being silently reinterpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    pub secs: i64,
    pub nanos: i64,
}

impl Deadline {
    pub fn new(secs: i64, nanos: i64) -> Self {
        Self { secs, nanos }
    }

    /// Structural validation only: a deadline that already lies in the past
    /// is valid. Expiry is a normal runtime condition decided by
    /// [`Deadline::remaining_ms`], not a malformed argument.
    pub fn is_valid(&self) -> bool {
        if self.secs < 0 {
            return false;
        }
        if self.nanos < 0 || self.nanos >= NANOS_PER_SEC {
            return false;
        }
        true
    }

    /// A deadline `timeout` from now on the monotonic clock.
    pub fn after(timeout: Duration) -> io::Result<Self> {
        let now = monotonic_now()?;
        let mut secs = now.secs.saturating_add(timeout.as_secs() as i64);
        let mut nanos = now.nanos + i64::from(timeout.subsec_nanos());
        if nanos >= NANOS_PER_SEC {
            secs = secs.saturating_add(1);
            nanos -= NANOS_PER_SEC;
        }
        Ok(Self { secs, nanos })
    }

    /// Milliseconds left until this deadline, measured from `now`.
    ///
    /// Pure arithmetic, no clock access. Sub-millisecond remainders are
    /// discarded (rounded down) so a wait bounded by the result never
    /// overshoots the deadline. The result is clamped to
    /// `[0, c_int::MAX]`, the timeout domain of `poll(2)`.
    ///
    /// # Returns
    /// * `ms > 0` - amount of time to wait
    /// * `ms == 0` - deadline has expired, or is less than 1ms away
    pub fn remaining_ms(&self, now: Deadline) -> libc::c_int {
        let mut sec = self.secs.saturating_sub(now.secs);
        let mut nsec = self.nanos - now.nanos;

        // Normalize: borrow one second so that 0 <= nsec < 1e9.
        if nsec < 0 {
            sec = sec.saturating_sub(1);
            nsec += NANOS_PER_SEC;
        }

        if sec < 0 {
            return 0;
        }

        let ms = i128::from(sec) * i128::from(MILLIS_PER_SEC) + i128::from(nsec / NANOS_PER_MILLI);
        ms.clamp(0, i128::from(libc::c_int::MAX)) as libc::c_int
    }
}

impl From<libc::timespec> for Deadline {
    fn from(ts: libc::timespec) -> Self {
        Self {
            secs: ts.tv_sec as i64,
            nanos: ts.tv_nsec as i64,
        }
    }
}

/// A fresh `CLOCK_MONOTONIC` sample.
///
/// Re-read on every retry iteration of a timed operation; never cached,
/// because the wait may span an arbitrary real-time interval.
pub fn monotonic_now() -> io::Result<Deadline> {
    // SAFETY: an all-zero timespec is a valid out-parameter for clock_gettime.
    let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
    // SAFETY: ts is a valid, writable timespec for the duration of the call.
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(Deadline::from(ts))
}
