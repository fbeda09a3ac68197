use std::ffi::CString;
use std::io;

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Queue attributes as reported by `mq_getattr(2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueAttributes {
    /// Maximum number of messages the queue holds (`mq_maxmsg`).
    pub capacity: i64,
    /// Maximum size of a single message in bytes (`mq_msgsize`).
    pub message_size: i64,
    /// Number of messages currently queued (`mq_curmsgs`).
    pub current_messages: i64,
}

/// Options for opening a POSIX message queue.
///
/// Follows the shape of `std::fs::OpenOptions`: pick access directions,
/// optionally request creation, then call [`OpenOptions::open`].
#[derive(Debug, Clone)]
pub struct OpenOptions {
    read: bool,
    write: bool,
    create: bool,
    mode: libc::mode_t,
    capacity: i64,
    message_size: i64,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            read: false,
            write: false,
            create: false,
            mode: 0o600,
            capacity: 10,
            message_size: 256,
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(mut self, read: bool) -> Self {
        self.read = read;
        self
    }

    pub fn write(mut self, write: bool) -> Self {
        self.write = write;
        self
    }

    /// Create the queue if it does not exist yet. [`OpenOptions::capacity`]
    /// and [`OpenOptions::message_size`] only apply at creation time; an
    /// existing queue keeps its attributes.
    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// Permission bits used when the queue is created.
    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = mode as libc::mode_t;
        self
    }

    /// Maximum number of queued messages (`mq_maxmsg`) at creation.
    pub fn capacity(mut self, capacity: i64) -> Self {
        self.capacity = capacity;
        self
    }

    /// Maximum message size in bytes (`mq_msgsize`) at creation.
    pub fn message_size(mut self, message_size: i64) -> Self {
        self.message_size = message_size;
        self
    }

    /// Open (or create) the queue named `name`. The name must have the
    /// POSIX `/name` shape: a leading slash and no further slashes.
    pub fn open(&self, name: &str) -> Result<MessageQueue> {
        let c_name = queue_name(name)?;

        let mut oflag = match (self.read, self.write) {
            (true, true) => libc::O_RDWR,
            (true, false) => libc::O_RDONLY,
            (false, true) => libc::O_WRONLY,
            (false, false) => {
                return Err(invalid_input("queue must be opened for reading or writing"));
            }
        };
        if self.create {
            oflag |= libc::O_CREAT;
        }

        let mqd = if self.create {
            // SAFETY: an all-zero mq_attr is valid; the kernel reads only
            // the fields set below.
            let mut attr: libc::mq_attr = unsafe { std::mem::zeroed() };
            attr.mq_maxmsg = self.capacity as libc::c_long;
            attr.mq_msgsize = self.message_size as libc::c_long;
            // SAFETY: c_name is NUL-terminated and attr outlives the call.
            unsafe {
                libc::mq_open(
                    c_name.as_ptr(),
                    oflag,
                    self.mode as libc::c_uint,
                    &mut attr as *mut libc::mq_attr,
                )
            }
        } else {
            // SAFETY: c_name is NUL-terminated; no attribute block is passed.
            unsafe { libc::mq_open(c_name.as_ptr(), oflag) }
        };

        if mqd < 0 {
            return Err(Error::Queue(io::Error::last_os_error()));
        }

        debug!("opened message queue '{}' (mqd {})", name, mqd);
        Ok(MessageQueue { mqd, owned: true })
    }
}

/// An open POSIX message queue descriptor.
///
/// The timed operations treat the descriptor as a read-only capability:
/// they never change its flags, close it, or unlink the queue. Lifecycle
/// belongs to whoever opened it: this type when constructed through
/// [`OpenOptions`], the C caller when constructed with
/// [`MessageQueue::from_raw_mqd`].
#[derive(Debug)]
pub struct MessageQueue {
    mqd: libc::mqd_t,
    owned: bool,
}

impl MessageQueue {
    /// Wrap a descriptor owned elsewhere. It is not closed on drop.
    pub fn from_raw_mqd(mqd: libc::mqd_t) -> Self {
        Self { mqd, owned: false }
    }

    pub fn as_raw_mqd(&self) -> libc::mqd_t {
        self.mqd
    }

    pub fn attributes(&self) -> Result<QueueAttributes> {
        // SAFETY: an all-zero mq_attr is a valid out-parameter.
        let mut attr: libc::mq_attr = unsafe { std::mem::zeroed() };
        // SAFETY: attr is a valid, writable mq_attr for the duration of the call.
        let rc = unsafe { libc::mq_getattr(self.mqd, &mut attr) };
        if rc != 0 {
            return Err(Error::Queue(io::Error::last_os_error()));
        }
        Ok(QueueAttributes {
            capacity: attr.mq_maxmsg as i64,
            message_size: attr.mq_msgsize as i64,
            current_messages: attr.mq_curmsgs as i64,
        })
    }

    /// Remove the queue name from the system. Open descriptors stay usable
    /// until closed; typically called by the creator during teardown.
    pub fn unlink(name: &str) -> Result<()> {
        let c_name = queue_name(name)?;
        // SAFETY: c_name is NUL-terminated.
        let rc = unsafe { libc::mq_unlink(c_name.as_ptr()) };
        if rc != 0 {
            return Err(Error::Queue(io::Error::last_os_error()));
        }
        debug!("unlinked message queue '{}'", name);
        Ok(())
    }
}

impl Drop for MessageQueue {
    fn drop(&mut self) {
        if !self.owned {
            return;
        }
        // SAFETY: mqd came from mq_open and is closed exactly once.
        if unsafe { libc::mq_close(self.mqd) } != 0 {
            warn!(
                "failed to close message queue descriptor {}: {}",
                self.mqd,
                io::Error::last_os_error()
            );
        } else {
            debug!("closed message queue descriptor {}", self.mqd);
        }
    }
}

fn queue_name(name: &str) -> Result<CString> {
    if !name.starts_with('/') || name.len() < 2 || name[1..].contains('/') {
        return Err(invalid_input(format!(
            "queue name must have the \"/name\" shape, got {:?}",
            name
        )));
    }
    CString::new(name).map_err(|_| invalid_input("queue name contains an interior NUL byte"))
}

fn invalid_input(message: impl Into<String>) -> Error {
    Error::Queue(io::Error::new(io::ErrorKind::InvalidInput, message.into()))
}
