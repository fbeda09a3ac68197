//! Publisher/consumer demonstration over one POSIX message queue.
//!
//! The publisher creates the queue and sends at randomized 3-8s intervals;
//! the consumer opens it read-only and blocks on 5s monotonic deadlines.
//! Ctrl-C flips a shared running flag and both loops drain out. Log lines
//! carry the process uptime (a monotonic timestamp), so deadline behavior
//! is visible even while the wall clock is being adjusted.

use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use mq_monotonic::{Deadline, Error, MessageQueue, OpenOptions};
use tracing::{error, info, warn};

const DEFAULT_QUEUE: &str = "/mq-monotonic-demo";
const CAPACITY: i64 = 10;
const MESSAGE_SIZE: i64 = 256;
const OP_TIMEOUT: Duration = Duration::from_secs(5);
const MIN_SLEEP_MS: u64 = 3000;
const MAX_SLEEP_MS: u64 = 8000;

fn main() {
    tracing_subscriber::fmt()
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let queue_name = args
        .get(1)
        .cloned()
        .unwrap_or_else(|| DEFAULT_QUEUE.to_string());

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })
        .expect("failed to install the Ctrl-C handler");
    }

    info!("demo started on queue {}", queue_name);

    thread::scope(|s| {
        s.spawn(|| publisher(&queue_name, &running));
        s.spawn(|| consumer(&queue_name, &running));
    });

    let _ = MessageQueue::unlink(&queue_name);
    info!("demo stopped");
}

fn publisher(queue_name: &str, running: &AtomicBool) {
    let queue = match OpenOptions::new()
        .write(true)
        .create(true)
        .capacity(CAPACITY)
        .message_size(MESSAGE_SIZE)
        .open(queue_name)
    {
        Ok(queue) => queue,
        Err(err) => {
            error!("publisher failed to open {}: {}", queue_name, err);
            return;
        }
    };

    while running.load(Ordering::SeqCst) {
        let deadline = match Deadline::after(OP_TIMEOUT) {
            Ok(deadline) => deadline,
            Err(err) => {
                error!("publisher failed to read the monotonic clock: {}", err);
                return;
            }
        };

        let message = "I like crispy strips";
        info!("sending with a {}s deadline", OP_TIMEOUT.as_secs());
        match queue.timed_send(message.as_bytes(), 0, deadline) {
            Ok(()) => info!("sent: {}", message),
            Err(Error::TimedOut) => warn!("send timed out, queue stayed full"),
            Err(err) => {
                error!("send failed: {}", err);
                return;
            }
        }

        let sleep_ms = fastrand::u64(MIN_SLEEP_MS..=MAX_SLEEP_MS);
        info!("publisher sleeping for {}ms", sleep_ms);
        sleep_while_running(running, sleep_ms);
    }
}

fn consumer(queue_name: &str, running: &AtomicBool) {
    // The publisher may not have created the queue yet.
    let queue = loop {
        if !running.load(Ordering::SeqCst) {
            return;
        }
        match OpenOptions::new().read(true).open(queue_name) {
            Ok(queue) => break queue,
            Err(err) if err.errno() == libc::ENOENT => {
                info!("waiting for queue creation...");
                thread::sleep(Duration::from_secs(1));
            }
            Err(err) => {
                error!("consumer failed to open {}: {}", queue_name, err);
                return;
            }
        }
    };

    let attrs = match queue.attributes() {
        Ok(attrs) => attrs,
        Err(err) => {
            error!("consumer failed to query queue attributes: {}", err);
            return;
        }
    };
    let mut buf = vec![0u8; attrs.message_size as usize];

    while running.load(Ordering::SeqCst) {
        let deadline = match Deadline::after(OP_TIMEOUT) {
            Ok(deadline) => deadline,
            Err(err) => {
                error!("consumer failed to read the monotonic clock: {}", err);
                return;
            }
        };

        info!("waiting for data with a {}s deadline", OP_TIMEOUT.as_secs());
        match queue.timed_receive(&mut buf, deadline) {
            Ok(received) => {
                let payload = String::from_utf8_lossy(&buf[..received.bytes]);
                info!(
                    "received {} bytes (priority {}): {}",
                    received.bytes, received.priority, payload
                );
            }
            Err(Error::TimedOut) => warn!("receive timed out"),
            Err(err) => {
                error!("receive failed: {}", err);
                return;
            }
        }
    }
}

// Sleep in bounded slices so the running flag is honored within ~200ms.
fn sleep_while_running(running: &AtomicBool, total_ms: u64) {
    let mut slept = 0;
    while slept < total_ms && running.load(Ordering::SeqCst) {
        let step = (total_ms - slept).min(200);
        thread::sleep(Duration::from_millis(step));
        slept += step;
    }
}
