// End-to-end tests against real kernel queues. The queue namespace is
// system-wide, so everything here runs serialized.

use std::time::{Duration, Instant};

use crossbeam_utils::thread;
use mq_monotonic::{Deadline, Error, MessageQueue, OpenOptions};
use serial_test::serial;

const MSG_SIZE: i64 = 64;

fn create_queue(name: &str, capacity: i64) -> MessageQueue {
    let _ = MessageQueue::unlink(name);
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .capacity(capacity)
        .message_size(MSG_SIZE)
        .open(name)
        .expect("failed to create the test queue")
}

fn deadline_secs(secs: u64) -> Deadline {
    Deadline::after(Duration::from_secs(secs)).expect("monotonic clock read failed")
}

#[test]
#[serial]
fn send_then_receive_round_trip() {
    let name = "/mq-monotonic-roundtrip";
    let queue = create_queue(name, 1);

    let payload = b"hello monotonic";
    queue.timed_send(payload, 7, deadline_secs(2)).unwrap();

    let mut buf = [0u8; MSG_SIZE as usize];
    let received = queue.timed_receive(&mut buf, deadline_secs(2)).unwrap();

    assert_eq!(received.bytes, payload.len());
    assert_eq!(received.priority, 7);
    assert_eq!(&buf[..received.bytes], payload);

    drop(queue);
    MessageQueue::unlink(name).unwrap();
}

#[test]
#[serial]
fn priority_ordering_is_delegated_to_the_kernel() {
    let name = "/mq-monotonic-priority";
    let queue = create_queue(name, 2);

    queue.timed_send(b"low", 1, deadline_secs(1)).unwrap();
    queue.timed_send(b"high", 5, deadline_secs(1)).unwrap();

    let mut buf = [0u8; MSG_SIZE as usize];
    let first = queue.timed_receive(&mut buf, deadline_secs(1)).unwrap();
    assert_eq!(first.priority, 5);
    assert_eq!(&buf[..first.bytes], b"high");

    let second = queue.timed_receive(&mut buf, deadline_secs(1)).unwrap();
    assert_eq!(second.priority, 1);
    assert_eq!(&buf[..second.bytes], b"low");

    drop(queue);
    MessageQueue::unlink(name).unwrap();
}

#[test]
#[serial]
fn receive_on_an_empty_queue_times_out_near_the_deadline() {
    let name = "/mq-monotonic-recv-timeout";
    let queue = create_queue(name, 1);

    let mut buf = [0u8; MSG_SIZE as usize];
    let start = Instant::now();
    let result = queue.timed_receive(&mut buf, deadline_secs(1));
    let elapsed = start.elapsed();

    assert!(matches!(result, Err(Error::TimedOut)), "{:?}", result);
    assert!(
        elapsed >= Duration::from_millis(900),
        "returned after {:?}",
        elapsed
    );
    assert!(
        elapsed < Duration::from_secs(3),
        "returned after {:?}",
        elapsed
    );

    drop(queue);
    MessageQueue::unlink(name).unwrap();
}

#[test]
#[serial]
fn send_on_a_full_queue_times_out() {
    let name = "/mq-monotonic-send-timeout";
    let queue = create_queue(name, 1);
    queue.timed_send(b"occupier", 0, deadline_secs(1)).unwrap();

    let start = Instant::now();
    let result = queue.timed_send(b"no room", 0, deadline_secs(1));
    let elapsed = start.elapsed();

    assert!(matches!(result, Err(Error::TimedOut)), "{:?}", result);
    assert!(
        elapsed >= Duration::from_millis(900),
        "returned after {:?}",
        elapsed
    );
    assert!(
        elapsed < Duration::from_secs(3),
        "returned after {:?}",
        elapsed
    );

    drop(queue);
    MessageQueue::unlink(name).unwrap();
}

#[test]
#[serial]
fn malformed_deadlines_fail_immediately() {
    let name = "/mq-monotonic-invalid-deadline";
    let queue = create_queue(name, 1);
    let mut buf = [0u8; MSG_SIZE as usize];

    let start = Instant::now();
    for bad in [
        Deadline::new(-1, 0),
        Deadline::new(0, -1),
        Deadline::new(0, 1_000_000_000),
    ] {
        assert!(matches!(
            queue.timed_receive(&mut buf, bad),
            Err(Error::InvalidDeadline)
        ));
        assert!(matches!(
            queue.timed_send(b"x", 0, bad),
            Err(Error::InvalidDeadline)
        ));
    }
    assert!(start.elapsed() < Duration::from_millis(100));

    drop(queue);
    MessageQueue::unlink(name).unwrap();
}

#[test]
#[serial]
fn blocked_receiver_wakes_for_a_concurrent_sender() {
    let name = "/mq-monotonic-concurrent-recv";
    let queue = create_queue(name, 1);

    thread::scope(|s| {
        s.spawn(|_| {
            std::thread::sleep(Duration::from_millis(300));
            queue
                .timed_send(b"late arrival", 1, deadline_secs(2))
                .unwrap();
        });

        let mut buf = [0u8; MSG_SIZE as usize];
        let start = Instant::now();
        let received = queue.timed_receive(&mut buf, deadline_secs(5)).unwrap();
        let elapsed = start.elapsed();

        assert_eq!(&buf[..received.bytes], b"late arrival");
        assert!(
            elapsed >= Duration::from_millis(200),
            "woke after {:?}",
            elapsed
        );
        assert!(elapsed < Duration::from_secs(5), "woke after {:?}", elapsed);
    })
    .unwrap();

    drop(queue);
    MessageQueue::unlink(name).unwrap();
}

#[test]
#[serial]
fn blocked_sender_wakes_when_a_consumer_drains() {
    let name = "/mq-monotonic-concurrent-send";
    let queue = create_queue(name, 1);
    queue.timed_send(b"occupier", 0, deadline_secs(1)).unwrap();

    thread::scope(|s| {
        s.spawn(|_| {
            std::thread::sleep(Duration::from_millis(300));
            let mut buf = [0u8; MSG_SIZE as usize];
            queue.timed_receive(&mut buf, deadline_secs(2)).unwrap();
        });

        let start = Instant::now();
        queue.timed_send(b"second", 0, deadline_secs(5)).unwrap();
        let elapsed = start.elapsed();

        assert!(
            elapsed >= Duration::from_millis(200),
            "woke after {:?}",
            elapsed
        );
        assert!(elapsed < Duration::from_secs(5), "woke after {:?}", elapsed);
    })
    .unwrap();

    drop(queue);
    MessageQueue::unlink(name).unwrap();
}

#[test]
#[serial]
fn hard_errors_are_not_retried() {
    // A descriptor that was never opened: every probe reports EBADF.
    let queue = MessageQueue::from_raw_mqd(-1);
    let mut buf = [0u8; MSG_SIZE as usize];

    let start = Instant::now();
    let result = queue.timed_receive(&mut buf, deadline_secs(5));

    match result {
        Err(Error::Queue(cause)) => assert_eq!(cause.raw_os_error(), Some(libc::EBADF)),
        other => panic!("expected EBADF, got {:?}", other),
    }
    assert!(start.elapsed() < Duration::from_millis(100));
}

#[test]
#[serial]
fn undersized_receive_buffer_is_a_hard_error() {
    let name = "/mq-monotonic-undersized";
    let queue = create_queue(name, 1);

    // Smaller than the queue's 64-byte message size.
    let mut buf = [0u8; 8];
    let start = Instant::now();
    let result = queue.timed_receive(&mut buf, deadline_secs(5));

    match result {
        Err(Error::Queue(cause)) => assert_eq!(cause.raw_os_error(), Some(libc::EMSGSIZE)),
        other => panic!("expected EMSGSIZE, got {:?}", other),
    }
    assert!(start.elapsed() < Duration::from_millis(100));

    drop(queue);
    MessageQueue::unlink(name).unwrap();
}
