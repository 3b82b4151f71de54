// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! End-to-end channel tests over real POSIX shared memory.
//!
//! Producer and consumer run on separate threads, each with its own mapping of
//! the region, the same way two processes would see it.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use shmring_core::{
    BackoffPolicy, CancelToken, Capacity, ChannelError, Consumer, MessageFormat, Producer,
    RegionName, SharedRegion, ShmError, SpinPolicy,
};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn unique_name(tag: &str) -> RegionName {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    RegionName::new(format!("shmring-it-{}-{}-{}", tag, std::process::id(), n))
        .expect("valid name")
}

fn cap(bytes: usize) -> Capacity {
    Capacity::new(bytes).expect("valid capacity")
}

fn patient() -> SpinPolicy {
    SpinPolicy::new()
        .with_backoff(BackoffPolicy::Yield { spin_limit: 64 })
        .with_timeout(Duration::from_secs(10))
}

/// Deterministic payload for message `seq`, `len` bytes long.
fn payload(seq: u64, len: usize) -> Vec<u8> {
    let mut bytes = seq.to_le_bytes().to_vec();
    bytes.extend((0..len.saturating_sub(8)).map(|i| (seq as usize).wrapping_add(i) as u8));
    bytes.truncate(len);
    bytes
}

#[test]
fn test_fifo_fixed_messages_across_mappings() {
    const COUNT: u64 = 50_000;
    const SIZE: usize = 100;

    let name = unique_name("fifo-fixed");
    let owner = SharedRegion::create(&name, cap(1024)).expect("create");
    let peer = SharedRegion::attach(&name, cap(1024)).expect("attach");

    let mut tx = Producer::new(Arc::new(owner), MessageFormat::Fixed(SIZE)).expect("producer");
    let mut rx = Consumer::new(Arc::new(peer), MessageFormat::Fixed(SIZE)).expect("consumer");

    let writer = thread::spawn(move || {
        let policy = patient();
        for seq in 0..COUNT {
            tx.send_blocking(&payload(seq, SIZE), &policy)
                .expect("send");
        }
        tx
    });

    let policy = patient();
    for seq in 0..COUNT {
        let msg = rx.recv_blocking(&policy).expect("recv");
        assert_eq!(msg, payload(seq, SIZE), "message {} out of order or corrupt", seq);
    }

    let tx = writer.join().expect("writer thread");
    assert_eq!(tx.stats().messages, COUNT);
    assert_eq!(rx.stats().messages, COUNT);
    assert!(rx.snapshot().is_empty());
    assert_eq!(rx.snapshot().write_pos, COUNT * SIZE as u64);
}

#[test]
fn test_fifo_framed_messages_across_mappings() {
    const COUNT: u64 = 20_000;

    let name = unique_name("fifo-framed");
    let owner = SharedRegion::create(&name, cap(4096)).expect("create");
    let peer = SharedRegion::attach(&name, cap(4096)).expect("attach");

    let mut tx = Producer::new(Arc::new(owner), MessageFormat::Framed).expect("producer");
    let mut rx = Consumer::new(Arc::new(peer), MessageFormat::Framed).expect("consumer");

    let writer = thread::spawn(move || {
        let policy = patient();
        for seq in 0..COUNT {
            let len = 1 + (seq as usize * 7) % 500;
            tx.send_blocking(&payload(seq, len), &policy).expect("send");
        }
        tx
    });

    let policy = patient();
    for seq in 0..COUNT {
        let len = 1 + (seq as usize * 7) % 500;
        let msg = rx.recv_blocking(&policy).expect("recv");
        assert_eq!(msg, payload(seq, len));
    }

    let _tx = writer.join().expect("writer thread");
    assert_eq!(rx.stats().checksum_failures, 0);
}

#[test]
fn test_cursor_invariant_observed_by_third_mapping() {
    const COUNT: u64 = 20_000;

    let name = unique_name("invariant");
    let owner = SharedRegion::create(&name, cap(1024)).expect("create");
    let consumer_map = SharedRegion::attach(&name, cap(1024)).expect("attach");
    let observer = SharedRegion::attach_discovered(&name).expect("attach observer");

    let mut tx = Producer::new(Arc::new(owner), MessageFormat::Fixed(64)).expect("producer");
    let mut rx = Consumer::new(Arc::new(consumer_map), MessageFormat::Fixed(64)).expect("consumer");

    let done = Arc::new(AtomicBool::new(false));
    let watcher = {
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut checks = 0u64;
            while !done.load(Ordering::Acquire) {
                let snapshot = observer.snapshot().expect("mapped");
                assert!(snapshot.holds_invariant(), "violated: {:?}", snapshot);
                checks += 1;
            }
            checks
        })
    };

    let writer = thread::spawn(move || {
        let policy = patient();
        for seq in 0..COUNT {
            tx.send_blocking(&payload(seq, 64), &policy).expect("send");
        }
    });

    let policy = patient();
    for _ in 0..COUNT {
        rx.recv_blocking(&policy).expect("recv");
    }
    writer.join().expect("writer thread");
    done.store(true, Ordering::Release);

    let checks = watcher.join().expect("watcher thread");
    assert!(checks > 0);
}

#[test]
fn test_batches_across_mappings() {
    const BATCHES: u64 = 2_000;
    const PER_BATCH: u64 = 8;

    let name = unique_name("batch");
    let owner = SharedRegion::create(&name, cap(2048)).expect("create");
    let peer = SharedRegion::attach(&name, cap(2048)).expect("attach");

    let mut tx = Producer::new(Arc::new(owner), MessageFormat::Framed).expect("producer");
    let mut rx = Consumer::new(Arc::new(peer), MessageFormat::Framed).expect("consumer");

    let writer = thread::spawn(move || {
        let policy = patient();
        for batch in 0..BATCHES {
            let owned: Vec<Vec<u8>> = (0..PER_BATCH)
                .map(|i| payload(batch * PER_BATCH + i, 40))
                .collect();
            let mut pending: Vec<&[u8]> = owned.iter().map(|p| p.as_slice()).collect();
            while !pending.is_empty() {
                let sent = policy
                    .run(|| tx.try_send_batch(&pending))
                    .expect("batch send");
                pending.drain(..sent);
            }
        }
    });

    let policy = patient();
    let mut next = 0u64;
    while next < BATCHES * PER_BATCH {
        let batch = policy.run(|| rx.try_recv_batch(16)).expect("batch recv");
        for msg in batch {
            assert_eq!(msg, payload(next, 40));
            next += 1;
        }
    }
    writer.join().expect("writer thread");
}

#[test]
fn test_send_blocking_timeout_against_full_ring() {
    let name = unique_name("timeout");
    let region = Arc::new(SharedRegion::create(&name, cap(1024)).expect("create"));
    let mut tx = Producer::new(Arc::clone(&region), MessageFormat::Fixed(100)).expect("producer");

    for seq in 0..10 {
        tx.try_send(&payload(seq, 100)).expect("fill");
    }
    let before = region.snapshot().expect("mapped");

    let policy = SpinPolicy::new().with_timeout(Duration::from_millis(1));
    let start = Instant::now();
    let result = tx.send_blocking(&payload(10, 100), &policy);
    let elapsed = start.elapsed();

    match result {
        Err(ChannelError::Timeout { elapsed: reported }) => {
            assert!(reported >= Duration::from_millis(1));
        }
        other => panic!("expected Timeout, got {:?}", other),
    }
    assert!(elapsed < Duration::from_millis(25), "overran: {:?}", elapsed);
    assert_eq!(region.snapshot().expect("mapped"), before);
}

#[test]
fn test_recv_blocking_cancelled_from_other_thread() {
    let name = unique_name("cancel");
    let region = Arc::new(SharedRegion::create(&name, cap(1024)).expect("create"));
    let mut rx = Consumer::new(region, MessageFormat::Framed).expect("consumer");

    let token = CancelToken::new();
    let canceller = {
        let token = token.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            token.cancel();
        })
    };

    let policy = SpinPolicy::new()
        .with_backoff(BackoffPolicy::Sleep {
            spin_limit: 32,
            min_sleep: Duration::from_micros(10),
            max_sleep: Duration::from_millis(1),
        })
        .with_cancel(token);
    let result = rx.recv_blocking(&policy);

    canceller.join().expect("canceller thread");
    assert!(matches!(result, Err(ChannelError::Cancelled)));
    assert_eq!(rx.snapshot().read_pos, 0);
    assert_eq!(rx.stats().cancellations, 1);
}

#[test]
fn test_capacity_mismatch_leaves_region_usable() {
    let name = unique_name("mismatch");
    let owner = Arc::new(SharedRegion::create(&name, cap(4096)).expect("create"));

    let err = SharedRegion::attach(&name, cap(8192)).expect_err("mismatch");
    assert!(matches!(
        err,
        ShmError::SizeMismatch {
            expected: 8192,
            actual: 4096,
            ..
        }
    ));

    let mut tx = Producer::new(owner, MessageFormat::Framed).expect("producer");
    tx.try_send(b"still alive").expect("send");

    let peer = SharedRegion::attach(&name, cap(4096)).expect("attach");
    let mut rx = Consumer::new(Arc::new(peer), MessageFormat::Framed).expect("consumer");
    assert_eq!(rx.try_recv().expect("recv"), b"still alive");
}

#[test]
fn test_handles_resume_from_stored_cursors() {
    let name = unique_name("resume");
    let region = Arc::new(SharedRegion::create(&name, cap(1024)).expect("create"));

    let mut tx = Producer::new(Arc::clone(&region), MessageFormat::Fixed(16)).expect("producer");
    tx.try_send(&[1u8; 16]).expect("send");
    tx.try_send(&[2u8; 16]).expect("send");
    drop(tx);

    let mut rx = Consumer::new(Arc::clone(&region), MessageFormat::Fixed(16)).expect("consumer");
    assert_eq!(rx.try_recv().expect("recv"), vec![1u8; 16]);
    drop(rx);

    let mut tx = Producer::new(Arc::clone(&region), MessageFormat::Fixed(16)).expect("producer");
    tx.try_send(&[3u8; 16]).expect("send");

    let mut rx = Consumer::new(region, MessageFormat::Fixed(16)).expect("consumer");
    assert_eq!(rx.try_recv().expect("recv"), vec![2u8; 16]);
    assert_eq!(rx.try_recv().expect("recv"), vec![3u8; 16]);
}

#[test]
fn test_non_power_of_two_capacity_wraps_correctly() {
    const COUNT: u64 = 5_000;

    let name = unique_name("npot");
    let owner = SharedRegion::create(&name, cap(1000)).expect("create");
    let peer = SharedRegion::attach(&name, cap(1000)).expect("attach");

    let mut tx = Producer::new(Arc::new(owner), MessageFormat::Fixed(30)).expect("producer");
    let mut rx = Consumer::new(Arc::new(peer), MessageFormat::Fixed(30)).expect("consumer");

    let writer = thread::spawn(move || {
        let policy = patient();
        for seq in 0..COUNT {
            tx.send_blocking(&payload(seq, 30), &policy).expect("send");
        }
    });

    let policy = patient();
    for seq in 0..COUNT {
        assert_eq!(rx.recv_blocking(&policy).expect("recv"), payload(seq, 30));
    }
    writer.join().expect("writer thread");
}
