// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Write side of the channel.

use std::sync::Arc;

use crate::channel::RingView;
use crate::error::ChannelError;
use crate::shm::frame::FRAME_HEADER_SIZE;
use crate::shm::header::free_space;
use crate::shm::{FrameHeader, MessageFormat, RingSnapshot, SharedRegion};
use crate::stats::ChannelStats;
use crate::sync::SpinPolicy;

/// Producer handle: enqueues messages without locks.
///
/// Payload bytes are copied into the data area first; the write cursor is
/// then advanced with a release store, publishing them to the consumer.
pub struct Producer {
    ring: RingView,
    format: MessageFormat,
    /// Local mirror of the write cursor. This handle is its only writer.
    write_pos: u64,
    /// Last read cursor observed; refreshed only when it looks insufficient.
    cached_read_pos: u64,
    stats: ChannelStats,
}

impl Producer {
    /// Create the producer handle over `region`.
    ///
    /// Resumes from the cursors already stored in the header.
    pub fn new(region: Arc<SharedRegion>, format: MessageFormat) -> Result<Self, ChannelError> {
        let ring = RingView::new(region, &format)?;
        let snapshot = ring.snapshot();

        tracing::debug!(
            region = %ring.region().name(),
            format = %format,
            write_pos = snapshot.write_pos,
            "Producer attached"
        );

        Ok(Self {
            ring,
            format,
            write_pos: snapshot.write_pos,
            cached_read_pos: snapshot.read_pos,
            stats: ChannelStats::default(),
        })
    }

    /// Enqueue one message if there is room.
    ///
    /// Returns `WouldBlock` without copying anything or moving the cursor when
    /// free space is below the encoded message length.
    pub fn try_send(&mut self, payload: &[u8]) -> Result<(), ChannelError> {
        let result = self.send_one(payload);
        match &result {
            Ok(()) => self.stats.record_message(payload.len()),
            Err(e) => self.stats.record_error(e),
        }
        result
    }

    /// Spin per `policy` until the message fits, then enqueue it.
    ///
    /// Fails only with `InvalidLength`, `Timeout` or `Cancelled`; the last two
    /// leave the ring untouched.
    pub fn send_blocking(&mut self, payload: &[u8], policy: &SpinPolicy) -> Result<(), ChannelError> {
        let result = policy.run(|| self.send_one(payload));
        match &result {
            Ok(()) => self.stats.record_message(payload.len()),
            Err(e) => self.stats.record_error(e),
        }
        result
    }

    /// Enqueue as many whole messages from `payloads` as currently fit,
    /// publishing them with a single cursor store.
    ///
    /// Returns the number of messages enqueued. An invalid payload is
    /// reported only if it is the first one; otherwise the batch stops before it.
    /// An empty batch is a no-op returning `Ok(0)`.
    pub fn try_send_batch(&mut self, payloads: &[&[u8]]) -> Result<usize, ChannelError> {
        if payloads.is_empty() {
            return Ok(0);
        }

        let capacity = self.ring.capacity();
        let mut pos = self.write_pos;
        let mut sent = 0;

        for payload in payloads {
            let encoded = match self.format.encoded_len(payload.len(), capacity) {
                Ok(encoded) => encoded,
                Err(e) if sent == 0 => return Err(e),
                Err(_) => break,
            };
            if !self.reserve(pos, encoded) {
                break;
            }
            // SAFETY: reserve confirmed [pos, pos + encoded) is free
            unsafe { self.write_message(pos, payload) };
            pos += encoded as u64;
            sent += 1;
            self.stats.record_message(payload.len());
        }

        if sent == 0 {
            let err = ChannelError::WouldBlock;
            self.stats.record_error(&err);
            return Err(err);
        }

        self.publish(pos);
        Ok(sent)
    }

    /// Bytes that can be written right now, per the latest read cursor.
    pub fn free_space(&mut self) -> usize {
        self.cached_read_pos = self.ring.header().load_read_pos();
        free_space(self.write_pos, self.cached_read_pos, self.ring.capacity())
    }

    pub fn snapshot(&self) -> RingSnapshot {
        self.ring.snapshot()
    }

    pub fn format(&self) -> MessageFormat {
        self.format
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }

    /// Give the region back, ending this handle.
    pub fn into_region(self) -> Arc<SharedRegion> {
        self.ring.into_region()
    }

    fn send_one(&mut self, payload: &[u8]) -> Result<(), ChannelError> {
        let encoded = self.format.encoded_len(payload.len(), self.ring.capacity())?;

        if !self.reserve(self.write_pos, encoded) {
            return Err(ChannelError::WouldBlock);
        }

        // SAFETY: reserve confirmed [write_pos, write_pos + encoded) is free
        unsafe { self.write_message(self.write_pos, payload) };
        self.publish(self.write_pos + encoded as u64);
        Ok(())
    }

    /// Whether `len` bytes starting at `pos` are free, reloading the read
    /// cursor only when the cached one says no.
    fn reserve(&mut self, pos: u64, len: usize) -> bool {
        let capacity = self.ring.capacity();
        if free_space(pos, self.cached_read_pos, capacity) >= len {
            return true;
        }
        self.cached_read_pos = self.ring.header().load_read_pos();
        free_space(pos, self.cached_read_pos, capacity) >= len
    }

    /// # Safety
    /// `[pos, pos + encoded_len)` must be free space owned by this producer.
    unsafe fn write_message(&self, pos: u64, payload: &[u8]) {
        match self.format {
            MessageFormat::Fixed(_) => self.ring.write_at(pos, payload),
            MessageFormat::Framed => {
                let header = FrameHeader::for_payload(payload);
                self.ring.write_at(pos, &header.encode());
                self.ring.write_at(pos + FRAME_HEADER_SIZE as u64, payload);
            }
        }
    }

    fn publish(&mut self, pos: u64) {
        debug_assert!(pos - self.cached_read_pos <= self.ring.capacity() as u64);
        self.write_pos = pos;
        self.ring.header().publish_write_pos(pos);
    }
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("region", self.ring.region().name())
            .field("format", &self.format)
            .field("write_pos", &self.write_pos)
            .finish()
    }
}
