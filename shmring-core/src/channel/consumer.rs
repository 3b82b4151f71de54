// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Read side of the channel.

use std::sync::Arc;

use crate::channel::RingView;
use crate::error::ChannelError;
use crate::shm::frame::{self, FRAME_HEADER_SIZE};
use crate::shm::header::occupied;
use crate::shm::{FrameHeader, MessageFormat, RingSnapshot, SharedRegion};
use crate::stats::ChannelStats;
use crate::sync::SpinPolicy;

/// Next message located at the read cursor but not yet consumed.
#[derive(Debug, Clone, Copy)]
struct PendingMessage {
    /// Offset of the payload from the read cursor.
    payload_offset: usize,
    payload_len: usize,
    /// Ring bytes released once consumed.
    encoded_len: usize,
    checksum: Option<u32>,
}

/// Consumer handle: dequeues messages in write order without locks.
pub struct Consumer {
    ring: RingView,
    format: MessageFormat,
    /// Local mirror of the read cursor. This handle is its only writer.
    read_pos: u64,
    /// Last write cursor observed; refreshed only when it looks insufficient.
    cached_write_pos: u64,
    stats: ChannelStats,
}

impl Consumer {
    /// Create the consumer handle over `region`.
    pub fn new(region: Arc<SharedRegion>, format: MessageFormat) -> Result<Self, ChannelError> {
        let ring = RingView::new(region, &format)?;
        let snapshot = ring.snapshot();

        tracing::debug!(
            region = %ring.region().name(),
            format = %format,
            read_pos = snapshot.read_pos,
            "Consumer attached"
        );

        Ok(Self {
            ring,
            format,
            read_pos: snapshot.read_pos,
            cached_write_pos: snapshot.write_pos,
            stats: ChannelStats::default(),
        })
    }

    /// Dequeue the next message if one is fully published.
    ///
    /// Returns `WouldBlock` without moving the read cursor when no complete
    /// message is available. A framed message whose checksum fails is consumed
    /// and reported as `ChecksumMismatch`, so the stream continues after it.
    pub fn try_recv(&mut self) -> Result<Vec<u8>, ChannelError> {
        let result = self.recv_one();
        self.record(&result);
        result
    }

    /// Spin per `policy` until a message is available, then dequeue it.
    pub fn recv_blocking(&mut self, policy: &SpinPolicy) -> Result<Vec<u8>, ChannelError> {
        let result = policy.run(|| self.recv_one());
        self.record(&result);
        result
    }

    /// Dequeue the next message into `buf`, returning its length.
    ///
    /// A buffer shorter than the message fails with `InvalidLength` and
    /// leaves the message in the ring.
    pub fn try_recv_into(&mut self, buf: &mut [u8]) -> Result<usize, ChannelError> {
        let result = self.peek().and_then(|pending| {
            if buf.len() < pending.payload_len {
                return Err(ChannelError::InvalidLength {
                    len: buf.len(),
                    reason: format!("Buffer too small for {}-byte message", pending.payload_len),
                });
            }
            let dst = &mut buf[..pending.payload_len];
            let checked = self.copy_payload(&pending, dst);
            self.release(self.read_pos + pending.encoded_len as u64);
            checked.map(|()| pending.payload_len)
        });
        match &result {
            Ok(len) => self.stats.record_message(*len),
            Err(e) => self.stats.record_error(e),
        }
        result
    }

    /// Dequeue up to `max` messages, releasing them with a single cursor store.
    ///
    /// A corrupt frame ends the batch before it; it is reported only when it
    /// is the first message, by the same rules as [`Consumer::try_recv`].
    pub fn try_recv_batch(&mut self, max: usize) -> Result<Vec<Vec<u8>>, ChannelError> {
        let mut messages = Vec::with_capacity(max.min(32));
        let mut pos = self.read_pos;

        while messages.len() < max {
            let pending = match self.peek_at(pos) {
                Ok(pending) => pending,
                Err(e) if messages.is_empty() => {
                    self.stats.record_error(&e);
                    return Err(e);
                }
                Err(_) => break,
            };

            let mut payload = vec![0u8; pending.payload_len];
            // SAFETY: peek_at confirmed the whole message is published
            unsafe {
                self.ring
                    .read_at(pos + pending.payload_offset as u64, &mut payload)
            };
            if let Some(expected) = pending.checksum {
                if let Err(e) = frame::validate_checksum(&payload, expected) {
                    if !messages.is_empty() {
                        break;
                    }
                    self.stats.record_error(&e);
                    self.release(pos + pending.encoded_len as u64);
                    return Err(e);
                }
            }

            pos += pending.encoded_len as u64;
            self.stats.record_message(payload.len());
            messages.push(payload);
        }

        self.release(pos);
        Ok(messages)
    }

    /// Bytes published but not yet consumed, per the latest write cursor.
    pub fn available(&mut self) -> usize {
        self.cached_write_pos = self.ring.header().load_write_pos();
        occupied(self.cached_write_pos, self.read_pos)
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

    fn record(&mut self, result: &Result<Vec<u8>, ChannelError>) {
        match result {
            Ok(payload) => self.stats.record_message(payload.len()),
            Err(e) => self.stats.record_error(e),
        }
    }

    fn recv_one(&mut self) -> Result<Vec<u8>, ChannelError> {
        let pending = self.peek()?;
        let mut payload = vec![0u8; pending.payload_len];
        let checked = self.copy_payload(&pending, &mut payload);
        self.release(self.read_pos + pending.encoded_len as u64);
        checked.map(|()| payload)
    }

    fn peek(&mut self) -> Result<PendingMessage, ChannelError> {
        self.peek_at(self.read_pos)
    }

    /// Locate the message starting at `pos` without consuming it.
    fn peek_at(&mut self, pos: u64) -> Result<PendingMessage, ChannelError> {
        match self.format {
            MessageFormat::Fixed(size) => {
                self.ensure_published(pos, size)?;
                Ok(PendingMessage {
                    payload_offset: 0,
                    payload_len: size,
                    encoded_len: size,
                    checksum: None,
                })
            }
            MessageFormat::Framed => {
                self.ensure_published(pos, FRAME_HEADER_SIZE)?;

                let mut raw = [0u8; FRAME_HEADER_SIZE];
                // SAFETY: the header bytes are published and not yet released
                unsafe { self.ring.read_at(pos, &mut raw) };
                let header = FrameHeader::decode(raw);

                let encoded_len = header.frame_len();
                if header.length == 0 || encoded_len > self.ring.capacity() {
                    return Err(ChannelError::CorruptFrame {
                        reason: format!(
                            "Frame at position {} declares {} payload bytes (capacity {})",
                            pos,
                            header.length,
                            self.ring.capacity()
                        ),
                    });
                }

                self.ensure_published(pos, encoded_len)?;
                Ok(PendingMessage {
                    payload_offset: FRAME_HEADER_SIZE,
                    payload_len: header.length as usize,
                    encoded_len,
                    checksum: Some(header.checksum),
                })
            }
        }
    }

    /// `WouldBlock` unless `len` bytes from `pos` are published, reloading
    /// the write cursor only when the cached one says no.
    fn ensure_published(&mut self, pos: u64, len: usize) -> Result<(), ChannelError> {
        if occupied(self.cached_write_pos, pos) >= len {
            return Ok(());
        }
        self.cached_write_pos = self.ring.header().load_write_pos();
        if occupied(self.cached_write_pos, pos) >= len {
            Ok(())
        } else {
            Err(ChannelError::WouldBlock)
        }
    }

    fn copy_payload(&self, pending: &PendingMessage, dst: &mut [u8]) -> Result<(), ChannelError> {
        debug_assert_eq!(dst.len(), pending.payload_len);
        // SAFETY: peek confirmed the whole message is published and unreleased
        unsafe {
            self.ring
                .read_at(self.read_pos + pending.payload_offset as u64, dst)
        };
        match pending.checksum {
            Some(expected) => frame::validate_checksum(dst, expected),
            None => Ok(()),
        }
    }

    fn release(&mut self, pos: u64) {
        debug_assert!(pos <= self.cached_write_pos);
        self.read_pos = pos;
        self.ring.header().publish_read_pos(pos);
    }
}

impl std::fmt::Debug for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("region", self.ring.region().name())
            .field("format", &self.format)
            .field("read_pos", &self.read_pos)
            .finish()
    }
}
