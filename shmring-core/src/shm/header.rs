// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Ring buffer header layout and cursor arithmetic.
//!
//! The header occupies the first three cache lines of every region:
//!
//! ```text
//! 0    preamble  [magic: u64][version: u32][reserved: u32][capacity: u64] ...
//! 64   write_pos [u64] ... (producer-owned line)
//! 128  read_pos  [u64] ... (consumer-owned line)
//! 192  data      [capacity bytes]
//! ```
//!
//! Cursors are monotonically increasing byte counters. They are never wrapped;
//! the physical offset into the data area is computed at access time.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Cache line size on x86_64, ARM64, and most modern CPUs.
pub const CACHE_LINE_SIZE: usize = 64;

/// Total header size in bytes. The data area starts here.
pub const HEADER_SIZE: usize = 3 * CACHE_LINE_SIZE;

/// "SHMRING" followed by a format byte.
pub const RING_MAGIC: u64 = 0x5348_4D52_494E_4701;

/// Bumped whenever the header layout changes.
pub const LAYOUT_VERSION: u32 = 1;

/// Wrapper forcing its contents onto a dedicated cache line.
#[repr(C, align(64))]
pub(crate) struct CacheLine<T>(pub T);

/// First cache line: identifies the ring and carries its capacity so an
/// attaching process can verify (or discover) it before touching the data.
#[repr(C, align(64))]
pub(crate) struct Preamble {
    pub magic: AtomicU64,
    pub version: AtomicU32,
    _reserved: AtomicU32,
    pub capacity: AtomicU64,
}

/// Ring buffer header stored at the start of shared memory.
#[repr(C)]
pub(crate) struct RingHeader {
    pub preamble: Preamble,
    /// Write position (owned by producer).
    pub write_pos: CacheLine<AtomicU64>,
    /// Read position (owned by consumer).
    pub read_pos: CacheLine<AtomicU64>,
}

const _: () = assert!(std::mem::size_of::<RingHeader>() == HEADER_SIZE);
const _: () = assert!(std::mem::align_of::<RingHeader>() == CACHE_LINE_SIZE);

impl RingHeader {
    /// Initialize a freshly zeroed header.
    ///
    /// The magic number is stored last with release ordering, so a peer that
    /// observes it with acquire ordering also observes the capacity and cursors.
    pub fn initialize(&self, capacity: usize) {
        self.write_pos.0.store(0, Ordering::Relaxed);
        self.read_pos.0.store(0, Ordering::Relaxed);
        self.preamble.capacity.store(capacity as u64, Ordering::Relaxed);
        self.preamble.version.store(LAYOUT_VERSION, Ordering::Relaxed);
        self.preamble.magic.store(RING_MAGIC, Ordering::Release);
    }

    pub fn magic(&self) -> u64 {
        self.preamble.magic.load(Ordering::Acquire)
    }

    pub fn version(&self) -> u32 {
        self.preamble.version.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> u64 {
        self.preamble.capacity.load(Ordering::Acquire)
    }

    pub fn load_write_pos(&self) -> u64 {
        self.write_pos.0.load(Ordering::Acquire)
    }

    pub fn load_read_pos(&self) -> u64 {
        self.read_pos.0.load(Ordering::Acquire)
    }

    /// Publish a new write position. Everything written to the data area
    /// before this call becomes visible to a consumer that loads the new value.
    pub fn publish_write_pos(&self, pos: u64) {
        self.write_pos.0.store(pos, Ordering::Release);
    }

    /// Publish a new read position, releasing the consumed bytes to the producer.
    pub fn publish_read_pos(&self, pos: u64) {
        self.read_pos.0.store(pos, Ordering::Release);
    }

    /// Load both cursors into a consistent snapshot.
    ///
    /// Retries until the write cursor is unchanged across the read-cursor
    /// load, so the pair existed together at one instant and always holds
    /// `read_pos <= write_pos <= read_pos + capacity`.
    pub fn snapshot(&self, capacity: usize) -> RingSnapshot {
        let mut write_pos = self.load_write_pos();
        loop {
            let read_pos = self.load_read_pos();
            let recheck = self.load_write_pos();
            if recheck == write_pos {
                return RingSnapshot {
                    write_pos,
                    read_pos,
                    capacity,
                };
            }
            write_pos = recheck;
            std::hint::spin_loop();
        }
    }
}

/// Point-in-time view of both cursors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingSnapshot {
    pub write_pos: u64,
    pub read_pos: u64,
    pub capacity: usize,
}

impl RingSnapshot {
    /// Bytes written but not yet consumed.
    pub fn occupied(&self) -> usize {
        occupied(self.write_pos, self.read_pos)
    }

    /// Bytes the producer may still write without overtaking the consumer.
    pub fn free_space(&self) -> usize {
        free_space(self.write_pos, self.read_pos, self.capacity)
    }

    pub fn is_empty(&self) -> bool {
        self.write_pos == self.read_pos
    }

    /// `read_pos <= write_pos <= read_pos + capacity`
    pub fn holds_invariant(&self) -> bool {
        self.read_pos <= self.write_pos
            && self.write_pos - self.read_pos <= self.capacity as u64
    }
}

/// Bytes between the two cursors.
#[inline]
pub fn occupied(write_pos: u64, read_pos: u64) -> usize {
    debug_assert!(read_pos <= write_pos, "read cursor overtook write cursor");
    write_pos.wrapping_sub(read_pos) as usize
}

/// Free bytes in a ring of `capacity` bytes.
#[inline]
pub fn free_space(write_pos: u64, read_pos: u64, capacity: usize) -> usize {
    capacity.saturating_sub(occupied(write_pos, read_pos))
}

/// Offset of cursor `pos` inside a data area of `capacity` bytes.
#[inline]
pub fn physical_offset(pos: u64, capacity: usize) -> usize {
    RingGeometry::new(capacity).offset(pos)
}

/// Precomputed addressing for a data area.
///
/// Power-of-two capacities reduce the modulo to a mask; anything else falls
/// back to true modulo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingGeometry {
    capacity: usize,
    mask: Option<u64>,
}

impl RingGeometry {
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0);
        let mask = capacity.is_power_of_two().then(|| capacity as u64 - 1);
        Self { capacity, mask }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn offset(&self, pos: u64) -> usize {
        match self.mask {
            Some(mask) => (pos & mask) as usize,
            None => (pos % self.capacity as u64) as usize,
        }
    }

    /// Split `len` bytes starting at `pos` into the contiguous run up to the
    /// end of the data area and the remainder that wraps to offset zero.
    #[inline]
    pub fn segments(&self, pos: u64, len: usize) -> (usize, usize, usize) {
        debug_assert!(len <= self.capacity);
        let offset = self.offset(pos);
        let first = len.min(self.capacity - offset);
        (offset, first, len - first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        assert_eq!(std::mem::size_of::<Preamble>(), CACHE_LINE_SIZE);
        assert_eq!(std::mem::size_of::<CacheLine<AtomicU64>>(), CACHE_LINE_SIZE);
        assert_eq!(std::mem::offset_of!(RingHeader, write_pos), 64);
        assert_eq!(std::mem::offset_of!(RingHeader, read_pos), 128);
    }

    #[test]
    fn test_occupied_and_free_space() {
        assert_eq!(occupied(1000, 0), 1000);
        assert_eq!(free_space(1000, 0, 1024), 24);
        assert_eq!(free_space(1000, 100, 1024), 124);
        assert_eq!(free_space(5000, 5000, 1024), 1024);
    }

    #[test]
    fn test_physical_offset_power_of_two() {
        assert_eq!(physical_offset(0, 1024), 0);
        assert_eq!(physical_offset(1023, 1024), 1023);
        assert_eq!(physical_offset(1024, 1024), 0);
        assert_eq!(physical_offset(1100, 1024), 76);
    }

    #[test]
    fn test_physical_offset_true_modulo() {
        assert_eq!(physical_offset(1000, 1000), 0);
        assert_eq!(physical_offset(2999, 1000), 999);
        assert_eq!(physical_offset(u64::MAX, 1000), (u64::MAX % 1000) as usize);
    }

    #[test]
    fn test_segments_straddling_end() {
        let geometry = RingGeometry::new(1024);
        assert_eq!(geometry.segments(980, 100), (980, 44, 56));
        assert_eq!(geometry.segments(100, 100), (100, 100, 0));
        assert_eq!(geometry.segments(1024 + 924, 100), (924, 100, 0));
    }

    #[test]
    fn test_snapshot_invariant() {
        let ok = RingSnapshot {
            write_pos: 1024,
            read_pos: 0,
            capacity: 1024,
        };
        assert!(ok.holds_invariant());
        assert_eq!(ok.free_space(), 0);

        let overrun = RingSnapshot {
            write_pos: 1025,
            read_pos: 0,
            capacity: 1024,
        };
        assert!(!overrun.holds_invariant());
    }
}
