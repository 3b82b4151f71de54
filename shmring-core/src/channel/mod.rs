// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! SPSC channel over a shared ring.
//!
//! A [`Producer`] and a [`Consumer`] are thin views over the same
//! [`SharedRegion`]. The producer owns the write cursor and the bytes ahead of
//! the read cursor; the consumer owns the read cursor and the bytes behind the
//! write cursor. They coordinate only through the two atomic cursors.
//!
//! Exactly one producer and one consumer may operate on a region at a time.
//! This is a caller contract and is not checked.

mod consumer;
mod producer;

use std::ptr::NonNull;
use std::sync::Arc;

pub use consumer::Consumer;
pub use producer::Producer;

use crate::error::{ChannelError, ShmError};
use crate::shm::header::{RingHeader, RingSnapshot};
use crate::shm::{MessageFormat, RingGeometry, SharedRegion};

/// Build both handles over one region, for two threads of the same process.
pub fn channel(
    region: Arc<SharedRegion>,
    format: MessageFormat,
) -> Result<(Producer, Consumer), ChannelError> {
    let producer = Producer::new(Arc::clone(&region), format)?;
    let consumer = Consumer::new(region, format)?;
    Ok((producer, consumer))
}

/// Addressing over a mapped ring: cursor access plus wraparound copies.
pub(crate) struct RingView {
    /// Keeps the mapping alive for as long as the pointers below are used.
    region: Arc<SharedRegion>,
    header: NonNull<RingHeader>,
    data: NonNull<u8>,
    geometry: RingGeometry,
}

// SAFETY: the pointers refer to a shared mapping kept alive by `region`,
// which is itself Send + Sync.
unsafe impl Send for RingView {}

impl RingView {
    pub(crate) fn new(
        region: Arc<SharedRegion>,
        format: &MessageFormat,
    ) -> Result<Self, ChannelError> {
        let detached = || ShmError::InvalidRegion {
            name: region.name().to_string(),
            reason: "Region is detached".to_string(),
        };
        let header = region.header().map(NonNull::from).ok_or_else(detached)?;
        let data = region.data_ptr().ok_or_else(detached)?;

        format.validate(region.capacity())?;
        let geometry = RingGeometry::new(region.capacity());

        Ok(Self {
            region,
            header,
            data,
            geometry,
        })
    }

    pub(crate) fn header(&self) -> &RingHeader {
        // SAFETY: the mapping outlives self (held through `region`) and
        // starts with an initialized header
        unsafe { self.header.as_ref() }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.geometry.capacity()
    }

    pub(crate) fn snapshot(&self) -> RingSnapshot {
        self.header().snapshot(self.capacity())
    }

    pub(crate) fn region(&self) -> &Arc<SharedRegion> {
        &self.region
    }

    pub(crate) fn into_region(self) -> Arc<SharedRegion> {
        self.region
    }

    /// Copy `src` into the data area starting at cursor `pos`, splitting the
    /// copy in two when it straddles the end of the data area.
    ///
    /// # Safety
    /// The caller must own `[pos, pos + src.len())`: it lies between the read
    /// and write cursors' exclusive regions as the SPSC protocol assigns them,
    /// and `src.len() <= capacity`.
    pub(crate) unsafe fn write_at(&self, pos: u64, src: &[u8]) {
        let (offset, first, rest) = self.geometry.segments(pos, src.len());
        let data = self.data.as_ptr();
        std::ptr::copy_nonoverlapping(src.as_ptr(), data.add(offset), first);
        if rest > 0 {
            std::ptr::copy_nonoverlapping(src.as_ptr().add(first), data, rest);
        }
    }

    /// Copy `dst.len()` bytes starting at cursor `pos` out of the data area.
    ///
    /// # Safety
    /// The bytes must have been published by the producer and not yet
    /// released by the consumer, and `dst.len() <= capacity`.
    pub(crate) unsafe fn read_at(&self, pos: u64, dst: &mut [u8]) {
        let (offset, first, rest) = self.geometry.segments(pos, dst.len());
        let data = self.data.as_ptr();
        std::ptr::copy_nonoverlapping(data.add(offset), dst.as_mut_ptr(), first);
        if rest > 0 {
            std::ptr::copy_nonoverlapping(data, dst.as_mut_ptr().add(first), rest);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::region;
    use super::*;

    #[test]
    fn test_wrapped_copy_roundtrip() {
        let region = region("wrapcopy", 1024);
        let view = RingView::new(region, &MessageFormat::Framed).unwrap();
        let payload: Vec<u8> = (0..100u8).collect();

        let mut out = vec![0u8; 100];
        // SAFETY: single-threaded test owns the whole data area
        unsafe {
            view.write_at(980, &payload);
            view.read_at(980, &mut out);
        }
        assert_eq!(out, payload);

        // Tail landed at offset 0
        let mut tail = vec![0u8; 56];
        unsafe { view.read_at(1024, &mut tail) };
        assert_eq!(tail, payload[44..]);
    }

    #[test]
    fn test_detached_region_rejected() {
        let name = test_support::unique_name("detached");
        let mut raw =
            SharedRegion::create(&name, crate::types::Capacity::new(4096).unwrap()).unwrap();
        raw.detach();
        let result = RingView::new(Arc::new(raw), &MessageFormat::Framed);
        assert!(matches!(
            result,
            Err(ChannelError::Region(ShmError::InvalidRegion { .. }))
        ));
    }

    #[test]
    fn test_channel_rejects_oversized_fixed_format() {
        let region = region("oversize", 1024);
        let result = channel(region, MessageFormat::Fixed(2048));
        assert!(matches!(result, Err(ChannelError::InvalidLength { .. })));
    }
}
