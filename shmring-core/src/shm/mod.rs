// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shared Memory module.
//!
//! Zero-copy inter-process communication using POSIX shared memory.
//! Holds the named region wrapper, the ring header layout, and message framing.

pub mod frame;
pub mod header;
mod region;

pub use frame::{FrameHeader, MessageFormat};
pub use header::{free_space, occupied, physical_offset, RingGeometry, RingSnapshot, HEADER_SIZE};
pub use region::SharedRegion;
