// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! SharedRegion - POSIX shared memory wrapper.
//!
//! Provides safe abstraction over mmap and shm_open for zero-copy IPC.
//! All unsafe operations are encapsulated with bounds checking.

use std::ffi::CString;
use std::fs::File;
use std::os::fd::{AsRawFd, FromRawFd};
use std::ptr::NonNull;

use crate::error::ShmError;
use crate::shm::header::{RingHeader, RingSnapshot, HEADER_SIZE, LAYOUT_VERSION, RING_MAGIC};
use crate::types::{Capacity, RegionName, MAX_CAPACITY, MIN_CAPACITY};

/// A live mapping of the whole object (header + data area).
struct Mapping {
    ptr: NonNull<u8>,
    len: usize,
    /// Keeps the shared memory descriptor open for the mapping's lifetime.
    _file: File,
}

impl Drop for Mapping {
    fn drop(&mut self) {
        // SAFETY: ptr and len describe a mapping created by mmap and not yet unmapped
        let result = unsafe { libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.len) };
        if result < 0 {
            tracing::error!(
                error = %std::io::Error::last_os_error(),
                "Failed to unmap shared memory"
            );
        }
    }
}

/// A named shared memory region holding one ring.
///
/// The creating process is the owner and unlinks the name on drop unless
/// [`SharedRegion::disown`] is called. Attaching processes never unlink.
pub struct SharedRegion {
    /// Name of the shared memory object.
    name: RegionName,
    /// `None` once detached.
    mapping: Option<Mapping>,
    /// Size of the data area in bytes (excluding header).
    capacity: usize,
    /// Whether this instance created the SHM (and should unlink on drop).
    is_owner: bool,
}

// SAFETY: SharedRegion owns its mapping; the raw pointer is valid from any thread.
unsafe impl Send for SharedRegion {}

// SAFETY: SharedRegion exposes no unsynchronized mutation through &self.
// Access to the data area is mediated by the ring's atomic cursors.
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    /// Create a new named region of `HEADER_SIZE + capacity` bytes, zero-filled,
    /// with an initialized ring header.
    ///
    /// # Errors
    /// `ShmError::Allocation` if the name already exists or the object cannot be
    /// sized; `ShmError::Map` if mapping fails.
    pub fn create(name: &RegionName, capacity: Capacity) -> Result<Self, ShmError> {
        let capacity = capacity.bytes();
        let c_name = c_name(name)?;

        // SAFETY: c_name is a valid CString, flags are valid POSIX flags
        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_RDWR | libc::O_EXCL,
                0o600,
            )
        };

        if fd < 0 {
            let errno = std::io::Error::last_os_error();
            let reason = if errno.raw_os_error() == Some(libc::EEXIST) {
                "Shared memory already exists".to_string()
            } else {
                format!("shm_open failed: {}", errno)
            };
            return Err(ShmError::Allocation {
                name: name.to_string(),
                reason,
            });
        }

        // SAFETY: fd was just returned by shm_open and is owned by nobody else
        let file = unsafe { File::from_raw_fd(fd) };

        let total = HEADER_SIZE + capacity;
        if let Err(e) = file.set_len(total as u64) {
            unlink(&c_name);
            return Err(ShmError::Allocation {
                name: name.to_string(),
                reason: format!("ftruncate to {} bytes failed: {}", total, e),
            });
        }

        let mapping = match map(name, file, total) {
            Ok(mapping) => mapping,
            Err(e) => {
                unlink(&c_name);
                return Err(e);
            }
        };

        // Zero-initialize the memory
        // SAFETY: the mapping is valid for `total` bytes
        unsafe {
            std::ptr::write_bytes(mapping.ptr.as_ptr(), 0, total);
        }

        let region = Self {
            name: name.clone(),
            mapping: Some(mapping),
            capacity,
            is_owner: true,
        };

        if let Some(header) = region.header() {
            header.initialize(capacity);
        }

        tracing::debug!(name = %name, capacity = capacity, "Created shared memory region");

        Ok(region)
    }

    /// Attach to an existing region, requiring its capacity to equal `expected`.
    ///
    /// # Errors
    /// `ShmError::NotFound` if no region has that name, `ShmError::SizeMismatch`
    /// if the stored capacity differs. A mismatch leaves the region untouched
    /// for other attachers.
    pub fn attach(name: &RegionName, expected: Capacity) -> Result<Self, ShmError> {
        let region = Self::attach_discovered(name)?;

        if region.capacity != expected.bytes() {
            return Err(ShmError::SizeMismatch {
                name: name.to_string(),
                expected: expected.bytes(),
                actual: region.capacity,
            });
        }

        Ok(region)
    }

    /// Attach to an existing region, taking the capacity from its preamble.
    pub fn attach_discovered(name: &RegionName) -> Result<Self, ShmError> {
        let c_name = c_name(name)?;

        // SAFETY: c_name is a valid CString
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0) };

        if fd < 0 {
            let errno = std::io::Error::last_os_error();
            if errno.raw_os_error() == Some(libc::ENOENT) {
                return Err(ShmError::NotFound {
                    name: name.to_string(),
                });
            }
            return Err(ShmError::Map {
                name: name.to_string(),
                reason: format!("shm_open failed: {}", errno),
            });
        }

        // SAFETY: fd was just returned by shm_open and is owned by nobody else
        let file = unsafe { File::from_raw_fd(fd) };

        let len = file
            .metadata()
            .map_err(|e| ShmError::Map {
                name: name.to_string(),
                reason: format!("fstat failed: {}", e),
            })?
            .len() as usize;

        if len < HEADER_SIZE + MIN_CAPACITY {
            return Err(ShmError::InvalidRegion {
                name: name.to_string(),
                reason: format!("Object is {} bytes, smaller than a minimal ring", len),
            });
        }

        let mapping = map(name, file, len)?;

        // SAFETY: the mapping is at least HEADER_SIZE bytes and page-aligned
        let header = unsafe { &*(mapping.ptr.as_ptr() as *const RingHeader) };

        if header.magic() != RING_MAGIC {
            return Err(ShmError::InvalidRegion {
                name: name.to_string(),
                reason: "Missing ring magic (not a ring, or creator still initializing)"
                    .to_string(),
            });
        }

        if header.version() != LAYOUT_VERSION {
            return Err(ShmError::InvalidRegion {
                name: name.to_string(),
                reason: format!(
                    "Layout version {} is not supported (expected {})",
                    header.version(),
                    LAYOUT_VERSION
                ),
            });
        }

        let capacity = header.capacity() as usize;
        if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&capacity) || HEADER_SIZE + capacity != len {
            return Err(ShmError::InvalidRegion {
                name: name.to_string(),
                reason: format!(
                    "Stored capacity {} does not match object size {}",
                    capacity, len
                ),
            });
        }

        tracing::debug!(name = %name, capacity = capacity, "Attached shared memory region");

        Ok(Self {
            name: name.clone(),
            mapping: Some(mapping),
            capacity,
            is_owner: false,
        })
    }

    /// Unmap the region from this process. Idempotent.
    ///
    /// An owner still unlinks the name when dropped.
    pub fn detach(&mut self) {
        if self.mapping.take().is_some() {
            tracing::debug!(name = %self.name, "Detached shared memory region");
        }
    }

    /// Release the backing object for `name`.
    ///
    /// Only the owning process should call this, after the peer has detached.
    /// Existing mappings stay valid until unmapped.
    pub fn destroy(name: &RegionName) -> Result<(), ShmError> {
        let c_name = c_name(name)?;

        // SAFETY: c_name is a valid CString
        let result = unsafe { libc::shm_unlink(c_name.as_ptr()) };
        if result < 0 {
            let errno = std::io::Error::last_os_error();
            if errno.raw_os_error() == Some(libc::ENOENT) {
                return Err(ShmError::NotFound {
                    name: name.to_string(),
                });
            }
            return Err(ShmError::Allocation {
                name: name.to_string(),
                reason: format!("shm_unlink failed: {}", errno),
            });
        }

        tracing::debug!(name = %name, "Destroyed shared memory region");
        Ok(())
    }

    /// Stop unlinking the name on drop, leaving the object for another process.
    pub fn disown(&mut self) {
        self.is_owner = false;
    }

    /// Get the name of this shared memory region.
    pub fn name(&self) -> &RegionName {
        &self.name
    }

    /// Size of the data area in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_owner(&self) -> bool {
        self.is_owner
    }

    pub fn is_attached(&self) -> bool {
        self.mapping.is_some()
    }

    /// Current cursor positions, or `None` once detached.
    pub fn snapshot(&self) -> Option<RingSnapshot> {
        self.header().map(|h| h.snapshot(self.capacity))
    }

    pub(crate) fn header(&self) -> Option<&RingHeader> {
        // SAFETY: a live mapping is page-aligned and starts with an initialized RingHeader
        self.mapping
            .as_ref()
            .map(|m| unsafe { &*(m.ptr.as_ptr() as *const RingHeader) })
    }

    /// Pointer to the first byte of the data area.
    pub(crate) fn data_ptr(&self) -> Option<NonNull<u8>> {
        // SAFETY: HEADER_SIZE is within the mapping, which is HEADER_SIZE + capacity bytes
        self.mapping
            .as_ref()
            .map(|m| unsafe { NonNull::new_unchecked(m.ptr.as_ptr().add(HEADER_SIZE)) })
    }
}

impl std::fmt::Debug for SharedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRegion")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("is_owner", &self.is_owner)
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        self.detach();

        // If we're the owner, unlink the shared memory
        if self.is_owner {
            match Self::destroy(&self.name) {
                Ok(()) | Err(ShmError::NotFound { .. }) => {}
                Err(e) => tracing::error!(name = %self.name, error = %e, "Failed to unlink shared memory"),
            }
        }
    }
}

fn c_name(name: &RegionName) -> Result<CString, ShmError> {
    CString::new(name.os_name()).map_err(|e| ShmError::Allocation {
        name: name.to_string(),
        reason: format!("Invalid name: {}", e),
    })
}

fn unlink(c_name: &CString) {
    // SAFETY: c_name is a valid CString
    unsafe { libc::shm_unlink(c_name.as_ptr()) };
}

fn map(name: &RegionName, file: File, len: usize) -> Result<Mapping, ShmError> {
    // SAFETY: fd is valid, len matches the object size, offset 0 is valid
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            file.as_raw_fd(),
            0,
        )
    };

    if ptr == libc::MAP_FAILED {
        return Err(ShmError::Map {
            name: name.to_string(),
            reason: format!("mmap failed: {}", std::io::Error::last_os_error()),
        });
    }

    let ptr = NonNull::new(ptr as *mut u8).ok_or_else(|| ShmError::Map {
        name: name.to_string(),
        reason: "mmap returned null".to_string(),
    })?;

    Ok(Mapping {
        ptr,
        len,
        _file: file,
    })
}
