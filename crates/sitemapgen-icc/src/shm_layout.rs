//! Shared memory layout for the single-reader/many-writer ring buffer.
//!
//! # Memory Layout
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │ magic │ version │ capacity │ elem_size │ begin │ end │  pad     │  (header)
//! ├────────────────────────────────────────────────────────────────┤
//! │                         records[0]                              │
//! ├────────────────────────────────────────────────────────────────┤
//! │                           ...                                   │
//! ├────────────────────────────────────────────────────────────────┤
//! │                     records[capacity-1]                         │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Unlike a lock-free SPMC ring, this buffer stores no synchronization state
//! of its own (`spec.md` 4.A: "the buffer does not provide synchronization
//! itself") — `begin`/`end` are plain `i32`s, made safe by the RW mutex that
//! every caller in `crate::pipe` takes before touching the header or slots.

use std::mem::size_of;

/// ASCII "SMGENRNG" — identifies a valid ring buffer segment.
pub const RING_MAGIC: u64 = 0x534D_4745_4E52_4E47;
pub const RING_VERSION: u64 = 1;

#[repr(C)]
pub struct RingHeader {
    pub magic: u64,
    pub version: u64,
    pub capacity: u64,
    pub elem_size: u64,
    /// Index of the oldest unconsumed record.
    pub begin: i32,
    /// Index one past the newest written record.
    pub end: i32,
}

impl RingHeader {
    pub fn new(capacity: u64, elem_size: u64) -> Self {
        RingHeader {
            magic: RING_MAGIC,
            version: RING_VERSION,
            capacity,
            elem_size,
            begin: 0,
            end: 0,
        }
    }

    pub fn validate<T: Copy>(&self) -> Result<(), &'static str> {
        if self.magic != RING_MAGIC {
            return Err("bad ring magic");
        }
        if self.version != RING_VERSION {
            return Err("ring version mismatch");
        }
        if self.elem_size as usize != size_of::<T>() {
            return Err("ring element size mismatch");
        }
        if self.capacity == 0 {
            return Err("ring capacity must be nonzero");
        }
        Ok(())
    }
}

/// Total bytes needed for a ring buffer region holding `capacity` elements
/// of type `T`: header plus `capacity` slots.
pub fn bytes_for_ring<T: Copy>(capacity: usize) -> usize {
    size_of::<RingHeader>() + capacity * size_of::<T>()
}
