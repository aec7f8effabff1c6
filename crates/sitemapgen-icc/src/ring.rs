//! The ring buffer itself: fixed-capacity circular array of records.
//!
//! Every operation here assumes the caller already holds the "RW" mutex
//! (`spec.md` 4.A/4.D) — this type performs no locking and no atomics; it is
//! plain index arithmetic over a region that may be shared memory.

use crate::shm_layout::{bytes_for_ring, RingHeader};
use std::marker::PhantomData;
use std::mem::size_of;

/// A view over a ring buffer region: a header followed by `capacity` slots
/// of `T`. Does not own the memory — `crate::pipe` owns the mmap and hands
/// out views into it.
pub struct RingView<T: Copy> {
    header: *mut RingHeader,
    slots: *mut T,
    capacity: usize,
    _pd: PhantomData<T>,
}

// SAFETY: all access is externally synchronized by the RW mutex in
// `crate::pipe`; the pointers here are to a memory-mapped region, not
// thread-local data.
unsafe impl<T: Copy> Send for RingView<T> {}

impl<T: Copy> RingView<T> {
    /// Initializes a brand-new ring buffer header and slots at `base` /
    /// `base + size_of::<RingHeader>()`. Only the receiver calls this, once,
    /// right after creating the shared memory segment (`spec.md` 4.D
    /// "Receiver initialization").
    ///
    /// # Safety
    /// `base` must point to at least `bytes_for_ring::<T>(capacity)` bytes of
    /// exclusively-owned, writable memory.
    pub unsafe fn init(base: *mut u8, capacity: usize) -> Self {
        let header = base as *mut RingHeader;
        unsafe {
            std::ptr::write(header, RingHeader::new(capacity as u64, size_of::<T>() as u64));
        }
        let slots = unsafe { base.add(size_of::<RingHeader>()) as *mut T };
        RingView { header, slots, capacity, _pd: PhantomData }
    }

    /// Attaches to an existing ring buffer header at `base`, validating it.
    ///
    /// # Safety
    /// `base` must point to a region previously initialized by [`Self::init`]
    /// with the same element type `T`.
    pub unsafe fn attach(base: *mut u8) -> Result<Self, &'static str> {
        let header = base as *mut RingHeader;
        unsafe { (*header).validate::<T>()? };
        let capacity = unsafe { (*header).capacity as usize };
        let slots = unsafe { base.add(size_of::<RingHeader>()) as *mut T };
        Ok(RingView { header, slots, capacity, _pd: PhantomData })
    }

    pub fn bytes_needed(capacity: usize) -> usize {
        bytes_for_ring::<T>(capacity)
    }

    #[inline]
    fn header(&self) -> &RingHeader {
        unsafe { &*self.header }
    }

    #[inline]
    fn header_mut(&mut self) -> &mut RingHeader {
        unsafe { &mut *self.header }
    }

    /// Number of records currently available to the reader.
    ///
    /// `spec.md` 4.A: `available = (end - begin + CAPACITY) mod CAPACITY`.
    pub fn count(&self) -> usize {
        let h = self.header();
        let begin = h.begin as i64;
        let end = h.end as i64;
        let cap = self.capacity as i64;
        (((end - begin) % cap + cap) % cap) as usize
    }

    /// Copies up to `n` records from `records` into the ring starting at
    /// `end`, stopping one slot short of `begin` so the slot at `begin` is
    /// never overwritten. Returns the number actually written. Never blocks,
    /// never fails.
    pub fn write(&mut self, records: &[T], n: usize) -> usize {
        let n = n.min(records.len());
        let cap = self.capacity;
        let free = cap - 1 - self.count();
        let to_write = n.min(free);

        let end = self.header().end as usize;
        for i in 0..to_write {
            let idx = (end + i) % cap;
            unsafe { std::ptr::write(self.slots.add(idx), records[i]) };
        }
        self.header_mut().end = ((end + to_write) % cap) as i32;
        to_write
    }

    /// Reads `count()` records (or fewer, if `max` is smaller) into `out`,
    /// starting at `begin`, without consuming them. Returns the number
    /// copied. Used by the receiver to snapshot all available records while
    /// holding the RW mutex, before releasing it (`spec.md` 4.D "Receive
    /// contract").
    pub fn copy_available(&self, out: &mut Vec<T>, max: usize) -> usize {
        let avail = self.count().min(max);
        let begin = self.header().begin as usize;
        let cap = self.capacity;
        out.clear();
        out.reserve(avail);
        for i in 0..avail {
            let idx = (begin + i) % cap;
            out.push(unsafe { std::ptr::read(self.slots.add(idx)) });
        }
        avail
    }

    /// Advances `begin` by `n` (mod capacity). Only the reader calls this,
    /// after copying records out (`spec.md` 4.A "consume(n)").
    pub fn consume(&mut self, n: usize) {
        let cap = self.capacity;
        let begin = self.header().begin as usize;
        self.header_mut().begin = ((begin + n) % cap) as i32;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_ring(capacity: usize) -> (Vec<u8>, RingView<u64>) {
        let mut buf = vec![0u8; RingView::<u64>::bytes_needed(capacity)];
        let view = unsafe { RingView::<u64>::init(buf.as_mut_ptr(), capacity) };
        (buf, view)
    }

    #[test]
    fn write_then_read_then_consume() {
        let (_buf, mut ring) = make_ring(8);
        let written = ring.write(&[1, 2, 3], 3);
        assert_eq!(written, 3);
        assert_eq!(ring.count(), 3);

        let mut out = Vec::new();
        let copied = ring.copy_available(&mut out, 100);
        assert_eq!(copied, 3);
        assert_eq!(out, vec![1, 2, 3]);

        ring.consume(3);
        assert_eq!(ring.count(), 0);
    }

    #[test]
    fn write_never_overwrites_unconsumed_slots() {
        // capacity-1 live records is the max; writing more is clamped.
        let (_buf, mut ring) = make_ring(4);
        let data = [10, 20, 30, 40, 50];
        let written = ring.write(&data, data.len());
        assert_eq!(written, 3); // capacity - 1
        assert_eq!(ring.count(), 3);
    }

    #[test]
    fn wrap_around_never_overwrites_unconsumed() {
        let (_buf, mut ring) = make_ring(4);
        assert_eq!(ring.write(&[1, 2, 3], 3), 3);
        ring.consume(2);
        assert_eq!(ring.count(), 1);
        // two free slots now (cap-1 - count = 3 - 1 = 2)
        let written = ring.write(&[4, 5, 6], 3);
        assert_eq!(written, 2);
        let mut out = Vec::new();
        ring.copy_available(&mut out, 100);
        assert_eq!(out, vec![3, 4, 5]);
    }

    #[test]
    fn many_small_writes_and_consumes_preserve_order_for_any_k() {
        for k in 1..7usize {
            let (_buf, mut ring) = make_ring(8);
            assert_eq!(ring.write(&[0, 1, 2, 3, 4, 5, 6], 7), 7); // cap - 1
            ring.consume(k);
            let written = ring.write(&[100, 101, 102, 103, 104, 105, 106], k);
            assert_eq!(written, k);
            let mut out = Vec::new();
            ring.copy_available(&mut out, 100);
            let expected: Vec<u64> = ((k as u64)..7).chain(100..(100 + k as u64)).collect();
            assert_eq!(out, expected);
        }
    }
}
