use crate::sync::{AtomicPtr, AtomicUsize, Ordering};
use std::boxed::Box;
use std::ptr;
use std::sync::OnceLock;

/// log2 of the first segment's capacity.
const FIRST_SHIFT: u32 = 5;
const FIRST: usize = 1 << FIRST_SHIFT;

/// Segment `k` holds `FIRST << k` entries; 27 segments cover just under 2^32 indices.
const SEGMENTS: usize = 27;

/// Total number of indices the arena can hand out.
pub(crate) const CAPACITY: usize = FIRST * ((1 << SEGMENTS) - 1);

/// Maps an arena index to `(segment, offset within segment)`.
#[inline]
fn locate(index: usize) -> (usize, usize) {
    let n = index + FIRST;
    let segment = (usize::BITS - 1 - n.leading_zeros() - FIRST_SHIFT) as usize;
    (segment, n - (FIRST << segment))
}

/// Append-only, lock-free storage addressed by a dense `u32` index.
///
/// Entries never move and are only dropped together with the arena, so an
/// index obtained from any thread stays dereferenceable for the arena's
/// lifetime. Segments double in size and are installed by CAS on first use.
///
/// 只追加的无锁存储，使用紧凑的 `u32` 索引寻址。
/// 条目不会移动，只会随 arena 一起被 drop，
/// 因此从任何线程获得的索引在 arena 生命周期内始终可以解引用。
pub(crate) struct Arena<T> {
    segments: [AtomicPtr<OnceLock<T>>; SEGMENTS],
    len: AtomicUsize,
}

// SAFETY: the arena hands out `&T` to any thread and accepts `T` from any
// thread; entries are only dropped in `Drop`, which needs `&mut self`.
unsafe impl<T: Send> Send for Arena<T> {}
unsafe impl<T: Send + Sync> Sync for Arena<T> {}

impl<T> Arena<T> {
    pub(crate) fn new() -> Self {
        Self {
            segments: std::array::from_fn(|_| AtomicPtr::new(ptr::null_mut())),
            len: AtomicUsize::new(0),
        }
    }

    /// Number of indices handed out so far.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len.load(Ordering::Acquire).min(CAPACITY)
    }

    /// Append a value and return its index.
    ///
    /// # Panics
    /// Panics once `CAPACITY` entries have been pushed.
    pub(crate) fn push(&self, value: T) -> u32 {
        let index = self.len.fetch_add(1, Ordering::AcqRel);
        assert!(index < CAPACITY, "arena capacity of {CAPACITY} entries exhausted");

        let (segment, offset) = locate(index);
        let base = self.segment(segment);
        // SAFETY: `offset < FIRST << segment`, the segment's length, and
        // segments are only freed in `Drop`.
        let slot = unsafe { &*base.add(offset) };
        let stored = slot.set(value).is_ok();
        debug_assert!(stored, "arena index {index} handed out twice");

        index as u32
    }

    /// Look up an entry. `None` if the index was never pushed or is still being written.
    #[inline]
    pub(crate) fn get(&self, index: u32) -> Option<&T> {
        let index = index as usize;
        if index >= CAPACITY {
            return None;
        }
        let (segment, offset) = locate(index);
        let base = self.segments[segment].load(Ordering::Acquire);
        if base.is_null() {
            return None;
        }
        // SAFETY: non-null segment pointers always point to a live slice of
        // `FIRST << segment` cells and `offset` is within it.
        unsafe { (*base.add(offset)).get() }
    }

    /// Iterate over every published entry in index order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.len()).filter_map(move |index| self.get(index as u32))
    }

    fn segment(&self, segment: usize) -> *const OnceLock<T> {
        let current = self.segments[segment].load(Ordering::Acquire);
        if !current.is_null() {
            return current;
        }

        let size = FIRST << segment;
        let fresh: Box<[OnceLock<T>]> = (0..size).map(|_| OnceLock::new()).collect();
        let fresh = Box::into_raw(fresh) as *mut OnceLock<T>;

        match self.segments[segment].compare_exchange(
            ptr::null_mut(),
            fresh,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => fresh,
            Err(winner) => {
                // Lost the race: nothing was written into `fresh` yet.
                unsafe {
                    drop(Box::from_raw(ptr::slice_from_raw_parts_mut(fresh, size)));
                }
                winner
            }
        }
    }
}

impl<T> Drop for Arena<T> {
    fn drop(&mut self) {
        for (segment, cell) in self.segments.iter().enumerate() {
            let base = cell.load(Ordering::Relaxed);
            if !base.is_null() {
                // SAFETY: installed by `segment()` from a boxed slice of this length.
                unsafe {
                    drop(Box::from_raw(ptr::slice_from_raw_parts_mut(
                        base,
                        FIRST << segment,
                    )));
                }
            }
        }
    }
}
