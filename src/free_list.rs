use crate::arena::Arena;
use crate::sync::{AtomicU32, AtomicU64, Ordering};
use std::fmt;

/// Empty link / empty head.
const NIL: u32 = 0;

const INDEX_MASK: u64 = u32::MAX as u64;

/// Pack `{ABA tag, index + 1}` into a head word.
#[inline]
fn pack(tag: u32, link: u32) -> u64 {
    ((tag as u64) << 32) | link as u64
}

#[inline]
fn unpack(word: u64) -> (u32, u32) {
    ((word >> 32) as u32, (word & INDEX_MASK) as u32)
}

/// A handle to one slot of a [`SlotFreeList`].
///
/// Not `Clone`: a slot id is either held by exactly one participant or
/// sitting in the list, so it can never be pushed twice.
///
/// [`SlotFreeList`] 中某个槽位的句柄。
/// 不可 `Clone`：槽位要么被唯一的参与者持有，要么在列表中，因此不会被重复 push。
#[derive(Debug, PartialEq, Eq)]
pub struct SlotId(u32);

impl SlotId {
    /// Dense index of this slot, stable for the list's lifetime.
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

struct Entry<T> {
    next: AtomicU32,
    value: T,
}

/// Lock-free LIFO pool of reusable participant slots.
///
/// Slots are registered once and then cycle between "checked out" (a
/// [`SlotId`] held by a participant) and "free" (linked into the list).
/// The head word carries an ABA tag bumped by every successful push and
/// pop, and entries are never freed while the list lives, so a pop that
/// read a stale `next` link simply loses its CAS.
///
/// 无锁 LIFO 槽位池。
/// 槽位注册一次后，在"被借出"（由参与者持有 [`SlotId`]）与"空闲"（链接在列表中）之间循环。
/// 头部字携带 ABA 标签，每次成功的 push 和 pop 都会递增它；
/// 条目在列表存活期间不会被释放，因此读到过期 `next` 链接的 pop 只会 CAS 失败。
pub struct SlotFreeList<T> {
    head: AtomicU64,
    entries: Arena<Entry<T>>,
}

impl<T> SlotFreeList<T> {
    pub fn new() -> Self {
        Self {
            head: AtomicU64::new(pack(0, NIL)),
            entries: Arena::new(),
        }
    }

    /// Create a list pre-populated with one free slot per value.
    pub fn from_values(values: impl IntoIterator<Item = T>) -> Self {
        let list = Self::new();
        for value in values {
            let id = list.register(value);
            list.push(id);
        }
        list
    }

    /// Add a brand-new slot. It is returned checked out, not linked into the list.
    pub fn register(&self, value: T) -> SlotId {
        SlotId(self.entries.push(Entry {
            next: AtomicU32::new(NIL),
            value,
        }))
    }

    /// Return a slot to the pool.
    ///
    /// # Panics
    /// Panics if `id` came from a different list.
    pub fn push(&self, id: SlotId) {
        let entry = self.entry(&id);
        let mut head = self.head.load(Ordering::Acquire);
        loop {
            let (tag, first) = unpack(head);
            entry.next.store(first, Ordering::Relaxed);
            match self.head.compare_exchange_weak(
                head,
                pack(tag.wrapping_add(1), id.0 + 1),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(current) => head = current,
            }
        }
    }

    /// Take a free slot, or `None` if every slot is checked out.
    pub fn pop(&self) -> Option<SlotId> {
        let mut head = self.head.load(Ordering::Acquire);
        loop {
            let (tag, first) = unpack(head);
            if first == NIL {
                return None;
            }
            let next = self.entries.get(first - 1)?.next.load(Ordering::Relaxed);
            match self.head.compare_exchange_weak(
                head,
                pack(tag.wrapping_add(1), next),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(SlotId(first - 1)),
                Err(current) => head = current,
            }
        }
    }

    /// The value behind a slot id obtained from this list.
    ///
    /// # Panics
    /// Panics if `id` came from a different list.
    #[inline]
    pub fn get(&self, id: &SlotId) -> &T {
        &self.entry(id).value
    }

    #[inline]
    fn entry(&self, id: &SlotId) -> &Entry<T> {
        match self.entries.get(id.0) {
            Some(entry) => entry,
            None => panic!("slot {} does not belong to this free list", id.0),
        }
    }

    /// Every registered slot value, free or checked out.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.entries.iter().map(|entry| &entry.value)
    }

    /// Number of registered slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for SlotFreeList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SlotFreeList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (tag, first) = unpack(self.head.load(Ordering::Relaxed));
        f.debug_struct("SlotFreeList")
            .field("slots", &self.len())
            .field("tag", &tag)
            .field("head", &first.checked_sub(1))
            .finish()
    }
}
