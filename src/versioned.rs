use crate::sync::{AtomicU64, Ordering};
use std::fmt;
use std::marker::PhantomData;

// [32-bit index + 1][1-bit mark][31-bit version] = 64
const INDEX_SHIFT: u32 = 32;
const MARK: u64 = 1 << 31;
const VERSION_MASK: u64 = MARK - 1;

/// Number of version bits kept in a [`Versioned`] word.
pub const VERSION_BITS: u32 = 31;

/// A versioned pointer value: an arena index, a hazard mark and a version.
///
/// The index addresses a node inside a [`VersionEngine`](crate::VersionEngine)
/// arena; the version is the engine version at allocation time, truncated
/// to [`VERSION_BITS`]. Two words naming the same node in different
/// incarnations differ in their version, which is what makes a stale CAS fail.
///
/// 带版本的指针值：arena 索引、危险标记位和版本号。
/// 同一节点的不同"化身"具有不同的版本号，因此基于过期值的 CAS 会失败。
pub struct Versioned<T> {
    word: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Versioned<T> {
    /// The null pointer.
    #[inline]
    pub const fn null() -> Self {
        Self::from_word(0)
    }

    #[inline]
    pub(crate) fn new(index: u32, version: u64) -> Self {
        Self::from_word(((index as u64 + 1) << INDEX_SHIFT) | (version & VERSION_MASK))
    }

    #[inline]
    const fn from_word(word: u64) -> Self {
        Self {
            word,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.word >> INDEX_SHIFT == 0
    }

    /// Arena index of the referenced node.
    #[inline]
    pub fn index(self) -> Option<u32> {
        ((self.word >> INDEX_SHIFT) as u32).checked_sub(1)
    }

    /// Version stamped into the word.
    #[inline]
    pub fn version(self) -> u64 {
        self.word & VERSION_MASK
    }

    #[inline]
    pub fn is_marked(self) -> bool {
        self.word & MARK != 0
    }

    #[inline]
    pub fn with_mark(self) -> Self {
        Self::from_word(self.word | MARK)
    }

    #[inline]
    pub fn without_mark(self) -> Self {
        Self::from_word(self.word & !MARK)
    }

    /// The raw packed word.
    #[inline]
    pub fn into_word(self) -> u64 {
        self.word
    }
}

impl<T> Clone for Versioned<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Versioned<T> {}

impl<T> PartialEq for Versioned<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.word == other.word
    }
}

impl<T> Eq for Versioned<T> {}

impl<T> Default for Versioned<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> fmt::Debug for Versioned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Versioned")
            .field("index", &self.index())
            .field("version", &self.version())
            .field("marked", &self.is_marked())
            .finish()
    }
}

/// An atomically updated [`Versioned`] word.
///
/// Once a word is marked, [`replace`](Self::replace) from the unmarked
/// observation fails; the mark is only dropped by [`clear`](Self::clear),
/// [`take`](Self::take) or [`store`](Self::store).
///
/// 原子更新的 [`Versioned`] 字。
/// 字一旦被标记，基于未标记观察值的 [`replace`](Self::replace) 就会失败；
/// 标记只会被 [`clear`](Self::clear)、[`take`](Self::take) 或 [`store`](Self::store) 清除。
pub struct VersionedAtomic<T> {
    word: AtomicU64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> VersionedAtomic<T> {
    #[inline]
    pub fn null() -> Self {
        Self::new(Versioned::null())
    }

    #[inline]
    pub fn new(ptr: Versioned<T>) -> Self {
        Self {
            word: AtomicU64::new(ptr.word),
            _marker: PhantomData,
        }
    }

    /// Current value, mark bit included.
    #[inline]
    pub fn load(&self) -> Versioned<T> {
        Versioned::from_word(self.word.load(Ordering::SeqCst))
    }

    #[inline]
    pub fn store(&self, ptr: Versioned<T>) {
        self.word.store(ptr.word, Ordering::SeqCst);
    }

    /// CAS from an unmarked observation of `current` to `new`.
    ///
    /// Returns the replaced value on success and the actual value on failure.
    /// 成功时返回被替换的值，失败时返回实际值。
    #[inline]
    pub fn replace(&self, current: Versioned<T>, new: Versioned<T>) -> Result<Versioned<T>, Versioned<T>> {
        self.word
            .compare_exchange(
                current.without_mark().word,
                new.word,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .map(Versioned::from_word)
            .map_err(Versioned::from_word)
    }

    /// Set the mark bit if the word still equals `current`.
    ///
    /// Returns `true` if the word is marked afterwards by this call, or if
    /// `current` was already marked.
    #[inline]
    pub fn mark(&self, current: Versioned<T>) -> bool {
        if current.is_marked() {
            return true;
        }
        self.word
            .compare_exchange(
                current.word,
                current.with_mark().word,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Reset the word to null if it still equals `current` (mark included).
    #[inline]
    pub fn clear(&self, current: Versioned<T>) -> bool {
        self.word
            .compare_exchange(current.word, 0, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Swap the word with null and return what was there.
    #[inline]
    pub fn take(&self) -> Versioned<T> {
        Versioned::from_word(self.word.swap(0, Ordering::SeqCst))
    }
}

impl<T> Default for VersionedAtomic<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> fmt::Debug for VersionedAtomic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VersionedAtomic").field(&self.load()).finish()
    }
}
