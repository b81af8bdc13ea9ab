use crate::error::{Error, Result};
use crate::sync::{AtomicU64, AtomicUsize, Ordering};
use crate::version::VersionEngine;
use crate::versioned::{Versioned, VersionedAtomic};
use crossbeam_utils::atomic::AtomicCell;
use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;
use tracing::{debug, trace, warn};

/// Number of tagged slots in one bucket.
pub const BUCKET_SIZE: usize = 8;

/// Bucket count used by [`HashMap::new`].
pub const DEFAULT_BUCKETS: usize = 64;

/// Default tag of a slot that was never claimed.
pub const DEFAULT_EMPTY_TAG: u64 = 0;

/// Default tag substituted for keys whose hash equals the empty tag.
pub const DEFAULT_REMAP_TAG: u64 = u64::MAX;

/// Payload of a key/value node. Loads and stores are whole-pair atomic, so a
/// reader racing the reuse of a node never sees half of each pair.
type Entry<K, V> = AtomicCell<Option<(K, V)>>;

fn empty_entry<K, V>() -> Entry<K, V> {
    AtomicCell::new(None)
}

struct Bucket<K, V> {
    tags: [AtomicU64; BUCKET_SIZE],
    entries: [VersionedAtomic<Entry<K, V>>; BUCKET_SIZE],
    /// Overflow link. Never populated by the map itself.
    next: VersionedAtomic<Bucket<K, V>>,
}

impl<K, V> Bucket<K, V> {
    fn new() -> Self {
        Self {
            tags: std::array::from_fn(|_| AtomicU64::new(DEFAULT_EMPTY_TAG)),
            entries: std::array::from_fn(|_| VersionedAtomic::null()),
            next: VersionedAtomic::null(),
        }
    }

    fn reset(&self, empty_tag: u64) {
        for tag in &self.tags {
            tag.store(empty_tag, Ordering::SeqCst);
        }
        for entry in &self.entries {
            entry.store(Versioned::null());
        }
        self.next.store(Versioned::null());
    }
}

/// Builder for configuring a [`HashMap`].
///
/// # Example
/// ```
/// use versioned_epoch::HashMap;
///
/// let map: HashMap<u64, u64> = HashMap::builder()
///     .buckets(128)
///     .max_size(512)
///     .sentinels(0, u64::MAX)
///     .build();
/// assert_eq!(map.bucket_count(), 128);
/// assert_eq!(map.max_size(), 512);
/// ```
///
/// 用于配置 [`HashMap`] 的构建器。
pub struct HashMapBuilder<K, V> {
    buckets: usize,
    max_size: Option<usize>,
    empty_tag: u64,
    remap_tag: u64,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> HashMapBuilder<K, V> {
    #[inline]
    pub fn new() -> Self {
        Self {
            buckets: DEFAULT_BUCKETS,
            max_size: None,
            empty_tag: DEFAULT_EMPTY_TAG,
            remap_tag: DEFAULT_REMAP_TAG,
            _marker: PhantomData,
        }
    }

    /// Number of buckets, rounded up to a power of two. Fixed for the map's lifetime.
    ///
    /// Default: `64`
    #[inline]
    pub fn buckets(mut self, buckets: usize) -> Self {
        self.buckets = buckets;
        self
    }

    /// Maximum number of live entries.
    ///
    /// Default: `buckets * BUCKET_SIZE`
    #[inline]
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }

    /// The two reserved hash values: `empty` marks an unclaimed slot and
    /// `remap` replaces any key hash equal to `empty`.
    ///
    /// Default: `(0, u64::MAX)`
    ///
    /// 两个保留的哈希值：`empty` 标记未被占用的槽位，`remap` 替换任何等于 `empty` 的键哈希。
    #[inline]
    pub fn sentinels(mut self, empty: u64, remap: u64) -> Self {
        self.empty_tag = empty;
        self.remap_tag = remap;
        self
    }

    /// Build a map using `RandomState`.
    ///
    /// # Panics
    /// Panics if the two sentinels are equal.
    pub fn build(self) -> HashMap<K, V>
    where
        K: Hash + Eq + Copy,
        V: Copy,
    {
        self.build_with_hasher(RandomState::new())
    }

    /// Build a map using the given hasher.
    ///
    /// # Panics
    /// Panics if the two sentinels are equal.
    pub fn build_with_hasher<S>(self, hasher: S) -> HashMap<K, V, S>
    where
        K: Hash + Eq + Copy,
        V: Copy,
        S: BuildHasher,
    {
        assert_ne!(
            self.empty_tag, self.remap_tag,
            "the empty and remap sentinels must differ"
        );

        let bucket_count = self.buckets.max(1).next_power_of_two();
        let max_size = self.max_size.unwrap_or(bucket_count * BUCKET_SIZE);

        let bucket_engine = VersionEngine::new(Bucket::new as fn() -> Bucket<K, V>);
        let buckets: Box<[Versioned<Bucket<K, V>>]> = {
            let pool = bucket_engine.begin();
            (0..bucket_count)
                .map(|_| {
                    let ptr = pool.allocate();
                    if let Some(bucket) = bucket_engine.resolve(ptr) {
                        bucket.reset(self.empty_tag);
                    }
                    ptr
                })
                .collect()
        };

        debug!(buckets = bucket_count, max_size, "hash map created");

        HashMap {
            buckets,
            mask: (bucket_count - 1) as u64,
            len: AtomicUsize::new(0),
            max_size,
            empty_tag: self.empty_tag,
            remap_tag: self.remap_tag,
            bucket_engine,
            entry_engine: VersionEngine::new(empty_entry::<K, V> as fn() -> Entry<K, V>),
            hasher,
        }
    }
}

impl<K, V> Default for HashMapBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for HashMapBuilder<K, V> {
    fn clone(&self) -> Self {
        Self {
            _marker: PhantomData,
            ..*self
        }
    }
}

impl<K, V> fmt::Debug for HashMapBuilder<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashMapBuilder")
            .field("buckets", &self.buckets)
            .field("max_size", &self.max_size)
            .field("empty_tag", &self.empty_tag)
            .field("remap_tag", &self.remap_tag)
            .finish()
    }
}

/// A fixed-size lock-free hash map over `Copy` keys and values.
///
/// Each bucket holds [`BUCKET_SIZE`] slots of `{hash tag, versioned pointer
/// to a key/value node}`. Inserts claim a slot's tag by CAS and then swap
/// the slot's pointer; the replaced node is retired into a
/// [`VersionPool`](crate::VersionPool) for reuse. Lookups never block:
/// they read optimistically and validate against the key/value
/// [`VersionEngine`], restarting if a node was reused underneath them.
///
/// The bucket count never changes. Inserting past `max_size` fails with
/// [`Error::CapacityExceeded`]; a key whose bucket chain is full fails with
/// [`Error::BucketChainExhausted`].
///
/// **Typical Usage**:
/// ```
/// use versioned_epoch::HashMap;
///
/// let map = HashMap::new();
/// assert_eq!(map.insert(1u32, 10u64), Ok(true));
/// assert_eq!(map.insert(1u32, 11u64), Ok(false));
/// assert_eq!(map.get(&1), Some(11));
/// assert_eq!(map.get(&2), None);
/// ```
///
/// 一个固定大小的无锁哈希表，键和值均为 `Copy` 类型。
/// 每个桶包含 [`BUCKET_SIZE`] 个 `{哈希标签, 指向键值节点的带版本指针}` 槽位。
/// 插入通过 CAS 占用槽位标签，然后交换槽位指针；被替换的节点退休到池中等待复用。
/// 查找从不阻塞：乐观读取并针对键值 [`VersionEngine`] 校验，若节点在读取期间被复用则重新开始。
pub struct HashMap<K, V, S = RandomState> {
    buckets: Box<[Versioned<Bucket<K, V>>]>,
    mask: u64,
    len: AtomicUsize,
    max_size: usize,
    empty_tag: u64,
    remap_tag: u64,
    bucket_engine: VersionEngine<Bucket<K, V>>,
    entry_engine: VersionEngine<Entry<K, V>>,
    hasher: S,
}

impl<K, V> HashMap<K, V>
where
    K: Hash + Eq + Copy,
    V: Copy,
{
    /// A map with [`DEFAULT_BUCKETS`] buckets.
    #[inline]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// A map with `buckets` buckets (rounded up to a power of two).
    #[inline]
    pub fn with_buckets(buckets: usize) -> Self {
        Self::builder().buckets(buckets).build()
    }

    #[inline]
    pub fn builder() -> HashMapBuilder<K, V> {
        HashMapBuilder::new()
    }
}

impl<K, V> Default for HashMap<K, V>
where
    K: Hash + Eq + Copy,
    V: Copy,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Hash + Eq + Copy,
    V: Copy,
    S: BuildHasher,
{
    /// Insert or overwrite `key`.
    ///
    /// Returns `Ok(true)` if the key was new and `Ok(false)` if an existing
    /// entry was replaced. The replaced node is retired for later reuse.
    ///
    /// # Errors
    /// - [`Error::CapacityExceeded`] if the map already holds `max_size` entries.
    /// - [`Error::BucketChainExhausted`] if every slot in the key's bucket
    ///   chain belongs to another key.
    ///
    /// 插入或覆盖 `key`。键为新键时返回 `Ok(true)`，替换已有条目时返回 `Ok(false)`。
    pub fn insert(&self, key: K, value: V) -> Result<bool> {
        if self.len.fetch_add(1, Ordering::SeqCst) >= self.max_size {
            self.len.fetch_sub(1, Ordering::SeqCst);
            debug!(max_size = self.max_size, "insert rejected: capacity exceeded");
            return Err(Error::CapacityExceeded {
                max_size: self.max_size,
            });
        }

        let tag = self.tag_of(&key);
        let pool = self.entry_engine.begin();
        let fresh = pool.allocate();
        if let Some(entry) = self.entry_engine.resolve(fresh) {
            entry.store(Some((key, value)));
        }

        match self.place(tag, &key, fresh) {
            Ok(replaced) if replaced.is_null() => Ok(true),
            Ok(replaced) => {
                pool.retire(replaced);
                self.len.fetch_sub(1, Ordering::SeqCst);
                Ok(false)
            }
            Err(err) => {
                // Never published, so it can go straight back to the pool.
                pool.retire(fresh);
                self.len.fetch_sub(1, Ordering::SeqCst);
                warn!(tag, "insert failed: bucket chain exhausted");
                Err(err)
            }
        }
    }

    /// Publish `fresh` in the slot for `key`, returning the pointer it replaced.
    fn place(
        &self,
        tag: u64,
        key: &K,
        fresh: Versioned<Entry<K, V>>,
    ) -> Result<Versioned<Entry<K, V>>> {
        'retry: loop {
            let Some(mut bucket) = self.home(tag) else {
                return Err(Error::BucketChainExhausted { tag });
            };

            loop {
                for (slot_tag, slot) in bucket.tags.iter().zip(&bucket.entries) {
                    let current_tag = slot_tag.load(Ordering::SeqCst);
                    if current_tag != tag && current_tag != self.empty_tag {
                        continue;
                    }
                    if current_tag == self.empty_tag
                        && slot_tag
                            .compare_exchange(self.empty_tag, tag, Ordering::SeqCst, Ordering::SeqCst)
                            .is_err()
                    {
                        continue 'retry;
                    }

                    let observed = slot.load();
                    let existing = self.entry_engine.resolve(observed).and_then(AtomicCell::load);
                    if let Some((existing_key, _)) = existing {
                        if existing_key != *key {
                            // The node may have been recycled for another key since `observed` was loaded.
                            if slot.load() != observed {
                                continue 'retry;
                            }
                            continue;
                        }
                    }

                    match slot.replace(observed, fresh) {
                        Ok(replaced) => return Ok(replaced),
                        Err(_) => continue 'retry,
                    }
                }

                match self.bucket_engine.resolve(bucket.next.load()) {
                    Some(next) => bucket = next,
                    None => return Err(Error::BucketChainExhausted { tag }),
                }
            }
        }
    }

    /// Look up `key` without blocking.
    ///
    /// The whole scan restarts whenever the key/value engine's version moved
    /// between the snapshot and a key match or a miss, so the returned value
    /// always comes from an entry that was live during the validated read.
    ///
    /// 无阻塞地查找 `key`。若在快照与键匹配之间键值引擎的版本发生变化，则整个扫描重新开始。
    pub fn get(&self, key: &K) -> Option<V> {
        let tag = self.tag_of(key);
        let mut reader = self.entry_engine.read();

        'retry: loop {
            let mut bucket = self.home(tag)?;

            loop {
                for (slot_tag, slot) in bucket.tags.iter().zip(&bucket.entries) {
                    if slot_tag.load(Ordering::SeqCst) != tag {
                        continue;
                    }
                    let Some((entry_key, value)) =
                        self.entry_engine.resolve(slot.load()).and_then(AtomicCell::load)
                    else {
                        continue;
                    };
                    if entry_key != *key {
                        continue;
                    }
                    if !reader.validate() {
                        trace!(tag, "lookup invalidated, restarting");
                        reader.restart();
                        std::hint::spin_loop();
                        continue 'retry;
                    }
                    return Some(value);
                }

                match self.bucket_engine.resolve(bucket.next.load()) {
                    Some(next) => bucket = next,
                    // A miss is only trusted if no node was recycled during the scan.
                    None if reader.validate() => return None,
                    None => {
                        reader.restart();
                        std::hint::spin_loop();
                        continue 'retry;
                    }
                }
            }
        }
    }

    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Hash `key` into a slot tag, steering clear of the empty sentinel.
    #[inline]
    fn tag_of(&self, key: &K) -> u64 {
        let hash = self.hasher.hash_one(key);
        if hash == self.empty_tag {
            self.remap_tag
        } else {
            hash
        }
    }
}

impl<K, V, S> HashMap<K, V, S> {
    #[inline]
    fn home(&self, tag: u64) -> Option<&Bucket<K, V>> {
        let ptr = self.buckets[(tag & self.mask) as usize];
        self.bucket_engine.resolve(ptr)
    }

    /// Number of live entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::SeqCst).min(self.max_size)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Key/value nodes created so far; replaced entries are recycled, not counted again.
    #[inline]
    pub(crate) fn entry_node_count(&self) -> usize {
        self.entry_engine.node_count()
    }
}

impl<K, V, S> fmt::Debug for HashMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashMap")
            .field("len", &self.len())
            .field("max_size", &self.max_size)
            .field("buckets", &self.bucket_count())
            .field("entry_nodes", &self.entry_node_count())
            .finish()
    }
}
