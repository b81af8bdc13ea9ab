use crate::arena::Arena;
use crate::free_list::{SlotFreeList, SlotId};
use crate::reader::VersionedReader;
use crate::sync::{AtomicU64, Mutex, Ordering};
use crate::versioned::Versioned;
use std::fmt;
use std::vec::Vec;
use tracing::{debug, trace};

/// A node owned by a [`VersionEngine`]: the payload plus the engine version
/// at which its current incarnation was handed out.
///
/// Nodes live as long as the engine. Retiring one only makes it eligible
/// for reuse by a later `allocate`.
pub(crate) struct VersionedNode<T> {
    birth: AtomicU64,
    payload: T,
}

impl<T> VersionedNode<T> {
    fn new(birth: u64, payload: T) -> Self {
        Self {
            birth: AtomicU64::new(birth),
            payload,
        }
    }
}

/// A retired node waiting in a pool, tagged with the version at retirement.
#[derive(Debug, Clone, Copy)]
struct RetiredNode {
    index: u32,
    version: u64,
}

/// Per-participant free list of retired nodes.
#[derive(Debug)]
pub(crate) struct PoolState {
    /// Only ever locked by the pool's current holder.
    retired: Mutex<Vec<RetiredNode>>,
}

impl PoolState {
    fn new() -> Self {
        Self {
            retired: Mutex::new(Vec::new()),
        }
    }
}

/// A version-based reclamation engine for nodes of type `T`.
///
/// The engine owns:
/// - A monotonic version counter, independent of any `EpochEngine`.
/// - An arena of versioned nodes addressed by [`Versioned`] words.
/// - A free-list of per-participant [`VersionPool`]s, grown on demand.
///
/// Writers allocate and retire nodes through a pool; readers never block
/// and instead validate a [`VersionedReader`] after dereferencing. Reusing
/// a node retired at the current version first bumps the version, so no
/// reader that could have seen the old incarnation validates successfully.
///
/// **Typical Usage**:
/// ```
/// use versioned_epoch::{VersionEngine, VersionedAtomic};
/// use std::sync::atomic::{AtomicU64, Ordering};
///
/// let engine = VersionEngine::new(|| AtomicU64::new(0));
/// let shared = VersionedAtomic::null();
///
/// let pool = engine.begin();
/// let node = pool.allocate();
/// engine.resolve(node).unwrap().store(7, Ordering::SeqCst);
/// shared.store(node);
/// engine.end(pool);
///
/// let reader = engine.read();
/// let value = engine.resolve(shared.load()).map(|v| v.load(Ordering::SeqCst));
/// assert!(reader.validate());
/// assert_eq!(value, Some(7));
/// ```
///
/// 基于版本的回收引擎，管理类型为 `T` 的节点。
/// 写入者通过池分配和退休节点；读取者从不阻塞，而是在解引用后校验 [`VersionedReader`]。
/// 复用一个在当前版本退休的节点之前会先推进版本，
/// 因此任何可能看到旧"化身"的读取者都无法校验成功。
pub struct VersionEngine<T, F = fn() -> T> {
    version: AtomicU64,
    nodes: Arena<VersionedNode<T>>,
    pools: SlotFreeList<PoolState>,
    factory: F,
}

impl<T, F> VersionEngine<T, F>
where
    F: Fn() -> T,
{
    /// Create an engine that builds fresh payloads with `factory`.
    /// 创建一个使用 `factory` 构造新负载的引擎。
    pub fn new(factory: F) -> Self {
        Self {
            version: AtomicU64::new(0),
            nodes: Arena::new(),
            pools: SlotFreeList::new(),
            factory,
        }
    }

    /// Check out a pool, creating a new one if none is free. Never fails.
    /// 借出一个池；若没有空闲的池则新建一个。永不失败。
    pub fn begin(&self) -> VersionPool<'_, T, F> {
        let id = match self.pools.pop() {
            Some(id) => id,
            None => {
                let id = self.pools.register(PoolState::new());
                debug!(pool = id.index(), "version pool created");
                id
            }
        };
        VersionPool {
            engine: self,
            state: self.pools.get(&id),
            id: Some(id),
        }
    }

    /// Return a pool. Equivalent to dropping it.
    /// 归还池，等价于 drop 它。
    #[inline]
    pub fn end(&self, pool: VersionPool<'_, T, F>) {
        drop(pool);
    }
}

impl<T, F> VersionEngine<T, F> {
    /// Snapshot the current version for an optimistic read.
    /// 为乐观读取快照当前版本。
    #[inline]
    pub fn read(&self) -> VersionedReader<'_> {
        VersionedReader::new(&self.version)
    }

    /// Dereference a versioned pointer. `None` for null.
    ///
    /// The node is always valid memory, but it may have been retired and
    /// reused since `ptr` was loaded; optimistic readers must validate.
    ///
    /// 解引用一个带版本的指针，null 返回 `None`。
    /// 节点内存总是有效的，但自 `ptr` 被加载以来它可能已被退休并复用；乐观读取者必须校验。
    #[inline]
    pub fn resolve(&self, ptr: Versioned<T>) -> Option<&T> {
        self.nodes.get(ptr.index()?).map(|node| &node.payload)
    }

    /// The engine version at which the node behind `ptr` was last handed out.
    #[inline]
    pub fn birth(&self, ptr: Versioned<T>) -> Option<u64> {
        self.nodes
            .get(ptr.index()?)
            .map(|node| node.birth.load(Ordering::SeqCst))
    }

    /// Current engine version.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Number of nodes ever created by the factory.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of pools ever created.
    #[inline]
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }
}

impl<T: Default> Default for VersionEngine<T> {
    fn default() -> Self {
        Self::new(T::default)
    }
}

impl<T, F> fmt::Debug for VersionEngine<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionEngine")
            .field("version", &self.version())
            .field("nodes", &self.node_count())
            .field("pools", &self.pool_count())
            .finish()
    }
}

/// A checked-out per-participant pool of a [`VersionEngine`].
///
/// Returned to the engine by [`VersionEngine::end`] or on drop; retired
/// nodes stay in the pool for its next holder.
///
/// 从 [`VersionEngine`] 借出的参与者私有池。
/// 通过 [`VersionEngine::end`] 或 drop 归还；已退休的节点留在池中供下一个持有者使用。
pub struct VersionPool<'e, T, F = fn() -> T> {
    engine: &'e VersionEngine<T, F>,
    state: &'e PoolState,
    id: Option<SlotId>,
}

impl<T, F> VersionPool<'_, T, F>
where
    F: Fn() -> T,
{
    /// Hand out a node: the most recently retired one if any, else a fresh one.
    ///
    /// A reused node retired at exactly the current version forces a version
    /// bump first; its birth is then stamped with the resulting version, so
    /// the returned word never equals any earlier word naming the same node.
    ///
    /// 分配一个节点：优先复用最近退休的节点，否则新建。
    /// 若复用的节点恰好在当前版本退休，则先推进版本；
    /// 然后用推进后的版本标记其诞生，因此返回的字不会等于任何指向同一节点的旧字。
    pub fn allocate(&self) -> Versioned<T> {
        let engine = self.engine;
        let reused = self.state.retired.lock().pop();

        match reused {
            Some(node) => {
                if node.version == engine.version.load(Ordering::SeqCst) {
                    let bumped = engine.version.fetch_add(1, Ordering::SeqCst) + 1;
                    trace!(version = bumped, index = node.index, "version bumped for node reuse");
                }
                let version = engine.version.load(Ordering::SeqCst);
                if let Some(slot) = engine.nodes.get(node.index) {
                    slot.birth.store(version, Ordering::SeqCst);
                }
                Versioned::new(node.index, version)
            }
            None => {
                let version = engine.version.load(Ordering::SeqCst);
                let index = engine
                    .nodes
                    .push(VersionedNode::new(version, (engine.factory)()));
                Versioned::new(index, version)
            }
        }
    }
}

impl<T, F> VersionPool<'_, T, F> {
    /// Put a node that is no longer reachable from shared state into this
    /// pool, tagged with the current version. Null is ignored.
    ///
    /// Each incarnation must be retired at most once.
    ///
    /// 将一个已不再可从共享状态访问的节点放入此池，并标记当前版本。null 会被忽略。
    pub fn retire(&self, ptr: Versioned<T>) {
        let Some(index) = ptr.index() else {
            return;
        };
        let version = self.engine.version.load(Ordering::SeqCst);
        self.state.retired.lock().push(RetiredNode { index, version });
    }

    /// Number of retired nodes waiting for reuse in this pool.
    #[inline]
    pub fn retired(&self) -> usize {
        self.state.retired.lock().len()
    }
}

impl<T, F> Drop for VersionPool<'_, T, F> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.engine.pools.push(id);
        }
    }
}

impl<T, F> fmt::Debug for VersionPool<'_, T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionPool")
            .field("pool", &self.id.as_ref().map(SlotId::index))
            .field("retired", &self.retired())
            .finish()
    }
}
