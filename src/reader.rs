use crate::sync::{AtomicU64, Ordering};

/// An optimistic reader of a [`VersionEngine`](crate::VersionEngine).
///
/// The reader snapshots the engine version. Any node reuse that could make
/// an earlier dereference stale moves the version, so after reading shared
/// state the caller checks [`validate`](Self::validate) and, on `false`,
/// calls [`restart`](Self::restart) and redoes the whole read.
///
/// **Usage**:
/// ```
/// use versioned_epoch::VersionEngine;
///
/// let engine: VersionEngine<u64> = VersionEngine::default();
/// let mut reader = engine.read();
/// // ... dereference versioned pointers ...
/// if !reader.validate() {
///     reader.restart();
///     // ... retry ...
/// }
/// ```
///
/// [`VersionEngine`](crate::VersionEngine) 的乐观读取者。
/// 读取者快照引擎版本。任何可能使之前的解引用过期的节点复用都会推进版本，
/// 因此调用者在读取共享状态后检查 [`validate`](Self::validate)，
/// 若为 `false` 则调用 [`restart`](Self::restart) 并重做整个读取。
#[must_use]
pub struct VersionedReader<'e> {
    version: &'e AtomicU64,
    snapshot: u64,
}

impl<'e> VersionedReader<'e> {
    #[inline]
    pub(crate) fn new(version: &'e AtomicU64) -> Self {
        Self {
            version,
            snapshot: version.load(Ordering::SeqCst),
        }
    }

    /// `true` iff the engine version is unchanged since the last snapshot.
    #[inline]
    pub fn validate(&self) -> bool {
        self.version.load(Ordering::SeqCst) == self.snapshot
    }

    /// Take a fresh snapshot.
    #[inline]
    pub fn restart(&mut self) {
        self.snapshot = self.version.load(Ordering::SeqCst);
    }

    /// The version this reader validates against.
    #[inline]
    pub fn snapshot(&self) -> u64 {
        self.snapshot
    }
}

impl std::fmt::Debug for VersionedReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionedReader")
            .field("snapshot", &self.snapshot)
            .finish()
    }
}
