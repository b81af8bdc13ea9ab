use crate::error::{Error, Result};
use crate::participant::Participant;
use crate::state::{
    EpochTable, MinEpoch, DEFAULT_ADVANCE_INTERVAL, DEFAULT_MAX_PARTICIPANTS,
    DEFAULT_SWEEP_INTERVAL,
};
use crate::sync::Ordering;
use tracing::{debug, warn};

/// Builder for configuring an `EpochEngine`.
///
/// - `max_participants`: number of participant slots, fixed for the engine's lifetime
/// - `advance_interval`: retirements per participant between global epoch advances
/// - `sweep_interval`: retire-list length multiple at which a participant sweeps
///
/// # Example
/// ```
/// use versioned_epoch::EpochEngine;
///
/// let engine = EpochEngine::builder()
///     .max_participants(8)
///     .advance_interval(32)
///     .sweep_interval(16)
///     .build();
/// assert_eq!(engine.capacity(), 8);
/// ```
///
/// 用于配置 `EpochEngine` 的构建器。
pub struct EpochEngineBuilder {
    max_participants: usize,
    advance_interval: u64,
    sweep_interval: usize,
}

impl EpochEngineBuilder {
    /// Create a new builder with default settings.
    /// 创建一个带有默认设置的新构建器。
    #[inline]
    pub fn new() -> Self {
        Self {
            max_participants: DEFAULT_MAX_PARTICIPANTS,
            advance_interval: DEFAULT_ADVANCE_INTERVAL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    /// Set how many participants may be checked out at once.
    ///
    /// Default: `64`
    ///
    /// 设置同时可借出的参与者数量。
    #[inline]
    pub fn max_participants(mut self, max_participants: usize) -> Self {
        self.max_participants = max_participants;
        self
    }

    /// Set how many retirements a participant performs before advancing the global epoch.
    ///
    /// Default: `16`
    ///
    /// 设置参与者推进全局纪元之前的退休次数。
    #[inline]
    pub fn advance_interval(mut self, interval: u64) -> Self {
        self.advance_interval = interval;
        self
    }

    /// Set the retire-list length multiple at which a participant sweeps.
    ///
    /// Default: `8`
    ///
    /// 设置参与者触发清扫的退休列表长度倍数。
    #[inline]
    pub fn sweep_interval(mut self, interval: usize) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Build the `EpochEngine`.
    ///
    /// # Panics
    /// Panics if `max_participants`, `advance_interval` or `sweep_interval` is zero.
    pub fn build(self) -> EpochEngine {
        assert!(self.max_participants > 0, "an epoch engine needs at least one participant slot");
        assert!(self.advance_interval > 0, "advance_interval must be non-zero");
        assert!(self.sweep_interval > 0, "sweep_interval must be non-zero");

        debug!(
            max_participants = self.max_participants,
            advance_interval = self.advance_interval,
            sweep_interval = self.sweep_interval,
            "epoch engine created"
        );

        EpochEngine {
            table: EpochTable::new(self.max_participants),
            capacity: self.max_participants,
            advance_interval: self.advance_interval,
            sweep_interval: self.sweep_interval,
        }
    }
}

impl Default for EpochEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An epoch-based reclamation engine with a bounded number of participants.
///
/// The engine owns:
/// - The global epoch counter.
/// - One participant slot per configured participant, handed out through a
///   lock-free free-list.
///
/// A participant `enter`s to pin the current epoch, `exit`s to unpin, and
/// `retire`s boxed values into its private list. A value retired at epoch
/// `E` is dropped once every pinned participant has observed an epoch
/// greater than `E`.
///
/// **Typical Usage**:
/// ```
/// use versioned_epoch::EpochEngine;
///
/// let engine = EpochEngine::new(4);
/// let participant = engine.begin().unwrap();
///
/// participant.enter();
/// participant.retire(Box::new(42u64));
/// participant.exit();
///
/// engine.end(participant);
/// ```
///
/// 基于纪元的回收引擎，参与者数量有界。
/// 参与者通过 `enter` 钉住当前纪元，通过 `exit` 解除，
/// 通过 `retire` 将 Box 值放入私有列表。
/// 在纪元 `E` 退休的值会在所有被钉住的参与者都观察到大于 `E` 的纪元之后被 drop。
pub struct EpochEngine {
    pub(crate) table: EpochTable,
    capacity: usize,
    pub(crate) advance_interval: u64,
    pub(crate) sweep_interval: usize,
}

impl EpochEngine {
    /// Create an engine admitting `max_participants` concurrent participants.
    /// 创建一个允许 `max_participants` 个并发参与者的引擎。
    #[inline]
    pub fn new(max_participants: usize) -> Self {
        Self::builder().max_participants(max_participants).build()
    }

    /// Create a builder for configuring the engine.
    /// 创建一个用于配置引擎的构建器。
    #[inline]
    pub fn builder() -> EpochEngineBuilder {
        EpochEngineBuilder::new()
    }

    /// Check out a participant slot.
    ///
    /// Fails with [`Error::PoolExhausted`] when every slot is already checked out.
    ///
    /// 借出一个参与者槽位。所有槽位都被借出时返回 [`Error::PoolExhausted`]。
    pub fn begin(&self) -> Result<Participant<'_>> {
        match self.table.slots.pop() {
            Some(slot) => Ok(Participant::new(self, slot)),
            None => {
                warn!(capacity = self.capacity, "epoch engine participant pool exhausted");
                Err(Error::PoolExhausted {
                    capacity: self.capacity,
                })
            }
        }
    }

    /// Return a participant slot. Equivalent to dropping the participant.
    /// 归还参与者槽位，等价于 drop 该参与者。
    #[inline]
    pub fn end(&self, participant: Participant<'_>) {
        drop(participant);
    }

    /// The smallest epoch pinned by any participant, or
    /// [`NOT_PARTICIPATING`](crate::NOT_PARTICIPATING) if none is pinned.
    #[inline]
    pub fn min_epoch(&self) -> u64 {
        self.table.min_epoch()
    }

    /// Current value of the global epoch.
    #[inline]
    pub fn global_epoch(&self) -> u64 {
        self.table.global_epoch.load(Ordering::SeqCst)
    }

    /// Number of participant slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl MinEpoch for EpochEngine {
    #[inline]
    fn min_epoch(&self) -> u64 {
        self.table.min_epoch()
    }
}

impl std::fmt::Debug for EpochEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpochEngine")
            .field("global_epoch", &self.global_epoch())
            .field("capacity", &self.capacity)
            .field("advance_interval", &self.advance_interval)
            .field("sweep_interval", &self.sweep_interval)
            .finish()
    }
}
