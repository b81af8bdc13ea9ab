use crate::free_list::SlotFreeList;
use crate::garbage::RetireList;
use crate::sync::{AtomicU64, Mutex, Ordering};

/// Default number of concurrent participants an `EpochEngine` admits.
/// `EpochEngine` 默认允许的并发参与者数量。
pub(crate) const DEFAULT_MAX_PARTICIPANTS: usize = 64;

/// Default number of retirements (per participant) between global epoch advances.
/// 每个参与者推进一次全局纪元之间的默认退休次数。
pub(crate) const DEFAULT_ADVANCE_INTERVAL: u64 = 16;

/// Default retire-list length multiple at which a participant sweeps.
/// 参与者触发清扫的默认退休列表长度倍数。
pub(crate) const DEFAULT_SWEEP_INTERVAL: usize = 8;

/// Slot value of a participant that is not inside a critical section.
/// 不在临界区内的参与者的槽位值。
pub const NOT_PARTICIPATING: u64 = u64::MAX;

/// Anything that can report the minimum epoch still observed by a participant.
///
/// Sweeps take this by reference instead of reaching back into the engine,
/// so any component that tracks pinned epochs can drive reclamation.
///
/// 任何能够报告参与者仍在观察的最小纪元的组件。
/// 清扫通过引用接收它，而不是回头访问引擎本身。
pub trait MinEpoch {
    /// The smallest pinned epoch, or [`NOT_PARTICIPATING`] if nobody is pinned.
    fn min_epoch(&self) -> u64;
}

/// Per-participant state: the pinned epoch and the private retire list.
///
/// Cache-aligned to prevent false sharing between participants.
///
/// 每个参与者的状态：被钉住的纪元和私有退休列表。
/// 缓存对齐以防止参与者之间的伪共享。
#[derive(Debug)]
#[repr(align(64))]
pub(crate) struct ParticipantSlot {
    /// Epoch observed on `enter`, or `NOT_PARTICIPATING`.
    /// `enter` 时观察到的纪元，或 `NOT_PARTICIPATING`。
    pub(crate) epoch: AtomicU64,
    /// Only ever locked by the slot's current holder, so never contended.
    pub(crate) retired: Mutex<RetireList>,
}

impl ParticipantSlot {
    pub(crate) fn new() -> Self {
        Self {
            epoch: AtomicU64::new(NOT_PARTICIPATING),
            retired: Mutex::new(RetireList::new()),
        }
    }
}

/// Global epoch plus the bounded table of participant slots.
/// 全局纪元以及有界的参与者槽位表。
#[derive(Debug)]
pub(crate) struct EpochTable {
    /// The global monotonic epoch counter.
    /// 全局单调纪元计数器。
    pub(crate) global_epoch: AtomicU64,
    pub(crate) slots: SlotFreeList<ParticipantSlot>,
}

impl EpochTable {
    pub(crate) fn new(max_participants: usize) -> Self {
        Self {
            global_epoch: AtomicU64::new(0),
            slots: SlotFreeList::from_values((0..max_participants).map(|_| ParticipantSlot::new())),
        }
    }
}

impl MinEpoch for EpochTable {
    fn min_epoch(&self) -> u64 {
        self.slots
            .iter()
            .map(|slot| slot.epoch.load(Ordering::SeqCst))
            .min()
            .unwrap_or(NOT_PARTICIPATING)
    }
}
