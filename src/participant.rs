use crate::epoch::EpochEngine;
use crate::free_list::SlotId;
use crate::garbage::Retired;
use crate::state::{ParticipantSlot, NOT_PARTICIPATING};
use crate::sync::{Cell, Ordering};
use tracing::trace;

/// A checked-out participant slot of an [`EpochEngine`].
///
/// Obtained from [`EpochEngine::begin`] and returned by
/// [`EpochEngine::end`] or by dropping it. While checked out, the slot's
/// epoch cell and retire list belong to this handle alone.
///
/// It is `!Sync` (due to `Cell`): a participant may move between threads
/// but is used by one thread at a time.
///
/// 一个从 [`EpochEngine`] 借出的参与者槽位。
/// 通过 [`EpochEngine::begin`] 获得，通过 [`EpochEngine::end`] 或 drop 归还。
/// 借出期间，槽位的纪元单元和退休列表只属于此句柄。
/// 它是 `!Sync` 的（因为 `Cell`）：参与者可以在线程间移动，但同一时刻只被一个线程使用。
pub struct Participant<'e> {
    engine: &'e EpochEngine,
    slot: &'e ParticipantSlot,
    id: Option<SlotId>,
    pin_count: Cell<usize>,
}

impl<'e> Participant<'e> {
    pub(crate) fn new(engine: &'e EpochEngine, id: SlotId) -> Self {
        Self {
            engine,
            slot: engine.table.slots.get(&id),
            id: Some(id),
            pin_count: Cell::new(0),
        }
    }

    /// Pin the current global epoch: nothing retired at or after it can be freed
    /// until [`exit`](Self::exit).
    ///
    /// 钉住当前全局纪元：在 [`exit`](Self::exit) 之前，该纪元及之后退休的对象都不会被释放。
    #[inline]
    pub fn enter(&self) {
        let epoch = self.engine.table.global_epoch.load(Ordering::SeqCst);
        self.slot.epoch.store(epoch, Ordering::SeqCst);
    }

    /// Stop blocking reclamation.
    /// 不再阻止回收。
    #[inline]
    pub fn exit(&self) {
        self.slot.epoch.store(NOT_PARTICIPATING, Ordering::SeqCst);
    }

    /// Enter and get a guard that exits when the last nested guard is dropped.
    ///
    /// **Reentrancy**: nested calls keep the epoch pinned by the outermost call.
    ///
    /// 进入临界区并返回一个守卫，最后一个嵌套守卫被 drop 时退出。
    #[inline]
    pub fn pin(&self) -> EpochGuard<'_, 'e> {
        let pin_count = self.pin_count.get();
        if pin_count == 0 {
            self.enter();
        }
        self.pin_count.set(pin_count + 1);
        EpochGuard { participant: self }
    }

    /// The epoch this participant currently pins, if any.
    #[inline]
    pub fn pinned_epoch(&self) -> Option<u64> {
        match self.slot.epoch.load(Ordering::SeqCst) {
            NOT_PARTICIPATING => None,
            epoch => Some(epoch),
        }
    }

    /// Retire (defer deletion) of a value.
    ///
    /// The value is tagged with the current global epoch. Every
    /// `advance_interval`-th retirement advances the global epoch, and
    /// whenever the private list length reaches a multiple of
    /// `sweep_interval` the list is swept against the engine's minimum epoch.
    ///
    /// 退休（延迟删除）一个值。
    /// 该值被标记为当前全局纪元。每第 `advance_interval` 次退休会推进全局纪元；
    /// 每当私有列表长度达到 `sweep_interval` 的倍数时，根据引擎的最小纪元清扫列表。
    pub fn retire<T: Send + 'static>(&self, value: Box<T>) {
        let table = &self.engine.table;
        let epoch = table.global_epoch.load(Ordering::SeqCst);

        let freed = {
            let mut retired = self.slot.retired.lock();
            retired.push(Retired::new(value, epoch));

            if retired.retired_total % self.engine.advance_interval == 0 {
                let advanced = table.global_epoch.fetch_add(1, Ordering::SeqCst) + 1;
                trace!(epoch = advanced, "global epoch advanced");
            }

            if retired.len() % self.engine.sweep_interval == 0 {
                retired.sweep(table)
            } else {
                Vec::new()
            }
        };

        if !freed.is_empty() {
            trace!(freed = freed.len(), "retire list swept");
        }
    }

    /// Sweep the private retire list now. Returns how many values were dropped.
    /// 立即清扫私有退休列表，返回被 drop 的值的数量。
    pub fn collect(&self) -> usize {
        let freed = self.slot.retired.lock().sweep(&self.engine.table);
        let count = freed.len();
        drop(freed);
        trace!(freed = count, "retire list swept");
        count
    }

    /// Number of retired values still waiting in the private list.
    /// 私有列表中仍在等待回收的值的数量。
    #[inline]
    pub fn pending(&self) -> usize {
        self.slot.retired.lock().len()
    }

    /// Dense index of the underlying slot.
    #[inline]
    pub fn slot_index(&self) -> usize {
        self.id.as_ref().map_or(usize::MAX, SlotId::index)
    }
}

impl Drop for Participant<'_> {
    /// Unpin and return the slot. The retire list stays with the slot and is
    /// swept by its next holder or dropped with the engine.
    ///
    /// 解除钉住并归还槽位。退休列表留在槽位中，由下一个持有者清扫或随引擎一起 drop。
    fn drop(&mut self) {
        self.exit();
        if let Some(id) = self.id.take() {
            self.engine.table.slots.push(id);
        }
    }
}

impl std::fmt::Debug for Participant<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Participant")
            .field("slot", &self.slot_index())
            .field("pinned_epoch", &self.pinned_epoch())
            .finish()
    }
}

/// A guard that keeps a participant's epoch pinned.
///
/// Obtained from [`Participant::pin`]; the participant exits when the last
/// outstanding guard is dropped.
///
/// 一个保持参与者纪元被钉住的守卫。
#[must_use]
pub struct EpochGuard<'p, 'e> {
    participant: &'p Participant<'e>,
}

impl EpochGuard<'_, '_> {
    /// The epoch this guard keeps pinned.
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.participant.slot.epoch.load(Ordering::SeqCst)
    }
}

impl Drop for EpochGuard<'_, '_> {
    #[inline]
    fn drop(&mut self) {
        let pin_count = self.participant.pin_count.get();

        assert!(
            pin_count > 0,
            "BUG: Dropping an EpochGuard in an unpinned state (pin_count = 0). \
             This indicates incorrect API usage or a library bug."
        );

        if pin_count == 1 {
            self.participant.exit();
        }
        self.participant.pin_count.set(pin_count - 1);
    }
}
