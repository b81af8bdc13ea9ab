use crate::state::{MinEpoch, NOT_PARTICIPATING};
use std::boxed::Box;
use std::fmt;
use std::vec::Vec;

/// An object that has been retired (removed from shared view) but not yet deleted.
/// It stores the raw pointer, the epoch it was retired in, and a destructor
/// function to safely drop the concrete type.
///
/// 一个已被退休（从共享视图中移除）但尚未删除的对象。
/// 它存储原始指针、退休时的纪元以及析构函数，以安全地 drop 具体类型。
pub(crate) struct Retired {
    ptr: *mut (),
    dtor: unsafe fn(*mut ()),
    /// Global epoch at the time of retirement.
    /// 退休时的全局纪元。
    pub(crate) epoch: u64,
}

// SAFETY: `Retired::new` only accepts `T: Send`.
unsafe impl Send for Retired {}

/// Generic destructor for retired objects.
/// Converts the raw pointer back to Box<T> and drops it.
///
/// 已退休对象的通用析构函数。
/// 将原始指针转换回 Box<T> 并将其 drop。
#[inline(always)]
unsafe fn drop_value<T>(ptr: *mut ()) {
    let ptr = ptr as *mut T;
    unsafe {
        drop(Box::from_raw(ptr));
    }
}

impl Retired {
    /// Take ownership of a boxed value; it is dropped exactly once, with the record.
    /// 接管一个 Box 值的所有权；它会随记录一起被 drop 恰好一次。
    #[inline(always)]
    pub(crate) fn new<T: Send + 'static>(value: Box<T>, epoch: u64) -> Self {
        Retired {
            ptr: Box::into_raw(value) as *mut (),
            dtor: drop_value::<T>,
            epoch,
        }
    }
}

impl Drop for Retired {
    /// Executes the type-erased destructor.
    /// 执行类型擦除的析构函数。
    #[inline(always)]
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                (self.dtor)(self.ptr);
            }
            self.ptr = std::ptr::null_mut();
        }
    }
}

/// A participant's private list of retired records.
///
/// Records are appended in epoch order. A sweep drops every record whose
/// retirement epoch is strictly below the minimum observed epoch, or all
/// of them when nobody is participating.
///
/// 参与者私有的退休记录列表。
/// 记录按纪元顺序追加。清扫会 drop 所有退休纪元严格小于最小观察纪元的记录；
/// 若没有参与者，则全部 drop。
pub(crate) struct RetireList {
    records: Vec<Retired>,
    /// Lifetime retirement count, drives epoch advancement.
    pub(crate) retired_total: u64,
}

impl RetireList {
    pub(crate) fn new() -> Self {
        Self {
            records: Vec::new(),
            retired_total: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub(crate) fn push(&mut self, record: Retired) {
        self.records.push(record);
        self.retired_total += 1;
    }

    /// Detach every record that no participant can still observe.
    ///
    /// The records are returned rather than dropped in place so the caller can
    /// run their destructors after releasing the list.
    ///
    /// 取出所有不再可能被任何参与者观察到的记录。
    /// 返回这些记录而不是就地 drop，以便调用者在释放列表后再执行析构。
    pub(crate) fn sweep(&mut self, oracle: &impl MinEpoch) -> Vec<Retired> {
        let min_epoch = oracle.min_epoch();

        if min_epoch == NOT_PARTICIPATING {
            return std::mem::take(&mut self.records);
        }

        let (keep, free): (Vec<_>, Vec<_>) = std::mem::take(&mut self.records)
            .into_iter()
            .partition(|record| record.epoch >= min_epoch);
        self.records = keep;
        free
    }
}

impl fmt::Debug for RetireList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetireList")
            .field("pending", &self.records.len())
            .field("retired_total", &self.retired_total)
            .finish()
    }
}
