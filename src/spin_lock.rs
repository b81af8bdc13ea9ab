use crate::sync::{AtomicI64, Ordering, yield_now};

/// Counter value of an unlocked lock. Readers take 1 each, a writer takes all of it.
const UNLOCKED: i64 = 0x20_0000_0000;

/// A reader/writer spin lock built on a single biased counter.
///
/// The counter starts at a large bias. A reader subtracts one and succeeds
/// if the counter was positive; a writer subtracts the whole bias and
/// succeeds only if nothing else held it. A failed attempt undoes its
/// subtraction and yields before retrying.
///
/// Not used by the hash map; provided as a standalone primitive.
///
/// 基于单个偏置计数器的读写自旋锁。
/// 计数器初始为一个很大的偏置值。读者减一，若计数器此前为正则成功；
/// 写者减去整个偏置，仅当没有其他持有者时成功。失败的尝试会撤销减法并让出 CPU 后重试。
#[derive(Debug)]
pub struct RwSpinLock {
    lock: AtomicI64,
}

impl RwSpinLock {
    pub fn new() -> Self {
        Self {
            lock: AtomicI64::new(UNLOCKED),
        }
    }

    /// Acquire a shared hold, spinning until no writer is active.
    pub fn rlock(&self) {
        while !self.try_rlock() {
            yield_now();
        }
    }

    pub fn runlock(&self) {
        self.lock.fetch_add(1, Ordering::Release);
    }

    pub fn try_rlock(&self) -> bool {
        if self.lock.fetch_sub(1, Ordering::Acquire) > 0 {
            return true;
        }
        self.lock.fetch_add(1, Ordering::Relaxed);
        false
    }

    /// Acquire the exclusive hold, spinning until no reader or writer is active.
    pub fn wlock(&self) {
        while !self.try_wlock() {
            yield_now();
        }
    }

    pub fn wunlock(&self) {
        self.lock.fetch_add(UNLOCKED, Ordering::Release);
    }

    pub fn try_wlock(&self) -> bool {
        if self.lock.fetch_sub(UNLOCKED, Ordering::Acquire) == UNLOCKED {
            return true;
        }
        self.lock.fetch_add(UNLOCKED, Ordering::Relaxed);
        false
    }

    /// Shared hold released on drop.
    /// 共享持有，drop 时释放。
    #[inline]
    pub fn read(&self) -> ReadGuard<'_> {
        self.rlock();
        ReadGuard { lock: self }
    }

    /// Exclusive hold released on drop.
    /// 独占持有，drop 时释放。
    #[inline]
    pub fn write(&self) -> WriteGuard<'_> {
        self.wlock();
        WriteGuard { lock: self }
    }
}

impl Default for RwSpinLock {
    fn default() -> Self {
        Self::new()
    }
}

#[must_use]
pub struct ReadGuard<'a> {
    lock: &'a RwSpinLock,
}

impl Drop for ReadGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.lock.runlock();
    }
}

#[must_use]
pub struct WriteGuard<'a> {
    lock: &'a RwSpinLock,
}

impl Drop for WriteGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.lock.wunlock();
    }
}
