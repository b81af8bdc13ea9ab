//! Safe manual memory reclamation for lock-free data structures.
//!
//! Two independent schemes are provided:
//!
//! - [`EpochEngine`]: a bounded set of participants pins the global epoch
//!   with `enter`/`exit`; boxed values retired into a participant's private
//!   list are dropped once no pinned participant can still observe them.
//! - [`VersionEngine`]: nodes addressed by packed [`Versioned`] words are
//!   recycled through per-participant pools; optimistic readers validate a
//!   version snapshot instead of pinning anything.
//!
//! Built on top of them:
//!
//! - [`SlotFreeList`]: the lock-free LIFO both engines use to hand out
//!   participant slots.
//! - [`HashMap`]: a fixed-size lock-free map whose lookups rely on the
//!   version scheme for ABA-safe optimistic reads.
//! - [`RwSpinLock`]: a standalone reader/writer spin lock.
//!
//! 无锁数据结构的安全手动内存回收。
//! 提供两种相互独立的方案：基于纪元的 [`EpochEngine`] 与基于版本的 [`VersionEngine`]，
//! 以及在其之上构建的 [`SlotFreeList`]、[`HashMap`] 和 [`RwSpinLock`]。

mod arena;
mod epoch;
mod error;
mod free_list;
mod garbage;
mod map;
mod participant;
mod reader;
mod spin_lock;
mod state;
mod sync;
mod version;
mod versioned;

pub use epoch::{EpochEngine, EpochEngineBuilder};
pub use error::{Error, Result};
pub use free_list::{SlotFreeList, SlotId};
pub use map::{
    HashMap, HashMapBuilder, BUCKET_SIZE, DEFAULT_BUCKETS, DEFAULT_EMPTY_TAG, DEFAULT_REMAP_TAG,
};
pub use participant::{EpochGuard, Participant};
pub use reader::VersionedReader;
pub use spin_lock::{ReadGuard, RwSpinLock, WriteGuard};
pub use state::{MinEpoch, NOT_PARTICIPATING};
pub use version::{VersionEngine, VersionPool};
pub use versioned::{Versioned, VersionedAtomic, VERSION_BITS};

#[cfg(all(test, not(feature = "loom")))]
mod tests;
