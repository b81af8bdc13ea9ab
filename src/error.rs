use thiserror::Error;

/// Errors surfaced by the reclamation engines and the hash map.
///
/// Optimistic-read validation failures are not errors: they are retried
/// internally and never reach the caller.
///
/// 回收引擎与哈希表对外暴露的错误。
/// 乐观读校验失败不属于错误：它在内部重试，调用者不可见。
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Every participant slot of an `EpochEngine` is checked out.
    #[error("all {capacity} participant slots are checked out")]
    PoolExhausted { capacity: usize },

    /// The map already holds `max_size` live entries.
    #[error("hash map capacity of {max_size} entries exceeded")]
    CapacityExceeded { max_size: usize },

    /// Every slot along the bucket chain for this hash tag is taken by another key.
    #[error("bucket chain for hash tag {tag:#018x} has no free slot")]
    BucketChainExhausted { tag: u64 },
}

pub type Result<T> = std::result::Result<T, Error>;
