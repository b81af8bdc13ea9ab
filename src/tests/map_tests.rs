/// 无锁哈希表测试模块
/// 测试插入/覆盖/查找、容量与桶链耗尽、哨兵重映射以及节点复用
use crate::{Error, HashMap, BUCKET_SIZE, DEFAULT_BUCKETS};
use std::hash::{BuildHasherDefault, Hasher};

/// 直接把整数键作为哈希值，便于构造确定的桶冲突
#[derive(Default)]
struct IdentityHasher(u64);

impl Hasher for IdentityHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.0 = (self.0 << 8) | u64::from(*byte);
        }
    }

    fn write_u64(&mut self, n: u64) {
        self.0 = n;
    }
}

type IdentityMap = HashMap<u64, u64, BuildHasherDefault<IdentityHasher>>;

fn identity_map(buckets: usize, max_size: usize) -> IdentityMap {
    HashMap::builder()
        .buckets(buckets)
        .max_size(max_size)
        .build_with_hasher(BuildHasherDefault::default())
}

/// 测试1: 插入后可以查到，覆盖返回 false
#[test]
fn test_insert_get_overwrite() {
    let map: HashMap<u64, u64> = HashMap::new();
    assert!(map.is_empty());

    assert_eq!(map.insert(1u64, 100u64), Ok(true));
    assert_eq!(map.insert(2, 200), Ok(true));
    assert_eq!(map.get(&1), Some(100));
    assert_eq!(map.get(&2), Some(200));
    assert_eq!(map.len(), 2);

    assert_eq!(map.insert(1, 101), Ok(false));
    assert_eq!(map.get(&1), Some(101));
    assert_eq!(map.len(), 2);
}

/// 测试2: 查找不存在的键返回 None
#[test]
fn test_get_missing_key() {
    let map: HashMap<u32, u32> = HashMap::new();
    assert_eq!(map.get(&7), None);
    assert!(!map.contains_key(&7));

    map.insert(8, 1).unwrap();
    assert_eq!(map.get(&7), None);
    assert!(map.contains_key(&8));
}

/// 测试3: 默认配置
#[test]
fn test_default_configuration() {
    let map: HashMap<u64, u64> = HashMap::default();
    assert_eq!(map.bucket_count(), DEFAULT_BUCKETS);
    assert_eq!(map.max_size(), DEFAULT_BUCKETS * BUCKET_SIZE);
}

/// 测试4: 桶数向上取整为 2 的幂
#[test]
fn test_bucket_count_rounds_to_power_of_two() {
    let map: HashMap<u64, u64> = HashMap::with_buckets(100);
    assert_eq!(map.bucket_count(), 128);
    assert_eq!(map.max_size(), 128 * BUCKET_SIZE);

    let map: HashMap<u64, u64> = HashMap::with_buckets(0);
    assert_eq!(map.bucket_count(), 1);
}

/// 测试5: 达到 max_size 后插入失败，已有条目保持不变
#[test]
fn test_capacity_exceeded() {
    let map: HashMap<u64, u64> = HashMap::builder().max_size(4).build();
    for key in 0..4 {
        assert_eq!(map.insert(key, key * 10), Ok(true));
    }

    assert_eq!(
        map.insert(4, 40),
        Err(Error::CapacityExceeded { max_size: 4 })
    );
    assert_eq!(map.len(), 4);
    assert_eq!(map.get(&4), None);
    for key in 0..4 {
        assert_eq!(map.get(&key), Some(key * 10));
    }

    // Overwrites also count against the limit while the map is full.
    assert_eq!(
        map.insert(0, 1),
        Err(Error::CapacityExceeded { max_size: 4 })
    );
    assert_eq!(map.get(&0), Some(0));
}

/// 测试6: 同一个桶的 8 个槽位都被其他键占用时返回 BucketChainExhausted
#[test]
fn test_bucket_chain_exhausted() {
    let map = identity_map(1, 100);
    for key in 1..=8 {
        assert_eq!(map.insert(key, key), Ok(true));
    }

    assert_eq!(
        map.insert(9, 9),
        Err(Error::BucketChainExhausted { tag: 9 })
    );
    assert_eq!(map.len(), 8);
    assert_eq!(map.get(&9), None);

    // Existing keys can still be overwritten.
    assert_eq!(map.insert(3, 33), Ok(false));
    assert_eq!(map.get(&3), Some(33));
}

/// 测试7: 哈希等于空标签的键被重映射，并与真正哈希为重映射值的键共存
#[test]
fn test_empty_tag_hash_is_remapped() {
    let map = identity_map(4, 100);

    assert_eq!(map.insert(0, 1), Ok(true));
    assert_eq!(map.insert(u64::MAX, 2), Ok(true));
    assert_eq!(map.get(&0), Some(1));
    assert_eq!(map.get(&u64::MAX), Some(2));
    assert_eq!(map.len(), 2);
}

/// 测试8: 自定义哨兵值
#[test]
fn test_custom_sentinels() {
    let map: IdentityMap = HashMap::builder()
        .buckets(1)
        .sentinels(7, 8)
        .build_with_hasher(BuildHasherDefault::default());

    assert_eq!(map.insert(0, 100), Ok(true));
    assert_eq!(map.insert(7, 107), Ok(true));
    assert_eq!(map.insert(8, 108), Ok(true));
    assert_eq!(map.get(&0), Some(100));
    assert_eq!(map.get(&7), Some(107));
    assert_eq!(map.get(&8), Some(108));
}

/// 测试9: 相同的哨兵值被拒绝
#[test]
#[should_panic(expected = "sentinels must differ")]
fn test_equal_sentinels_rejected() {
    let _map: HashMap<u64, u64> = HashMap::builder().sentinels(3, 3).build();
}

/// 测试10: 被覆盖的键值节点被复用而不是重新分配
#[test]
fn test_replaced_entries_are_recycled() {
    let map: HashMap<u64, u64> = HashMap::new();
    map.insert(1u64, 10u64).unwrap();
    assert_eq!(map.entry_node_count(), 1);

    map.insert(1, 11).unwrap();
    assert_eq!(map.entry_node_count(), 2);

    map.insert(2, 20).unwrap();
    assert_eq!(map.entry_node_count(), 2);
    assert_eq!(map.get(&1), Some(11));
    assert_eq!(map.get(&2), Some(20));
}

/// 测试11: 桶链耗尽导致的失败不会泄漏键值节点
#[test]
fn test_failed_insert_recycles_entry() {
    let map = identity_map(1, 100);
    for key in 1..=8 {
        map.insert(key, key).unwrap();
    }
    let nodes = map.entry_node_count();

    for _ in 0..4 {
        assert!(map.insert(9, 9).is_err());
    }
    assert_eq!(map.entry_node_count(), nodes + 1);
}

/// 测试12: 错误信息
#[test]
fn test_error_display() {
    assert_eq!(
        Error::PoolExhausted { capacity: 4 }.to_string(),
        "all 4 participant slots are checked out"
    );
    assert_eq!(
        Error::CapacityExceeded { max_size: 16 }.to_string(),
        "hash map capacity of 16 entries exceeded"
    );
    assert_eq!(
        Error::BucketChainExhausted { tag: 9 }.to_string(),
        "bucket chain for hash tag 0x0000000000000009 has no free slot"
    );
}
