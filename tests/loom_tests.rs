//! Loom-based concurrency tests
//!
//! These tests use the `loom` library to exhaustively check thread
//! interleavings of the slot free-list, the epoch engine and the spin lock.
//!
//! Run with: `cargo test --features loom --test loom_tests --release`

#![cfg(feature = "loom")]

use loom::sync::Arc;
use loom::sync::atomic::{AtomicUsize, Ordering};
use loom::thread;
use versioned_epoch::{EpochEngine, RwSpinLock, SlotFreeList};

/// Test: two threads popping and pushing never hold the same slot
#[test]
fn loom_free_list_pop_push() {
    loom::model(|| {
        let list = Arc::new(SlotFreeList::from_values([0usize, 1]));
        let held = Arc::new([AtomicUsize::new(0), AtomicUsize::new(0)]);

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let list = Arc::clone(&list);
                let held = Arc::clone(&held);
                thread::spawn(move || {
                    if let Some(id) = list.pop() {
                        let index = *list.get(&id);
                        assert_eq!(held[index].fetch_add(1, Ordering::SeqCst), 0);
                        held[index].fetch_sub(1, Ordering::SeqCst);
                        list.push(id);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let mut count = 0;
        let mut drained = Vec::new();
        while let Some(id) = list.pop() {
            count += 1;
            drained.push(id);
        }
        assert_eq!(count, 2);
    });
}

struct Counted(Arc<AtomicUsize>);

impl Drop for Counted {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Test: a value retired while another participant is pinned is not dropped
/// until that participant exits
#[test]
fn loom_retire_while_pinned() {
    loom::model(|| {
        let engine = Arc::new(
            EpochEngine::builder()
                .max_participants(2)
                .sweep_interval(1)
                .build(),
        );
        let drops = Arc::new(AtomicUsize::new(0));
        let pinned = Arc::new(AtomicUsize::new(0));
        let retired = Arc::new(AtomicUsize::new(0));

        let reader = {
            let engine = Arc::clone(&engine);
            let drops = Arc::clone(&drops);
            let pinned = Arc::clone(&pinned);
            let retired = Arc::clone(&retired);
            thread::spawn(move || {
                let participant = engine.begin().unwrap();
                participant.enter();
                pinned.store(1, Ordering::Release);
                while retired.load(Ordering::Acquire) == 0 {
                    thread::yield_now();
                }
                assert_eq!(drops.load(Ordering::SeqCst), 0, "value dropped while pinned");
                participant.exit();
            })
        };

        let writer = {
            let engine = Arc::clone(&engine);
            let drops = Arc::clone(&drops);
            let pinned = Arc::clone(&pinned);
            let retired = Arc::clone(&retired);
            thread::spawn(move || {
                let participant = engine.begin().unwrap();
                while pinned.load(Ordering::Acquire) == 0 {
                    thread::yield_now();
                }
                // Sweeps immediately; the reader's pin keeps the value alive.
                participant.retire(Box::new(Counted(Arc::clone(&drops))));
                assert_eq!(participant.pending(), 1);
                retired.store(1, Ordering::Release);
            })
        };

        reader.join().unwrap();
        writer.join().unwrap();
        drop(engine);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    });
}

/// Test: a writer never overlaps with a reader or another writer
#[test]
fn loom_spin_lock_exclusion() {
    loom::model(|| {
        let lock = Arc::new(RwSpinLock::new());
        let inside = Arc::new(AtomicUsize::new(0));

        let writer = {
            let lock = Arc::clone(&lock);
            let inside = Arc::clone(&inside);
            thread::spawn(move || {
                let _w = lock.write();
                assert_eq!(inside.swap(usize::MAX, Ordering::SeqCst), 0);
                inside.store(0, Ordering::SeqCst);
            })
        };

        {
            let _r = lock.read();
            assert_ne!(inside.fetch_add(1, Ordering::SeqCst), usize::MAX);
            inside.fetch_sub(1, Ordering::SeqCst);
        }

        writer.join().unwrap();
    });
}
