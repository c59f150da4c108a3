use buddy_pool::alloc::buddy::{block_size, buddy_of, class_for};
use buddy_pool::constants::{HEADER_SIZE, MAX_K, MIN_K, SMALLEST_K};
use buddy_pool::{AllocError, BuddyPool};

fn pool() -> BuddyPool {
    BuddyPool::new(1024).expect("Failed to create pool")
}

#[test]
fn test_buddy_alloc_basic() {
    let mut pool = pool();
    let p = pool.acquire(64).unwrap();
    pool.payload_mut(p).unwrap()[..8].copy_from_slice(&42u64.to_le_bytes());
    assert_eq!(&pool.payload(p).unwrap()[..8], &42u64.to_le_bytes());
    pool.release(p);
    pool.check_invariants().unwrap();
}

#[test]
fn test_adjacent_acquires_are_buddies() {
    let mut pool = pool();
    let p1 = pool.acquire(8).unwrap();
    let p2 = pool.acquire(8).unwrap();

    let k = class_for(8).unwrap();
    assert_eq!(p2.offset() - p1.offset(), block_size(k));
    assert_eq!(buddy_of(p1.block_offset(), k), p2.block_offset());
    assert_eq!(buddy_of(p2.block_offset(), k), p1.block_offset());
}

#[test]
fn test_full_coalescing_restores_fresh_state() {
    let mut pool = pool();
    let fresh = pool.snapshot();

    for size in [1, 8, 40, 41, 100, 1000, 4096, 65_536, (1 << MIN_K) - HEADER_SIZE] {
        let p = pool.acquire(size).unwrap();
        pool.release(p);
        assert_eq!(pool.snapshot(), fresh, "size {size}");
    }
}

#[test]
fn test_interleaved_release_coalesces_fully() {
    let mut pool = pool();
    let fresh = pool.snapshot();

    let blocks: Vec<_> = (0..64).map(|i| pool.acquire(16 + i * 37).unwrap()).collect();
    pool.check_invariants().unwrap();

    // Release odd indices, then even ones, so merges happen out of order.
    for b in blocks.iter().skip(1).step_by(2) {
        pool.release(*b);
        pool.check_invariants().unwrap();
    }
    for b in blocks.iter().step_by(2) {
        pool.release(*b);
        pool.check_invariants().unwrap();
    }
    assert_eq!(pool.snapshot(), fresh);
    assert_eq!(pool.reserved_blocks(), 0);
}

#[test]
fn test_conservation_across_operations() {
    let mut pool = pool();
    let mut live = Vec::new();
    for i in 0..200usize {
        if i % 3 == 2 {
            if let Some(p) = live.pop() {
                pool.release(p);
            }
        } else {
            live.push(pool.acquire(1 + (i * 97) % 2000).unwrap());
        }
        let stats = pool.stats();
        assert_eq!(stats.free_bytes + stats.reserved_bytes, stats.capacity);
        assert_eq!(stats.reserved_blocks, live.len());
        assert_eq!(stats.header_overhead(), live.len() * HEADER_SIZE);

        // Reserved bytes split into what callers can use plus header overhead.
        let usable: usize = live.iter().map(|&p| pool.usable_size(p).unwrap()).sum();
        assert_eq!(usable + stats.header_overhead(), stats.reserved_bytes);
    }
}

#[test]
fn test_oversized_request_is_side_effect_free() {
    let mut pool = pool();
    let _p = pool.acquire(100).unwrap();
    let before = pool.snapshot();

    assert_eq!(pool.acquire(1 << MIN_K), Err(AllocError::OutOfMemory));
    assert_eq!(pool.acquire(block_size(MAX_K)), Err(AllocError::OutOfMemory));
    assert_eq!(pool.acquire(usize::MAX), Err(AllocError::OutOfMemory));
    assert_eq!(pool.snapshot(), before);
    assert_eq!(pool.last_error(), Some(AllocError::OutOfMemory));
}

#[test]
fn test_exhaustion_is_side_effect_free() {
    let mut pool = pool();
    let half = (1 << (MIN_K - 1)) - HEADER_SIZE;
    let _a = pool.acquire(half).unwrap();
    let _b = pool.acquire(half).unwrap();
    let before = pool.snapshot();

    assert_eq!(pool.acquire(1), Err(AllocError::OutOfMemory));
    assert_eq!(pool.snapshot(), before);
}

#[test]
fn test_invalid_arguments() {
    let mut pool = pool();
    let before = pool.snapshot();
    assert_eq!(pool.acquire(0), Err(AllocError::InvalidArgument));
    assert_eq!(pool.snapshot(), before);
    assert_eq!(pool.last_error(), Some(AllocError::InvalidArgument));

    pool.clear_last_error();
    assert_eq!(pool.last_error(), None);

    // A successful call leaves the indicator alone.
    assert_eq!(pool.acquire(0), Err(AllocError::InvalidArgument));
    let _p = pool.acquire(1).unwrap();
    assert_eq!(pool.last_error(), Some(AllocError::InvalidArgument));
}

#[test]
fn test_release_none_is_noop() {
    let mut pool = pool();
    let before = pool.snapshot();
    pool.release(None);
    assert_eq!(pool.snapshot(), before);
}

#[test]
fn test_destroyed_pool() {
    let mut pool = pool();
    let p = pool.acquire(10).unwrap();
    pool.destroy();

    assert!(!pool.is_initialized());
    assert_eq!(pool.capacity(), 0);
    assert_eq!(pool.kval(), 0);
    assert!(pool.base_ptr().is_none());
    assert_eq!(pool.acquire(10), Err(AllocError::InvalidArgument));
    assert_eq!(pool.resize(None, 10), Err(AllocError::InvalidArgument));
    assert_eq!(pool.resize(p, 10), Err(AllocError::InvalidArgument));
    pool.release(p);
    pool.destroy();

    let mut never = BuddyPool::default();
    assert_eq!(never.acquire(1), Err(AllocError::InvalidArgument));
    never.destroy();
}

#[test]
fn test_resize_null_acquires() {
    let mut pool = pool();
    let p = pool.resize(None, 100).unwrap();
    assert_eq!(pool.class_of(p), class_for(100));
}

#[test]
fn test_resize_shrink_is_noop() {
    let mut pool = pool();
    let p = pool.acquire(100).unwrap();
    let before = pool.snapshot();

    let p2 = pool.resize(p, 10).unwrap();
    assert_eq!(p2, p);
    assert_eq!(pool.snapshot(), before);

    // Growing within the same block also keeps it.
    let usable = pool.usable_size(p).unwrap();
    assert_eq!(pool.resize(p, usable).unwrap(), p);
    assert_eq!(pool.resize(p, 0).unwrap(), p);
}

#[test]
fn test_resize_grow_copies_contents() {
    let mut pool = pool();
    let p = pool.acquire(100).unwrap();
    let old_len = pool.usable_size(p).unwrap();
    for (i, b) in pool.payload_mut(p).unwrap().iter_mut().enumerate() {
        *b = i as u8;
    }

    let q = pool.resize(p, 5000).unwrap();
    assert_ne!(q, p);
    assert!(pool.usable_size(q).unwrap() >= 5000);
    let data = pool.payload(q).unwrap();
    for (i, b) in data[..old_len].iter().enumerate() {
        assert_eq!(*b, i as u8);
    }

    // The old block went back to the pool.
    assert_eq!(pool.class_of(p), None);
    assert_eq!(pool.reserved_blocks(), 1);
    pool.check_invariants().unwrap();
}

#[test]
fn test_resize_failure_keeps_original() {
    let mut pool = pool();
    let p = pool.acquire(100).unwrap();
    pool.payload_mut(p).unwrap()[..5].copy_from_slice(b"hello");
    let before = pool.snapshot();

    assert_eq!(pool.resize(p, 1 << MIN_K), Err(AllocError::OutOfMemory));
    assert_eq!(pool.resize(p, usize::MAX), Err(AllocError::OutOfMemory));

    assert_eq!(pool.snapshot(), before);
    assert_eq!(&pool.payload(p).unwrap()[..5], b"hello");
    pool.payload_mut(p).unwrap()[5] = b'!';
    assert_eq!(&pool.payload(p).unwrap()[..6], b"hello!");
    pool.release(p);
    pool.check_invariants().unwrap();
}

#[test]
fn test_head_of_list_reuse() {
    let mut pool = pool();
    let a = pool.acquire(10).unwrap();
    let _guard1 = pool.acquire(10).unwrap();
    let c = pool.acquire(10).unwrap();
    let _guard2 = pool.acquire(10).unwrap();

    // Both freed blocks sit on the same list; the most recent one is reused.
    pool.release(a);
    pool.release(c);
    assert_eq!(pool.acquire(10).unwrap(), c);
    assert_eq!(pool.acquire(10).unwrap(), a);
}

#[test]
fn test_payload_alignment_and_raw_pointer() {
    let mut pool = pool();
    let p = pool.acquire(32).unwrap();
    let raw = pool.as_ptr(p).unwrap();
    assert_eq!(raw.as_ptr() as usize % 8, 0);

    let base = pool.base_ptr().unwrap();
    assert_eq!(raw.as_ptr() as usize - base.as_ptr() as usize, p.offset());

    unsafe { raw.as_ptr().cast::<u64>().write(0xDEAD_BEEF) };
    assert_eq!(&pool.payload(p).unwrap()[..8], &0xDEAD_BEEFu64.to_ne_bytes());
}

#[test]
fn test_describe_reports_every_block() {
    let mut pool = pool();
    let _a = pool.acquire(8).unwrap();
    let _b = pool.acquire(8).unwrap();
    let text = pool.describe();

    // The two smallest blocks are one fully reserved pair.
    assert!(text.contains(&format!("RESERVED 2^{} ", SMALLEST_K + 1)));
    for k in SMALLEST_K + 1..MIN_K {
        assert!(text.contains(&format!("AVAIL    2^{k} ")), "missing AVAIL 2^{k}");
    }
}

#[test]
fn test_snapshot_json() {
    let mut pool = pool();
    let _a = pool.acquire(8).unwrap();
    let json = pool.snapshot().to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["kval_m"], MIN_K);
    assert_eq!(value["avail"][SMALLEST_K][0]["offset"], 64);
}

#[test]
fn test_pool_behind_mutex() {
    use std::sync::{Arc, Mutex};

    let pool = Arc::new(Mutex::new(pool()));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pool = Arc::clone(&pool);
            std::thread::spawn(move || {
                for i in 0..50 {
                    let mut guard = pool.lock().unwrap();
                    let p = guard.acquire(1 + i * 13).unwrap();
                    guard.release(p);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    let pool = pool.lock().unwrap();
    assert_eq!(pool.reserved_blocks(), 0);
    pool.check_invariants().unwrap();
}
