//! End-to-end arena scenarios.

use anyhow::Result;
use rand::Rng;

use reserva_core::{Arena, ArenaConfig, ArenaError, MemoryCategory, MEMORY_TRACKER};

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

#[test]
fn default_arena_holds_a_thousand_ints() -> Result<()> {
    init_tracing();
    let arena = Arena::new()?;

    let ptr = arena.alloc_raw(1000 * std::mem::size_of::<i32>())?;
    assert_eq!(ptr.as_ptr() as usize % 8, 0);

    let ints = ptr.cast::<i32>().as_ptr();
    unsafe {
        for i in 0..1000 {
            ints.add(i).write(i as i32);
        }
        for i in 0..1000 {
            assert_eq!(ints.add(i).read(), i as i32);
        }
    }
    assert!(arena.allocated() >= 4000);
    Ok(())
}

#[test]
fn exhaustion_fails_cleanly_and_recovers() -> Result<()> {
    let arena = Arena::new()?;
    let before = arena.allocated();

    let err = arena.alloc_raw(300 * 1024 * 1024).unwrap_err();
    assert!(matches!(err, ArenaError::OutOfMemory { .. }));
    assert_eq!(arena.allocated(), before);

    // A smaller request still fits the untouched reservation.
    arena.alloc_raw(100 * 1024 * 1024)?;
    assert!(arena.allocated() >= 100 * 1024 * 1024);
    Ok(())
}

#[test]
fn reset_reuses_the_same_address() -> Result<()> {
    let mut arena = Arena::new()?;
    let p1 = arena.alloc_raw(1024)?;
    unsafe {
        p1.as_ptr().write_bytes(0xEE, 1024);
    }

    arena.reset()?;
    assert_eq!(arena.allocated(), 0);

    let p2 = arena.alloc_raw(1024)?;
    assert_eq!(p1, p2);

    // MADV_DONTNEED guarantees zero-fill pages on re-read; other targets
    // only promise the range stays usable.
    #[cfg(target_os = "linux")]
    unsafe {
        let bytes = std::slice::from_raw_parts(p2.as_ptr(), 1024);
        assert!(bytes.iter().all(|&b| b == 0));
    }
    Ok(())
}

#[test]
fn alignment_chain_after_odd_push() -> Result<()> {
    let arena = Arena::new()?;
    let first = arena.alloc_raw(1)?.as_ptr() as usize;
    let aligned = arena.alloc_raw_aligned(100, 64)?.as_ptr() as usize;
    assert_eq!(aligned % 64, 0);
    assert!(aligned > first);
    Ok(())
}

#[test]
fn single_byte_and_random_sizes_stay_aligned() -> Result<()> {
    let arena = Arena::new()?;
    arena.alloc_raw(1)?;

    let mut rng = rand::rng();
    let mut last_end = 0usize;
    for _ in 0..200 {
        let size = rng.random_range(1..=4096);
        let ptr = arena.alloc_raw(size)?.as_ptr() as usize;
        assert_eq!(ptr % 8, 0);
        assert!(ptr >= last_end, "allocations must not overlap");
        last_end = ptr + size;
    }
    Ok(())
}

#[test]
fn session_preset_reserves_large_address_space() -> Result<()> {
    // Address space only; physical pages stay untouched until committed.
    // Environments with an address-space ulimit cannot satisfy the
    // reservation at all, which the constructor reports as a platform
    // error instead of downgrading.
    let arena = match Arena::session() {
        Ok(arena) => arena,
        Err(ArenaError::Platform(_)) => return Ok(()),
        Err(other) => return Err(other.into()),
    };
    assert!(arena.reserved() >= 256 * 1024 * 1024 * 1024);
    assert!(arena.committed() < arena.reserved());
    arena.alloc_raw(1024)?;
    Ok(())
}

#[test]
fn tracker_accounts_reservations() -> Result<()> {
    // The tracker is process-global and other tests run concurrently, so
    // the assertion sticks to what this arena alone guarantees: while it
    // is alive, the category holds at least its reservation.
    let arena = Arena::new()?;
    let reserve = MEMORY_TRACKER.category(MemoryCategory::ArenaReserve);
    assert!(reserve.live_bytes >= arena.reserved() as u64);
    assert!(reserve.peak_bytes >= reserve.live_bytes);
    assert!(reserve.acquisitions > reserve.releases);
    let commit = MEMORY_TRACKER.category(MemoryCategory::ArenaCommit);
    assert!(commit.live_bytes >= arena.committed() as u64);
    Ok(())
}

#[test]
fn stats_snapshot_serializes() -> Result<()> {
    let arena = Arena::with_config(ArenaConfig::new().with_stats(true))?;
    arena.alloc_raw(64)?;
    let _ = arena.alloc_raw(0);

    let stats = arena.stats().expect("stats enabled");
    let json = serde_json::to_string(&stats)?;
    let round_trip: reserva_core::ArenaStats = serde_json::from_str(&json)?;
    assert_eq!(round_trip, stats);
    Ok(())
}

#[test]
fn typed_alloc_round_trips() -> Result<()> {
    let arena = Arena::new()?;
    let value = arena.alloc([1u64, 2, 3, 4])?;
    value[2] = 30;
    assert_eq!(*value, [1, 2, 30, 4]);

    let bytes = arena.alloc_slice_zeroed(4096)?;
    assert!(bytes.iter().all(|&b| b == 0));
    bytes[4095] = 1;
    Ok(())
}
