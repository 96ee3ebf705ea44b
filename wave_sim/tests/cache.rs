// tests/cache.rs

use std::sync::Arc;
use wave_sim::{FieldSnapshot, StateCache, TimeKey};

const STEP: f64 = 1e-15;

fn snapshot(time: f64) -> Arc<FieldSnapshot> {
    Arc::new(FieldSnapshot::from_components(time, vec![1.0, 0.5, 0.0], vec![0.0, 0.5, 1.0]))
}

fn tick(i: usize) -> f64 {
    i as f64 * STEP
}

#[test]
fn test_capacity_evicts_earliest_inserts() {
    let mut cache = StateCache::new(100, STEP);
    for i in 0..150 {
        cache.put(tick(i), snapshot(tick(i)));
        assert!(cache.len() <= cache.capacity(), "cache over capacity after insert {i}");
    }

    assert_eq!(cache.len(), 100);
    for i in 0..50 {
        assert!(!cache.contains(tick(i)), "key {i} should have been evicted");
    }
    for i in 50..150 {
        assert!(cache.contains(tick(i)), "key {i} should still be cached");
    }
}

#[test]
fn test_reads_do_not_refresh_eviction_order() {
    let mut cache = StateCache::new(3, STEP);
    for i in 0..3 {
        cache.put(tick(i), snapshot(tick(i)));
    }
    for _ in 0..10 {
        assert!(cache.get(tick(0)).is_some());
    }

    cache.put(tick(3), snapshot(tick(3)));
    assert!(cache.get(tick(0)).is_none(), "oldest insert goes first regardless of reads");
    assert!(cache.contains(tick(1)));
    assert!(cache.contains(tick(3)));
}

#[test]
fn test_replacing_a_key_keeps_its_position() {
    let mut cache = StateCache::new(3, STEP);
    for i in 0..3 {
        cache.put(tick(i), snapshot(tick(i)));
    }

    let replacement = snapshot(tick(0));
    cache.put(tick(0), replacement.clone());
    assert_eq!(cache.len(), 3);
    let current = cache.get(tick(0)).unwrap();
    assert!(Arc::ptr_eq(&current, &replacement));

    cache.put(tick(3), snapshot(tick(3)));
    assert!(!cache.contains(tick(0)));
    assert_eq!(cache.len(), 3);
}

#[test]
fn test_drifting_times_share_a_key() {
    let drifted = 3.0 * STEP + 1e-27;
    let undershot = 3.0 * STEP - 4e-28;
    assert_ne!(drifted, 3.0 * STEP);
    assert_eq!(TimeKey::from_time(drifted, STEP), TimeKey::from_time(3.0 * STEP, STEP));
    assert_eq!(TimeKey::from_time(undershot, STEP), TimeKey(3));

    let mut cache = StateCache::new(10, STEP);
    cache.put(3.0 * STEP, snapshot(3.0 * STEP));
    assert!(cache.get(drifted).is_some());
    assert!(cache.get(4.0 * STEP).is_none());
}

#[test]
fn test_invalidate_all_clears_snapshots_and_wavelength() {
    let mut cache = StateCache::new(10, STEP);
    for i in 0..5 {
        cache.put(tick(i), snapshot(tick(i)));
    }
    cache.store_wavelength(1e-9);
    assert_eq!(cache.cached_wavelength(), Some(1e-9));

    cache.invalidate_all();
    assert!(cache.is_empty());
    assert_eq!(cache.cached_wavelength(), None);

    // Eviction order restarts cleanly
    for i in 10..21 {
        cache.put(tick(i), snapshot(tick(i)));
    }
    assert_eq!(cache.len(), 10);
    assert!(!cache.contains(tick(10)));
}
