//! Bounded snapshot cache keyed by quantized time
//!
//! Eviction follows insertion order only: reading an entry does not refresh
//! it, so the oldest insert goes first once the cache is over capacity.

use crate::snapshot::FieldSnapshot;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// A time value quantized to whole animation steps.
///
/// Times that differ by accumulated rounding drift land on the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeKey(pub i64);

impl TimeKey {
    pub fn from_time(time: f64, step: f64) -> Self {
        TimeKey((time / step).round() as i64)
    }

    /// The representative time of this key
    pub fn time(self, step: f64) -> f64 {
        self.0 as f64 * step
    }
}

/// Time-keyed store of computed snapshots plus a single derived-quantity slot
pub struct StateCache {
    capacity: usize,
    step: f64,
    entries: HashMap<TimeKey, Arc<FieldSnapshot>>,
    order: VecDeque<TimeKey>,
    wavelength: Option<f64>,
}

impl StateCache {
    /// `step` is the time quantum used to build keys
    pub fn new(capacity: usize, step: f64) -> Self {
        Self {
            capacity,
            step,
            entries: HashMap::with_capacity(capacity + 1),
            order: VecDeque::with_capacity(capacity + 1),
            wavelength: None,
        }
    }

    pub fn key(&self, time: f64) -> TimeKey {
        TimeKey::from_time(time, self.step)
    }

    /// Snap `time` onto its key's representative time. Every field stored
    /// under a key is evaluated at this time.
    pub fn quantize(&self, time: f64) -> f64 {
        self.key(time).time(self.step)
    }

    pub fn get(&self, time: f64) -> Option<Arc<FieldSnapshot>> {
        self.entries.get(&self.key(time)).cloned()
    }

    pub fn contains(&self, time: f64) -> bool {
        self.entries.contains_key(&self.key(time))
    }

    /// Insert a snapshot, evicting the oldest inserts while over capacity.
    ///
    /// Replacing an existing key keeps its original eviction position.
    pub fn put(&mut self, time: f64, snapshot: Arc<FieldSnapshot>) {
        let key = self.key(time);
        if self.entries.insert(key, snapshot).is_none() {
            self.order.push_back(key);
        }
        while self.entries.len() > self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    /// Drop every snapshot and the derived-quantity slot
    pub fn invalidate_all(&mut self) {
        if !self.entries.is_empty() {
            log::debug!("invalidating {} cached snapshots", self.entries.len());
        }
        self.entries.clear();
        self.order.clear();
        self.wavelength = None;
    }

    pub fn cached_wavelength(&self) -> Option<f64> {
        self.wavelength
    }

    pub fn store_wavelength(&mut self, wavelength: f64) {
        self.wavelength = Some(wavelength);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
