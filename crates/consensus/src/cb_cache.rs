//! Bounded cache of cycle-boundary records.

use rotor_types::DposCBInfo;
use std::collections::BTreeMap;

/// Maps cycle number to its recorded boundary info.
///
/// Bounded: when full, inserting a new cycle evicts the numerically
/// smallest one. Updating an existing cycle overwrites in place.
#[derive(Debug)]
pub struct CycleBoundaryCache {
    entries: BTreeMap<i64, DposCBInfo>,
    capacity: usize,
}

impl CycleBoundaryCache {
    /// Create a cache holding at most `capacity` cycles.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Number of cached cycles.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or overwrite the record for its cycle, evicting the smallest
    /// cycle if the cache is full.
    pub fn update(&mut self, info: DposCBInfo) {
        if !self.entries.contains_key(&info.cycle) && self.entries.len() >= self.capacity {
            self.entries.pop_first();
        }
        self.entries.insert(info.cycle, info);
    }

    /// Look up the record for a cycle.
    pub fn get(&self, cycle: i64) -> Option<&DposCBInfo> {
        self.entries.get(&cycle)
    }
}
