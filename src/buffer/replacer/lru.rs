//! LRU (Least Recently Used) replacement policy.

use std::collections::{HashMap, HashSet};

use crate::buffer::frame::FrameId;

/// Evicts the unpinned frame whose last access is oldest.
///
/// Every access stamps the frame with a logical clock. Eviction scans the
/// evictable set for the smallest stamp; block caches in front of a B-tree
/// are small enough that a linear scan beats maintaining an ordered index.
#[derive(Debug, Default)]
pub struct LruReplacer {
    clock: u64,
    last_access: HashMap<FrameId, u64>,
    evictable: HashSet<FrameId>,
}

impl LruReplacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a frame was accessed.
    pub fn record_access(&mut self, frame_id: FrameId) {
        self.clock += 1;
        self.last_access.insert(frame_id, self.clock);
    }

    /// Mark a frame as evictable (pin count dropped to 0) or pinned.
    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if evictable {
            self.evictable.insert(frame_id);
        } else {
            self.evictable.remove(&frame_id);
        }
    }

    /// Select and forget the least recently used evictable frame.
    ///
    /// Returns `None` if every tracked frame is pinned.
    pub fn evict(&mut self) -> Option<FrameId> {
        let victim = self
            .evictable
            .iter()
            .min_by_key(|fid| self.last_access.get(fid).copied().unwrap_or(0))
            .copied()?;
        self.remove(victim);
        Some(victim)
    }

    /// Stop tracking a frame entirely.
    pub fn remove(&mut self, frame_id: FrameId) {
        self.last_access.remove(&frame_id);
        self.evictable.remove(&frame_id);
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.evictable.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fid(n: usize) -> FrameId {
        FrameId::new(n)
    }

    #[test]
    fn test_lru_evicts_oldest() {
        let mut replacer = LruReplacer::new();
        for i in 0..3 {
            replacer.record_access(fid(i));
            replacer.set_evictable(fid(i), true);
        }
        assert_eq!(replacer.size(), 3);

        assert_eq!(replacer.evict(), Some(fid(0)));
        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), Some(fid(2)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_reaccess_moves_to_back() {
        let mut replacer = LruReplacer::new();
        replacer.record_access(fid(0));
        replacer.record_access(fid(1));
        replacer.record_access(fid(0));
        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);

        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), Some(fid(0)));
    }

    #[test]
    fn test_skips_pinned() {
        let mut replacer = LruReplacer::new();
        for i in 0..3 {
            replacer.record_access(fid(i));
        }
        replacer.set_evictable(fid(1), true);

        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_remove() {
        let mut replacer = LruReplacer::new();
        replacer.record_access(fid(0));
        replacer.record_access(fid(1));
        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);

        replacer.remove(fid(0));

        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(fid(1)));
    }
}
