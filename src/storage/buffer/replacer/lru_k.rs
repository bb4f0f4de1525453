use std::collections::VecDeque;
use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::{AccessType, FrameId};

#[derive(Error, Debug)]
pub enum ReplacerError {
    #[error("Frame id {0} is out of range")]
    InvalidFrameId(FrameId),
    #[error("Frame {0} is not evictable")]
    NotEvictable(FrameId),
}

/// Per-frame access bookkeeping for the LRU-K policy.
///
/// `history` keeps the newest timestamp at the front and never grows past
/// `k` entries. A node "exists" from its first recorded access until it is
/// evicted or removed; the node object itself lives as long as the replacer.
struct LRUKNode {
    history: VecDeque<u64>,
    k: usize,
    is_evictable: bool,
    exists: bool,
}

impl LRUKNode {
    fn new(k: usize) -> Self {
        Self {
            history: VecDeque::new(),
            k,
            is_evictable: false,
            exists: false,
        }
    }

    fn access(&mut self, timestamp: u64) {
        self.exists = true;
        if self.history.len() >= self.k {
            self.history.pop_back();
        }
        self.history.push_front(timestamp);
    }

    /// Backward K-distance at time `now`; `u64::MAX` stands in for +inf
    /// when fewer than `k` accesses have been recorded.
    fn k_distance(&self, now: u64) -> u64 {
        if self.history.len() < self.k {
            return u64::MAX;
        }
        now - self.history.back().copied().unwrap_or(0)
    }

    /// Oldest timestamp still retained; for an under-K node this is its
    /// first access.
    fn earliest_timestamp(&self) -> u64 {
        self.history.back().copied().unwrap_or(0)
    }

    fn clear(&mut self) {
        self.history.clear();
        self.is_evictable = false;
        self.exists = false;
    }
}

struct LRUKStore {
    node_store: Vec<LRUKNode>,
    current_timestamp: u64,
    curr_size: usize,
}

/// LRU-K replacement policy over a fixed set of frames.
///
/// The eviction victim is the evictable frame with the largest backward
/// K-distance, where a frame with fewer than K recorded accesses counts as
/// infinitely distant. Ties fall back to plain LRU on the oldest retained
/// timestamp. Every operation is atomic behind an internal latch.
pub struct LRUKReplacer {
    inner: Mutex<LRUKStore>,
    replacer_size: usize,
}

impl LRUKReplacer {
    pub fn new(num_frames: usize, k: usize) -> Self {
        let node_store = (0..num_frames).map(|_| LRUKNode::new(k)).collect();
        Self {
            inner: Mutex::new(LRUKStore {
                node_store,
                current_timestamp: 0,
                curr_size: 0,
            }),
            replacer_size: num_frames,
        }
    }

    /// Record an access to a frame at the current timestamp.
    ///
    /// Evictability is left untouched.
    pub fn record_access(
        &self,
        frame_id: FrameId,
        _access_type: AccessType,
    ) -> Result<(), ReplacerError> {
        self.check_frame_id(frame_id)?;

        let mut inner = self.inner.lock();
        let timestamp = inner.current_timestamp;
        inner.current_timestamp += 1;
        inner.node_store[frame_id as usize].access(timestamp);
        Ok(())
    }

    /// Toggle whether a frame may be chosen as an eviction victim.
    ///
    /// Setting the flag to its current value changes nothing.
    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) -> Result<(), ReplacerError> {
        self.check_frame_id(frame_id)?;

        let mut inner = self.inner.lock();
        let node = &mut inner.node_store[frame_id as usize];
        if node.is_evictable == evictable {
            return Ok(());
        }
        node.is_evictable = evictable;
        if evictable {
            inner.curr_size += 1;
        } else {
            inner.curr_size -= 1;
        }
        Ok(())
    }

    /// Drop a frame's history outside the normal eviction flow.
    ///
    /// Unknown and never-accessed frames are ignored; a frame that exists
    /// but is pinned down as non-evictable is an error.
    pub fn remove(&self, frame_id: FrameId) -> Result<(), ReplacerError> {
        if frame_id as usize >= self.replacer_size {
            return Ok(());
        }

        let mut inner = self.inner.lock();
        let node = &mut inner.node_store[frame_id as usize];
        if !node.exists {
            return Ok(());
        }
        if !node.is_evictable {
            return Err(ReplacerError::NotEvictable(frame_id));
        }
        node.clear();
        inner.curr_size -= 1;
        Ok(())
    }

    /// Pick, clear, and return the eviction victim, if any frame is
    /// currently evictable.
    pub fn evict(&self) -> Option<FrameId> {
        let mut inner = self.inner.lock();
        let now = inner.current_timestamp;

        let mut victim: Option<FrameId> = None;
        let mut largest_distance = 0u64;
        let mut earliest_timestamp = u64::MAX;

        for (fid, node) in inner.node_store.iter().enumerate() {
            if !node.is_evictable {
                continue;
            }

            let distance = node.k_distance(now);
            let timestamp = node.earliest_timestamp();

            if victim.is_none()
                || distance > largest_distance
                || (distance == largest_distance && timestamp < earliest_timestamp)
            {
                victim = Some(fid as FrameId);
                largest_distance = distance;
                earliest_timestamp = timestamp;
            }
        }

        if let Some(fid) = victim {
            inner.node_store[fid as usize].clear();
            inner.curr_size -= 1;
        }

        victim
    }

    /// Number of frames currently evictable
    pub fn size(&self) -> usize {
        self.inner.lock().curr_size
    }

    fn check_frame_id(&self, frame_id: FrameId) -> Result<(), ReplacerError> {
        if frame_id as usize >= self.replacer_size {
            return Err(ReplacerError::InvalidFrameId(frame_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_under_k_node_is_infinitely_distant() {
        let replacer = LRUKReplacer::new(2, 2);
        replacer.record_access(0, AccessType::Unknown).unwrap();
        replacer.set_evictable(0, true).unwrap();

        let inner = replacer.inner.lock();
        assert_eq!(inner.node_store[0].k_distance(inner.current_timestamp), u64::MAX);
    }

    #[test]
    fn test_out_of_range_frame_rejected() {
        let replacer = LRUKReplacer::new(4, 2);
        assert!(replacer.record_access(4, AccessType::Unknown).is_err());
        assert!(replacer.set_evictable(4, true).is_err());
        // Remove is the one forgiving entry point.
        assert!(replacer.remove(4).is_ok());
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let replacer = LRUKReplacer::new(3, 2);
        for fid in [0u32, 1, 2, 0, 1] {
            replacer.record_access(fid, AccessType::Lookup).unwrap();
        }
        let inner = replacer.inner.lock();
        assert_eq!(inner.current_timestamp, 5);
        assert_eq!(inner.node_store[0].history, [3, 0]);
        assert_eq!(inner.node_store[1].history, [4, 1]);
    }

    #[test]
    fn test_history_capped_at_k() {
        let replacer = LRUKReplacer::new(1, 3);
        for _ in 0..10 {
            replacer.record_access(0, AccessType::Scan).unwrap();
        }
        let inner = replacer.inner.lock();
        assert_eq!(inner.node_store[0].history, [9, 8, 7]);
    }
}
