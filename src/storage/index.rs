//! In-memory index of the entry log.

use super::log::{FrameOp, ScannedFrame};
use std::collections::HashMap;

/// Maps each live entry id to the offset of its latest `Put` frame.
///
/// Also counts dead frames (superseded puts and deletes) so the store knows
/// when compaction pays off.
#[derive(Debug, Default)]
pub(crate) struct EntryIndex {
    offsets: HashMap<String, u64>,
    dead_frames: u64,
}

impl EntryIndex {
    /// Rebuild the index from a full log scan.
    pub fn rebuild(frames: &[ScannedFrame]) -> Self {
        let mut index = Self::default();
        for scanned in frames {
            index.apply(scanned.frame.op, &scanned.frame.key, scanned.offset);
        }
        index
    }

    /// Record one committed frame.
    pub fn apply(&mut self, op: FrameOp, key: &str, offset: u64) {
        match op {
            FrameOp::Put => {
                if self.offsets.insert(key.to_string(), offset).is_some() {
                    self.dead_frames += 1;
                }
            }
            FrameOp::Delete => {
                if self.offsets.remove(key).is_some() {
                    self.dead_frames += 1;
                }
                // the delete frame itself never points at live data
                self.dead_frames += 1;
            }
        }
    }

    pub fn offset_of(&self, key: &str) -> Option<u64> {
        self.offsets.get(key).copied()
    }

    /// Live ids with their offsets, in log order.
    pub fn live(&self) -> Vec<(String, u64)> {
        let mut live: Vec<(String, u64)> = self
            .offsets
            .iter()
            .map(|(k, &offset)| (k.clone(), offset))
            .collect();
        live.sort_by_key(|(_, offset)| *offset);
        live
    }

    pub fn live_count(&self) -> u64 {
        self.offsets.len() as u64
    }

    pub fn dead_frames(&self) -> u64 {
        self.dead_frames
    }

    /// Whether dead frames pass `threshold` and outnumber live entries.
    pub fn needs_compaction(&self, threshold: u64) -> bool {
        self.dead_frames >= threshold && self.dead_frames > self.live_count()
    }

    /// Replace all offsets after the log was rewritten.
    pub fn reset(&mut self, offsets: impl IntoIterator<Item = (String, u64)>) {
        self.offsets = offsets.into_iter().collect();
        self.dead_frames = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_supersedes() {
        let mut index = EntryIndex::default();
        index.apply(FrameOp::Put, "a", 0);
        index.apply(FrameOp::Put, "b", 10);
        index.apply(FrameOp::Put, "a", 20);

        assert_eq!(index.offset_of("a"), Some(20));
        assert_eq!(index.live_count(), 2);
        assert_eq!(index.dead_frames(), 1);
        assert_eq!(
            index.live(),
            vec![("b".to_string(), 10), ("a".to_string(), 20)]
        );
    }

    #[test]
    fn test_delete_counts_both_frames() {
        let mut index = EntryIndex::default();
        index.apply(FrameOp::Put, "a", 0);
        index.apply(FrameOp::Delete, "a", 10);
        assert_eq!(index.offset_of("a"), None);
        assert_eq!(index.dead_frames(), 2);

        // deleting an absent id still leaves a dead frame behind
        index.apply(FrameOp::Delete, "zzz", 20);
        assert_eq!(index.dead_frames(), 3);
    }

    #[test]
    fn test_compaction_threshold() {
        let mut index = EntryIndex::default();
        for i in 0..4 {
            index.apply(FrameOp::Put, "a", i * 10);
        }
        assert_eq!(index.dead_frames(), 3);
        assert!(index.needs_compaction(3));
        assert!(!index.needs_compaction(4));

        index.reset(vec![("a".to_string(), 0)]);
        assert_eq!(index.dead_frames(), 0);
        assert!(!index.needs_compaction(0));
    }
}
