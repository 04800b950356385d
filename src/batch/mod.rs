mod extended;
mod subgraph;

pub use extended::ExtendedBatch;
pub use subgraph::{LocalIdMap, SubGraph};

use std::{num::NonZeroUsize, ops::Range};

/// The split of node ids `0..node_count` into consecutive batches.
///
/// Every batch holds `batch_size` ids except possibly the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batches {
    node_count: u64,
    batch_size: u64,
}

impl Batches {
    pub fn new(node_count: u64, batch_size: NonZeroUsize) -> Self {
        Self {
            node_count,
            batch_size: batch_size.get() as u64,
        }
    }

    pub fn len(&self) -> usize {
        self.node_count.div_ceil(self.batch_size) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.node_count == 0
    }

    /// Returns the node ids of the `index`-th batch.
    pub fn get(&self, index: usize) -> Option<Range<u64>> {
        let start = index as u64 * self.batch_size;
        (start < self.node_count).then(|| start..(start + self.batch_size).min(self.node_count))
    }

    pub fn iter(&self) -> impl Iterator<Item = Range<u64>> + '_ {
        (0..self.len()).filter_map(|i| self.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_batch_may_be_smaller() {
        let batches = Batches::new(7, NonZeroUsize::new(3).unwrap());

        assert_eq!(batches.len(), 3);
        assert_eq!(batches.iter().collect::<Vec<_>>(), [0..3, 3..6, 6..7]);
        assert_eq!(batches.get(3), None);
    }
}
