mod csr;

pub use csr::{CsrGraph, CsrGraphBuilder};

/// Read access to the graph being embedded.
///
/// Node ids are dense, `0..node_count()`.
pub trait Graph: Send + Sync {
    fn node_count(&self) -> u64;

    /// Returns the amount of outgoing relationships of `node`.
    fn degree(&self, node: u64) -> usize;

    /// Calls `f` with the target and weight of every outgoing relationship of `node`,
    /// stopping as soon as `f` returns `false`.
    fn for_each_neighbor(&self, node: u64, f: &mut dyn FnMut(u64, f64) -> bool);

    /// Whether relationship weights carry information, unweighted graphs report `1.0`.
    fn is_weighted(&self) -> bool;

    /// Returns an independent handle to the same graph for another worker.
    fn concurrent_copy(&self) -> Self
    where
        Self: Sized;

    /// Returns the `index`-th outgoing relationship of `node`.
    fn nth_neighbor(&self, node: u64, index: usize) -> Option<(u64, f64)> {
        let mut seen = 0;
        let mut found = None;

        self.for_each_neighbor(node, &mut |target, weight| {
            if seen == index {
                found = Some((target, weight));
                return false;
            }

            seen += 1;
            true
        });

        found
    }
}
