//! Candidate ordering for the list scheduler.

use std::cmp::Ordering;

use crate::tree::NodeId;

/// Sort key for a ready operator node.
///
/// Implements `Ord` so candidates can be sorted (lower = issued first):
/// earliest operand readiness first, then the longer operation, then the order
/// in which the node became a candidate. The last component is unique per
/// node, which makes the order total and any sort deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateKey {
    pub early_start: u64,
    pub duration: u64,
    pub discovery: u64,
    pub node: NodeId,
}

impl Ord for CandidateKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.early_start
            .cmp(&other.early_start)
            .then(other.duration.cmp(&self.duration))
            .then(self.discovery.cmp(&other.discovery))
            .then(self.node.cmp(&other.node))
    }
}

impl PartialOrd for CandidateKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sort candidate keys in issue order and return the node ids.
pub fn sort_candidates(mut keys: Vec<CandidateKey>) -> Vec<NodeId> {
    keys.sort_unstable();
    keys.into_iter().map(|k| k.node).collect()
}
